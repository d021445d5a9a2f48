#![forbid(unsafe_code)]

//! Key-Value Form encoding.
//!
//! Each requested key becomes one `key:value\n` line, in the order given.
//! A leading `openid.` is dropped from the line key. This is the byte string
//! that signatures are computed over and the body of direct responses.

use crate::message::{Message, MessageKey, MessageValue};
use openid2_core::{ns, Error, Result};

impl Message {
    /// Encode the listed keys in Key-Value Form.
    ///
    /// Keys are fully qualified (`openid.mode`, `openid.ns.sreg`,
    /// `openid.sreg.email`). A key without the `openid.` prefix, or one that
    /// resolves to nothing, fails with [`Error::ValueNotFound`].
    pub fn to_key_value<S: AsRef<str>>(&self, order: &[S]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for key in order {
            let key = key.as_ref();
            let line_key = key
                .strip_prefix(ns::PREFIX)
                .ok_or_else(|| Error::ValueNotFound(key.to_owned()))?;

            if line_key.contains(':') {
                return Err(Error::KeyContainsColon(key.to_owned()));
            }
            if line_key.contains('\n') {
                return Err(Error::KeyContainsNewLine(key.to_owned()));
            }

            let value = self
                .resolve(line_key)
                .ok_or_else(|| Error::ValueNotFound(key.to_owned()))?;
            if value.contains('\n') {
                return Err(Error::ValueContainsNewLine(key.to_owned()));
            }

            out.extend_from_slice(line_key.as_bytes());
            out.push(b':');
            out.extend_from_slice(value.as_bytes());
            out.push(b'\n');
        }
        Ok(out)
    }

    /// Encode every key of the message, as used for direct response bodies.
    pub fn to_key_value_all(&self) -> Result<Vec<u8>> {
        self.to_key_value(&self.keys())
    }

    /// Resolve a key with the `openid.` prefix already removed.
    fn resolve(&self, key: &str) -> Option<&str> {
        match key.split_once('.') {
            None if key == ns::field::NS => Some(self.namespace().as_str()),
            None => self.openid_arg(key).map(MessageValue::as_str),
            Some((ns::field::NS, alias)) => self.namespace_uri(alias).map(|u| u.as_str()),
            Some((alias, local)) => match self.namespace_uri(alias) {
                Some(uri) if alias != "openid" => self
                    .arg(&MessageKey::new(uri.clone(), local))
                    .map(MessageValue::as_str),
                // Undeclared alias: the argument was kept under the protocol
                // namespace with its dotted name.
                _ => self.openid_arg(key).map(MessageValue::as_str),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS_EXT: &str = "http://example.com/";

    fn sample() -> Message {
        let mut msg = Message::new(ns::OPENID20);
        msg.set_namespace_alias("example", NS_EXT).unwrap();
        msg.add_arg(MessageKey::new(NS_EXT, "foo"), "bar");
        msg.set_openid_arg("mode", "id_res");
        msg.set_openid_arg("return_to", "http://www.example.com/");
        msg
    }

    #[test]
    fn test_key_value_order_and_prefix() {
        let kv = sample()
            .to_key_value(&["openid.mode", "openid.return_to", "openid.example.foo", "openid.ns"])
            .unwrap();
        assert_eq!(
            String::from_utf8(kv).unwrap(),
            "mode:id_res\n\
             return_to:http://www.example.com/\n\
             example.foo:bar\n\
             ns:http://specs.openid.net/auth/2.0\n"
        );
    }

    #[test]
    fn test_key_value_alias_declaration() {
        let kv = sample().to_key_value(&["openid.ns.example"]).unwrap();
        assert_eq!(kv, b"ns.example:http://example.com/\n");
    }

    #[test]
    fn test_key_value_all_keys() {
        let msg = sample();
        let kv = String::from_utf8(msg.to_key_value_all().unwrap()).unwrap();
        assert_eq!(kv.lines().count(), msg.keys().len());
        assert!(kv.starts_with("ns:http://specs.openid.net/auth/2.0\n"));
    }

    #[test]
    fn test_key_value_requires_prefix() {
        let msg = sample();
        assert_eq!(
            msg.to_key_value(&["mode"]).unwrap_err(),
            Error::ValueNotFound("mode".into())
        );
        assert_eq!(
            msg.to_key_value(&["ns"]).unwrap_err(),
            Error::ValueNotFound("ns".into())
        );
        assert!(msg.to_key_value(&["openid.mode"]).is_ok());
    }

    #[test]
    fn test_key_value_missing() {
        let err = sample().to_key_value(&["openid.assoc_handle"]).unwrap_err();
        assert_eq!(err, Error::ValueNotFound("openid.assoc_handle".into()));
    }

    #[test]
    fn test_key_value_rejects_separators() {
        let mut msg = sample();
        assert!(matches!(
            msg.to_key_value(&["openid.a:b"]),
            Err(Error::KeyContainsColon(_))
        ));
        assert!(matches!(
            msg.to_key_value(&["openid.a\nb"]),
            Err(Error::KeyContainsNewLine(_))
        ));

        msg.set_openid_arg("mode", "id_res\nis_valid:true");
        assert!(matches!(
            msg.to_key_value(&["openid.mode"]),
            Err(Error::ValueContainsNewLine(_))
        ));
    }

    #[test]
    fn test_key_value_empty_order() {
        let order: [&str; 0] = [];
        assert!(sample().to_key_value(&order).unwrap().is_empty());
    }

    #[test]
    fn test_key_value_undeclared_alias() {
        let mut msg = Message::new(ns::OPENID20);
        msg.set_openid_arg("unknown.field", "v");
        assert_eq!(msg.to_key_value(&["openid.unknown.field"]).unwrap(), b"unknown.field:v\n");
    }
}
