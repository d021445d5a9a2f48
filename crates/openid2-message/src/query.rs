#![forbid(unsafe_code)]

//! HTTP parameter codec.
//!
//! Parameters that do not start with `openid.` are ignored. `openid.ns`
//! selects the protocol version (defaulting to OpenID 1.1 when absent),
//! `openid.ns.<alias>` declares an extension namespace, and everything else
//! becomes an argument under the namespace its alias names.

use crate::message::{validate_alias, Message, MessageKey};
use openid2_core::{ns, Error, Result};
use std::collections::BTreeMap;
use tracing::trace;
use url::form_urlencoded;

impl Message {
    /// Build a message from decoded HTTP parameters.
    ///
    /// A parameter repeated with differing values is rejected; exact
    /// duplicates collapse.
    pub fn from_query<I, K, V>(params: I) -> Result<Message>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut seen: BTreeMap<String, String> = BTreeMap::new();
        let mut namespace: Option<String> = None;
        let mut aliases: BTreeMap<String, String> = BTreeMap::new();
        // (alias, local key) -> value; alias "" is the protocol namespace.
        let mut raw_args: BTreeMap<(String, String), String> = BTreeMap::new();

        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());

            if let Some(prev) = seen.get(key) {
                if prev != value {
                    return Err(Error::MalformedMessage(format!(
                        "parameter {key} given more than once"
                    )));
                }
                continue;
            }
            seen.insert(key.to_owned(), value.to_owned());

            let Some(rest) = key.strip_prefix(ns::PREFIX) else {
                continue;
            };
            if rest.is_empty() {
                return Err(Error::MalformedMessage("empty parameter name".into()));
            }

            match rest.split_once('.') {
                None if rest == ns::field::NS => namespace = Some(value.to_owned()),
                None => {
                    raw_args.insert((String::new(), rest.to_owned()), value.to_owned());
                }
                Some((ns::field::NS, alias)) => {
                    validate_alias(alias)?;
                    if aliases.values().any(|uri| uri == value) {
                        return Err(Error::MalformedMessage(format!(
                            "namespace {value} declared under two aliases"
                        )));
                    }
                    aliases.insert(alias.to_owned(), value.to_owned());
                }
                Some((alias, local)) => {
                    if alias.is_empty() || local.is_empty() {
                        return Err(Error::MalformedMessage(format!(
                            "malformed parameter name: {key}"
                        )));
                    }
                    raw_args.insert((alias.to_owned(), local.to_owned()), value.to_owned());
                }
            }
        }

        let namespace = match namespace {
            Some(uri) if ns::is_supported_version(&uri) => uri,
            Some(uri) => return Err(Error::UnsupportedVersion(uri)),
            None => ns::OPENID11.to_owned(),
        };

        let mut msg = Message::new(namespace.as_str());
        for (alias, uri) in &aliases {
            msg.set_namespace_alias(alias.as_str(), uri.as_str())?;
        }

        for ((alias, local), value) in raw_args {
            let key = if alias.is_empty() {
                MessageKey::new(namespace.as_str(), local)
            } else if let Some(uri) = aliases.get(&alias) {
                MessageKey::new(uri.as_str(), local)
            } else {
                MessageKey::new(namespace.as_str(), format!("{alias}.{local}"))
            };
            msg.add_arg(key, value);
        }

        trace!("Parsed message in {} with {} args", msg.namespace(), msg.len());
        Ok(msg)
    }

    /// Parse an `application/x-www-form-urlencoded` query string or body.
    pub fn from_query_string(query: &str) -> Result<Message> {
        let query = query.strip_prefix('?').unwrap_or(query);
        Message::from_query(form_urlencoded::parse(query.as_bytes()))
    }

    /// Every key of the message paired with its value, in [`Message::keys`] order.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(1 + self.len());
        out.push((
            format!("{}{}", ns::PREFIX, ns::field::NS),
            self.namespace().to_string(),
        ));
        for (alias, uri) in self.namespace_aliases() {
            out.push((
                format!("{}{}.{alias}", ns::PREFIX, ns::field::NS),
                uri.to_string(),
            ));
        }
        for (key, value) in self.args() {
            if let Some(qualified) = self.qualified_key(key) {
                out.push((qualified, value.to_string()));
            }
        }
        out
    }

    /// Form-encode [`Message::to_query`].
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_query())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query_openid2() {
        let msg = Message::from_query([
            ("openid.ns", ns::OPENID20),
            ("openid.ns.example", "http://example.com/"),
            ("openid.mode", "checkid_immediate"),
            ("openid.example.foo", "bar"),
            ("openid.example.hoge", "fuga"),
            ("openid.return_to", "http://www.example.com/"),
            ("unrelated", "ignored"),
        ])
        .unwrap();

        assert_eq!(msg.namespace(), &ns::OPENID20);
        assert_eq!(msg.openid_arg("mode").unwrap(), "checkid_immediate");
        assert_eq!(
            msg.arg(&MessageKey::new("http://example.com/", "hoge")).unwrap(),
            "fuga"
        );
        assert_eq!(msg.len(), 4);
    }

    #[test]
    fn test_from_query_defaults_to_openid11() {
        let msg = Message::from_query([("openid.mode", "associate")]).unwrap();
        assert_eq!(msg.namespace(), &ns::OPENID11);
        assert!(msg.is_openid1());
    }

    #[test]
    fn test_from_query_rejects_unknown_version() {
        let err = Message::from_query([("openid.ns", "http://example.com/")]).unwrap_err();
        assert_eq!(err, Error::UnsupportedVersion("http://example.com/".into()));
    }

    #[test]
    fn test_from_query_rejects_bad_alias() {
        for alias in ["openid.ns.mode", "openid.ns.a.b", "openid.ns."] {
            let r = Message::from_query([("openid.ns", ns::OPENID20), (alias, "http://x/")]);
            assert!(matches!(r, Err(Error::MalformedMessage(_))), "{alias}");
        }
    }

    #[test]
    fn test_from_query_rejects_duplicate_alias_target() {
        let r = Message::from_query([
            ("openid.ns.a", "http://x/"),
            ("openid.ns.b", "http://x/"),
        ]);
        assert!(matches!(r, Err(Error::MalformedMessage(_))));
    }

    #[test]
    fn test_from_query_repeated_parameter() {
        let r = Message::from_query([("openid.mode", "a"), ("openid.mode", "b")]);
        assert!(matches!(r, Err(Error::MalformedMessage(_))));

        let msg = Message::from_query([("openid.mode", "a"), ("openid.mode", "a")]).unwrap();
        assert_eq!(msg.openid_arg("mode").unwrap(), "a");
    }

    #[test]
    fn test_from_query_undeclared_alias() {
        let msg = Message::from_query([
            ("openid.ns", ns::OPENID20),
            ("openid.sreg.email", "a@example.com"),
        ])
        .unwrap();
        assert_eq!(msg.openid_arg("sreg.email").unwrap(), "a@example.com");
        assert!(msg.keys().contains(&"openid.sreg.email".to_owned()));
    }

    #[test]
    fn test_query_string_round_trip() {
        let input = "openid.ns=http%3A%2F%2Fspecs.openid.net%2Fauth%2F2.0\
                     &openid.mode=checkid_setup\
                     &openid.return_to=http%3A%2F%2Frp.example.com%2F%3Fa%3D1%26b%3D2";
        let msg = Message::from_query_string(input).unwrap();
        assert_eq!(
            msg.openid_arg("return_to").unwrap(),
            "http://rp.example.com/?a=1&b=2"
        );
        let again = Message::from_query_string(&msg.to_query_string()).unwrap();
        assert_eq!(msg, again);
    }

    #[test]
    fn test_to_query_covers_keys() {
        let msg = Message::from_query([
            ("openid.ns", ns::OPENID20),
            ("openid.ns.ext", "http://ext/"),
            ("openid.ext.a", "1"),
            ("openid.mode", "id_res"),
        ])
        .unwrap();
        let keys: Vec<String> = msg.to_query().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, msg.keys());
    }
}
