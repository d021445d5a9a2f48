#![forbid(unsafe_code)]

//! Responses produced by a session.
//!
//! Indirect responses travel back to the relying party as a redirect to
//! `return_to`; direct responses are a KeyValue Form body.

use openid2_core::{Error, Result};
use openid2_message::Message;
use url::Url;

const KEY_VALUE_CONTENT_TYPE: &str = "text/plain;charset=utf-8";

/// How a response reaches the relying party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    /// Send the user agent to `return_to` with the message in the query.
    Redirect { return_to: String },
    /// Reply in the HTTP body of the relying party's own request.
    Direct,
}

#[derive(Debug, Clone)]
pub struct Response {
    message: Message,
    kind: ResponseKind,
}

impl Response {
    pub fn redirect(message: Message, return_to: impl Into<String>) -> Self {
        Self {
            message,
            kind: ResponseKind::Redirect {
                return_to: return_to.into(),
            },
        }
    }

    pub fn direct(message: Message) -> Self {
        Self {
            message,
            kind: ResponseKind::Direct,
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn into_message(self) -> Message {
        self.message
    }

    pub fn kind(&self) -> &ResponseKind {
        &self.kind
    }

    pub fn needs_redirect(&self) -> bool {
        matches!(self.kind, ResponseKind::Redirect { .. })
    }

    /// `None` for redirects, which carry no body.
    pub fn content_type(&self) -> Option<&'static str> {
        match self.kind {
            ResponseKind::Redirect { .. } => None,
            ResponseKind::Direct => Some(KEY_VALUE_CONTENT_TYPE),
        }
    }

    /// KeyValue Form encoding of every field.
    pub fn body(&self) -> Result<Vec<u8>> {
        self.message.to_key_value_all()
    }

    /// The URL to redirect to: `return_to` with the message merged into
    /// its query. Message fields replace query parameters of the same name.
    pub fn redirect_to(&self) -> Result<String> {
        let ResponseKind::Redirect { return_to } = &self.kind else {
            return Err(Error::InvalidUrl("direct response has no redirect target".into()));
        };
        let mut url = Url::parse(return_to)
            .map_err(|e| Error::InvalidUrl(format!("return_to {return_to}: {e}")))?;

        let fields = self.message.to_query();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !fields.iter().any(|(f, _)| f == k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().chain(fields.iter()));
        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openid2_core::ns;

    fn message() -> Message {
        let mut msg = Message::new(ns::OPENID20);
        msg.set_openid_arg("mode", "cancel");
        msg
    }

    #[test]
    fn test_direct() {
        let resp = Response::direct(message());
        assert!(!resp.needs_redirect());
        assert_eq!(resp.content_type(), Some("text/plain;charset=utf-8"));
        assert_eq!(
            resp.body().unwrap(),
            b"ns:http://specs.openid.net/auth/2.0\nmode:cancel\n"
        );
        assert!(matches!(resp.redirect_to(), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_redirect_merges_query() {
        let resp = Response::redirect(
            message(),
            "http://rp.example.com/back?session=1&openid.mode=stale",
        );
        assert!(resp.needs_redirect());
        assert_eq!(resp.content_type(), None);

        let target = Url::parse(&resp.redirect_to().unwrap()).unwrap();
        let pairs: Vec<(String, String)> = target.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            [
                ("session".to_string(), "1".to_string()),
                ("openid.ns".to_string(), ns::OPENID20.to_string()),
                ("openid.mode".to_string(), "cancel".to_string()),
            ]
        );
        assert_eq!(target.path(), "/back");
    }

    #[test]
    fn test_redirect_bad_return_to() {
        let resp = Response::redirect(message(), "/relative/only");
        assert!(matches!(resp.redirect_to(), Err(Error::InvalidUrl(_))));
    }
}
