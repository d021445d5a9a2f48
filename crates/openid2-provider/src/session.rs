#![forbid(unsafe_code)]

//! One-shot sessions: the computation that turns a parsed request into a
//! response.
//!
//! A session borrows its [`Provider`] for the store, signer and random
//! source. Only checkid sessions take input from the caller (the user's
//! decision) before the response is built.

use crate::nonce::generate_nonce;
use crate::provider::Provider;
use crate::request::{
    AssociateRequest, CheckAuthenticationRequest, CheckIdMode, CheckIdRequest, Request,
};
use crate::response::Response;
use crate::signer::{signed_fields, Verification};
use chrono::Utc;
use openid2_core::{ns, Error, Result, SessionType};
use openid2_crypto::encoding::base64_encode;
use openid2_crypto::PrivateKey;
use openid2_message::Message;
use tracing::{debug, warn};
use url::Url;

/// A session for one request.
pub enum Session<'p> {
    CheckId(CheckIdSession<'p>),
    Associate(AssociateSession<'p>),
    CheckAuthentication(CheckAuthenticationSession<'p>),
}

impl<'p> Session<'p> {
    pub(crate) fn new(provider: &'p Provider, request: Request) -> Self {
        match request {
            Request::CheckId(request) => Session::CheckId(CheckIdSession {
                provider,
                request,
                assertion: None,
            }),
            Request::Associate(request) => {
                Session::Associate(AssociateSession { provider, request })
            }
            Request::CheckAuthentication(request) => {
                Session::CheckAuthentication(CheckAuthenticationSession { provider, request })
            }
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Session::CheckId(s) => s.request.mode().as_str(),
            Session::Associate(_) => ns::mode::ASSOCIATE,
            Session::CheckAuthentication(_) => ns::mode::CHECK_AUTHENTICATION,
        }
    }

    pub fn response(&self) -> Result<Response> {
        match self {
            Session::CheckId(s) => s.response(),
            Session::Associate(s) => s.response(),
            Session::CheckAuthentication(s) => s.response(),
        }
    }
}

// ── checkid ──────────────────────────────────────────────────────────

/// Identifiers the provider vouches for in a positive assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Assertion {
    identity: Option<String>,
    claimed_id: Option<String>,
}

pub struct CheckIdSession<'p> {
    provider: &'p Provider,
    request: CheckIdRequest,
    assertion: Option<Assertion>,
}

impl<'p> CheckIdSession<'p> {
    pub fn request(&self) -> &CheckIdRequest {
        &self.request
    }

    /// Record that the user authenticated as `identity`.
    ///
    /// Empty strings mean "not supplied". Under identifier select the
    /// caller must name the identity and `claimed_id` defaults to it. When
    /// the request pinned an identity, a supplied identity must equal it.
    /// When the request carried no identity, none may be supplied.
    pub fn accept(&mut self, identity: &str, claimed_id: &str) -> Result<()> {
        let assertion = if self.request.is_identifier_select() {
            if identity.is_empty() {
                return Err(Error::IdentityNotSet);
            }
            let claimed_id = if claimed_id.is_empty() { identity } else { claimed_id };
            Assertion {
                identity: Some(identity.to_owned()),
                claimed_id: Some(claimed_id.to_owned()),
            }
        } else if let Some(requested) = self.request.identity() {
            if !identity.is_empty() && identity != requested {
                return Err(Error::IdentityNotMatched(identity.to_owned()));
            }
            Assertion {
                identity: Some(requested.to_owned()),
                claimed_id: self.request.claimed_id().map(str::to_owned),
            }
        } else {
            if !identity.is_empty() {
                return Err(Error::IdentitySet);
            }
            Assertion {
                identity: None,
                claimed_id: None,
            }
        };

        debug!(
            "Accepted {} request for {}",
            self.request.mode().as_str(),
            assertion.identity.as_deref().unwrap_or("no identifier")
        );
        self.assertion = Some(assertion);
        Ok(())
    }

    /// Withdraw a previous [`accept`](Self::accept). Sessions start rejected.
    pub fn reject(&mut self) {
        self.assertion = None;
    }

    pub fn is_accepted(&self) -> bool {
        self.assertion.is_some()
    }

    pub fn response(&self) -> Result<Response> {
        let return_to = self.request.return_to().ok_or_else(|| {
            Error::InvalidCheckIdRequest("cannot respond without return_to".into())
        })?;

        let message = match &self.assertion {
            Some(assertion) => self.positive_assertion(assertion, return_to)?,
            None => self.negative_assertion()?,
        };
        Ok(Response::redirect(message, return_to))
    }

    fn positive_assertion(&self, assertion: &Assertion, return_to: &str) -> Result<Message> {
        let provider = self.provider;
        let mut msg = Message::new(self.request.message().namespace().clone());
        msg.set_openid_arg(ns::field::MODE, ns::mode::ID_RES);
        msg.set_openid_arg(ns::field::OP_ENDPOINT, provider.endpoint());
        if let Some(claimed_id) = &assertion.claimed_id {
            msg.set_openid_arg(ns::field::CLAIMED_ID, claimed_id.as_str());
        }
        if let Some(identity) = &assertion.identity {
            msg.set_openid_arg(ns::field::IDENTITY, identity.as_str());
        }
        msg.set_openid_arg(ns::field::RETURN_TO, return_to);
        let nonce = generate_nonce(Utc::now(), provider.random())?;
        msg.set_openid_arg(ns::field::RESPONSE_NONCE, nonce);

        let order = signed_fields(&msg);
        provider
            .signer()
            .sign(&mut msg, self.request.assoc_handle(), &order)?;
        Ok(msg)
    }

    fn negative_assertion(&self) -> Result<Message> {
        let request = self.request.message();
        let mut msg = Message::new(request.namespace().clone());
        match self.request.mode() {
            CheckIdMode::Setup => {
                msg.set_openid_arg(ns::field::MODE, ns::mode::CANCEL);
            }
            CheckIdMode::Immediate => {
                // 1.x has no setup_needed mode; the setup URL rides on id_res.
                let mode = if request.is_openid1() {
                    ns::mode::ID_RES
                } else {
                    ns::mode::SETUP_NEEDED
                };
                msg.set_openid_arg(ns::field::MODE, mode);
                msg.set_openid_arg(ns::field::USER_SETUP_URL, self.setup_url()?);
            }
        }
        Ok(msg)
    }

    /// The provider endpoint carrying this request as a `checkid_setup`.
    fn setup_url(&self) -> Result<String> {
        let endpoint = self.provider.endpoint();
        let mut url = Url::parse(endpoint)
            .map_err(|e| Error::InvalidUrl(format!("endpoint {endpoint}: {e}")))?;

        let mut setup = self.request.message().clone();
        setup.set_openid_arg(ns::field::MODE, ns::mode::CHECKID_SETUP);

        url.set_query(None);
        url.query_pairs_mut().extend_pairs(setup.to_query());
        Ok(url.into())
    }
}

// ── associate ────────────────────────────────────────────────────────

pub struct AssociateSession<'p> {
    provider: &'p Provider,
    request: AssociateRequest,
}

impl<'p> AssociateSession<'p> {
    pub fn request(&self) -> &AssociateRequest {
        &self.request
    }

    /// Create and persist a stateful association, or describe what the
    /// provider supports when negotiation failed.
    pub fn response(&self) -> Result<Response> {
        let (Some(assoc_type), Some(session_type)) =
            (self.request.assoc_type(), self.request.session_type())
        else {
            return Ok(self.unsupported_type());
        };

        let provider = self.provider;
        let assoc = provider.signer().create_association(assoc_type, false)?;

        let request = self.request.message();
        let mut msg = Message::new(request.namespace().clone());
        msg.set_openid_arg(ns::field::ASSOC_HANDLE, assoc.handle());
        msg.set_openid_arg(ns::field::ASSOC_TYPE, assoc_type.name());
        msg.set_openid_arg(
            ns::field::EXPIRES_IN,
            assoc.expires_in(Utc::now()).to_string(),
        );
        // 1.x signals plaintext by leaving session_type out.
        if !(request.is_openid1() && session_type == SessionType::NoEncryption) {
            msg.set_openid_arg(ns::field::SESSION_TYPE, session_type.name());
        }

        match (session_type.hash(), self.request.dh()) {
            (Some(hash), Some(dh)) => {
                let server_key = PrivateKey::generate(&dh.params, provider.random())
                    .map_err(|e| Error::GeneratingAssociationFailed(e.to_string()))?;
                let shared = server_key.shared_secret(&dh.consumer_public, &dh.params)?;
                let enc_mac_key = shared.xor_secret(hash, assoc.secret())?;
                msg.set_openid_arg(
                    ns::field::DH_SERVER_PUBLIC,
                    server_key.public_key(&dh.params).to_base64(),
                );
                msg.set_openid_arg(ns::field::DH_MAC_KEY, base64_encode(&enc_mac_key));
            }
            (None, _) => {
                msg.set_openid_arg(ns::field::MAC_KEY, base64_encode(assoc.secret()));
            }
            (Some(_), None) => {
                return Err(Error::InvalidAssociateRequest(format!(
                    "{} session without Diffie-Hellman parameters",
                    session_type.name()
                )));
            }
        }

        provider.store().store_association(&assoc)?;
        debug!(
            "Created {} association {} over {}",
            assoc_type.name(),
            assoc.handle(),
            session_type.name()
        );
        Ok(Response::direct(msg))
    }

    fn unsupported_type(&self) -> Response {
        let config = self.provider.config();
        let reason = self
            .request
            .negotiation_error()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unsupported association".into());
        warn!("Associate negotiation failed: {}", reason);

        let mut msg = Message::new(ns::OPENID20);
        msg.set_openid_arg(ns::field::ERROR, reason);
        msg.set_openid_arg(ns::field::ERROR_CODE, ns::UNSUPPORTED_TYPE);
        msg.set_openid_arg(
            ns::field::SESSION_TYPE,
            config.default_session_type().name(),
        );
        msg.set_openid_arg(ns::field::ASSOC_TYPE, config.default_assoc_type().name());
        Response::direct(msg)
    }
}

// ── check_authentication ─────────────────────────────────────────────

pub struct CheckAuthenticationSession<'p> {
    provider: &'p Provider,
    request: CheckAuthenticationRequest,
}

impl<'p> CheckAuthenticationSession<'p> {
    pub fn request(&self) -> &CheckAuthenticationRequest {
        &self.request
    }

    /// Verify the assertion against its stateless association.
    ///
    /// The nonce is only recorded once the signature checks out, so a forged
    /// request cannot use up a genuine one. A nonce seen before fails with
    /// [`Error::KnownNonce`]. The stateless association is deleted whatever
    /// the outcome.
    pub fn response(&self) -> Result<Response> {
        let provider = self.provider;
        let request = &self.request;
        let handle = request.assoc_handle();
        let nonce = request.response_nonce();

        let verification = match provider.signer().verify(
            request.message(),
            handle,
            request.signed(),
            request.sig(),
            true,
        ) {
            Ok(v) => v,
            Err(e @ Error::AssociationNotFound(_)) => Verification::Invalid {
                reason: e.to_string(),
            },
            Err(e) => return Err(e),
        };
        provider.signer().invalidate(handle, true)?;

        let replayed = match &verification {
            Verification::Valid => !provider.store().use_nonce(nonce)?,
            Verification::Invalid { .. } => provider.store().is_known_nonce(nonce)?,
        };
        if replayed {
            warn!("Replayed nonce {}", nonce);
            return Err(Error::KnownNonce(nonce.to_owned()));
        }

        let mut msg = Message::new(ns::OPENID20);
        match &verification {
            Verification::Valid => {
                msg.set_openid_arg(ns::field::IS_VALID, "true");
                if let Some(stale) = request.invalidate_handle() {
                    if !self.is_live_stateful(stale)? {
                        msg.set_openid_arg(ns::field::INVALIDATE_HANDLE, stale);
                    }
                }
            }
            Verification::Invalid { reason } => {
                debug!("Assertion under {} is invalid: {}", handle, reason);
                msg.set_openid_arg(ns::field::IS_VALID, "false");
                msg.set_openid_arg(ns::field::INVALIDATE_HANDLE, handle);
            }
        }
        Ok(Response::direct(msg))
    }

    fn is_live_stateful(&self, handle: &str) -> Result<bool> {
        match self.provider.store().get_association(handle, false) {
            Ok(assoc) => Ok(assoc.is_valid()),
            Err(Error::AssociationNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use openid2_assoc::MemoryStore;
    use std::sync::Arc;

    fn provider() -> Provider {
        let config = ProviderConfig::new("https://op.example.com/openid");
        Provider::new(config, Arc::new(MemoryStore::new())).unwrap()
    }

    fn checkid<'p>(provider: &'p Provider, params: &[(&str, &str)]) -> CheckIdSession<'p> {
        let msg = Message::from_query(params.iter().copied()).unwrap();
        match provider.establish_session(msg).unwrap() {
            Session::CheckId(s) => s,
            _ => panic!("expected a checkid session"),
        }
    }

    const SELECT: [(&str, &str); 5] = [
        ("openid.ns", ns::OPENID20),
        ("openid.mode", "checkid_setup"),
        ("openid.identity", ns::IDENTIFIER_SELECT),
        ("openid.claimed_id", ns::IDENTIFIER_SELECT),
        ("openid.return_to", "https://rp.example.com/back"),
    ];

    const PINNED: [(&str, &str); 5] = [
        ("openid.ns", ns::OPENID20),
        ("openid.mode", "checkid_setup"),
        ("openid.identity", "https://op.example.com/alice"),
        ("openid.claimed_id", "https://alice.example.org/"),
        ("openid.return_to", "https://rp.example.com/back"),
    ];

    #[test]
    fn test_accept_identifier_select() {
        let p = provider();
        let mut s = checkid(&p, &SELECT);
        assert_eq!(s.accept("", ""), Err(Error::IdentityNotSet));
        assert!(!s.is_accepted());

        s.accept("https://op.example.com/alice", "").unwrap();
        assert!(s.is_accepted());
        let resp = s.response().unwrap();
        let msg = resp.message();
        assert_eq!(msg.openid_arg("identity").unwrap(), "https://op.example.com/alice");
        assert_eq!(msg.openid_arg("claimed_id").unwrap(), "https://op.example.com/alice");
    }

    #[test]
    fn test_accept_pinned_identity() {
        let p = provider();
        let mut s = checkid(&p, &PINNED);
        assert_eq!(
            s.accept("https://op.example.com/bob", ""),
            Err(Error::IdentityNotMatched("https://op.example.com/bob".into()))
        );
        s.accept("", "").unwrap();

        let resp = s.response().unwrap();
        let msg = resp.message();
        assert_eq!(msg.openid_arg("mode").unwrap(), "id_res");
        assert_eq!(msg.openid_arg("op_endpoint").unwrap(), "https://op.example.com/openid");
        assert_eq!(msg.openid_arg("claimed_id").unwrap(), "https://alice.example.org/");
        assert_eq!(msg.openid_arg("return_to").unwrap(), "https://rp.example.com/back");
        assert!(msg.openid_arg("response_nonce").is_some());
        assert!(msg.openid_arg("assoc_handle").is_some());
        assert!(msg.openid_arg("sig").is_some());
        assert_eq!(
            resp.kind(),
            &crate::response::ResponseKind::Redirect {
                return_to: "https://rp.example.com/back".into()
            }
        );
    }

    #[test]
    fn test_accept_without_identity() {
        let p = provider();
        let mut s = checkid(
            &p,
            &[
                ("openid.ns", ns::OPENID20),
                ("openid.mode", "checkid_setup"),
                ("openid.return_to", "https://rp.example.com/back"),
            ],
        );
        assert_eq!(s.accept("https://op.example.com/alice", ""), Err(Error::IdentitySet));
        s.accept("", "").unwrap();

        let msg = s.response().unwrap().into_message();
        assert!(msg.openid_arg("identity").is_none());
        assert_eq!(
            msg.openid_arg("signed").unwrap(),
            "op_endpoint,return_to,response_nonce,assoc_handle"
        );
    }

    #[test]
    fn test_reject_setup_is_cancel() {
        let p = provider();
        let mut s = checkid(&p, &PINNED);
        s.accept("", "").unwrap();
        s.reject();
        let msg = s.response().unwrap().into_message();
        assert_eq!(msg.openid_arg("mode").unwrap(), "cancel");
        assert!(msg.openid_arg("sig").is_none());
    }

    #[test]
    fn test_reject_immediate_openid1() {
        let p = provider();
        let s = checkid(
            &p,
            &[
                ("openid.mode", "checkid_immediate"),
                ("openid.identity", "https://op.example.com/alice"),
                ("openid.return_to", "https://rp.example.com/back"),
            ],
        );
        let msg = s.response().unwrap().into_message();
        assert_eq!(msg.openid_arg("mode").unwrap(), "id_res");
        let setup = msg.openid_arg("user_setup_url").unwrap().as_str();
        assert!(setup.starts_with("https://op.example.com/openid?"));
        assert!(setup.contains("openid.mode=checkid_setup"));
    }

    #[test]
    fn test_response_requires_return_to() {
        let p = provider();
        let s = checkid(
            &p,
            &[
                ("openid.ns", ns::OPENID20),
                ("openid.mode", "checkid_setup"),
                ("openid.realm", "https://rp.example.com/"),
            ],
        );
        assert!(matches!(s.response(), Err(Error::InvalidCheckIdRequest(_))));
    }

    #[test]
    fn test_associate_openid1_omits_session_type() {
        let p = provider();
        let msg = Message::from_query([
            ("openid.mode", "associate"),
            ("openid.assoc_type", "HMAC-SHA1"),
        ])
        .unwrap();
        let session = p.establish_session(msg).unwrap();
        assert_eq!(session.mode(), "associate");

        let resp = session.response().unwrap();
        let msg = resp.message();
        assert!(msg.openid_arg("session_type").is_none());
        assert_eq!(msg.openid_arg("assoc_type").unwrap(), "HMAC-SHA1");
        assert!(msg.openid_arg("mac_key").is_some());
        let expires_in: i64 = msg.openid_arg("expires_in").unwrap().as_str().parse().unwrap();
        assert!(expires_in > 86_000 && expires_in <= 86_400);
    }

    #[test]
    fn test_check_authentication_unknown_handle() {
        let p = provider();
        let msg = Message::from_query([
            ("openid.ns", ns::OPENID20),
            ("openid.mode", "check_authentication"),
            ("openid.assoc_handle", "nobody"),
            ("openid.signed", "return_to"),
            ("openid.return_to", "https://rp.example.com/back"),
            ("openid.sig", "c2ln"),
            ("openid.response_nonce", "2014-03-07T09:05:01ZAAAAAA"),
        ])
        .unwrap();
        let resp = p.establish_session(msg).unwrap().response().unwrap();
        assert_eq!(resp.message().openid_arg("is_valid").unwrap(), "false");
        assert_eq!(resp.message().openid_arg("invalidate_handle").unwrap(), "nobody");
        assert!(!p.store().is_known_nonce("2014-03-07T09:05:01ZAAAAAA").unwrap());
    }
}
