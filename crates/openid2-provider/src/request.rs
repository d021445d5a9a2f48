#![forbid(unsafe_code)]

//! Incoming OpenID requests.
//!
//! [`Request::from_message`] dispatches on `openid.mode` and validates the
//! fields each mode requires.

use crate::realm::Realm;
use openid2_core::{ns, AssocType, Error, Result, SessionType};
use openid2_crypto::{DhParams, PublicKey};
use openid2_message::{Message, MessageValue, NamespaceUri};
use tracing::debug;

/// A parsed request of one of the supported modes.
#[derive(Debug, Clone)]
pub enum Request {
    CheckId(CheckIdRequest),
    Associate(AssociateRequest),
    CheckAuthentication(CheckAuthenticationRequest),
}

impl Request {
    /// Parse `msg`. `dh_defaults` is used when a DH associate request does
    /// not name its own group.
    pub fn from_message(msg: Message, dh_defaults: &DhParams) -> Result<Self> {
        let mode = msg
            .openid_arg(ns::field::MODE)
            .map(MessageValue::as_str)
            .unwrap_or_default()
            .to_owned();
        match mode.as_str() {
            ns::mode::CHECKID_IMMEDIATE | ns::mode::CHECKID_SETUP => {
                CheckIdRequest::from_message(msg).map(Request::CheckId)
            }
            ns::mode::ASSOCIATE => {
                AssociateRequest::from_message(msg, dh_defaults).map(Request::Associate)
            }
            ns::mode::CHECK_AUTHENTICATION => {
                CheckAuthenticationRequest::from_message(msg).map(Request::CheckAuthentication)
            }
            other => Err(Error::UnknownMode(other.to_owned())),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Request::CheckId(r) => r.mode().as_str(),
            Request::Associate(_) => ns::mode::ASSOCIATE,
            Request::CheckAuthentication(_) => ns::mode::CHECK_AUTHENTICATION,
        }
    }

    pub fn message(&self) -> &Message {
        match self {
            Request::CheckId(r) => r.message(),
            Request::Associate(r) => r.message(),
            Request::CheckAuthentication(r) => r.message(),
        }
    }

    pub fn namespace(&self) -> &NamespaceUri {
        self.message().namespace()
    }
}

fn arg(msg: &Message, name: &str) -> Option<String> {
    msg.openid_arg(name)
        .filter(|v| !v.is_empty())
        .map(|v| v.as_str().to_owned())
}

// ── checkid_immediate / checkid_setup ────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckIdMode {
    Immediate,
    Setup,
}

impl CheckIdMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckIdMode::Immediate => ns::mode::CHECKID_IMMEDIATE,
            CheckIdMode::Setup => ns::mode::CHECKID_SETUP,
        }
    }
}

/// An authentication request.
#[derive(Debug, Clone)]
pub struct CheckIdRequest {
    message: Message,
    mode: CheckIdMode,
    claimed_id: Option<String>,
    identity: Option<String>,
    assoc_handle: Option<String>,
    return_to: Option<String>,
    realm: Realm,
}

impl CheckIdRequest {
    pub fn from_message(msg: Message) -> Result<Self> {
        let mode = match msg.openid_arg(ns::field::MODE).map(MessageValue::as_str) {
            Some(ns::mode::CHECKID_IMMEDIATE) => CheckIdMode::Immediate,
            Some(ns::mode::CHECKID_SETUP) => CheckIdMode::Setup,
            other => return Err(Error::UnknownMode(other.unwrap_or_default().to_owned())),
        };

        let claimed_id = arg(&msg, ns::field::CLAIMED_ID);
        let identity = arg(&msg, ns::field::IDENTITY);
        // 1.x has no claimed_id.
        if !msg.is_openid1() && claimed_id.is_some() != identity.is_some() {
            return Err(Error::InvalidCheckIdRequest(
                "claimed_id and identity must be both present or both absent".into(),
            ));
        }

        let return_to = arg(&msg, ns::field::RETURN_TO);
        if let Some(return_to) = &return_to {
            Realm::parse(return_to)?;
        }

        let declared_realm = match arg(&msg, ns::field::REALM) {
            Some(realm) => Some(realm),
            None if msg.is_openid1() => arg(&msg, ns::field::TRUST_ROOT),
            None => None,
        };

        let realm = match (&declared_realm, &return_to) {
            (None, None) => {
                return Err(Error::InvalidCheckIdRequest(
                    "realm is required when return_to is absent".into(),
                ))
            }
            (None, Some(return_to)) => Realm::parse(return_to)?,
            (Some(declared), return_to) => {
                let realm = Realm::parse(declared)?;
                if let Some(return_to) = return_to {
                    if !realm.validate(return_to) {
                        debug!("return_to {} is outside realm {}", return_to, realm);
                        return Err(Error::InvalidCheckIdRequest(format!(
                            "return_to {return_to} does not match realm {declared}"
                        )));
                    }
                }
                realm
            }
        };

        Ok(Self {
            mode,
            claimed_id,
            identity,
            assoc_handle: arg(&msg, ns::field::ASSOC_HANDLE),
            return_to,
            realm,
            message: msg,
        })
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn mode(&self) -> CheckIdMode {
        self.mode
    }

    pub fn is_immediate(&self) -> bool {
        self.mode == CheckIdMode::Immediate
    }

    pub fn claimed_id(&self) -> Option<&str> {
        self.claimed_id.as_deref()
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Whether the relying party left the choice of identifier to the provider.
    pub fn is_identifier_select(&self) -> bool {
        self.identity.as_deref() == Some(ns::IDENTIFIER_SELECT)
    }

    pub fn assoc_handle(&self) -> Option<&str> {
        self.assoc_handle.as_deref()
    }

    pub fn return_to(&self) -> Option<&str> {
        self.return_to.as_deref()
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }
}

// ── associate ────────────────────────────────────────────────────────

/// Diffie-Hellman inputs of an associate request.
#[derive(Debug, Clone)]
pub struct DhRequest {
    pub params: DhParams,
    pub consumer_public: PublicKey,
}

/// A request to establish a shared secret.
///
/// Unknown or mismatched association/session types do not fail parsing.
/// They are kept as a negotiation failure, which the session answers with
/// an `unsupported-type` response.
#[derive(Debug, Clone)]
pub struct AssociateRequest {
    message: Message,
    negotiated: std::result::Result<(AssocType, SessionType), Error>,
    dh: Option<DhRequest>,
}

impl AssociateRequest {
    pub fn from_message(msg: Message, dh_defaults: &DhParams) -> Result<Self> {
        let assoc_type = AssocType::from_name(
            msg.openid_arg(ns::field::ASSOC_TYPE)
                .map(MessageValue::as_str)
                .unwrap_or_default(),
        );

        let session_name = msg
            .openid_arg(ns::field::SESSION_TYPE)
            .map(MessageValue::as_str)
            .unwrap_or_default();
        let session_type = if session_name.is_empty() && msg.is_openid1() {
            Ok(SessionType::NoEncryption)
        } else {
            SessionType::from_name(session_name)
        };

        let negotiated = match (assoc_type, session_type) {
            (Ok(a), Ok(s)) if s.supports(a) => Ok((a, s)),
            (Ok(a), Ok(s)) => Err(Error::UnsupportedSessionAssoc {
                session: s.name().into(),
                assoc: a.name().into(),
            }),
            (Err(e), _) | (_, Err(e)) => Err(e),
        };

        let dh = match &negotiated {
            Ok((_, session)) if session.is_diffie_hellman() => {
                Some(parse_dh(&msg, dh_defaults)?)
            }
            _ => None,
        };

        Ok(Self {
            message: msg,
            negotiated,
            dh,
        })
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn assoc_type(&self) -> Option<AssocType> {
        self.negotiated.as_ref().ok().map(|(a, _)| *a)
    }

    pub fn session_type(&self) -> Option<SessionType> {
        self.negotiated.as_ref().ok().map(|(_, s)| *s)
    }

    /// Why negotiation failed, if it did.
    pub fn negotiation_error(&self) -> Option<&Error> {
        self.negotiated.as_ref().err()
    }

    pub fn dh(&self) -> Option<&DhRequest> {
        self.dh.as_ref()
    }
}

fn parse_dh(msg: &Message, defaults: &DhParams) -> Result<DhRequest> {
    let invalid = |e: Error| Error::InvalidAssociateRequest(e.to_string());

    let params = match (arg(msg, ns::field::DH_MODULUS), arg(msg, ns::field::DH_GEN)) {
        (None, None) => defaults.clone(),
        (modulus, generator) => {
            let modulus = modulus.unwrap_or_else(|| defaults.modulus_base64());
            let generator = generator.unwrap_or_else(|| defaults.generator_base64());
            DhParams::from_base64(&modulus, &generator).map_err(invalid)?
        }
    };

    let consumer_public = arg(msg, ns::field::DH_CONSUMER_PUBLIC)
        .ok_or_else(|| Error::InvalidAssociateRequest("dh_consumer_public is required".into()))
        .and_then(|y| PublicKey::from_base64(&y).map_err(invalid))?;
    consumer_public.validate(&params).map_err(invalid)?;

    Ok(DhRequest {
        params,
        consumer_public,
    })
}

// ── check_authentication ─────────────────────────────────────────────

/// A relying party asking the provider to verify an assertion it signed
/// with a stateless association.
#[derive(Debug, Clone)]
pub struct CheckAuthenticationRequest {
    message: Message,
    assoc_handle: String,
    signed: Vec<String>,
    sig: String,
    response_nonce: String,
    invalidate_handle: Option<String>,
}

impl CheckAuthenticationRequest {
    pub fn from_message(msg: Message) -> Result<Self> {
        if *msg.namespace() != ns::OPENID20 {
            return Err(Error::InvalidCheckAuthenticationRequest(format!(
                "unsupported namespace {}",
                msg.namespace()
            )));
        }

        let required = |name: &str| {
            arg(&msg, name).ok_or_else(|| {
                Error::InvalidCheckAuthenticationRequest(format!("{name} is required"))
            })
        };
        let assoc_handle = required(ns::field::ASSOC_HANDLE)?;
        let signed: Vec<String> = required(ns::field::SIGNED)?
            .split(',')
            .map(str::to_owned)
            .collect();
        let sig = required(ns::field::SIG)?;
        let response_nonce = required(ns::field::RESPONSE_NONCE)?;
        let invalidate_handle = arg(&msg, ns::field::INVALIDATE_HANDLE);

        Ok(Self {
            message: msg,
            assoc_handle,
            signed,
            sig,
            response_nonce,
            invalidate_handle,
        })
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn assoc_handle(&self) -> &str {
        &self.assoc_handle
    }

    /// Field names listed in `openid.signed`, in order.
    pub fn signed(&self) -> &[String] {
        &self.signed
    }

    pub fn sig(&self) -> &str {
        &self.sig
    }

    pub fn response_nonce(&self) -> &str {
        &self.response_nonce
    }

    /// A stateful handle the relying party wants checked.
    pub fn invalidate_handle(&self) -> Option<&str> {
        self.invalidate_handle.as_deref()
    }
}
