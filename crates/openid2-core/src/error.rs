#![forbid(unsafe_code)]

/// Errors produced by the OpenID 2.0 provider engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("unknown mode: {0}")]
    UnknownMode(String),

    #[error("unknown association type: {0}")]
    UnknownAssocType(String),

    #[error("unknown session type: {0}")]
    UnknownSessionType(String),

    #[error("session type {session} cannot carry association type {assoc}")]
    UnsupportedSessionAssoc { session: String, assoc: String },

    #[error("invalid checkid request: {0}")]
    InvalidCheckIdRequest(String),

    #[error("invalid associate request: {0}")]
    InvalidAssociateRequest(String),

    #[error("invalid check_authentication request: {0}")]
    InvalidCheckAuthenticationRequest(String),

    #[error("malformed realm: {0}")]
    MalformedRealm(String),

    #[error("association not found: {0}")]
    AssociationNotFound(String),

    #[error("invalid association: {0}")]
    InvalidAssociation(String),

    #[error("nonce is known: {0}")]
    KnownNonce(String),

    #[error("generating association failed: {0}")]
    GeneratingAssociationFailed(String),

    #[error("value not found: {0}")]
    ValueNotFound(String),

    #[error("key contains colon: {0}")]
    KeyContainsColon(String),

    #[error("key contains new line: {0}")]
    KeyContainsNewLine(String),

    #[error("value contains new line for key: {0}")]
    ValueContainsNewLine(String),

    #[error("identity not set")]
    IdentityNotSet,

    #[error("identity set but the request asked for none")]
    IdentitySet,

    #[error("identity not matched: {0}")]
    IdentityNotMatched(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error was caused by the relying party's input.
    ///
    /// Client errors are answered with a protocol-level rejection (or an HTTP
    /// 4xx); everything else is a provider-side failure whose details must not
    /// be leaked into a response body.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage(_)
                | Self::UnsupportedVersion(_)
                | Self::UnknownMode(_)
                | Self::UnknownAssocType(_)
                | Self::UnknownSessionType(_)
                | Self::UnsupportedSessionAssoc { .. }
                | Self::InvalidCheckIdRequest(_)
                | Self::InvalidAssociateRequest(_)
                | Self::InvalidCheckAuthenticationRequest(_)
                | Self::MalformedRealm(_)
                | Self::AssociationNotFound(_)
                | Self::KnownNonce(_)
                | Self::IdentityNotSet
                | Self::IdentitySet
                | Self::IdentityNotMatched(_)
                | Self::Base64(_)
                | Self::InvalidUrl(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
