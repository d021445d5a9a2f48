#![forbid(unsafe_code)]

//! Association and session type names.
//!
//! Each constant is the exact string that appears in `openid.assoc_type` /
//! `openid.session_type`.

use crate::Error;

// ── Association types ────────────────────────────────────────────────

pub const HMAC_SHA1: &str = "HMAC-SHA1";
pub const HMAC_SHA256: &str = "HMAC-SHA256";

// ── Session types ────────────────────────────────────────────────────

pub const NO_ENCRYPTION: &str = "no-encryption";
pub const DH_SHA1: &str = "DH-SHA1";
pub const DH_SHA256: &str = "DH-SHA256";

/// Hash functions used by associations and DH sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    pub fn output_size(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }
}

/// A MAC algorithm an association can be created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssocType {
    HmacSha1,
    HmacSha256,
}

impl AssocType {
    pub const ALL: [AssocType; 2] = [AssocType::HmacSha1, AssocType::HmacSha256];

    /// Wire name of this association type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HmacSha1 => HMAC_SHA1,
            Self::HmacSha256 => HMAC_SHA256,
        }
    }

    /// Look up an association type by wire name.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name {
            HMAC_SHA1 => Ok(Self::HmacSha1),
            HMAC_SHA256 => Ok(Self::HmacSha256),
            _ => Err(Error::UnknownAssocType(name.to_owned())),
        }
    }

    /// The hash the HMAC is built on.
    pub fn hash(&self) -> HashAlgorithm {
        match self {
            Self::HmacSha1 => HashAlgorithm::Sha1,
            Self::HmacSha256 => HashAlgorithm::Sha256,
        }
    }

    /// Required secret length in bytes.
    pub fn secret_size(&self) -> usize {
        self.hash().output_size()
    }
}

impl std::fmt::Display for AssocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How the MAC key is transported in an associate response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionType {
    NoEncryption,
    DhSha1,
    DhSha256,
}

impl SessionType {
    pub const ALL: [SessionType; 3] = [
        SessionType::NoEncryption,
        SessionType::DhSha1,
        SessionType::DhSha256,
    ];

    /// Wire name of this session type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoEncryption => NO_ENCRYPTION,
            Self::DhSha1 => DH_SHA1,
            Self::DhSha256 => DH_SHA256,
        }
    }

    /// Look up a session type by wire name.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name {
            NO_ENCRYPTION => Ok(Self::NoEncryption),
            DH_SHA1 => Ok(Self::DhSha1),
            DH_SHA256 => Ok(Self::DhSha256),
            _ => Err(Error::UnknownSessionType(name.to_owned())),
        }
    }

    /// Hash applied to the DH shared secret, `None` for `no-encryption`.
    pub fn hash(&self) -> Option<HashAlgorithm> {
        match self {
            Self::NoEncryption => None,
            Self::DhSha1 => Some(HashAlgorithm::Sha1),
            Self::DhSha256 => Some(HashAlgorithm::Sha256),
        }
    }

    pub fn is_diffie_hellman(&self) -> bool {
        self.hash().is_some()
    }

    /// Whether this session type may carry a secret of `assoc_type`.
    pub fn supports(&self, assoc_type: AssocType) -> bool {
        match self {
            Self::NoEncryption => true,
            Self::DhSha1 => assoc_type == AssocType::HmacSha1,
            Self::DhSha256 => assoc_type == AssocType::HmacSha256,
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
