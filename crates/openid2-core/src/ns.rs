#![forbid(unsafe_code)]

//! Namespace URIs and protocol field names used across the engine.

/// OpenID Authentication 1.0
pub const OPENID10: &str = "http://openid.net/signon/1.0";

/// OpenID Authentication 1.1 (also the compatibility namespace for messages
/// without `openid.ns`)
pub const OPENID11: &str = "http://openid.net/signon/1.1";

/// OpenID Authentication 2.0
pub const OPENID20: &str = "http://specs.openid.net/auth/2.0";

/// Identifier-select placeholder for `openid.identity` / `openid.claimed_id`
pub const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";

/// Service type of an OP identifier element
pub const OPENID20_SERVER: &str = "http://specs.openid.net/auth/2.0/server";

/// Service type of a claimed identifier element
pub const OPENID20_SIGNON: &str = "http://specs.openid.net/auth/2.0/signon";

/// Wire prefix of every OpenID parameter.
pub const PREFIX: &str = "openid.";

/// Whether `uri` names one of the supported protocol versions.
pub fn is_supported_version(uri: &str) -> bool {
    matches!(uri, OPENID10 | OPENID11 | OPENID20)
}

/// Whether `uri` names an OpenID 1.x protocol version.
pub fn is_openid1(uri: &str) -> bool {
    matches!(uri, OPENID10 | OPENID11)
}

/// Protocol field names. These may not be used as namespace aliases.
///
/// Kept sorted so membership can use a binary search.
pub const PROTOCOL_FIELDS: &[&str] = &[
    "assoc_handle",
    "assoc_type",
    "claimed_id",
    "contact",
    "delegate",
    "dh_consumer_public",
    "dh_gen",
    "dh_modulus",
    "error",
    "identity",
    "invalidate_handle",
    "mode",
    "ns",
    "op_endpoint",
    "openid",
    "realm",
    "reference",
    "response_nonce",
    "return_to",
    "server",
    "session_type",
    "sig",
    "signed",
    "trust_root",
];

/// Whether `name` is a reserved protocol field name.
pub fn is_protocol_field(name: &str) -> bool {
    PROTOCOL_FIELDS.binary_search(&name).is_ok()
}

// ── Field names ──────────────────────────────────────────────────────

pub mod field {
    pub const NS: &str = "ns";
    pub const MODE: &str = "mode";
    pub const ERROR: &str = "error";
    pub const ERROR_CODE: &str = "error_code";

    // checkid_*
    pub const CLAIMED_ID: &str = "claimed_id";
    pub const IDENTITY: &str = "identity";
    pub const ASSOC_HANDLE: &str = "assoc_handle";
    pub const RETURN_TO: &str = "return_to";
    pub const REALM: &str = "realm";
    pub const TRUST_ROOT: &str = "trust_root";
    pub const OP_ENDPOINT: &str = "op_endpoint";
    pub const RESPONSE_NONCE: &str = "response_nonce";
    pub const INVALIDATE_HANDLE: &str = "invalidate_handle";
    pub const USER_SETUP_URL: &str = "user_setup_url";
    pub const SIGNED: &str = "signed";
    pub const SIG: &str = "sig";

    // associate
    pub const ASSOC_TYPE: &str = "assoc_type";
    pub const SESSION_TYPE: &str = "session_type";
    pub const DH_MODULUS: &str = "dh_modulus";
    pub const DH_GEN: &str = "dh_gen";
    pub const DH_CONSUMER_PUBLIC: &str = "dh_consumer_public";
    pub const DH_SERVER_PUBLIC: &str = "dh_server_public";
    pub const DH_MAC_KEY: &str = "dh_mac_key";
    pub const MAC_KEY: &str = "mac_key";
    pub const EXPIRES_IN: &str = "expires_in";

    // check_authentication
    pub const IS_VALID: &str = "is_valid";
}

// ── Mode values ──────────────────────────────────────────────────────

pub mod mode {
    pub const CHECKID_IMMEDIATE: &str = "checkid_immediate";
    pub const CHECKID_SETUP: &str = "checkid_setup";
    pub const ASSOCIATE: &str = "associate";
    pub const CHECK_AUTHENTICATION: &str = "check_authentication";
    pub const ID_RES: &str = "id_res";
    pub const CANCEL: &str = "cancel";
    pub const SETUP_NEEDED: &str = "setup_needed";
}

/// `error_code` sent when association negotiation fails.
pub const UNSUPPORTED_TYPE: &str = "unsupported-type";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_fields_sorted() {
        assert!(PROTOCOL_FIELDS.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(PROTOCOL_FIELDS.len(), 24);
    }

    #[test]
    fn test_is_protocol_field() {
        assert!(is_protocol_field("mode"));
        assert!(is_protocol_field("trust_root"));
        assert!(!is_protocol_field("sreg"));
        assert!(!is_protocol_field("ax"));
    }

    #[test]
    fn test_versions() {
        assert!(is_supported_version(OPENID20));
        assert!(is_supported_version(OPENID11));
        assert!(!is_supported_version("http://example.com/"));
        assert!(is_openid1(OPENID10));
        assert!(!is_openid1(OPENID20));
    }
}
