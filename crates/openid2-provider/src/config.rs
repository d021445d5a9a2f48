#![forbid(unsafe_code)]

//! Provider configuration.

use chrono::Duration;
use openid2_assoc::DEFAULT_LIFETIME_SECS;
use openid2_core::{AssocType, Error, Result, SessionType};
use openid2_crypto::DhParams;
use url::Url;

/// Settings a [`Provider`](crate::Provider) is built from.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    endpoint: String,
    association_lifetime: Duration,
    default_assoc_type: AssocType,
    default_session_type: SessionType,
    dh_params: DhParams,
}

impl ProviderConfig {
    /// Configuration for the provider reachable at `endpoint`, with a 24 hour
    /// association lifetime, HMAC-SHA256 / DH-SHA256 as the advertised
    /// defaults and the published DH group.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            association_lifetime: Duration::seconds(DEFAULT_LIFETIME_SECS),
            default_assoc_type: AssocType::HmacSha256,
            default_session_type: SessionType::DhSha256,
            dh_params: DhParams::default(),
        }
    }

    pub fn with_association_lifetime(mut self, lifetime: Duration) -> Self {
        self.association_lifetime = lifetime;
        self
    }

    /// Association type used for stateless signing and advertised when
    /// `associate` negotiation fails.
    pub fn with_default_assoc_type(mut self, assoc_type: AssocType) -> Self {
        self.default_assoc_type = assoc_type;
        self
    }

    /// Session type advertised when `associate` negotiation fails.
    pub fn with_default_session_type(mut self, session_type: SessionType) -> Self {
        self.default_session_type = session_type;
        self
    }

    /// Group used when an `associate` request omits `dh_modulus`/`dh_gen`.
    pub fn with_dh_params(mut self, params: DhParams) -> Self {
        self.dh_params = params;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn association_lifetime(&self) -> Duration {
        self.association_lifetime
    }

    pub fn default_assoc_type(&self) -> AssocType {
        self.default_assoc_type
    }

    pub fn default_session_type(&self) -> SessionType {
        self.default_session_type
    }

    pub fn dh_params(&self) -> &DhParams {
        &self.dh_params
    }

    /// Check the settings are usable together.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| Error::InvalidUrl(format!("endpoint {}: {e}", self.endpoint)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "endpoint must be http or https: {}",
                self.endpoint
            )));
        }
        if self.association_lifetime <= Duration::zero() {
            return Err(Error::Other("association lifetime must be positive".into()));
        }
        if !self.default_session_type.supports(self.default_assoc_type) {
            return Err(Error::UnsupportedSessionAssoc {
                session: self.default_session_type.name().into(),
                assoc: self.default_assoc_type.name().into(),
            });
        }
        Ok(())
    }
}
