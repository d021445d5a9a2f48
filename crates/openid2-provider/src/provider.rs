#![forbid(unsafe_code)]

//! The provider: configuration plus the store and random source every
//! session shares.

use crate::config::ProviderConfig;
use crate::request::Request;
use crate::session::Session;
use crate::signer::Signer;
use openid2_assoc::Store;
use openid2_core::Result;
use openid2_crypto::{OsRandom, RandomSource};
use openid2_message::Message;
use std::sync::Arc;
use tracing::debug;

/// An OpenID provider endpoint.
///
/// Holds no per-request state; one instance serves any number of requests
/// as long as its [`Store`] is safe to share.
pub struct Provider {
    config: ProviderConfig,
    store: Arc<dyn Store>,
    random: Arc<dyn RandomSource>,
    signer: Signer,
}

impl Provider {
    /// Provider drawing randomness from the operating system.
    pub fn new(config: ProviderConfig, store: Arc<dyn Store>) -> Result<Self> {
        Self::with_random(config, store, Arc::new(OsRandom))
    }

    pub fn with_random(
        config: ProviderConfig,
        store: Arc<dyn Store>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self> {
        config.validate()?;
        let signer = Signer::new(
            store.clone(),
            random.clone(),
            config.association_lifetime(),
            config.default_assoc_type(),
        );
        Ok(Self {
            config,
            store,
            random,
            signer,
        })
    }

    /// The URL relying parties send requests to. Discovery documents
    /// advertise it with the [`OPENID20_SERVER`](openid2_core::ns::OPENID20_SERVER)
    /// or [`OPENID20_SIGNON`](openid2_core::ns::OPENID20_SIGNON) type.
    pub fn endpoint(&self) -> &str {
        self.config.endpoint()
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn random(&self) -> &dyn RandomSource {
        self.random.as_ref()
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Parse `msg` and open the session that answers it.
    pub fn establish_session(&self, msg: Message) -> Result<Session<'_>> {
        let request = Request::from_message(msg, self.config.dh_params())?;
        debug!("Established {} session", request.mode());
        Ok(Session::new(self, request))
    }

    /// [`establish_session`](Self::establish_session) for a raw query
    /// string or form body.
    pub fn establish_session_from_query(&self, query: &str) -> Result<Session<'_>> {
        self.establish_session(Message::from_query_string(query)?)
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
