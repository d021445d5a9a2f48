#![forbid(unsafe_code)]

//! OpenID 2.0 provider protocol engine.
//!
//! Re-exports the workspace crates under one name.

pub use openid2_assoc as assoc;
pub use openid2_core as core;
pub use openid2_crypto as crypto;
pub use openid2_message as message;
pub use openid2_provider as provider;

pub use openid2_core::{Error, Result};
pub use openid2_message::Message;
pub use openid2_provider::{Provider, ProviderConfig, Response, Session};
