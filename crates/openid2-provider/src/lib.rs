#![forbid(unsafe_code)]

//! OpenID 2.0 provider: request parsing, the per-request session state
//! machine, assertion signing and realm validation.
//!
//! ```text
//! Message -> Provider::establish_session -> Session -> Response
//! ```

pub mod config;
pub mod nonce;
pub mod provider;
pub mod realm;
pub mod request;
pub mod response;
pub mod session;
pub mod signer;

pub use config::ProviderConfig;
pub use provider::Provider;
pub use realm::Realm;
pub use request::{
    AssociateRequest, CheckAuthenticationRequest, CheckIdMode, CheckIdRequest, Request,
};
pub use response::{Response, ResponseKind};
pub use session::{AssociateSession, CheckAuthenticationSession, CheckIdSession, Session};
pub use signer::{Signer, Verification};
