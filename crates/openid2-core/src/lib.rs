#![forbid(unsafe_code)]

//! Core types for the OpenID 2.0 provider engine.
//!
//! Contains the shared error type, namespace URIs and protocol field names,
//! and the closed sets of association and session types.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use algorithm::{AssocType, HashAlgorithm, SessionType};
pub use error::{Error, Result};
