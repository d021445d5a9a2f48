#![forbid(unsafe_code)]

//! OpenID message model.
//!
//! A [`Message`] holds namespace-qualified arguments and converts between
//! HTTP parameters and Key-Value Form.

pub mod kv;
pub mod message;
pub mod query;

pub use message::{Message, MessageKey, MessageValue, NamespaceUri};
