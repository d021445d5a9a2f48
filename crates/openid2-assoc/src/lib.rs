#![forbid(unsafe_code)]

//! Associations and the store they live in.

pub mod association;
pub mod store;

pub use association::{Association, DEFAULT_LIFETIME_SECS};
pub use store::{MemoryStore, Store};
