#![forbid(unsafe_code)]

//! Cryptographic primitives for the OpenID 2.0 provider engine.
//!
//! Hashes, HMAC signing, Diffie-Hellman key exchange, the wire encodings
//! for integers and binary values, and the random source abstraction.

pub mod dh;
pub mod digest;
pub mod encoding;
pub mod mac;
pub mod random;

pub use dh::{DhParams, PrivateKey, PublicKey, SharedSecret};
pub use random::{OsRandom, RandomSource};
