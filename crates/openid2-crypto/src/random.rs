#![forbid(unsafe_code)]

//! Cryptographically secure randomness.
//!
//! Everything that needs random bytes (association secrets and handles,
//! Diffie-Hellman private keys, nonce salts) draws them from a
//! [`RandomSource`], so tests can substitute a deterministic one.

use openid2_core::{Error, Result};
use rand::RngCore;

/// A source of random bytes.
pub trait RandomSource: Send + Sync {
    /// Fill `buf` completely or fail.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// The operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        rand::rngs::OsRng
            .try_fill_bytes(buf)
            .map_err(|e| Error::Crypto(format!("OS random source: {e}")))
    }
}

/// Draw `len` random bytes.
pub fn random_bytes(rng: &dyn RandomSource, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf)?;
    Ok(buf)
}
