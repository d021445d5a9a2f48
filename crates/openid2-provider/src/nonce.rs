#![forbid(unsafe_code)]

//! `response_nonce` generation.

use chrono::{DateTime, Utc};
use openid2_core::{Error, Result};
use openid2_crypto::RandomSource;

const SALT_LEN: usize = 6;
const MAX_DRAWS: usize = 64;
const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// A UTC timestamp in `YYYY-MM-DDTHH:MM:SSZ` form followed by six random
/// alphanumeric characters.
pub fn generate_nonce(now: DateTime<Utc>, rng: &dyn RandomSource) -> Result<String> {
    let mut nonce = now.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    nonce.reserve(SALT_LEN);

    let mut buf = [0u8; 16];
    let mut drawn = 0;
    for _ in 0..MAX_DRAWS {
        rng.fill(&mut buf)?;
        // 248 = 4 * 62; larger bytes are dropped to keep the draw uniform.
        for &b in buf.iter().filter(|&&b| b < 248) {
            nonce.push(ALPHABET[(b % 62) as usize] as char);
            drawn += 1;
            if drawn == SALT_LEN {
                return Ok(nonce);
            }
        }
    }
    Err(Error::Crypto(format!(
        "no nonce salt after {MAX_DRAWS} random draws"
    )))
}
