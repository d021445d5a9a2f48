#![forbid(unsafe_code)]

//! Base64 and big-integer wire encodings.
//!
//! Integers travel as the base64 of their two's-complement big-endian form
//! (`btwoc`): the shortest big-endian encoding, with a leading zero byte
//! added whenever the top bit would otherwise be set.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use num_bigint_dig::BigUint;
use openid2_core::{Error, Result};

pub fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn base64_decode(input: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(input.trim())
        .map_err(|e| Error::Base64(e.to_string()))
}

/// Two's-complement big-endian bytes of a non-negative integer.
pub fn btwoc(n: &BigUint) -> Vec<u8> {
    let bytes = n.to_bytes_be();
    match bytes.first() {
        None => vec![0],
        Some(&b) if b & 0x80 != 0 => {
            let mut out = Vec::with_capacity(bytes.len() + 1);
            out.push(0);
            out.extend_from_slice(&bytes);
            out
        }
        Some(_) => bytes,
    }
}

pub fn int_to_base64(n: &BigUint) -> String {
    base64_encode(&btwoc(n))
}

/// Decode a base64 `btwoc` integer. Leading zero bytes are accepted.
pub fn base64_to_int(input: &str) -> Result<BigUint> {
    let bytes = base64_decode(input)?;
    if bytes.is_empty() {
        return Err(Error::Base64("empty integer".into()));
    }
    Ok(BigUint::from_bytes_be(&bytes))
}
