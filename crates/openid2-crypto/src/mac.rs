#![forbid(unsafe_code)]

//! HMAC over the association hashes.

use openid2_core::{Error, HashAlgorithm, Result};

/// Compute `HMAC-<alg>(key, data)`.
pub fn hmac(alg: HashAlgorithm, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    use hmac::{Hmac, Mac};
    macro_rules! hmac_compute {
        ($hasher:ty) => {{
            let mut mac = <Hmac<$hasher>>::new_from_slice(key)
                .map_err(|e| Error::Crypto(format!("HMAC key: {e}")))?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }};
    }
    Ok(match alg {
        HashAlgorithm::Sha1 => hmac_compute!(sha1::Sha1),
        HashAlgorithm::Sha256 => hmac_compute!(sha2::Sha256),
    })
}

/// Recompute the HMAC and compare it against `signature` in constant time.
pub fn verify_hmac(alg: HashAlgorithm, key: &[u8], data: &[u8], signature: &[u8]) -> Result<bool> {
    let expected = hmac(alg, key, data)?;
    Ok(constant_time_eq(&expected, signature))
}

/// Length-strict comparison whose running time depends only on the length.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
