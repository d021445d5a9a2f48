#![forbid(unsafe_code)]

//! Finite-field Diffie-Hellman for associate sessions.
//!
//! The provider answers a `DH-SHA1` / `DH-SHA256` associate request with a
//! fresh key pair of its own. Both sides derive
//! `H(btwoc(g^(xa*xb) mod p))` and the MAC key travels XORed with it.

use crate::digest::digest;
use crate::encoding::{base64_to_int, btwoc, int_to_base64};
use crate::random::RandomSource;
use num_bigint_dig::BigUint;
use openid2_core::{Error, HashAlgorithm, Result};
use zeroize::{Zeroize, Zeroizing};

/// Default modulus published for OpenID associations.
const DEFAULT_MODULUS: [u8; 128] = [
    0xdc, 0xf9, 0x3a, 0x0b, 0x88, 0x39, 0x72, 0xec, 0x0e, 0x19, 0x98, 0x9a,
    0xc5, 0xa2, 0xce, 0x31, 0x0e, 0x1d, 0x37, 0x71, 0x7e, 0x8d, 0x95, 0x71,
    0xbb, 0x76, 0x23, 0x73, 0x18, 0x66, 0xe6, 0x1e, 0xf7, 0x5a, 0x2e, 0x27,
    0x89, 0x8b, 0x05, 0x7f, 0x98, 0x91, 0xc2, 0xe2, 0x7a, 0x63, 0x9c, 0x3f,
    0x29, 0xb6, 0x08, 0x14, 0x58, 0x1c, 0xd3, 0xb2, 0xca, 0x39, 0x86, 0xd2,
    0x68, 0x37, 0x05, 0x57, 0x7d, 0x45, 0xc2, 0xe7, 0xe5, 0x2d, 0xc8, 0x1c,
    0x7a, 0x17, 0x18, 0x76, 0xe5, 0xce, 0xa7, 0x4b, 0x14, 0x48, 0xbf, 0xdf,
    0xaf, 0x18, 0x82, 0x8e, 0xfd, 0x25, 0x19, 0xf1, 0x4e, 0x45, 0xe3, 0x82,
    0x66, 0x34, 0xaf, 0x19, 0x49, 0xe5, 0xb5, 0x35, 0xcc, 0x82, 0x9a, 0x48,
    0x3b, 0x8a, 0x76, 0x22, 0x3e, 0x5d, 0x49, 0x0a, 0x25, 0x7f, 0x05, 0xbd,
    0xff, 0x16, 0xf2, 0xfb, 0x22, 0xc5, 0x83, 0xab,
];

const DEFAULT_GENERATOR: u32 = 2;

/// Private exponent draws before giving up.
const MAX_DRAWS: usize = 128;

/// Group parameters `(p, g)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParams {
    modulus: BigUint,
    generator: BigUint,
}

impl DhParams {
    /// Parameters from explicit values. Requires `p > 3` and `1 < g < p`.
    pub fn new(modulus: BigUint, generator: BigUint) -> Result<Self> {
        let one = BigUint::from(1u32);
        if modulus <= BigUint::from(3u32) {
            return Err(Error::Crypto("DH modulus too small".into()));
        }
        if generator <= one || generator >= modulus {
            return Err(Error::Crypto("DH generator out of range".into()));
        }
        Ok(Self { modulus, generator })
    }

    /// Parameters from their base64 `btwoc` wire form.
    pub fn from_base64(modulus: &str, generator: &str) -> Result<Self> {
        Self::new(base64_to_int(modulus)?, base64_to_int(generator)?)
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    pub fn generator(&self) -> &BigUint {
        &self.generator
    }

    pub fn modulus_base64(&self) -> String {
        int_to_base64(&self.modulus)
    }

    pub fn generator_base64(&self) -> String {
        int_to_base64(&self.generator)
    }
}

impl Default for DhParams {
    fn default() -> Self {
        Self {
            modulus: BigUint::from_bytes_be(&DEFAULT_MODULUS),
            generator: BigUint::from(DEFAULT_GENERATOR),
        }
    }
}

/// A public value `y = g^x mod p`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(BigUint);

impl PublicKey {
    pub fn new(y: BigUint) -> Self {
        Self(y)
    }

    pub fn from_base64(input: &str) -> Result<Self> {
        Ok(Self(base64_to_int(input)?))
    }

    pub fn to_base64(&self) -> String {
        int_to_base64(&self.0)
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Reject values outside the open interval `(1, p)`.
    pub fn validate(&self, params: &DhParams) -> Result<()> {
        if self.0 <= BigUint::from(1u32) || self.0 >= params.modulus {
            return Err(Error::Crypto("DH public key out of range".into()));
        }
        Ok(())
    }
}

/// A private exponent in `[1, p-1)`. Wiped on drop.
pub struct PrivateKey {
    x: BigUint,
}

impl PrivateKey {
    /// Draw a uniformly random exponent by rejection sampling.
    pub fn generate(params: &DhParams, rng: &dyn RandomSource) -> Result<Self> {
        let one = BigUint::from(1u32);
        // x = p-1 is excluded: g^(p-1) mod p is 1, which peers reject.
        let bound = &params.modulus - &one;
        let bits = bound.bits();
        let len = (bits + 7) / 8;
        let excess = len * 8 - bits;

        let mut buf = Zeroizing::new(vec![0u8; len]);
        for _ in 0..MAX_DRAWS {
            rng.fill(&mut buf)?;
            buf[0] &= 0xff >> excess;
            let mut x = BigUint::from_bytes_be(&buf);
            if x >= one && x < bound {
                return Ok(Self { x });
            }
            x.zeroize();
        }
        Err(Error::Crypto("could not draw a DH private key".into()))
    }

    pub fn public_key(&self, params: &DhParams) -> PublicKey {
        PublicKey(params.generator.modpow(&self.x, &params.modulus))
    }

    /// Combine with the peer's public value. The peer value is validated first.
    pub fn shared_secret(&self, peer: &PublicKey, params: &DhParams) -> Result<SharedSecret> {
        peer.validate(params)?;
        let mut zz = peer.0.modpow(&self.x, &params.modulus);
        let secret = SharedSecret(Zeroizing::new(btwoc(&zz)));
        zz.zeroize();
        Ok(secret)
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.x.zeroize();
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// `btwoc(zz)` of an agreed secret.
pub struct SharedSecret(Zeroizing<Vec<u8>>);

impl SharedSecret {
    /// XOR `secret` with `H(btwoc(zz))`. Applying it twice restores the input.
    pub fn xor_secret(&self, hash: HashAlgorithm, secret: &[u8]) -> Result<Vec<u8>> {
        let pad = Zeroizing::new(digest(hash, &self.0));
        if pad.len() != secret.len() {
            return Err(Error::Crypto(format!(
                "MAC key length {} does not match {:?} output",
                secret.len(),
                hash
            )));
        }
        Ok(pad.iter().zip(secret).map(|(a, b)| a ^ b).collect())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}
