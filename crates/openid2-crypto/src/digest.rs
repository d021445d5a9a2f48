#![forbid(unsafe_code)]

//! Hash algorithm implementations.

use digest::Digest;
use openid2_core::HashAlgorithm;

/// Streaming hash.
pub trait DigestAlgorithm: Send {
    /// Feed data into the hash.
    fn update(&mut self, data: &[u8]);
    /// Finalize and return the hash value.
    fn finalize(self: Box<Self>) -> Vec<u8>;
    fn algorithm(&self) -> HashAlgorithm;
}

/// Create a streaming hash for `alg`.
pub fn new_digest(alg: HashAlgorithm) -> Box<dyn DigestAlgorithm> {
    match alg {
        HashAlgorithm::Sha1 => Box::new(Sha1Digest::new()),
        HashAlgorithm::Sha256 => Box::new(Sha256Digest::new()),
    }
}

/// Compute a digest in one shot.
pub fn digest(alg: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    let mut hasher = new_digest(alg);
    hasher.update(data);
    hasher.finalize()
}

macro_rules! impl_digest {
    ($name:ident, $hasher:ty, $alg:expr) => {
        struct $name {
            inner: $hasher,
        }

        impl $name {
            fn new() -> Self {
                Self {
                    inner: <$hasher>::new(),
                }
            }
        }

        impl DigestAlgorithm for $name {
            fn update(&mut self, data: &[u8]) {
                Digest::update(&mut self.inner, data);
            }

            fn finalize(self: Box<Self>) -> Vec<u8> {
                Digest::finalize(self.inner).to_vec()
            }

            fn algorithm(&self) -> HashAlgorithm {
                $alg
            }
        }
    };
}

impl_digest!(Sha1Digest, sha1::Sha1, HashAlgorithm::Sha1);
impl_digest!(Sha256Digest, sha2::Sha256, HashAlgorithm::Sha256);

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_sha1_abc() {
        assert_eq!(
            hex(&digest(HashAlgorithm::Sha1, b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_sha256_abc() {
        assert_eq!(
            hex(&digest(HashAlgorithm::Sha256, b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let mut h = new_digest(HashAlgorithm::Sha256);
        h.update(b"a");
        h.update(b"bc");
        assert_eq!(h.algorithm(), HashAlgorithm::Sha256);
        assert_eq!(h.finalize(), digest(HashAlgorithm::Sha256, b"abc"));
    }

    #[test]
    fn test_output_sizes() {
        for alg in [HashAlgorithm::Sha1, HashAlgorithm::Sha256] {
            assert_eq!(digest(alg, b"").len(), alg.output_size());
        }
    }
}
