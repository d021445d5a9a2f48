#![forbid(unsafe_code)]

//! Associations: shared MAC secrets between the provider and a relying party.

use chrono::{DateTime, Utc};
use openid2_core::{ns, AssocType, Error, Result};
use openid2_crypto::encoding::{base64_decode, base64_encode};
use openid2_crypto::{mac, random::random_bytes, RandomSource};
use openid2_message::Message;
use tracing::debug;
use zeroize::Zeroizing;

/// Default association lifetime in seconds.
pub const DEFAULT_LIFETIME_SECS: i64 = 60 * 60 * 24;

/// A shared secret plus the metadata needed to sign and verify with it.
///
/// Stateful associations were negotiated through `associate` and are reused
/// by the relying party. Stateless ones are created by the provider for a
/// single assertion and consumed by `check_authentication`.
#[derive(Clone)]
pub struct Association {
    assoc_type: AssocType,
    handle: String,
    secret: Zeroizing<Vec<u8>>,
    expires: DateTime<Utc>,
    stateless: bool,
}

impl Association {
    /// Wrap an existing secret. The secret length must match `assoc_type`.
    pub fn new(
        assoc_type: AssocType,
        handle: impl Into<String>,
        secret: Vec<u8>,
        expires: DateTime<Utc>,
        stateless: bool,
    ) -> Result<Self> {
        let handle = handle.into();
        if secret.len() != assoc_type.secret_size() {
            return Err(Error::InvalidAssociation(format!(
                "{assoc_type} secret must be {} bytes, got {}",
                assoc_type.secret_size(),
                secret.len()
            )));
        }
        if handle.is_empty() || !handle.bytes().all(|b| (0x21..=0x7e).contains(&b)) {
            return Err(Error::InvalidAssociation(format!(
                "handle must be printable ASCII: {handle:?}"
            )));
        }
        Ok(Self {
            assoc_type,
            handle,
            secret: Zeroizing::new(secret),
            expires,
            stateless,
        })
    }

    /// Generate a fresh association with a random UUID handle and secret.
    pub fn create(
        rng: &dyn RandomSource,
        assoc_type: AssocType,
        expires: DateTime<Utc>,
        stateless: bool,
    ) -> Result<Self> {
        let mut uuid_bytes = [0u8; 16];
        rng.fill(&mut uuid_bytes)
            .map_err(|e| Error::GeneratingAssociationFailed(e.to_string()))?;
        let handle = uuid::Builder::from_random_bytes(uuid_bytes)
            .into_uuid()
            .to_string();

        let secret = random_bytes(rng, assoc_type.secret_size())
            .map_err(|e| Error::GeneratingAssociationFailed(e.to_string()))?;

        debug!(
            "Created {} association {} (stateless: {})",
            assoc_type, handle, stateless
        );
        Self::new(assoc_type, handle, secret, expires, stateless)
    }

    pub fn assoc_type(&self) -> AssocType {
        self.assoc_type
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    pub fn is_stateless(&self) -> bool {
        self.stateless
    }

    /// Whether the association is still usable at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Whole seconds until expiry, never negative.
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        (self.expires - now).num_seconds().max(0)
    }

    /// Base64 HMAC over the Key-Value Form of `openid.<field>` for each
    /// field in `signed`.
    pub fn signature<S: AsRef<str>>(&self, msg: &Message, signed: &[S]) -> Result<String> {
        let order: Vec<String> = signed
            .iter()
            .map(|f| format!("{}{}", ns::PREFIX, f.as_ref()))
            .collect();
        let kv = msg.to_key_value(&order)?;
        let mac = mac::hmac(self.assoc_type.hash(), &self.secret, &kv)?;
        Ok(base64_encode(&mac))
    }

    /// Sign `msg` in place, adding `openid.signed` and `openid.sig`.
    pub fn sign<S: AsRef<str>>(&self, msg: &mut Message, signed: &[S]) -> Result<()> {
        let sig = self.signature(msg, signed)?;
        let joined = signed
            .iter()
            .map(|f| f.as_ref())
            .collect::<Vec<_>>()
            .join(",");
        msg.set_openid_arg(ns::field::SIGNED, joined);
        msg.set_openid_arg(ns::field::SIG, sig);
        Ok(())
    }

    /// Check `sig` against a fresh signature over `signed`.
    ///
    /// A signature that is not valid base64 simply does not verify.
    pub fn verify<S: AsRef<str>>(&self, msg: &Message, signed: &[S], sig: &str) -> Result<bool> {
        let Ok(submitted) = base64_decode(sig) else {
            return Ok(false);
        };
        let order: Vec<String> = signed
            .iter()
            .map(|f| format!("{}{}", ns::PREFIX, f.as_ref()))
            .collect();
        let kv = msg.to_key_value(&order)?;
        mac::verify_hmac(self.assoc_type.hash(), &self.secret, &kv, &submitted)
    }
}

impl std::fmt::Debug for Association {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Association")
            .field("assoc_type", &self.assoc_type)
            .field("handle", &self.handle)
            .field("secret", &"[redacted]")
            .field("expires", &self.expires)
            .field("stateless", &self.stateless)
            .finish()
    }
}
