#![forbid(unsafe_code)]

//! Association and nonce persistence.

use crate::association::{Association, DEFAULT_LIFETIME_SECS};
use chrono::{DateTime, Duration, Utc};
use openid2_core::{Error, Result};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use tracing::debug;

/// Where associations and seen nonces live between requests.
///
/// Associations are keyed by `(handle, stateless)`. Implementations must be
/// safe to share across threads; two concurrent verifications must not both
/// consume the same stateless association, and a nonce must be recorded at
/// most once.
pub trait Store: Send + Sync {
    /// Insert or replace an association.
    fn store_association(&self, assoc: &Association) -> Result<()>;

    /// Fetch an association. Absent ⇒ [`Error::AssociationNotFound`].
    fn get_association(&self, handle: &str, stateless: bool) -> Result<Association>;

    /// Remove an association. Removing an absent one is not an error.
    fn delete_association(&self, assoc: &Association) -> Result<()>;

    fn is_known_nonce(&self, nonce: &str) -> Result<bool>;

    fn store_nonce(&self, nonce: &str) -> Result<()>;

    /// Record `nonce` unless it was already seen. Returns `true` when the
    /// nonce was fresh.
    ///
    /// The default is check-then-store; override it when the backing store
    /// can do both atomically.
    fn use_nonce(&self, nonce: &str) -> Result<bool> {
        if self.is_known_nonce(nonce)? {
            return Ok(false);
        }
        self.store_nonce(nonce)?;
        Ok(true)
    }
}

/// In-memory [`Store`].
///
/// Seen nonces are kept with the time their leading timestamp names and are
/// forgotten by [`purge_expired`](Self::purge_expired) once they fall outside
/// the nonce window.
pub struct MemoryStore {
    associations: RwLock<HashMap<(String, bool), Association>>,
    nonces: Mutex<HashMap<String, DateTime<Utc>>>,
    nonce_window: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            associations: RwLock::default(),
            nonces: Mutex::default(),
            nonce_window: Duration::seconds(DEFAULT_LIFETIME_SECS),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long a nonce is remembered after its timestamp. It should be no
    /// shorter than the lifetime of the associations that sign assertions.
    pub fn with_nonce_window(mut self, window: Duration) -> Self {
        self.nonce_window = window;
        self
    }

    /// Number of remembered nonces.
    pub fn nonce_count(&self) -> Result<usize> {
        Ok(self.nonces.lock().map_err(poisoned)?.len())
    }

    /// Number of stored associations.
    pub fn association_count(&self) -> Result<usize> {
        Ok(self.associations.read().map_err(poisoned)?.len())
    }

    /// Drop every association that has expired at `now` and every nonce
    /// older than the nonce window. Returns how many entries were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut map = self.associations.write().map_err(poisoned)?;
        let before = map.len();
        map.retain(|_, a| a.is_valid_at(now));
        let assocs = before - map.len();
        drop(map);

        let mut nonces = self.nonces.lock().map_err(poisoned)?;
        let before = nonces.len();
        nonces.retain(|_, stamp| *stamp + self.nonce_window > now);
        let seen = before - nonces.len();

        if assocs + seen > 0 {
            debug!("Purged {} expired associations and {} old nonces", assocs, seen);
        }
        Ok(assocs + seen)
    }
}

/// The timestamp a `response_nonce` starts with, or the current time for a
/// nonce that carries none.
fn nonce_timestamp(nonce: &str) -> DateTime<Utc> {
    nonce
        .get(..20)
        .and_then(|stamp| DateTime::parse_from_rfc3339(stamp).ok())
        .map_or_else(Utc::now, |t| t.with_timezone(&Utc))
}

fn poisoned<T>(_: T) -> Error {
    Error::Store("lock poisoned".into())
}

impl Store for MemoryStore {
    fn store_association(&self, assoc: &Association) -> Result<()> {
        let key = (assoc.handle().to_owned(), assoc.is_stateless());
        self.associations
            .write()
            .map_err(poisoned)?
            .insert(key, assoc.clone());
        Ok(())
    }

    fn get_association(&self, handle: &str, stateless: bool) -> Result<Association> {
        self.associations
            .read()
            .map_err(poisoned)?
            .get(&(handle.to_owned(), stateless))
            .cloned()
            .ok_or_else(|| Error::AssociationNotFound(handle.to_owned()))
    }

    fn delete_association(&self, assoc: &Association) -> Result<()> {
        let key = (assoc.handle().to_owned(), assoc.is_stateless());
        self.associations.write().map_err(poisoned)?.remove(&key);
        Ok(())
    }

    fn is_known_nonce(&self, nonce: &str) -> Result<bool> {
        Ok(self.nonces.lock().map_err(poisoned)?.contains_key(nonce))
    }

    fn store_nonce(&self, nonce: &str) -> Result<()> {
        self.nonces
            .lock()
            .map_err(poisoned)?
            .insert(nonce.to_owned(), nonce_timestamp(nonce));
        Ok(())
    }

    fn use_nonce(&self, nonce: &str) -> Result<bool> {
        let mut nonces = self.nonces.lock().map_err(poisoned)?;
        if nonces.contains_key(nonce) {
            return Ok(false);
        }
        nonces.insert(nonce.to_owned(), nonce_timestamp(nonce));
        Ok(true)
    }
}
