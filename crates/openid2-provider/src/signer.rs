#![forbid(unsafe_code)]

//! Signing positive assertions and verifying them for `check_authentication`.

use chrono::{Duration, Utc};
use openid2_assoc::{Association, Store};
use openid2_core::{ns, AssocType, Error, Result};
use openid2_crypto::RandomSource;
use openid2_message::Message;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fields covered by an assertion signature, in signing order.
const SIGNED_FIELDS: [&str; 6] = [
    ns::field::OP_ENDPOINT,
    ns::field::RETURN_TO,
    ns::field::RESPONSE_NONCE,
    ns::field::ASSOC_HANDLE,
    ns::field::CLAIMED_ID,
    ns::field::IDENTITY,
];

/// Outcome of verifying an assertion signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Invalid { reason: String },
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid)
    }
}

/// Picks or creates associations, signs with them and verifies signatures.
#[derive(Clone)]
pub struct Signer {
    store: Arc<dyn Store>,
    random: Arc<dyn RandomSource>,
    lifetime: Duration,
    assoc_type: AssocType,
}

impl Signer {
    /// `assoc_type` is used for the stateless associations the signer
    /// creates itself.
    pub fn new(
        store: Arc<dyn Store>,
        random: Arc<dyn RandomSource>,
        lifetime: Duration,
        assoc_type: AssocType,
    ) -> Self {
        Self {
            store,
            random,
            lifetime,
            assoc_type,
        }
    }

    /// Create an association of `assoc_type` expiring after the configured
    /// lifetime. Nothing is persisted.
    pub fn create_association(&self, assoc_type: AssocType, stateless: bool) -> Result<Association> {
        Association::create(
            self.random.as_ref(),
            assoc_type,
            Utc::now() + self.lifetime,
            stateless,
        )
    }

    /// Sign `msg` over `order`.
    ///
    /// With no handle a fresh stateless association is used. A handle that
    /// names no live stateful association is echoed back as
    /// `invalidate_handle` and a stateless association is used instead.
    /// The chosen handle is written to `assoc_handle` before signing.
    pub fn sign<S: AsRef<str>>(
        &self,
        msg: &mut Message,
        assoc_handle: Option<&str>,
        order: &[S],
    ) -> Result<()> {
        let assoc = match assoc_handle {
            None => self.create_association(self.assoc_type, true)?,
            Some(handle) => match self.store.get_association(handle, false) {
                Ok(assoc) if assoc.is_valid() => assoc,
                Ok(_) | Err(Error::AssociationNotFound(_)) => {
                    debug!(
                        "Association {} unusable, falling back to a stateless one",
                        handle
                    );
                    msg.set_openid_arg(ns::field::INVALIDATE_HANDLE, handle);
                    self.create_association(self.assoc_type, true)?
                }
                Err(e) => return Err(e),
            },
        };

        if assoc.is_stateless() {
            self.store.store_association(&assoc)?;
        }

        msg.set_openid_arg(ns::field::ASSOC_HANDLE, assoc.handle());
        assoc.sign(msg, order)
    }

    /// Re-sign a copy of `msg` with the association named by `handle` and
    /// compare with `sig`.
    ///
    /// An unknown handle is [`Error::AssociationNotFound`]. An expired
    /// association, or a `signed` list naming absent or unencodable fields,
    /// is an invalid signature.
    pub fn verify<S: AsRef<str>>(
        &self,
        msg: &Message,
        handle: &str,
        signed: &[S],
        sig: &str,
        stateless: bool,
    ) -> Result<Verification> {
        let assoc = self.store.get_association(handle, stateless)?;
        if !assoc.is_valid() {
            return Ok(Verification::Invalid {
                reason: format!("association {handle} expired"),
            });
        }

        // The assertion was signed as id_res; the copy under verification
        // carries mode=check_authentication.
        let mut copy = msg.clone();
        copy.set_openid_arg(ns::field::MODE, ns::mode::ID_RES);

        match assoc.verify(&copy, signed, sig) {
            Ok(true) => Ok(Verification::Valid),
            Ok(false) => {
                warn!("Signature mismatch for association {}", handle);
                Ok(Verification::Invalid {
                    reason: "signature mismatch".into(),
                })
            }
            Err(
                e @ (Error::ValueNotFound(_)
                | Error::KeyContainsColon(_)
                | Error::KeyContainsNewLine(_)
                | Error::ValueContainsNewLine(_)),
            ) => Ok(Verification::Invalid {
                reason: e.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Delete the association named by `handle`. Absent is not an error.
    pub fn invalidate(&self, handle: &str, stateless: bool) -> Result<()> {
        match self.store.get_association(handle, stateless) {
            Ok(assoc) => {
                debug!("Invalidating association {}", handle);
                self.store.delete_association(&assoc)
            }
            Err(Error::AssociationNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Signing order for an assertion: every field of [`SIGNED_FIELDS`] except
/// `claimed_id` and `identity` when the message lacks them.
pub fn signed_fields(msg: &Message) -> Vec<&'static str> {
    SIGNED_FIELDS
        .iter()
        .copied()
        .filter(|field| match *field {
            ns::field::CLAIMED_ID | ns::field::IDENTITY => msg.openid_arg(field).is_some(),
            _ => true,
        })
        .collect()
}
