//! In-process store of access requests.
//!
//! The registry is the only shared mutable state in the approval engine.
//! It is held in memory (records do not survive a restart) and is owned by
//! [`crate::state::AppState`] rather than a global, so tests can spin up
//! independent instances.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AccessRequest, Decision};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("access request not found")]
    NotFound,

    #[error("access request id already exists")]
    DuplicateKey,
}

/// Result of [`RequestRegistry::transition`].
#[derive(Debug, Clone)]
pub enum Transition {
    /// The record was pending and this call resolved it.
    Applied(AccessRequest),
    /// The record was already terminal; carries the existing record so the
    /// caller can re-render its state instead of acting again.
    AlreadyResolved(AccessRequest),
}

/// Keyed store of [`AccessRequest`] records with an atomic per-record
/// transition primitive.
#[derive(Default)]
pub struct RequestRegistry {
    records: DashMap<Uuid, AccessRequest>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record. Fails if the id is already present.
    pub fn create(&self, record: AccessRequest) -> Result<(), RegistryError> {
        match self.records.entry(record.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(RegistryError::DuplicateKey),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Result<AccessRequest, RegistryError> {
        self.records
            .get(id)
            .map(|r| r.clone())
            .ok_or(RegistryError::NotFound)
    }

    /// Atomically resolve a pending record.
    ///
    /// The `get_mut` guard holds the shard write lock for the duration of
    /// the read-check-write, so concurrent callers on the same id are
    /// serialized: exactly one observes `Applied`, the rest observe
    /// `AlreadyResolved` with the winning record. Callers on different ids
    /// do not contend beyond shard granularity.
    pub fn transition(
        &self,
        id: &Uuid,
        decision: Decision,
        resolver: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, RegistryError> {
        let mut entry = self.records.get_mut(id).ok_or(RegistryError::NotFound)?;
        if entry.status.is_terminal() {
            return Ok(Transition::AlreadyResolved(entry.clone()));
        }
        entry.status = decision.into();
        entry.resolver = Some(resolver.to_string());
        entry.resolved_at = Some(now);
        Ok(Transition::Applied(entry.clone()))
    }
}
