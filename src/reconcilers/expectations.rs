//! Pending-operation counters per (kind, owner)
//!
//! A counter is raised right before a mutating call and lowered either when
//! the call fails or when the watch cache observes the resulting object. The
//! controller does not start a new pass for an owner while any of its
//! counters is non-zero, so a pass never reads a cache that is missing the
//! objects the previous pass created.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

use crate::reconcilers::generations::ObjectKind;

/// Outstanding creations and deletions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pending {
    pub adds: i64,
    pub deletes: i64,
}

impl Pending {
    pub fn is_fulfilled(&self) -> bool {
        self.adds <= 0 && self.deletes <= 0
    }
}

/// Expectations shared between reconcile passes and cache observers
#[derive(Debug, Default)]
pub struct Expectations {
    counters: Mutex<HashMap<(ObjectKind, String), Pending>>,
}

impl Expectations {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(ObjectKind, String), Pending>> {
        // Counters stay consistent even if a holder panicked mid-update
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `adds` creations and `deletes` deletions about to be issued
    pub fn raise(&self, kind: ObjectKind, key: &str, adds: i64, deletes: i64) {
        let mut counters = self.lock();
        let pending = counters.entry((kind, key.to_string())).or_default();
        pending.adds += adds;
        pending.deletes += deletes;
        trace!(%kind, key, adds = pending.adds, deletes = pending.deletes, "Raised expectations");
    }

    /// Mark operations as observed or abandoned; counters never drop below zero
    pub fn lower(&self, kind: ObjectKind, key: &str, adds: i64, deletes: i64) {
        let mut counters = self.lock();
        let map_key = (kind, key.to_string());
        let Some(pending) = counters.get_mut(&map_key) else {
            return;
        };
        pending.adds = (pending.adds - adds).max(0);
        pending.deletes = (pending.deletes - deletes).max(0);
        trace!(%kind, key, adds = pending.adds, deletes = pending.deletes, "Lowered expectations");
        if pending.is_fulfilled() {
            counters.remove(&map_key);
        }
    }

    pub fn pending(&self, kind: ObjectKind, key: &str) -> Pending {
        self.lock()
            .get(&(kind, key.to_string()))
            .copied()
            .unwrap_or_default()
    }

    pub fn satisfied(&self, kind: ObjectKind, key: &str) -> bool {
        self.pending(kind, key).is_fulfilled()
    }

    /// True when no kind has outstanding operations for `key`
    pub fn all_satisfied(&self, key: &str) -> bool {
        self.lock()
            .iter()
            .filter(|((_, owner), _)| owner == key)
            .all(|(_, pending)| pending.is_fulfilled())
    }

    /// Forget every counter of `key`, e.g. once the owner is deleted
    pub fn delete_expectations(&self, key: &str) {
        self.lock().retain(|(_, owner), _| owner != key);
    }
}
