//! The model cache: the last model each participant selected.
//!
//! Used to bring late joiners up to date and to answer model requests.
//! Only the [`RelayEngine`](crate::RelayEngine) writes to it.
//!
//! # Concurrency note
//!
//! Unlike the session registry, this map is shared by every connection
//! task at once, so it carries its own `RwLock`. Callers never see the
//! lock: each method takes it, does one small operation, and releases it.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use avatar_relay_protocol::ParticipantId;

/// Participant id → currently selected model name.
///
/// Invariant: at most one entry per participant, and never an entry with
/// an empty name. "No entry" means "no model selected".
#[derive(Debug, Default)]
pub struct ModelCache {
    models: RwLock<HashMap<ParticipantId, String>>,
}

impl ModelCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `model` as `participant`'s current model.
    ///
    /// An empty `model` removes the entry instead: a client clears its
    /// selection by sending an empty name.
    pub fn upsert(&self, participant: ParticipantId, model: &str) {
        // Single insert/remove per lock: a poisoned map is still consistent.
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        if model.is_empty() {
            models.remove(&participant);
        } else {
            models.insert(participant, model.to_string());
        }
    }

    /// Removes `participant`'s entry, if any. Returns the removed name.
    pub fn remove(&self, participant: ParticipantId) -> Option<String> {
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&participant)
    }

    /// Returns `participant`'s current model, if any.
    pub fn get(&self, participant: ParticipantId) -> Option<String> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&participant)
            .cloned()
    }

    /// A point-in-time copy of every entry, ordered by participant id.
    ///
    /// The read lock is held only while copying, so a slow caller sending
    /// the snapshot out never blocks writers.
    pub fn snapshot(&self) -> Vec<(ParticipantId, String)> {
        let mut entries: Vec<_> = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, model)| (*id, model.clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    pub fn len(&self) -> usize {
        self.models.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
