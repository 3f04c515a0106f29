// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Persisted progress: the one record that survives a reload.
//!
//! Progress lives in a host-provided key-value store as a JSON string value
//! under `tour_{id}_progress`, with a separate `tour_{id}_completed` boolean
//! flag that outlives the record itself. The engine reads both at tour start
//! to decide whether to resume or to stay dormant, writes progress on every
//! successful advance, and clears the record on completion or skip.

use serde::{Deserialize, Serialize};

use crate::definition::{StepId, TourId};

/// Lifecycle state recorded in [`TourProgress`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    /// The tour is running and `current_step` is being presented.
    InProgress,
    /// The terminal step is being presented, awaiting user confirmation.
    AwaitingConfirm,
    /// The tour finished. Terminal; the progress record is cleared.
    Completed,
    /// The user skipped out. Terminal; the progress record is cleared.
    Skipped,
}

impl ProgressState {
    /// True for the two terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

/// The persisted progress record.
///
/// Invariant: across any sequence of persisted writes for one run,
/// `current_step` never decreases. The state machine is the only writer and
/// enforces this; the record itself is plain data.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TourProgress {
    /// The tour this record belongs to.
    pub tour_id: TourId,
    /// Step currently being (or about to be) presented.
    pub current_step: StepId,
    /// Lifecycle state.
    pub state: ProgressState,
    /// Wall-clock milliseconds of the last write, host-supplied.
    pub updated_at_ms: u64,
}

impl TourProgress {
    /// Serialize to the JSON string stored as the progress value.
    pub fn to_json(&self) -> String {
        // Serialization of a plain record with no maps cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a stored progress value. Returns `None` for corrupt values so a
    /// damaged record degrades to a fresh start rather than an error.
    pub fn from_json(value: &str) -> Option<Self> {
        serde_json::from_str(value).ok()
    }
}

/// Progress-store key for the progress record of `tour`.
pub fn progress_key(tour: &TourId) -> String {
    format!("tour_{tour}_progress")
}

/// Progress-store key for the completed flag of `tour`.
pub fn completed_key(tour: &TourId) -> String {
    format!("tour_{tour}_completed")
}

/// Failure talking to the host's key-value store.
///
/// The engine treats store failures as non-fatal: they are logged and the
/// tour continues (a lost write costs resume fidelity, not correctness).
#[derive(Debug, thiserror::Error)]
#[error("progress store: {0}")]
pub struct StoreError(pub String);

/// Host-provided key-value store for progress persistence.
///
/// Values are opaque strings; the engine stores JSON. Implementations are
/// expected to be synchronous and cheap (e.g. browser local storage, a
/// settings file, an in-memory map in tests).
pub trait ProgressStore {
    /// Read the value at `key`, if present.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Write `value` at `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Remove the value at `key`, if present.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-memory [`ProgressStore`] used by tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemStore {
    entries: std::collections::BTreeMap<String, String>,
}

impl MemStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}
