use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::models::TrustHistoryEntry;

/// A device's trust history, ascending by timestamp. Shared, never mutated.
pub type History = Arc<[TrustHistoryEntry]>;

pub fn empty_history() -> History {
    Arc::from(Vec::new())
}

/// Per-device lifecycle: `Absent -> Loading -> {Loaded | Absent}`.
/// Absent is represented by the key not being present.
#[derive(Debug, Clone)]
pub enum EntryState {
    Loading { ticket: u64 },
    Loaded(History),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HistoryStatus {
    Absent,
    Loading,
    Loaded,
}

#[derive(Debug, Clone)]
pub enum HistoryEvent {
    FetchStarted {
        device_id: String,
        ticket: u64,
    },
    FetchSucceeded {
        device_id: String,
        ticket: u64,
        entries: Vec<TrustHistoryEntry>,
    },
    FetchFailed {
        device_id: String,
        ticket: u64,
    },
}

/// What `ensure` has to do for a key given the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureDecision {
    AlreadyLoaded,
    JoinInFlight { ticket: u64 },
    StartFetch,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryState {
    entries: HashMap<String, EntryState>,
    revision: u64,
}

impl HistoryState {
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn status(&self, device_id: &str) -> HistoryStatus {
        match self.entries.get(device_id) {
            None => HistoryStatus::Absent,
            Some(EntryState::Loading { .. }) => HistoryStatus::Loading,
            Some(EntryState::Loaded(_)) => HistoryStatus::Loaded,
        }
    }

    pub fn loaded(&self, device_id: &str) -> Option<&History> {
        match self.entries.get(device_id) {
            Some(EntryState::Loaded(history)) => Some(history),
            _ => None,
        }
    }

    pub fn decide(&self, device_id: &str) -> EnsureDecision {
        match self.entries.get(device_id) {
            None => EnsureDecision::StartFetch,
            Some(EntryState::Loading { ticket }) => EnsureDecision::JoinInFlight { ticket: *ticket },
            Some(EntryState::Loaded(_)) => EnsureDecision::AlreadyLoaded,
        }
    }

    /// Applies one event. Completions whose ticket does not match the
    /// in-flight request for that key are ignored.
    pub fn apply(mut self, event: HistoryEvent) -> Self {
        let changed = match event {
            HistoryEvent::FetchStarted { device_id, ticket } => {
                if self.entries.contains_key(&device_id) {
                    false
                } else {
                    self.entries
                        .insert(device_id, EntryState::Loading { ticket });
                    true
                }
            }
            HistoryEvent::FetchSucceeded {
                device_id,
                ticket,
                mut entries,
            } => {
                if self.is_loading(&device_id, ticket) {
                    entries.sort_by_key(|entry| entry.timestamp);
                    self.entries
                        .insert(device_id, EntryState::Loaded(Arc::from(entries)));
                    true
                } else {
                    false
                }
            }
            HistoryEvent::FetchFailed { device_id, ticket } => {
                if self.is_loading(&device_id, ticket) {
                    self.entries.remove(&device_id);
                    true
                } else {
                    false
                }
            }
        };

        if changed {
            self.revision += 1;
        }
        self
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            histories: self
                .entries
                .iter()
                .filter_map(|(id, entry)| match entry {
                    EntryState::Loaded(history) => Some((id.clone(), history.clone())),
                    EntryState::Loading { .. } => None,
                })
                .collect(),
            revision: self.revision,
        }
    }

    fn is_loading(&self, device_id: &str, ticket: u64) -> bool {
        matches!(
            self.entries.get(device_id),
            Some(EntryState::Loading { ticket: current }) if *current == ticket
        )
    }
}

/// Point-in-time copy of every loaded history, the input of chart building.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySnapshot {
    histories: HashMap<String, History>,
    revision: u64,
}

impl HistorySnapshot {
    pub fn get(&self, device_id: &str) -> Option<&History> {
        self.histories.get(device_id)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}

impl FromIterator<(String, Vec<TrustHistoryEntry>)> for HistorySnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Vec<TrustHistoryEntry>)>>(iter: I) -> Self {
        Self {
            histories: iter
                .into_iter()
                .map(|(id, entries)| (id, Arc::from(entries)))
                .collect(),
            revision: 0,
        }
    }
}
