use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tokio::sync::watch;

use crate::history::{History, HistoryFetch, TrustHistoryCache};

use super::state::{Selection, SelectionChange};

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "trust_monitor::selection";

use crate::log_debug;

/// Result of one selection update: the diff plus a handle for every
/// history fetch it triggered.
#[derive(Debug)]
pub struct SelectionUpdate {
    pub change: SelectionChange,
    pub fetches: Vec<HistoryFetch>,
}

impl SelectionUpdate {
    /// Waits for every triggered fetch. Failures are reported per device.
    pub async fn settle(self) -> Vec<(String, Result<History>)> {
        let mut settled = Vec::with_capacity(self.fetches.len());
        for fetch in self.fetches {
            let device_id = fetch.device_id().to_string();
            settled.push((device_id, fetch.wait().await));
        }
        settled
    }
}

/// Tracks which devices are charted and warms the history cache for
/// newly selected ones.
#[derive(Clone)]
pub struct SelectionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    selection: Mutex<Selection>,
    cache: TrustHistoryCache,
    revision: watch::Sender<u64>,
}

impl SelectionController {
    pub fn new(cache: TrustHistoryCache) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(ControllerInner {
                selection: Mutex::new(Selection::default()),
                cache,
                revision,
            }),
        }
    }

    pub fn current(&self) -> Selection {
        self.lock().clone()
    }

    /// Replaces the selection. `ensure` runs once for each id that was not
    /// selected before; deselected ids keep their cached history.
    pub fn set_selection<I, S>(&self, ids: I) -> SelectionUpdate
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply(|_| Selection::from_ids(ids))
    }

    pub fn select(&self, device_id: &str) -> SelectionUpdate {
        self.apply(|current| current.with(device_id))
    }

    pub fn deselect(&self, device_id: &str) -> SelectionUpdate {
        self.apply(|current| current.without(device_id))
    }

    pub fn clear(&self) -> SelectionUpdate {
        self.apply(|_| Selection::default())
    }

    /// Receives a new value whenever the selection changes, order included.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    fn apply<F>(&self, next: F) -> SelectionUpdate
    where
        F: FnOnce(&Selection) -> Selection,
    {
        let change = {
            let mut guard = self.lock();
            let change = guard.replace(next(&guard));
            let reordered = change.selection != *guard;
            *guard = change.selection.clone();
            if reordered {
                self.inner.revision.send_modify(|revision| *revision += 1);
            }
            change
        };

        if !change.is_noop() {
            log_debug!(
                "selection now {:?} (+{:?} -{:?})",
                change.selection.ids(),
                change.added,
                change.removed
            );
        }

        let fetches = change
            .added
            .iter()
            .map(|device_id| self.inner.cache.ensure(device_id))
            .collect();

        SelectionUpdate { change, fetches }
    }

    fn lock(&self) -> MutexGuard<'_, Selection> {
        self.inner
            .selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
