use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use anyhow::{anyhow, Result};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::backend::TrustBackend;

use super::state::{
    empty_history, EnsureDecision, History, HistoryEvent, HistorySnapshot, HistoryState,
    HistoryStatus,
};

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "trust_monitor::history";

use crate::{log_debug, log_error, log_info, log_warn};

/// How a fetch settled, as seen by everyone waiting on it.
#[derive(Debug, Clone)]
pub enum FetchResult {
    Loaded(History),
    Failed(String),
    /// The cache was shut down before the response arrived.
    Discarded,
}

type Settled = watch::Receiver<Option<FetchResult>>;

/// What a single `ensure` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// History was already loaded; nothing was requested.
    Cached,
    /// A fetch for this id was in flight; the call joined it.
    Joined,
    /// This call started the fetch.
    Started,
    /// The cache is shut down.
    Closed,
    /// Called outside a tokio runtime, so no fetch could be started. The id
    /// stays absent and a later call can retry.
    NoRuntime,
}

/// Handle returned by [`TrustHistoryCache::ensure`]. Dropping it does not
/// cancel the fetch.
#[derive(Debug)]
pub struct HistoryFetch {
    device_id: String,
    outcome: EnsureOutcome,
    cached: Option<History>,
    settled: Option<Settled>,
}

impl HistoryFetch {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn outcome(&self) -> EnsureOutcome {
        self.outcome
    }

    /// Waits until the history is available. Only for callers that can
    /// afford to wait; renderers read [`TrustHistoryCache::get`] instead.
    pub async fn wait(self) -> Result<History> {
        if let Some(history) = self.cached {
            return Ok(history);
        }

        let Some(mut settled) = self.settled else {
            return Err(match self.outcome {
                EnsureOutcome::NoRuntime => anyhow!(
                    "history fetch for {} needs a tokio runtime",
                    self.device_id
                ),
                _ => anyhow!("history cache is shut down"),
            });
        };

        let result = settled
            .wait_for(Option::is_some)
            .await
            .map(|value| value.clone())
            .map_err(|_| anyhow!("history fetch for {} was dropped", self.device_id))?;

        match result {
            Some(FetchResult::Loaded(history)) => Ok(history),
            Some(FetchResult::Failed(reason)) => Err(anyhow!(
                "history fetch for {} failed: {reason}",
                self.device_id
            )),
            Some(FetchResult::Discarded) | None => Err(anyhow!(
                "history fetch for {} was discarded",
                self.device_id
            )),
        }
    }
}

struct CacheState {
    history: HistoryState,
    in_flight: HashMap<String, PendingFetch>,
}

struct PendingFetch {
    ticket: u64,
    settled: Settled,
}

struct CacheInner {
    backend: Arc<dyn TrustBackend>,
    state: Mutex<CacheState>,
    next_ticket: AtomicU64,
    revision: watch::Sender<u64>,
    shutdown: CancellationToken,
}

/// Lazy per-device store of trust histories with at most one request in
/// flight per device. Entries are never evicted.
#[derive(Clone)]
pub struct TrustHistoryCache {
    inner: Arc<CacheInner>,
}

impl TrustHistoryCache {
    pub fn new(backend: Arc<dyn TrustBackend>, shutdown: CancellationToken) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(CacheInner {
                backend,
                state: Mutex::new(CacheState {
                    history: HistoryState::default(),
                    in_flight: HashMap::new(),
                }),
                next_ticket: AtomicU64::new(1),
                revision,
                shutdown,
            }),
        }
    }

    /// Makes sure history for `device_id` is loaded or loading. Starts a
    /// background fetch on a tokio runtime when the id is absent; joins the
    /// outstanding one when it is loading.
    pub fn ensure(&self, device_id: &str) -> HistoryFetch {
        let mut fetch = HistoryFetch {
            device_id: device_id.to_string(),
            outcome: EnsureOutcome::Closed,
            cached: None,
            settled: None,
        };

        if self.inner.shutdown.is_cancelled() {
            return fetch;
        }

        let mut guard = self.inner.lock();
        match guard.history.decide(device_id) {
            EnsureDecision::AlreadyLoaded => {
                fetch.outcome = EnsureOutcome::Cached;
                fetch.cached = guard.history.loaded(device_id).cloned();
            }
            EnsureDecision::JoinInFlight { ticket } => {
                log_debug!("joining in-flight history fetch #{} for {}", ticket, device_id);
                fetch.outcome = EnsureOutcome::Joined;
                fetch.settled = guard
                    .in_flight
                    .get(device_id)
                    .map(|pending| pending.settled.clone());
            }
            EnsureDecision::StartFetch => {
                let Ok(runtime) = Handle::try_current() else {
                    log_error!("cannot fetch history for {} outside a tokio runtime", device_id);
                    fetch.outcome = EnsureOutcome::NoRuntime;
                    return fetch;
                };

                let ticket = self.inner.next_ticket.fetch_add(1, Ordering::SeqCst);
                let (tx, rx) = watch::channel(None);

                let state = std::mem::take(&mut guard.history);
                guard.history = state.apply(HistoryEvent::FetchStarted {
                    device_id: device_id.to_string(),
                    ticket,
                });
                guard.in_flight.insert(
                    device_id.to_string(),
                    PendingFetch {
                        ticket,
                        settled: rx.clone(),
                    },
                );
                self.inner.publish(guard.history.revision());
                drop(guard);

                log_info!("fetching history for {} (#{})", device_id, ticket);

                fetch.outcome = EnsureOutcome::Started;
                fetch.settled = Some(rx);

                let inner = self.inner.clone();
                let device_id = device_id.to_string();
                runtime.spawn(async move {
                    inner.run_fetch(device_id, ticket, tx).await;
                });
            }
        }

        fetch
    }

    /// Non-blocking read; empty until the history has been fetched.
    pub fn get(&self, device_id: &str) -> History {
        self.inner
            .lock()
            .history
            .loaded(device_id)
            .cloned()
            .unwrap_or_else(empty_history)
    }

    pub fn status(&self, device_id: &str) -> HistoryStatus {
        self.inner.lock().history.status(device_id)
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        self.inner.lock().history.snapshot()
    }

    /// Receives the cache revision after every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }
}

impl CacheInner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called with the state lock held so subscribers never see the
    /// revision go backwards.
    fn publish(&self, revision: u64) {
        self.revision.send_if_modified(|current| {
            let newer = revision > *current;
            if newer {
                *current = revision;
            }
            newer
        });
    }

    async fn run_fetch(
        &self,
        device_id: String,
        ticket: u64,
        settled: watch::Sender<Option<FetchResult>>,
    ) {
        let response = tokio::select! {
            response = self.backend.device_history(&device_id) => Some(response),
            _ = self.shutdown.cancelled() => None,
        };

        let response = match response {
            Some(response) if !self.shutdown.is_cancelled() => response,
            _ => {
                log_debug!("discarding history fetch #{} for {} after shutdown", ticket, device_id);
                settled.send_replace(Some(FetchResult::Discarded));
                return;
            }
        };

        let (event, failure) = match response {
            Ok(entries) => (
                HistoryEvent::FetchSucceeded {
                    device_id: device_id.clone(),
                    ticket,
                    entries,
                },
                None,
            ),
            Err(err) => (
                HistoryEvent::FetchFailed {
                    device_id: device_id.clone(),
                    ticket,
                },
                Some(err.to_string()),
            ),
        };

        let result = {
            let mut guard = self.lock();
            let state = std::mem::take(&mut guard.history);
            guard.history = state.apply(event);
            if guard
                .in_flight
                .get(&device_id)
                .is_some_and(|pending| pending.ticket == ticket)
            {
                guard.in_flight.remove(&device_id);
            }

            let result = match (&failure, guard.history.loaded(&device_id)) {
                (Some(reason), _) => FetchResult::Failed(reason.clone()),
                (None, Some(history)) => FetchResult::Loaded(history.clone()),
                (None, None) => FetchResult::Discarded,
            };
            self.publish(guard.history.revision());
            result
        };

        match &result {
            FetchResult::Loaded(history) => {
                log_info!("stored {} history entries for {}", history.len(), device_id)
            }
            FetchResult::Failed(reason) => {
                log_warn!("history fetch for {} failed: {}", device_id, reason)
            }
            FetchResult::Discarded => {
                log_debug!("history fetch #{} for {} was superseded", ticket, device_id)
            }
        }

        settled.send_replace(Some(result));
    }
}
