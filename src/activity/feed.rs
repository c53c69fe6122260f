use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, PoisonError, RwLock,
};

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;

use crate::backend::TrustBackend;
use crate::models::ActivityLogEntry;

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "trust_monitor::activity";

use crate::{log_info, log_warn};

struct FeedState {
    entries: Arc<[ActivityLogEntry]>,
    ticket: u64,
}

/// Display-only copy of the backend activity log, replaced wholesale on
/// each successful refresh.
#[derive(Clone)]
pub struct ActivityFeed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    backend: Arc<dyn TrustBackend>,
    state: RwLock<FeedState>,
    next_ticket: AtomicU64,
    shutdown: CancellationToken,
}

impl ActivityFeed {
    pub fn new(backend: Arc<dyn TrustBackend>, shutdown: CancellationToken) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                backend,
                state: RwLock::new(FeedState {
                    entries: Arc::from(Vec::new()),
                    ticket: 0,
                }),
                next_ticket: AtomicU64::new(1),
                shutdown,
            }),
        }
    }

    pub fn entries(&self) -> Arc<[ActivityLogEntry]> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone()
    }

    pub fn malicious(&self) -> Vec<ActivityLogEntry> {
        self.entries()
            .iter()
            .filter(|entry| entry.is_malicious())
            .cloned()
            .collect()
    }

    pub async fn refresh(&self) -> Result<Arc<[ActivityLogEntry]>> {
        if self.inner.shutdown.is_cancelled() {
            bail!("monitor is shut down");
        }
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::SeqCst);

        let result = tokio::select! {
            result = self.inner.backend.activity_log() => result,
            _ = self.inner.shutdown.cancelled() => {
                bail!("monitor shut down during activity refresh");
            }
        };

        if self.inner.shutdown.is_cancelled() {
            bail!("monitor shut down during activity refresh");
        }

        let entries = match result {
            Ok(entries) => entries,
            Err(err) => {
                log_warn!("activity log refresh failed: {}", err);
                return Err(err).context("activity log refresh failed");
            }
        };

        let mut guard = self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if ticket > guard.ticket {
            log_info!("activity log holds {} entries", entries.len());
            *guard = FeedState {
                entries: Arc::from(entries),
                ticket,
            };
        }
        Ok(guard.entries.clone())
    }
}
