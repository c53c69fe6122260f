use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, PoisonError, RwLock,
};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, TrustBackend};
use crate::models::{Device, NewDevice};

use super::state::{DeviceSnapshot, RosterEvent, RosterState, Transition};

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "trust_monitor::snapshot";

use crate::{log_debug, log_info, log_warn};

/// Result of a create/leave request. Local state is never changed
/// optimistically, so a failure leaves nothing to roll back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MutationOutcome {
    Succeeded,
    Failed { reason: String },
}

impl MutationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MutationOutcome::Succeeded)
    }
}

/// Holds the current roster, its suspicious subset and the coordinator.
#[derive(Clone)]
pub struct DeviceSnapshotStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    backend: Arc<dyn TrustBackend>,
    state: RwLock<RosterState>,
    next_ticket: AtomicU64,
    shutdown: CancellationToken,
}

impl DeviceSnapshotStore {
    pub fn new(backend: Arc<dyn TrustBackend>, shutdown: CancellationToken) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                state: RwLock::new(RosterState::default()),
                next_ticket: AtomicU64::new(1),
                shutdown,
            }),
        }
    }

    /// Last committed snapshot. Empty until the first refresh succeeds.
    pub fn current(&self) -> Arc<DeviceSnapshot> {
        self.read_state().snapshot.clone()
    }

    pub fn coordinator(&self) -> Option<Device> {
        self.read_state().coordinator.clone()
    }

    /// Set when the latest refresh failed and `current()` predates it.
    pub fn last_refresh_error(&self) -> Option<String> {
        self.read_state().last_error.clone()
    }

    pub fn is_stale(&self) -> bool {
        self.read_state().is_stale()
    }

    /// Fetches the full roster and swaps it in. On failure the previous
    /// snapshot stays in place and the error is returned.
    pub async fn refresh(&self) -> Result<Arc<DeviceSnapshot>> {
        let ticket = self.issue_ticket()?;
        log_debug!("roster refresh #{} started", ticket);

        let result = tokio::select! {
            result = self.inner.backend.list_devices() => result,
            _ = self.inner.shutdown.cancelled() => {
                log_debug!("roster refresh #{} discarded after shutdown", ticket);
                bail!("monitor shut down during roster refresh");
            }
        };

        if self.inner.shutdown.is_cancelled() {
            bail!("monitor shut down during roster refresh");
        }

        match result {
            Ok(devices) => {
                let count = devices.len();
                let transition = self.commit(RosterEvent::RosterFetched {
                    ticket,
                    devices,
                    fetched_at: Utc::now(),
                });
                let snapshot = self.current();
                match transition {
                    Transition::Committed => log_info!(
                        "roster refresh #{} committed {} devices ({} suspicious)",
                        ticket,
                        count,
                        snapshot.suspicious().len()
                    ),
                    _ => log_debug!("roster refresh #{} superseded by a newer one", ticket),
                }
                Ok(snapshot)
            }
            Err(err) => {
                log_warn!("roster refresh #{} failed: {}", ticket, err);
                self.commit(RosterEvent::RosterFailed {
                    ticket,
                    reason: err.to_string(),
                });
                Err(err).context("device roster refresh failed")
            }
        }
    }

    /// Fetches the current coordinator. Failure keeps the previous one.
    pub async fn refresh_coordinator(&self) -> Result<Device> {
        let ticket = self.issue_ticket()?;

        let result = tokio::select! {
            result = self.inner.backend.coordinator() => result,
            _ = self.inner.shutdown.cancelled() => {
                bail!("monitor shut down during coordinator refresh");
            }
        };

        if self.inner.shutdown.is_cancelled() {
            bail!("monitor shut down during coordinator refresh");
        }

        match result {
            Ok(coordinator) => {
                log_info!("coordinator is {}", coordinator.id);
                self.commit(RosterEvent::CoordinatorFetched {
                    ticket,
                    coordinator: coordinator.clone(),
                });
                Ok(coordinator)
            }
            Err(err) => {
                if err.is_not_found() {
                    log_info!("backend reports no coordinator");
                } else {
                    log_warn!("coordinator refresh failed: {}", err);
                }
                self.commit(RosterEvent::CoordinatorFailed {
                    ticket,
                    reason: err.to_string(),
                });
                Err(err).context("coordinator refresh failed")
            }
        }
    }

    /// Fetches one device straight from the backend. The roster snapshot is
    /// left untouched.
    pub async fn lookup_device(&self, device_id: &str) -> Result<Device> {
        if self.inner.shutdown.is_cancelled() {
            bail!("monitor is shut down");
        }

        let result = tokio::select! {
            result = self.inner.backend.get_device(device_id) => result,
            _ = self.inner.shutdown.cancelled() => {
                bail!("monitor shut down during device lookup");
            }
        };

        match result {
            Ok(device) => {
                log_debug!("looked up device {} (trust {:.3})", device.id, device.trust_score);
                Ok(device)
            }
            Err(err) if err.is_not_found() => Err(err).context(format!("device {device_id} not found")),
            Err(err) => {
                log_warn!("lookup of device {} failed: {}", device_id, err);
                Err(err).context(format!("failed to look up device {device_id}"))
            }
        }
    }

    pub async fn create_device(&self, device: &NewDevice) -> MutationOutcome {
        let result = self.inner.backend.create_device(device).await;
        self.finish_mutation(&format!("create device {}", device.id), result)
            .await
    }

    pub async fn leave_device(&self, device_id: &str) -> MutationOutcome {
        let result = self.inner.backend.leave_device(device_id).await;
        self.finish_mutation(&format!("leave device {device_id}"), result)
            .await
    }

    async fn finish_mutation(
        &self,
        action: &str,
        result: Result<(), BackendError>,
    ) -> MutationOutcome {
        match result {
            Ok(()) => {
                log_info!("{} succeeded", action);
                if let Err(err) = self.refresh().await {
                    log_warn!("roster refresh after {} failed: {:#}", action, err);
                }
                MutationOutcome::Succeeded
            }
            Err(err) => {
                log_warn!("{} failed: {}", action, err);
                MutationOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn issue_ticket(&self) -> Result<u64> {
        if self.inner.shutdown.is_cancelled() {
            bail!("monitor is shut down");
        }
        Ok(self.inner.next_ticket.fetch_add(1, Ordering::SeqCst))
    }

    fn commit(&self, event: RosterEvent) -> Transition {
        let mut guard = self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let (next, transition) = guard.apply(event);
        *guard = next;
        transition
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, RosterState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
