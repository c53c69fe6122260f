pub mod activity;
pub mod backend;
pub mod chart;
pub mod cli;
pub mod history;
pub mod models;
pub mod selection;
pub mod settings;
pub mod snapshot;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use activity::ActivityFeed;
use backend::{HttpBackend, TrustBackend};
use chart::{ChartData, ChartSeries};
use history::TrustHistoryCache;
use selection::SelectionController;
use settings::Settings;
use snapshot::DeviceSnapshotStore;

/// Client-side state for one monitoring session: roster, history cache,
/// chart selection and activity log, all bound to one backend.
pub struct Monitor {
    settings: Settings,
    devices: DeviceSnapshotStore,
    history: TrustHistoryCache,
    selection: SelectionController,
    activity: ActivityFeed,
    shutdown: CancellationToken,
}

impl Monitor {
    pub fn new(settings: Settings) -> Result<Self> {
        let backend = HttpBackend::new(&settings.backend_url, settings.request_timeout())
            .context("failed to set up backend client")?;
        log::info!("Using trust backend at {}", backend.base_url());
        Ok(Self::with_backend(settings, Arc::new(backend)))
    }

    pub fn with_backend(settings: Settings, backend: Arc<dyn TrustBackend>) -> Self {
        let shutdown = CancellationToken::new();
        let history = TrustHistoryCache::new(backend.clone(), shutdown.clone());

        Self {
            devices: DeviceSnapshotStore::new(backend.clone(), shutdown.clone()),
            selection: SelectionController::new(history.clone()),
            activity: ActivityFeed::new(backend, shutdown.clone()),
            history,
            settings,
            shutdown,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn devices(&self) -> &DeviceSnapshotStore {
        &self.devices
    }

    pub fn history(&self) -> &TrustHistoryCache {
        &self.history
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn activity(&self) -> &ActivityFeed {
        &self.activity
    }

    /// Series for the current selection from whatever history is loaded.
    pub fn chart_series(&self) -> Vec<ChartSeries> {
        chart::build(
            self.selection.current().ids(),
            &self.history.snapshot(),
            &self.settings.palette,
        )
    }

    pub fn chart(&self) -> ChartData {
        chart::chart_data(
            self.selection.current().ids(),
            &self.history.snapshot(),
            &self.settings.palette,
        )
    }

    /// Tears the session down. Responses still in flight are dropped
    /// instead of being written into any store.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            log::info!("Monitor shutting down");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Initialise logging (reads RUST_LOG; `debug` lowers the default level).
pub fn init_logging(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}
