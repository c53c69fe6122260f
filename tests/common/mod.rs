#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use tokio::sync::watch;

use trust_monitor::backend::{BackendError, TrustBackend};
use trust_monitor::models::{ActivityLogEntry, Device, NewDevice, TrustHistoryEntry};
use trust_monitor::settings::Settings;
use trust_monitor::Monitor;

pub fn device(id: &str, trust_score: f64) -> Device {
    serde_json::from_value(json!({ "id": id, "name": id, "trust_score": trust_score }))
        .expect("valid device")
}

pub fn entry(minute: u32, trust_score: f64) -> TrustHistoryEntry {
    TrustHistoryEntry {
        timestamp: Utc
            .with_ymd_and_hms(2024, 5, 1, 10, minute, 0)
            .single()
            .expect("valid timestamp"),
        direct_trust: Some(0.1),
        indirect_trust: None,
        centrality_score: None,
        trust_score,
        notes: format!("update {minute}"),
        connection_count: None,
        last_connected_device_id: None,
        coordinator_id: None,
    }
}

pub fn activity(device_id: &str, activity_type: &str) -> ActivityLogEntry {
    serde_json::from_value(json!({
        "timestamp": "2024-05-01T10:00:00",
        "device_id": device_id,
        "activity_type": activity_type,
        "description": format!("Connection from {device_id}"),
        "connection_status": "success"
    }))
    .expect("valid activity entry")
}

/// Holds requests open until `open()` is called.
#[derive(Clone)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
}

impl Gate {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    async fn pass(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[derive(Default)]
struct Script {
    roster: Vec<Device>,
    coordinator: Option<Device>,
    histories: HashMap<String, Vec<TrustHistoryEntry>>,
    activity: Vec<ActivityLogEntry>,
    roster_fails: bool,
    mutations_fail: bool,
    history_failures: HashSet<String>,
    calls: HashMap<String, usize>,
    created: Vec<NewDevice>,
}

/// In-memory backend that records every request.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    roster_gate: Arc<Mutex<Option<Gate>>>,
    history_gate: Arc<Mutex<Option<Gate>>>,
}

fn unavailable(endpoint: &str) -> BackendError {
    BackendError::Status {
        endpoint: endpoint.to_string(),
        status: 503,
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn monitor(&self) -> Monitor {
        Monitor::with_backend(Settings::default(), Arc::new(self.clone()))
    }

    pub fn with_roster(self, devices: Vec<Device>) -> Self {
        self.script.lock().unwrap().roster = devices;
        self
    }

    pub fn with_coordinator(self, coordinator: Device) -> Self {
        self.script.lock().unwrap().coordinator = Some(coordinator);
        self
    }

    pub fn with_history(self, device_id: &str, entries: Vec<TrustHistoryEntry>) -> Self {
        self.script
            .lock()
            .unwrap()
            .histories
            .insert(device_id.to_string(), entries);
        self
    }

    pub fn with_activity(self, entries: Vec<ActivityLogEntry>) -> Self {
        self.script.lock().unwrap().activity = entries;
        self
    }

    pub fn set_roster(&self, devices: Vec<Device>) {
        self.script.lock().unwrap().roster = devices;
    }

    pub fn fail_roster(&self, fail: bool) {
        self.script.lock().unwrap().roster_fails = fail;
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.script.lock().unwrap().mutations_fail = fail;
    }

    /// The next history request for `device_id` fails.
    pub fn fail_history_once(&self, device_id: &str) {
        self.script
            .lock()
            .unwrap()
            .history_failures
            .insert(device_id.to_string());
    }

    pub fn hold_roster(&self) -> Gate {
        let gate = Gate::new();
        *self.roster_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn hold_history(&self) -> Gate {
        let gate = Gate::new();
        *self.history_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    pub fn history_calls(&self, device_id: &str) -> usize {
        self.calls(&format!("history:{device_id}"))
    }

    pub fn created(&self) -> Vec<NewDevice> {
        self.script.lock().unwrap().created.clone()
    }

    fn record(&self, endpoint: &str) {
        *self
            .script
            .lock()
            .unwrap()
            .calls
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
    }

    async fn wait_for(gate: &Arc<Mutex<Option<Gate>>>) {
        let gate = gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
    }
}

#[async_trait]
impl TrustBackend for ScriptedBackend {
    async fn list_devices(&self) -> Result<Vec<Device>, BackendError> {
        self.record("devices");
        Self::wait_for(&self.roster_gate).await;
        let script = self.script.lock().unwrap();
        if script.roster_fails {
            return Err(unavailable("GET /devices"));
        }
        Ok(script.roster.clone())
    }

    async fn get_device(&self, device_id: &str) -> Result<Device, BackendError> {
        self.record("device");
        self.script
            .lock()
            .unwrap()
            .roster
            .iter()
            .find(|device| device.id == device_id)
            .cloned()
            .ok_or_else(|| BackendError::Status {
                endpoint: "GET /device".into(),
                status: 404,
            })
    }

    async fn coordinator(&self) -> Result<Device, BackendError> {
        self.record("coordinator");
        self.script
            .lock()
            .unwrap()
            .coordinator
            .clone()
            .ok_or_else(|| BackendError::Status {
                endpoint: "GET /coordinator".into(),
                status: 404,
            })
    }

    async fn device_history(&self, device_id: &str) -> Result<Vec<TrustHistoryEntry>, BackendError> {
        self.record(&format!("history:{device_id}"));
        Self::wait_for(&self.history_gate).await;
        let mut script = self.script.lock().unwrap();
        if script.history_failures.remove(device_id) {
            return Err(unavailable("GET /device/{id}/history"));
        }
        Ok(script.histories.get(device_id).cloned().unwrap_or_default())
    }

    async fn create_device(&self, device: &NewDevice) -> Result<(), BackendError> {
        self.record("create");
        let mut script = self.script.lock().unwrap();
        if script.mutations_fail {
            return Err(unavailable("POST /device"));
        }
        script.created.push(device.clone());
        let mut created = self::device(&device.id, 0.5);
        created.name = device.name.clone();
        script.roster.push(created);
        Ok(())
    }

    async fn leave_device(&self, device_id: &str) -> Result<(), BackendError> {
        self.record("leave");
        let mut script = self.script.lock().unwrap();
        if script.mutations_fail {
            return Err(unavailable("POST /device/{id}/leave"));
        }
        match script.roster.iter_mut().find(|d| d.id == device_id) {
            Some(found) => {
                found.is_active = false;
                found.left_at = Some(Utc::now());
                Ok(())
            }
            None => Err(BackendError::Status {
                endpoint: "POST /device/{id}/leave".into(),
                status: 400,
            }),
        }
    }

    async fn activity_log(&self) -> Result<Vec<ActivityLogEntry>, BackendError> {
        self.record("log_activity");
        Ok(self.script.lock().unwrap().activity.clone())
    }
}
