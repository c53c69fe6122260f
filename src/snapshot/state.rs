use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Device;

/// Immutable view of the roster as of one successful refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    devices: Vec<Device>,
    suspicious: Vec<Device>,
    fetched_at: Option<DateTime<Utc>>,
}

impl DeviceSnapshot {
    /// The suspicious set is derived here and nowhere else, so it always
    /// matches the roster it was built from.
    pub fn new(devices: Vec<Device>, fetched_at: DateTime<Utc>) -> Self {
        let suspicious = devices
            .iter()
            .filter(|device| device.is_suspicious())
            .cloned()
            .collect();

        Self {
            devices,
            suspicious,
            fetched_at: Some(fetched_at),
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn suspicious(&self) -> &[Device] {
        &self.suspicious
    }

    pub fn suspicious_ids(&self) -> Vec<&str> {
        self.suspicious.iter().map(|device| device.id.as_str()).collect()
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.id == device_id)
    }

    /// `None` until the first refresh commits.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn security_status(&self) -> SecurityStatus {
        if self.suspicious.is_empty() {
            SecurityStatus::Safe
        } else {
            SecurityStatus::Alert(
                self.suspicious
                    .iter()
                    .map(|device| SuspiciousDevice {
                        id: device.id.clone(),
                        trust_score: device.trust_score,
                    })
                    .collect(),
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousDevice {
    pub id: String,
    pub trust_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "devices", rename_all = "camelCase")]
pub enum SecurityStatus {
    Safe,
    Alert(Vec<SuspiciousDevice>),
}

/// Everything the snapshot store owns. Replaced as a whole on every
/// transition; readers only ever see a committed value.
#[derive(Debug, Clone, Default)]
pub struct RosterState {
    pub snapshot: Arc<DeviceSnapshot>,
    pub coordinator: Option<Device>,
    pub roster_ticket: u64,
    pub coordinator_ticket: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RosterEvent {
    RosterFetched {
        ticket: u64,
        devices: Vec<Device>,
        fetched_at: DateTime<Utc>,
    },
    RosterFailed {
        ticket: u64,
        reason: String,
    },
    CoordinatorFetched {
        ticket: u64,
        coordinator: Device,
    },
    CoordinatorFailed {
        ticket: u64,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Committed,
    Failed,
    /// A newer request already settled; the event was ignored.
    Stale,
}

impl RosterState {
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }

    pub fn apply(&self, event: RosterEvent) -> (RosterState, Transition) {
        match event {
            RosterEvent::RosterFetched {
                ticket,
                devices,
                fetched_at,
            } => {
                if ticket <= self.roster_ticket {
                    return (self.clone(), Transition::Stale);
                }
                let next = RosterState {
                    snapshot: Arc::new(DeviceSnapshot::new(devices, fetched_at)),
                    roster_ticket: ticket,
                    last_error: None,
                    ..self.clone()
                };
                (next, Transition::Committed)
            }
            RosterEvent::RosterFailed { ticket, reason } => {
                if ticket <= self.roster_ticket {
                    return (self.clone(), Transition::Stale);
                }
                let next = RosterState {
                    last_error: Some(reason),
                    ..self.clone()
                };
                (next, Transition::Failed)
            }
            RosterEvent::CoordinatorFetched {
                ticket,
                coordinator,
            } => {
                if ticket <= self.coordinator_ticket {
                    return (self.clone(), Transition::Stale);
                }
                let next = RosterState {
                    coordinator: Some(coordinator),
                    coordinator_ticket: ticket,
                    ..self.clone()
                };
                (next, Transition::Committed)
            }
            RosterEvent::CoordinatorFailed { ticket, .. } => {
                if ticket <= self.coordinator_ticket {
                    (self.clone(), Transition::Stale)
                } else {
                    (self.clone(), Transition::Failed)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device(id: &str, trust_score: f64) -> Device {
        serde_json::from_value(json!({ "id": id, "trust_score": trust_score })).unwrap()
    }

    fn fetched(ticket: u64, devices: Vec<Device>) -> RosterEvent {
        RosterEvent::RosterFetched {
            ticket,
            devices,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn suspicious_set_is_the_low_trust_subsequence() {
        let snapshot = DeviceSnapshot::new(
            vec![
                device("d1", 0.25),
                device("d2", 0.9),
                device("d3", 0.0),
                device("d4", 0.3),
            ],
            Utc::now(),
        );

        assert_eq!(snapshot.suspicious_ids(), vec!["d1", "d3"]);
    }

    #[test]
    fn security_status_reports_scores_in_roster_order() {
        let snapshot = DeviceSnapshot::new(vec![device("d1", 0.25), device("d2", 0.9)], Utc::now());
        assert_eq!(
            snapshot.security_status(),
            SecurityStatus::Alert(vec![SuspiciousDevice {
                id: "d1".into(),
                trust_score: 0.25
            }])
        );

        let safe = DeviceSnapshot::new(vec![device("d2", 0.9)], Utc::now());
        assert_eq!(safe.security_status(), SecurityStatus::Safe);
    }

    #[test]
    fn fetched_roster_replaces_the_snapshot_wholesale() {
        let (state, _) = RosterState::default().apply(fetched(1, vec![device("d1", 0.5)]));
        let (state, outcome) = state.apply(fetched(2, vec![device("d2", 0.1)]));

        assert_eq!(outcome, Transition::Committed);
        assert_eq!(state.snapshot.devices().len(), 1);
        assert_eq!(state.snapshot.devices()[0].id, "d2");
        assert_eq!(state.snapshot.suspicious_ids(), vec!["d2"]);
    }

    #[test]
    fn failure_keeps_the_snapshot_and_marks_it_stale() {
        let (state, _) = RosterState::default().apply(fetched(1, vec![device("d1", 0.5)]));
        let before = state.snapshot.clone();

        let (state, outcome) = state.apply(RosterEvent::RosterFailed {
            ticket: 2,
            reason: "HTTP 500".into(),
        });

        assert_eq!(outcome, Transition::Failed);
        assert!(Arc::ptr_eq(&before, &state.snapshot));
        assert!(state.is_stale());

        let (state, _) = state.apply(fetched(3, vec![device("d1", 0.5)]));
        assert!(!state.is_stale());
    }

    #[test]
    fn late_responses_from_older_requests_are_ignored() {
        let (state, _) = RosterState::default().apply(fetched(2, vec![device("new", 0.5)]));
        let (state, outcome) = state.apply(fetched(1, vec![device("old", 0.5)]));

        assert_eq!(outcome, Transition::Stale);
        assert_eq!(state.snapshot.devices()[0].id, "new");

        let (state, outcome) = state.apply(RosterEvent::RosterFailed {
            ticket: 1,
            reason: "timeout".into(),
        });
        assert_eq!(outcome, Transition::Stale);
        assert!(!state.is_stale());
    }

    #[test]
    fn coordinator_updates_independently_of_the_roster() {
        let (state, _) = RosterState::default().apply(fetched(1, vec![device("d1", 0.5)]));
        let mut coordinator = device("rsu-1", 0.95);
        coordinator.is_coordinator = true;

        let (state, outcome) = state.apply(RosterEvent::CoordinatorFetched {
            ticket: 2,
            coordinator: coordinator.clone(),
        });
        assert_eq!(outcome, Transition::Committed);
        assert_eq!(state.coordinator.as_ref(), Some(&coordinator));
        assert_eq!(state.snapshot.devices()[0].id, "d1");

        let (state, outcome) = state.apply(RosterEvent::CoordinatorFailed {
            ticket: 3,
            reason: "404".into(),
        });
        assert_eq!(outcome, Transition::Failed);
        assert_eq!(state.coordinator.as_ref(), Some(&coordinator));
    }
}
