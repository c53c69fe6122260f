pub mod state;
pub mod store;

pub use state::{DeviceSnapshot, RosterEvent, RosterState, SecurityStatus, SuspiciousDevice, Transition};
pub use store::{DeviceSnapshotStore, MutationOutcome};
