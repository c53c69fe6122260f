pub mod activity;
pub mod device;
pub mod history;
pub mod wire;

pub use activity::{ActivityLogEntry, ActivityType};
pub use device::{Device, DeviceStanding, NewDevice, SUSPICIOUS_TRUST_THRESHOLD};
pub use history::{history_rows, HistoryRow, TrustHistoryEntry};
