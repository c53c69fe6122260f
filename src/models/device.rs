use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::wire;

/// Trust score below which a device is treated as suspicious.
pub const SUSPICIOUS_TRUST_THRESHOLD: f64 = 0.3;

/// A member of the trust network as reported by `GET /devices`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub id: String,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub device_type: String,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub ownership_type: String,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub memory_gb: f64,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub location: String,
    pub trust_score: f64,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub is_blacklisted: bool,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub is_flagged: bool,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub is_coordinator: bool,
    #[serde(default = "default_active", deserialize_with = "active_or_default")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "wire::optional_timestamp")]
    pub left_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "wire::optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "wire::optional_timestamp")]
    pub blacklisted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub computing_power: Option<f64>,
    #[serde(default)]
    pub connection_count: Option<u64>,
}

fn default_active() -> bool {
    true
}

fn active_or_default<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

/// How the roster presents a device. Suspicion outranks a manual flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DeviceStanding {
    Suspicious,
    Flagged,
    Normal,
}

impl Device {
    pub fn is_suspicious(&self) -> bool {
        self.trust_score < SUSPICIOUS_TRUST_THRESHOLD
    }

    pub fn standing(&self) -> DeviceStanding {
        if self.is_suspicious() {
            DeviceStanding::Suspicious
        } else if self.is_flagged {
            DeviceStanding::Flagged
        } else {
            DeviceStanding::Normal
        }
    }

    /// Only active, non-blacklisted devices may be asked to leave.
    pub fn can_leave(&self) -> bool {
        self.is_active && !self.is_blacklisted
    }
}

/// Body of `POST /device`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewDevice {
    pub id: String,
    pub name: String,
    pub device_type: String,
    pub ownership_type: String,
    pub memory_gb: f64,
    pub location: String,
}
