use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::wire;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    Normal,
    Malicious,
    Other(String),
}

impl From<String> for ActivityType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "normal" => ActivityType::Normal,
            "malicious" => ActivityType::Malicious,
            _ => ActivityType::Other(value),
        }
    }
}

impl From<ActivityType> for String {
    fn from(value: ActivityType) -> Self {
        match value {
            ActivityType::Normal => "normal".into(),
            ActivityType::Malicious => "malicious".into(),
            ActivityType::Other(raw) => raw,
        }
    }
}

/// Read-only row of `GET /log_activity`, newest first as served.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityLogEntry {
    #[serde(deserialize_with = "wire::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub device_id: String,
    pub activity_type: ActivityType,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub description: String,
    #[serde(default)]
    pub connection_status: Option<String>,
}

impl ActivityLogEntry {
    pub fn is_malicious(&self) -> bool {
        self.activity_type == ActivityType::Malicious
    }
}
