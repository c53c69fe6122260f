use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::wire;

/// One timestamped observation on a device's trust trajectory
/// (`GET /device/{id}/history`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustHistoryEntry {
    #[serde(deserialize_with = "wire::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub direct_trust: Option<f64>,
    #[serde(default)]
    pub indirect_trust: Option<f64>,
    #[serde(default)]
    pub centrality_score: Option<f64>,
    pub trust_score: f64,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub notes: String,
    #[serde(default)]
    pub connection_count: Option<u64>,
    #[serde(default)]
    pub last_connected_device_id: Option<String>,
    #[serde(default)]
    pub coordinator_id: Option<String>,
}

/// Display row for the per-device history table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub time: String,
    pub direct: String,
    pub indirect: String,
    pub centrality: String,
    pub trust: String,
    pub notes: String,
}

fn three_places(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

impl From<&TrustHistoryEntry> for HistoryRow {
    fn from(entry: &TrustHistoryEntry) -> Self {
        Self {
            time: entry.timestamp.to_rfc3339(),
            direct: three_places(entry.direct_trust),
            indirect: three_places(entry.indirect_trust),
            centrality: three_places(entry.centrality_score),
            trust: format!("{:.3}", entry.trust_score),
            notes: entry.notes.clone(),
        }
    }
}

pub fn history_rows(entries: &[TrustHistoryEntry]) -> Vec<HistoryRow> {
    entries.iter().map(HistoryRow::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rows_render_missing_components_as_dash() {
        let entry: TrustHistoryEntry = serde_json::from_value(json!({
            "timestamp": "2024-05-01T10:00:00",
            "direct_trust": 0.12345,
            "indirect_trust": null,
            "trust_score": 0.5,
            "notes": null,
            "connection_count": 3
        }))
        .unwrap();

        let rows = history_rows(&[entry]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].direct, "0.123");
        assert_eq!(rows[0].indirect, "-");
        assert_eq!(rows[0].centrality, "-");
        assert_eq!(rows[0].trust, "0.500");
        assert_eq!(rows[0].notes, "");
        assert_eq!(rows[0].time, "2024-05-01T10:00:00+00:00");
    }
}
