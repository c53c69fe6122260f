use serde::Serialize;

use crate::history::HistorySnapshot;

use super::palette::Palette;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub name: String,
    pub color: String,
    pub points: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    /// `1..=n` where `n` is the longest series.
    pub labels: Vec<usize>,
    pub series: Vec<ChartSeries>,
}

/// One series per selected id, in selection order. Ids without loaded
/// history yield an empty series rather than an error.
pub fn build(selected: &[String], histories: &HistorySnapshot, palette: &Palette) -> Vec<ChartSeries> {
    selected
        .iter()
        .enumerate()
        .map(|(position, device_id)| ChartSeries {
            name: device_id.clone(),
            color: palette.color_at(position).to_string(),
            points: histories
                .get(device_id)
                .map(|history| history.iter().map(|entry| entry.trust_score).collect())
                .unwrap_or_default(),
        })
        .collect()
}

pub fn chart_data(selected: &[String], histories: &HistorySnapshot, palette: &Palette) -> ChartData {
    let series = build(selected, histories, palette);
    let longest = series.iter().map(|s| s.points.len()).max().unwrap_or(0);

    ChartData {
        labels: (1..=longest).collect(),
        series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrustHistoryEntry;
    use chrono::{TimeZone, Utc};

    fn entries(scores: &[f64]) -> Vec<TrustHistoryEntry> {
        scores
            .iter()
            .enumerate()
            .map(|(i, score)| TrustHistoryEntry {
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, i as u32, 0).unwrap(),
                direct_trust: None,
                indirect_trust: None,
                centrality_score: None,
                trust_score: *score,
                notes: String::new(),
                connection_count: None,
                last_connected_device_id: None,
                coordinator_id: None,
            })
            .collect()
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn points_follow_the_cached_history() {
        let cache: HistorySnapshot = [("d1".to_string(), entries(&[0.5, 0.4]))].into_iter().collect();
        let series = build(&ids(&["d1"]), &cache, &Palette::default());

        assert_eq!(
            series,
            vec![ChartSeries {
                name: "d1".into(),
                color: "#2563eb".into(),
                points: vec![0.5, 0.4],
            }]
        );
    }

    #[test]
    fn unloaded_ids_degrade_to_empty_series() {
        let cache: HistorySnapshot = [("d2".to_string(), entries(&[0.9]))].into_iter().collect();
        let series = build(&ids(&["d1", "d2"]), &cache, &Palette::default());

        assert!(series[0].points.is_empty());
        assert_eq!(series[1].points, vec![0.9]);
        assert_eq!(series[1].color, "#16a34a");
    }

    #[test]
    fn colours_wrap_around_the_palette() {
        let palette = Palette::new(vec!["red".into(), "blue".into()]).unwrap();
        let series = build(&ids(&["a", "b", "c"]), &HistorySnapshot::default(), &palette);

        let colors: Vec<&str> = series.iter().map(|s| s.color.as_str()).collect();
        assert_eq!(colors, vec!["red", "blue", "red"]);
    }

    #[test]
    fn identical_inputs_build_identical_output() {
        let cache: HistorySnapshot = [
            ("d1".to_string(), entries(&[0.5, 0.4])),
            ("d2".to_string(), entries(&[0.1, 0.2, 0.3])),
        ]
        .into_iter()
        .collect();
        let selected = ids(&["d2", "d1", "d3"]);

        let first = chart_data(&selected, &cache, &Palette::default());
        let second = chart_data(&selected, &cache, &Palette::default());
        assert_eq!(first, second);
        assert_eq!(first.labels, vec![1, 2, 3]);
    }

    #[test]
    fn no_selection_means_no_labels() {
        let data = chart_data(&[], &HistorySnapshot::default(), &Palette::default());
        assert!(data.series.is_empty());
        assert!(data.labels.is_empty());
    }
}
