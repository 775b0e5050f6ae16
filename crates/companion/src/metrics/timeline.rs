//! Plain-language summary of a user's most recent readings.

use std::collections::HashSet;

use common::protocol::{Metric, TimelineResponse};

use super::MetricStore;

/// How many recent readings the summary looks at.
pub const TIMELINE_WINDOW: usize = 100;

const NO_READINGS: &str = "No recent health metrics recorded.";
const NO_KNOWN_TYPES: &str = "Health metrics captured recently.";

/// Summarised readings, labelled in this order.
const LABELS: [(&str, &str); 3] = [
    ("bp", "BP latest"),
    ("hr", "Heart rate latest"),
    ("glucose", "Glucose latest"),
];

/// Build the timeline of `user_id` from its last [`TIMELINE_WINDOW`] readings.
pub async fn timeline(store: &MetricStore, user_id: &str) -> TimelineResponse {
    let metrics = store.list(user_id, None, TIMELINE_WINDOW).await;
    TimelineResponse {
        summary: summarize(&metrics),
        metrics,
    }
}

/// `metrics` must be newest first; the first reading of each type wins.
fn summarize(metrics: &[Metric]) -> String {
    if metrics.is_empty() {
        return NO_READINGS.to_owned();
    }
    let mut seen = HashSet::new();
    let latest: Vec<&Metric> = metrics.iter().filter(|m| seen.insert(m.kind.as_str())).collect();

    let parts: Vec<String> = LABELS
        .iter()
        .filter_map(|(kind, label)| {
            latest
                .iter()
                .find(|m| m.kind == *kind)
                .map(|m| format!("{label}: {}", m.value))
        })
        .collect();

    if parts.is_empty() {
        NO_KNOWN_TYPES.to_owned()
    } else {
        parts.join(". ")
    }
}
