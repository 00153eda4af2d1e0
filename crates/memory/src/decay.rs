//! Recency weighting for visit history.
//!
//! `weight = decay_rate ^ age_in_days`, with age measured against the
//! current clock and clamped at zero for timestamps in the future.

use siteshift_core::history::{History, WeightedVisit};
use std::collections::BTreeMap;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Intents that say nothing about variant affinity.
const SENTINEL_INTENTS: [&str; 2] = ["unknown", "default"];

/// Weight of a visit at `timestamp_ms` as seen from `now_ms`.
pub fn weight_at(timestamp_ms: i64, decay_rate: f64, now_ms: i64) -> f64 {
    let age_days = (now_ms.saturating_sub(timestamp_ms) as f64 / MS_PER_DAY).max(0.0);
    decay_rate.powf(age_days)
}

/// Weight of a visit at `timestamp_ms` as seen from now.
pub fn weight(timestamp_ms: i64, decay_rate: f64) -> f64 {
    weight_at(timestamp_ms, decay_rate, crate::now_ms())
}

/// All visits weighted and sorted heaviest first, truncated to `max_results`.
pub fn weighted_view(history: &History, decay_rate: f64, max_results: usize) -> Vec<WeightedVisit> {
    weighted_view_at(history, decay_rate, max_results, crate::now_ms())
}

pub fn weighted_view_at(
    history: &History,
    decay_rate: f64,
    max_results: usize,
    now_ms: i64,
) -> Vec<WeightedVisit> {
    // Newest first, so the stable sort keeps recency order among equal weights.
    let mut weighted: Vec<WeightedVisit> = history
        .visits
        .iter()
        .rev()
        .map(|visit| WeightedVisit {
            weight: weight_at(visit.timestamp, decay_rate, now_ms),
            visit: visit.clone(),
        })
        .collect();

    weighted.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
    weighted.truncate(max_results);
    weighted
}

/// Sum of weights per intent, excluding `unknown` and `default`.
pub fn aggregate_preferences(weighted: &[WeightedVisit]) -> BTreeMap<String, f64> {
    let mut preferences = BTreeMap::new();
    for entry in weighted {
        let intent = entry.visit.intent.as_str();
        if intent.is_empty() || SENTINEL_INTENTS.contains(&intent) {
            continue;
        }
        *preferences.entry(intent.to_string()).or_insert(0.0) += entry.weight;
    }
    preferences
}
