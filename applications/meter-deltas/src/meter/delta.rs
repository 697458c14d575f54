use crate::meter::reading::Reading;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A reading that survived cleaning: timestamped and finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanReading {
    pub tag_id: i64,
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Consumption between two adjacent readings, stamped at the later one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaPoint {
    pub timestamp: NaiveDateTime,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub initial_value: f64,
    pub final_value: f64,
    /// `final_value - initial_value`. Wrong if the counter reset inside the window.
    pub naive_total: f64,
    /// Sum of the positive steps. Never negative.
    pub reset_aware_total: f64,
    pub point_count: usize,
}

/// Everything derived for one meter over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDerivation {
    pub tag_id: i64,
    pub cleaned: Vec<CleanReading>,
    pub deltas: Vec<DeltaPoint>,
    /// `None` when fewer than two readings survived cleaning.
    pub summary: Option<SeriesSummary>,
}

impl SeriesDerivation {
    pub fn empty(tag_id: i64) -> Self {
        Self {
            tag_id,
            cleaned: Vec::new(),
            deltas: Vec::new(),
            summary: None,
        }
    }

    fn derive(tag_id: i64, readings: &[Reading]) -> Self {
        let cleaned = clean(readings);
        let deltas = differentiate(&cleaned);
        let summary = summarize(&cleaned, &deltas);
        Self {
            tag_id,
            cleaned,
            deltas,
            summary,
        }
    }

    /// Energy used in the window. Always the reset-aware figure.
    pub fn energy_total(&self) -> Option<f64> {
        self.summary.as_ref().map(|s| s.reset_aware_total)
    }
}

/// Drop samples without a timestamp or a finite value and sort the rest
/// chronologically. Upstream order is not trusted.
///
/// Equal timestamps are ordered by tag and then value so the result does
/// not depend on input order.
pub fn clean(readings: &[Reading]) -> Vec<CleanReading> {
    let mut cleaned: Vec<CleanReading> = readings
        .iter()
        .filter_map(|r| match (r.timestamp, r.value) {
            (Some(timestamp), Some(value)) if value.is_finite() => Some(CleanReading {
                tag_id: r.tag_id,
                timestamp,
                value,
            }),
            _ => None,
        })
        .collect();

    cleaned.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.tag_id.cmp(&b.tag_id))
            .then(a.value.total_cmp(&b.value))
    });
    cleaned
}

/// Positive steps between chronologically adjacent readings of the same tag.
///
/// A decrease means the counter was reset, rolled over or replaced. It is
/// skipped, not subtracted.
pub fn differentiate(cleaned: &[CleanReading]) -> Vec<DeltaPoint> {
    let mut previous: BTreeMap<i64, f64> = BTreeMap::new();
    let mut deltas = Vec::new();

    for reading in cleaned {
        if let Some(prev) = previous.insert(reading.tag_id, reading.value) {
            let delta = reading.value - prev;
            if delta > 0.0 {
                deltas.push(DeltaPoint {
                    timestamp: reading.timestamp,
                    delta,
                });
            }
        }
    }

    deltas
}

pub fn summarize(cleaned: &[CleanReading], deltas: &[DeltaPoint]) -> Option<SeriesSummary> {
    if cleaned.len() < 2 {
        return None;
    }
    let first = cleaned.first()?;
    let last = cleaned.last()?;

    Some(SeriesSummary {
        initial_value: first.value,
        final_value: last.value,
        naive_total: last.value - first.value,
        reset_aware_total: deltas.iter().map(|d| d.delta).sum(),
        point_count: cleaned.len(),
    })
}

/// Partition readings by tag and derive each series independently.
pub fn extract(readings: &[Reading]) -> BTreeMap<i64, SeriesDerivation> {
    let mut by_tag: BTreeMap<i64, Vec<Reading>> = BTreeMap::new();
    for reading in readings {
        by_tag.entry(reading.tag_id).or_default().push(reading.clone());
    }

    by_tag
        .into_iter()
        .map(|(tag_id, rows)| (tag_id, SeriesDerivation::derive(tag_id, &rows)))
        .collect()
}

/// Like [`extract`], but returns one derivation per requested tag, in the
/// requested order. Tags that received no readings get an empty derivation;
/// readings for tags that were not requested are ignored.
pub fn extract_tags(readings: &[Reading], tags: &[i64]) -> Vec<SeriesDerivation> {
    let mut derived = extract(readings);
    tags.iter()
        .map(|tag| {
            derived
                .remove(tag)
                .unwrap_or_else(|| SeriesDerivation::empty(*tag))
        })
        .collect()
}
