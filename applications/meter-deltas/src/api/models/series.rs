use crate::error::{AppError, Result};
use crate::meter::{RangePreset, ResolutionChoice, ResolutionTier, SeriesDerivation, Window};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/series/deltas`.
///
/// Either `range` or both `start` and `end` must be given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaQuery {
    pub tag_ids: Vec<i64>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub range: Option<RangePreset>,
    #[serde(default)]
    pub resolution: ResolutionChoice,
}

impl DeltaQuery {
    pub fn window(&self, now: NaiveDateTime) -> Result<Window> {
        match (&self.range, &self.start, &self.end) {
            (Some(preset), _, _) => Ok(preset.window(now)),
            (None, Some(start), Some(end)) => Window::custom(start, end),
            _ => Err(AppError::InvalidInput(
                "either range or both start and end are required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResponse {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub time_begin: String,
    pub time_end: String,
}

impl From<Window> for WindowResponse {
    fn from(window: Window) -> Self {
        Self {
            start: window.start(),
            end: window.end(),
            time_begin: window.time_begin(),
            time_end: window.time_end(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeltaQueryResponse {
    pub window: WindowResponse,
    pub resolution: ResolutionTier,
    pub series: Vec<SeriesDerivation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DailyEnergyResponse {
    pub window: WindowResponse,
    pub meters: Vec<DailyEnergy>,
}

/// Yesterday's energy for one meter. Totals are `None` with fewer than two samples.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyEnergy {
    pub tag_id: i64,
    pub energy_kwh: Option<f64>,
    pub naive_total_kwh: Option<f64>,
    pub point_count: usize,
}

impl From<&SeriesDerivation> for DailyEnergy {
    fn from(series: &SeriesDerivation) -> Self {
        Self {
            tag_id: series.tag_id,
            energy_kwh: series.energy_total(),
            naive_total_kwh: series.summary.as_ref().map(|s| s.naive_total),
            point_count: series.cleaned.len(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedListResponse {
    pub feeds: Vec<String>,
}
