use crate::error::{AppError, Result};
use crate::meter::window::Window;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const HOUR: i64 = 3600;
const DAY: i64 = 24 * HOUR;

/// Aggregation bucket the query service applies before returning readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResolutionTier {
    OneMinute,
    FifteenMinutes,
    OneHour,
    OneDay,
}

impl ResolutionTier {
    pub const ALL: [ResolutionTier; 4] = [
        ResolutionTier::OneMinute,
        ResolutionTier::FifteenMinutes,
        ResolutionTier::OneHour,
        ResolutionTier::OneDay,
    ];

    pub fn bucket_seconds(self) -> u32 {
        match self {
            ResolutionTier::OneMinute => 60,
            ResolutionTier::FifteenMinutes => 900,
            ResolutionTier::OneHour => 3600,
            ResolutionTier::OneDay => 86400,
        }
    }

    /// The `timeStep` value of a query request, e.g. `"900,1"`.
    pub fn time_step(self) -> &'static str {
        match self {
            ResolutionTier::OneMinute => "60,1",
            ResolutionTier::FifteenMinutes => "900,1",
            ResolutionTier::OneHour => "3600,1",
            ResolutionTier::OneDay => "86400,1",
        }
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.time_step())
    }
}

impl FromStr for ResolutionTier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        ResolutionTier::ALL
            .into_iter()
            .find(|tier| tier.time_step() == s.trim())
            .ok_or_else(|| AppError::InvalidInput(format!("unknown time step: {}", s)))
    }
}

impl TryFrom<String> for ResolutionTier {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ResolutionTier> for String {
    fn from(tier: ResolutionTier) -> Self {
        tier.time_step().to_string()
    }
}

/// Either an explicit tier or "pick one from the window length".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResolutionChoice {
    #[default]
    Auto,
    Fixed(ResolutionTier),
}

impl FromStr for ResolutionChoice {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(ResolutionChoice::Auto);
        }
        s.parse().map(ResolutionChoice::Fixed)
    }
}

impl TryFrom<String> for ResolutionChoice {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ResolutionChoice> for String {
    fn from(choice: ResolutionChoice) -> Self {
        match choice {
            ResolutionChoice::Auto => "auto".to_string(),
            ResolutionChoice::Fixed(tier) => tier.into(),
        }
    }
}

/// Pick the bucket size for a window. Bounds are inclusive, so a window of
/// exactly two hours still gets one-minute buckets.
pub fn select_resolution(window: &Window) -> ResolutionTier {
    let secs = window.duration_secs();
    if secs <= 2 * HOUR {
        ResolutionTier::OneMinute
    } else if secs <= 12 * HOUR {
        ResolutionTier::FifteenMinutes
    } else if secs <= 2 * DAY {
        ResolutionTier::OneHour
    } else {
        // Past 30 days there is nothing coarser to fall back to.
        ResolutionTier::OneDay
    }
}

pub fn resolve(choice: ResolutionChoice, window: &Window) -> ResolutionTier {
    match choice {
        ResolutionChoice::Fixed(tier) => tier,
        ResolutionChoice::Auto => select_resolution(window),
    }
}
