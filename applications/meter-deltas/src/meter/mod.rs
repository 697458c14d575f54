//! Cumulative meter engine: resolution selection, cleaning and
//! reset-aware differencing. Pure functions only, no I/O.

pub mod delta;
pub mod reading;
pub mod resolution;
pub mod window;

pub use delta::{
    clean, differentiate, extract, extract_tags, summarize, CleanReading, DeltaPoint,
    SeriesDerivation, SeriesSummary,
};
pub use reading::{Reading, UpstreamRecord};
pub use resolution::{resolve, select_resolution, ResolutionChoice, ResolutionTier};
pub use window::{daily_energy_window, format_query_timestamp, RangePreset, Window};
