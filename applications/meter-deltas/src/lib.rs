pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod meter;
pub mod poller;

// Re-export commonly used items
pub use config::Config;
pub use error::{AppError, Result};
pub use meter::{extract, SeriesDerivation, Window};
