pub mod handlers;
pub mod models;
mod routes;

pub use routes::create_router;

use crate::client::ReadingSource;
use crate::poller::{local_now, SnapshotReceiver};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn ReadingSource>,
    pub feeds: Arc<BTreeMap<String, SnapshotReceiver>>,
    clock: fn() -> NaiveDateTime,
}

impl AppState {
    pub fn new(source: Arc<dyn ReadingSource>, feeds: BTreeMap<String, SnapshotReceiver>) -> Self {
        Self {
            source,
            feeds: Arc::new(feeds),
            clock: local_now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }
}
