//! Feed pollers
//!
//! Each configured feed gets its own task that re-queries its range on a
//! fixed interval and publishes an immutable snapshot on a watch channel.
//! Consumers only ever read snapshots; nothing derived is mutated in place.

use crate::client::{QueryRequest, ReadingSource};
use crate::config::FeedConfig;
use crate::meter::{extract_tags, resolve, ResolutionTier, SeriesDerivation, Window};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Latest snapshot of a feed; `None` until the first cycle finishes.
pub type SnapshotReceiver = watch::Receiver<Option<Arc<FeedSnapshot>>>;

#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub feed: String,
    pub window: Window,
    pub resolution: ResolutionTier,
    pub fetched_at: NaiveDateTime,
    #[serde(flatten)]
    pub outcome: SnapshotOutcome,
}

/// A failed fetch is reported as such, never as an empty series.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SnapshotOutcome {
    Series { series: Vec<SeriesDerivation> },
    Failed { message: String },
}

pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub struct FeedPoller {
    feed: FeedConfig,
    source: Arc<dyn ReadingSource>,
    clock: fn() -> NaiveDateTime,
}

impl FeedPoller {
    pub fn new(feed: FeedConfig, source: Arc<dyn ReadingSource>) -> Self {
        Self {
            feed,
            source,
            clock: local_now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Start polling on a background task.
    ///
    /// Any change on `shutdown` (or dropping its sender) stops the task;
    /// a fetch still in flight at that point is dropped unapplied.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> (SnapshotReceiver, JoinHandle<()>) {
        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(self.run(tx, shutdown));
        (rx, handle)
    }

    pub async fn run(
        self,
        tx: watch::Sender<Option<Arc<FeedSnapshot>>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!(
            feed = %self.feed.name,
            range = %self.feed.range,
            interval_ms = self.feed.interval_ms,
            "Feed poller started"
        );

        let mut ticker = interval(Duration::from_millis(self.feed.interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                // Only ever flips to true; a dropped sender means stop too
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            let snapshot = tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    tracing::debug!(feed = %self.feed.name, "dropping in-flight poll");
                    break;
                }
                snapshot = self.poll_once() => snapshot,
            };

            if tx.send(Some(Arc::new(snapshot))).is_err() {
                tracing::debug!(feed = %self.feed.name, "no snapshot receivers left");
                break;
            }
        }

        tracing::info!(feed = %self.feed.name, "Feed poller stopped");
    }

    /// One fetch-and-derive cycle against the current clock.
    pub async fn poll_once(&self) -> FeedSnapshot {
        let now = (self.clock)();
        let window = self.feed.range.window(now);
        let resolution = resolve(self.feed.resolution, &window);
        let request = QueryRequest::new(&self.feed.tag_ids, &window, resolution);

        let outcome = match self.source.fetch(&request).await {
            Ok(readings) => {
                let series = extract_tags(&readings, &self.feed.tag_ids);
                tracing::debug!(
                    feed = %self.feed.name,
                    rows = readings.len(),
                    resolution = %resolution,
                    "feed refreshed"
                );
                SnapshotOutcome::Series { series }
            }
            Err(e) => {
                tracing::warn!(feed = %self.feed.name, error = %e, "feed refresh failed");
                SnapshotOutcome::Failed {
                    message: e.to_string(),
                }
            }
        };

        FeedSnapshot {
            feed: self.feed.name.clone(),
            window,
            resolution,
            fetched_at: now,
            outcome,
        }
    }
}

/// Spawn one poller per feed and collect their snapshot receivers by name.
pub fn spawn_feeds(
    feeds: &[FeedConfig],
    source: Arc<dyn ReadingSource>,
    shutdown: &watch::Receiver<bool>,
) -> (BTreeMap<String, SnapshotReceiver>, Vec<JoinHandle<()>>) {
    let mut receivers = BTreeMap::new();
    let mut handles = Vec::with_capacity(feeds.len());

    for feed in feeds {
        let (rx, handle) = FeedPoller::new(feed.clone(), source.clone()).spawn(shutdown.clone());
        receivers.insert(feed.name.clone(), rx);
        handles.push(handle);
    }

    (receivers, handles)
}
