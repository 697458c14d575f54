//! Client for the external time-series query service.

use crate::config::QueryConfig;
use crate::error::{AppError, Result};
use crate::meter::{Reading, ResolutionTier, UpstreamRecord, Window};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Request body understood by the query service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub value_ids: Vec<i64>,
    pub value_names: Vec<String>,
    pub time_begin: String,
    pub time_end: String,
    pub time_step: String,
    pub sql_clause: String,
}

impl QueryRequest {
    pub fn new(tag_ids: &[i64], window: &Window, resolution: ResolutionTier) -> Self {
        Self {
            value_ids: tag_ids.to_vec(),
            // One (unused) name per id; the service rejects mismatched lengths
            value_names: vec![String::new(); tag_ids.len()],
            time_begin: window.time_begin(),
            time_end: window.time_end(),
            time_step: resolution.time_step().to_string(),
            sql_clause: String::new(),
        }
    }
}

/// Anything that can answer a reading query.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    async fn fetch(&self, request: &QueryRequest) -> Result<Vec<Reading>>;
}

/// HTTP client for the query service. One POST per call, no retries.
#[derive(Debug, Clone)]
pub struct QueryClient {
    http: reqwest::Client,
    url: String,
}

impl QueryClient {
    pub fn new(config: &QueryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl ReadingSource for QueryClient {
    async fn fetch(&self, request: &QueryRequest) -> Result<Vec<Reading>> {
        tracing::debug!(
            url = %self.url,
            tags = ?request.value_ids,
            time_begin = %request.time_begin,
            time_end = %request.time_end,
            time_step = %request.time_step,
            "querying time-series service"
        );

        let response = self.http.post(&self.url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let records: Vec<UpstreamRecord> = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Upstream(format!("undecodable response: {}", e)))?;

        tracing::debug!(rows = records.len(), "query returned");
        Ok(records.into_iter().map(Reading::from).collect())
    }
}

/// In-memory source that answers every query with fixed readings.
///
/// Filters by the requested tag ids and records each request so callers can
/// assert on what would have been sent upstream.
#[derive(Debug, Default, Clone)]
pub struct StaticSource {
    readings: Vec<Reading>,
    failure: Option<String>,
    pub requests: Arc<Mutex<Vec<QueryRequest>>>,
}

impl StaticSource {
    pub fn new(readings: Vec<Reading>) -> Self {
        Self {
            readings,
            ..Self::default()
        }
    }

    /// A source whose every fetch fails with an upstream error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Non-destructive copy of the requests seen so far.
    pub fn seen_requests(&self) -> Vec<QueryRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReadingSource for StaticSource {
    async fn fetch(&self, request: &QueryRequest) -> Result<Vec<Reading>> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        if let Some(message) = &self.failure {
            return Err(AppError::Upstream(message.clone()));
        }
        Ok(self
            .readings
            .iter()
            .filter(|r| request.value_ids.contains(&r.tag_id))
            .cloned()
            .collect())
    }
}
