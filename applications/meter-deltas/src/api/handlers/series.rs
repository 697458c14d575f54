use crate::api::models::series::{
    DailyEnergy, DailyEnergyResponse, DeltaQuery, DeltaQueryResponse,
};
use crate::api::AppState;
use crate::client::QueryRequest;
use crate::error::{AppError, Result};
use crate::meter::{daily_energy_window, extract_tags, resolve, ResolutionTier};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Json,
};
use std::collections::HashMap;

/// POST /api/v1/series/deltas
/// Clean, difference and summarise the requested meters over one window
pub async fn query_deltas(
    State(state): State<AppState>,
    payload: std::result::Result<Json<DeltaQuery>, JsonRejection>,
) -> Result<Json<DeltaQueryResponse>> {
    let Json(query) = payload?;
    if query.tag_ids.is_empty() {
        return Err(AppError::InvalidInput("tag_ids cannot be empty".to_string()));
    }

    let window = query.window(state.now())?;
    let resolution = resolve(query.resolution, &window);

    let request = QueryRequest::new(&query.tag_ids, &window, resolution);
    let readings = state.source.fetch(&request).await?;
    let series = extract_tags(&readings, &query.tag_ids);

    tracing::info!(
        tags = ?query.tag_ids,
        window = %window,
        resolution = %resolution,
        rows = readings.len(),
        "delta query served"
    );

    Ok(Json(DeltaQueryResponse {
        window: window.into(),
        resolution,
        series,
    }))
}

/// GET /api/v1/series/daily-energy?tags=13,15,11
/// Energy per meter for yesterday, reset-aware
pub async fn get_daily_energy(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<DailyEnergyResponse>> {
    let tags = params
        .get("tags")
        .ok_or_else(|| AppError::InvalidInput("tags parameter is required".to_string()))
        .and_then(|raw| parse_tag_list(raw))?;

    let window = daily_energy_window(state.now());
    let request = QueryRequest::new(&tags, &window, ResolutionTier::OneDay);
    let readings = state.source.fetch(&request).await?;

    let meters = extract_tags(&readings, &tags)
        .iter()
        .map(DailyEnergy::from)
        .collect();

    Ok(Json(DailyEnergyResponse {
        window: window.into(),
        meters,
    }))
}

fn parse_tag_list(raw: &str) -> Result<Vec<i64>> {
    let tags = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| AppError::InvalidInput(format!("invalid tag id: {}", s)))
        })
        .collect::<Result<Vec<_>>>()?;

    if tags.is_empty() {
        return Err(AppError::InvalidInput("tags cannot be empty".to_string()));
    }
    Ok(tags)
}
