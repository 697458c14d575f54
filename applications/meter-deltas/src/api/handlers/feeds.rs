use crate::api::models::series::FeedListResponse;
use crate::api::AppState;
use crate::error::{AppError, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

/// GET /api/v1/feeds
pub async fn list_feeds(State(state): State<AppState>) -> Json<FeedListResponse> {
    Json(FeedListResponse {
        feeds: state.feeds.keys().cloned().collect(),
    })
}

/// GET /api/v1/feeds/{name}
/// Latest snapshot of a polled feed, 204 until the first poll completes
pub async fn get_feed(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response> {
    let rx = state
        .feeds
        .get(&name)
        .ok_or_else(|| AppError::NotFound(format!("feed {}", name)))?;

    let snapshot = rx.borrow().clone();
    match snapshot {
        Some(snapshot) => Ok(Json(snapshot.as_ref().clone()).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
