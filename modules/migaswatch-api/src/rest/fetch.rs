use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use migaswatch_engine::FetchOutcome;
use serde::Serialize;

use crate::error::ApiError;
use crate::rest::user_id;
use crate::AppState;

#[derive(Serialize)]
pub struct FetchResponse {
    message: String,
    inserted: usize,
    skipped: usize,
    warnings: Vec<String>,
}

/// Manual trigger. Shares the scheduler's pipeline and latch; skips the
/// minimum-gap guard.
pub async fn trigger_fetch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<FetchResponse>, ApiError> {
    let user = user_id(&headers)?;

    match state.scheduler.perform_fetch(user, true).await? {
        FetchOutcome::Completed(report) => Ok(Json(FetchResponse {
            message: "fetch pipeline completed".to_string(),
            inserted: report.inserted,
            skipped: report.skipped,
            warnings: report.errors,
        })),
        FetchOutcome::SkippedRecentFetch => {
            Err(ApiError::conflict("fetched too recently, try again later"))
        }
    }
}

pub async fn fetch_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<migaswatch_engine::UserFetchState>, ApiError> {
    let user = user_id(&headers)?;
    Ok(Json(state.scheduler.status(user).await))
}
