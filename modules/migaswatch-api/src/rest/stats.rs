use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::{Duration, Utc};
use migaswatch_store::KpiCounts;
use serde::Deserialize;

use crate::error::ApiError;
use crate::rest::user_id;
use crate::AppState;

const DEFAULT_PERIOD_DAYS: i64 = 30;

#[derive(Deserialize)]
pub struct StatsParams {
    /// Period in days; 0 means all time.
    days: Option<i64>,
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<StatsParams>,
) -> Result<Json<KpiCounts>, ApiError> {
    let user = user_id(&headers)?;
    let days = params.days.unwrap_or(DEFAULT_PERIOD_DAYS);
    if days < 0 {
        return Err(ApiError::bad_request("days must be non-negative"));
    }
    let since = (days > 0).then(|| Utc::now() - Duration::days(days));
    let counts = state.store.kpi_counts(user, since).await?;
    Ok(Json(counts))
}
