use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use migaswatch_store::Article;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::rest::user_id;
use crate::AppState;

const DEFAULT_PAGE: i64 = 20;
const MAX_PAGE: i64 = 100;

#[derive(Deserialize)]
pub struct ListParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let user = user_id(&headers)?;
    let limit = params.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
    let offset = params.offset.unwrap_or(0).max(0);
    Ok(Json(state.store.list_articles(user, limit, offset).await?))
}

/// Reset a failed analysis so the next analyzer run retries the article.
/// Only articles with a non-null `ai_error` qualify.
pub async fn retry_analysis(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(article_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = user_id(&headers)?;
    state.store.reset_failed_analysis(user, article_id).await?;
    Ok(Json(serde_json::json!({ "queued": article_id })))
}
