use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Json;
use migaswatch_store::Feed;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::rest::user_id;
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateFeed {
    name: String,
    url: String,
}

#[derive(Deserialize)]
pub struct UpdateFeed {
    name: Option<String>,
    url: Option<String>,
    enabled: Option<bool>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Feed>>, ApiError> {
    let user = user_id(&headers)?;
    Ok(Json(state.store.list_feeds(user).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateFeed>,
) -> Result<Json<Feed>, ApiError> {
    let user = user_id(&headers)?;
    let feed = state.store.create_feed(user, &body.name, &body.url).await?;
    Ok(Json(feed))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(feed_id): Path<Uuid>,
    Json(body): Json<UpdateFeed>,
) -> Result<Json<Feed>, ApiError> {
    let user = user_id(&headers)?;
    let feed = state
        .store
        .update_feed(user, feed_id, body.name.as_deref(), body.url.as_deref(), body.enabled)
        .await?;
    Ok(Json(feed))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(feed_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = user_id(&headers)?;
    state.store.delete_feed(user, feed_id).await?;
    Ok(Json(serde_json::json!({ "deleted": feed_id })))
}
