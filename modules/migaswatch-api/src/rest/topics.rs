use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Json;
use migaswatch_store::Topic;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::rest::user_id;
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateTopic {
    name: String,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Deserialize)]
pub struct UpdateTopic {
    name: Option<String>,
    keywords: Option<Vec<String>>,
    enabled: Option<bool>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Topic>>, ApiError> {
    let user = user_id(&headers)?;
    Ok(Json(state.store.list_topics(user).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateTopic>,
) -> Result<Json<Topic>, ApiError> {
    let user = user_id(&headers)?;
    let topic = state.store.create_topic(user, &body.name, &body.keywords).await?;
    Ok(Json(topic))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(topic_id): Path<Uuid>,
    Json(body): Json<UpdateTopic>,
) -> Result<Json<Topic>, ApiError> {
    let user = user_id(&headers)?;
    let topic = state
        .store
        .update_topic(
            user,
            topic_id,
            body.name.as_deref(),
            body.keywords.as_deref(),
            body.enabled,
        )
        .await?;
    Ok(Json(topic))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(topic_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = user_id(&headers)?;
    state.store.delete_topic(user, topic_id).await?;
    Ok(Json(serde_json::json!({ "deleted": topic_id })))
}
