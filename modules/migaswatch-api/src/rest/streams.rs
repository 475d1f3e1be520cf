use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use migaswatch_engine::ANALYZE_DEFAULT_LIMIT;
use serde::Deserialize;

use crate::error::ApiError;
use crate::rest::user_id;
use crate::AppState;

const KEEP_ALIVE_SECS: u64 = 15;

fn sse_from_channel<T: serde::Serialize + Send + 'static>(
    mut rx: tokio::sync::mpsc::Receiver<T>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let json = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().data(json));
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS)))
}

/// SSE stream decoding the user's pending aggregator URLs. Disconnecting
/// aborts the run at the next article boundary.
pub async fn decode_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let user = user_id(&headers)?;
    let rx = state.engine.spawn_decode_stream(user);
    Ok(sse_from_channel(rx))
}

#[derive(Deserialize)]
pub struct AnalyzeParams {
    limit: Option<i64>,
}

/// SSE stream crawling and analyzing pending articles. Refused with 409 when
/// an analyzer stream is already running for this user.
pub async fn analyze_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<AnalyzeParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let user = user_id(&headers)?;
    let limit = params.limit.unwrap_or(ANALYZE_DEFAULT_LIMIT);
    let rx = state.engine.try_spawn_analyze_stream(user, limit).await?;
    Ok(sse_from_channel(rx))
}
