use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crawler_client::CrawlerClient;
use gnews_client::GnewsDecoder;
use llm_client::LlmClient;
use migaswatch_common::Config;
use migaswatch_engine::{Engine, Pacing, Scheduler};
use migaswatch_store::Store;

mod error;
mod rest;

pub struct AppState {
    pub store: Store,
    pub engine: Engine,
    pub scheduler: Arc<Scheduler>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    config.log_redacted();

    let store = Store::connect(&config.database_url).await?;
    store.migrate().await?;
    info!("database ready");

    let decoder = Arc::new(GnewsDecoder::new());
    let crawler = Arc::new(CrawlerClient::new(&config.crawler_base_url));
    let llm = Arc::new(LlmClient::new(
        &config.llm_base_url,
        &config.llm_api_key,
        &config.llm_model,
    ));

    let engine = Engine::new(store.clone(), decoder, crawler, llm, Pacing::default());
    let scheduler = Arc::new(Scheduler::new(engine.clone()));
    scheduler.clone().spawn();

    let state = Arc::new(AppState {
        store,
        engine,
        scheduler,
    });

    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/fetch", post(rest::fetch::trigger_fetch))
        .route("/api/fetch/status", get(rest::fetch::fetch_status))
        .route("/api/articles", get(rest::articles::list))
        .route("/api/articles/{id}/retry", post(rest::articles::retry_analysis))
        .route("/api/articles/decode/stream", get(rest::streams::decode_stream))
        .route("/api/articles/analyze/stream", get(rest::streams::analyze_stream))
        .route("/api/stats", get(rest::stats::stats))
        .route("/api/topics", get(rest::topics::list).post(rest::topics::create))
        .route(
            "/api/topics/{id}",
            axum::routing::put(rest::topics::update).delete(rest::topics::delete),
        )
        .route("/api/feeds", get(rest::feeds::list).post(rest::feeds::create))
        .route(
            "/api/feeds/{id}",
            axum::routing::put(rest::feeds::update).delete(rest::feeds::delete),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "migaswatch API listening");
    axum::serve(listener, app).await?;

    Ok(())
}
