use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use migaswatch_common::{FetchStatus, IngestReport, MigaswatchError};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::events::DecodeEvent;
use crate::Engine;

/// Automatic runs are skipped when the previous fetch is this recent.
pub const MIN_GAP_MINUTES: i64 = 55;
/// Cadence of the automatic tick.
pub const FETCH_INTERVAL_SECS: u64 = 3600;
/// Grace period before the catch-up run at startup.
const STARTUP_DELAY_SECS: u64 = 2;

/// Scheduler state surfaced per user.
#[derive(Debug, Clone, Serialize)]
pub struct UserFetchState {
    pub status: FetchStatus,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub next_fetch_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Default for UserFetchState {
    fn default() -> Self {
        Self {
            status: FetchStatus::Idle,
            last_fetch_at: None,
            next_fetch_at: None,
            last_error: None,
        }
    }
}

/// Result of one `perform_fetch` call.
#[derive(Debug)]
pub enum FetchOutcome {
    Completed(IngestReport),
    /// The minimum-gap guard declined the run.
    SkippedRecentFetch,
}

fn gap_elapsed(last_fetch_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_fetch_at {
        Some(last) => now - last >= Duration::minutes(MIN_GAP_MINUTES),
        None => true,
    }
}

/// Single writer for the fetch → decode → analyze pipeline. Automatic and
/// manual triggers share the one entry point; a per-user latch guarantees at
/// most one pipeline per user at a time.
#[derive(Clone)]
pub struct Scheduler {
    engine: Engine,
    latches: Arc<Mutex<HashSet<Uuid>>>,
    states: Arc<Mutex<HashMap<Uuid, UserFetchState>>>,
}

impl Scheduler {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            latches: Arc::new(Mutex::new(HashSet::new())),
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Current scheduler state for one user. Falls back to the persisted
    /// `last_fetch_at` when no pipeline has run in this process yet.
    pub async fn status(&self, user_id: Uuid) -> UserFetchState {
        if let Some(state) = self.states.lock().await.get(&user_id) {
            return state.clone();
        }
        let last_fetch_at = self.engine.store().last_fetch_at(user_id).await.ok().flatten();
        UserFetchState {
            next_fetch_at: last_fetch_at.map(|t| t + Duration::seconds(FETCH_INTERVAL_SECS as i64)),
            last_fetch_at,
            ..Default::default()
        }
    }

    /// The one pipeline entry point. `skip_gap_check` is set by manual
    /// triggers; automatic runs honor the minimum gap.
    pub async fn perform_fetch(
        &self,
        user_id: Uuid,
        skip_gap_check: bool,
    ) -> Result<FetchOutcome, MigaswatchError> {
        {
            let mut latches = self.latches.lock().await;
            if !latches.insert(user_id) {
                return Err(MigaswatchError::FetchInProgress);
            }
        }

        let result = self.run_pipeline(user_id, skip_gap_check).await;

        self.latches.lock().await.remove(&user_id);
        result
    }

    async fn run_pipeline(
        &self,
        user_id: Uuid,
        skip_gap_check: bool,
    ) -> Result<FetchOutcome, MigaswatchError> {
        let now = Utc::now();
        let previous = self
            .engine
            .store()
            .last_fetch_at(user_id)
            .await
            .map_err(|e| MigaswatchError::Database(e.to_string()))?;

        if !skip_gap_check && !gap_elapsed(previous, now) {
            debug!(user_id = %user_id, "fetch skipped, minimum gap not met");
            return Ok(FetchOutcome::SkippedRecentFetch);
        }

        // Phase 1: fetch, each source wrapped in its own error envelope.
        self.set_state(user_id, FetchStatus::Fetching, previous, None).await;

        let aggregator = self.engine.ingest_aggregator(user_id).await;
        let rss = self.engine.ingest_rss(user_id).await;
        let both_failed = !aggregator.is_success() && !rss.is_success();

        let mut report = IngestReport::default();
        report.absorb(aggregator);
        report.absorb(rss);
        for message in &report.errors {
            warn!(user_id = %user_id, message = %message, "fetch warning");
        }

        if both_failed {
            let summary = report.errors.join("; ");
            self.set_state(user_id, FetchStatus::Error, previous, Some(summary)).await;
            return Ok(FetchOutcome::Completed(report));
        }

        if let Err(e) = self.engine.store().set_last_fetch_at(user_id, now).await {
            report.errors.push(format!("persist last_fetch_at: {e}"));
        }

        // Phase 2: decode to completion.
        self.set_state(user_id, FetchStatus::Decoding, Some(now), None).await;
        let mut decode_rx = self.engine.spawn_decode_stream(user_id);
        while let Some(event) = decode_rx.recv().await {
            if let DecodeEvent::Error { message } = event {
                warn!(user_id = %user_id, message = %message, "decode phase error");
            }
        }

        // Phase 3: analyze whatever is pending, unless a stream is already
        // live for this user.
        if !self.engine.is_analyzing(user_id).await {
            match self.engine.store().pending_analysis_count(user_id).await {
                Ok(0) => {}
                Ok(pending) => {
                    self.set_state(user_id, FetchStatus::Analyzing, Some(now), None).await;
                    match self.engine.try_spawn_analyze_stream(user_id, pending).await {
                        Ok(mut analyze_rx) => while analyze_rx.recv().await.is_some() {},
                        Err(MigaswatchError::AnalysisInProgress) => {
                            debug!(user_id = %user_id, "analyzer already running, skipping phase");
                        }
                        Err(e) => report.errors.push(format!("analyze phase: {e}")),
                    }
                }
                Err(e) => report.errors.push(format!("pending count: {e}")),
            }
        }

        self.set_state(user_id, FetchStatus::Success, Some(now), None).await;
        info!(user_id = %user_id, inserted = report.inserted, skipped = report.skipped,
              "fetch pipeline complete");
        Ok(FetchOutcome::Completed(report))
    }

    async fn set_state(
        &self,
        user_id: Uuid,
        status: FetchStatus,
        last_fetch_at: Option<DateTime<Utc>>,
        last_error: Option<String>,
    ) {
        let mut states = self.states.lock().await;
        states.insert(
            user_id,
            UserFetchState {
                status,
                last_fetch_at,
                next_fetch_at: last_fetch_at
                    .map(|t| t + Duration::seconds(FETCH_INTERVAL_SECS as i64)),
                last_error,
            },
        );
    }

    /// Run the hourly loop: a delayed catch-up pass at startup, then one
    /// pass per interval over every active user.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(STARTUP_DELAY_SECS)).await;
            loop {
                self.tick().await;
                tokio::time::sleep(std::time::Duration::from_secs(FETCH_INTERVAL_SECS)).await;
            }
        })
    }

    async fn tick(&self) {
        let users = match self.engine.store().active_user_ids().await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "could not enumerate active users");
                return;
            }
        };

        for user_id in users {
            match self.perform_fetch(user_id, false).await {
                Ok(FetchOutcome::Completed(report)) => {
                    info!(user_id = %user_id, inserted = report.inserted,
                          skipped = report.skipped, "scheduled fetch done");
                }
                Ok(FetchOutcome::SkippedRecentFetch) => {
                    debug!(user_id = %user_id, "scheduled fetch skipped");
                }
                Err(MigaswatchError::FetchInProgress) => {
                    debug!(user_id = %user_id, "fetch already running");
                }
                Err(e) => error!(user_id = %user_id, error = %e, "scheduled fetch failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_guard_allows_first_run_and_hourly_cadence() {
        let now = Utc::now();
        assert!(gap_elapsed(None, now));
        assert!(gap_elapsed(Some(now - Duration::minutes(MIN_GAP_MINUTES)), now));
        assert!(gap_elapsed(Some(now - Duration::hours(2)), now));
        assert!(!gap_elapsed(Some(now - Duration::minutes(MIN_GAP_MINUTES - 1)), now));
        assert!(!gap_elapsed(Some(now), now));
    }
}
