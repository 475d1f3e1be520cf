use migaswatch_common::MigaswatchError;
use migaswatch_store::AnalysisRecord;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::events::AnalyzeEvent;
use crate::Engine;

pub const ANALYZE_DEFAULT_LIMIT: i64 = 50;
pub const ANALYZE_MAX_LIMIT: i64 = 100;

impl Engine {
    /// Start an analyzer run for the user's eligible articles. At most one
    /// analyzer stream runs per user; a second request is refused. Dropping
    /// the receiver cancels the run at the next article boundary.
    pub async fn try_spawn_analyze_stream(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<mpsc::Receiver<AnalyzeEvent>, MigaswatchError> {
        {
            let mut running = self.analyzing.lock().await;
            if !running.insert(user_id) {
                return Err(MigaswatchError::AnalysisInProgress);
            }
        }

        let limit = limit.clamp(1, ANALYZE_MAX_LIMIT);
        let (tx, rx) = mpsc::channel(32);
        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_analyze(user_id, limit, tx).await;
            engine.analyzing.lock().await.remove(&user_id);
        });
        Ok(rx)
    }

    /// Whether an analyzer stream is currently live for the user.
    pub async fn is_analyzing(&self, user_id: Uuid) -> bool {
        self.analyzing.lock().await.contains(&user_id)
    }

    async fn run_analyze(&self, user_id: Uuid, limit: i64, tx: mpsc::Sender<AnalyzeEvent>) {
        let articles = match self.store.pending_analysis(user_id, limit).await {
            Ok(a) => a,
            Err(e) => {
                let _ = tx.send(AnalyzeEvent::Error { message: e.to_string() }).await;
                return;
            }
        };

        let total = articles.len();
        let mut analyzed = 0usize;
        let mut failed = 0usize;

        for (index, article) in articles.iter().enumerate() {
            if tx.is_closed() {
                info!(user_id = %user_id, "analyze stream cancelled");
                return;
            }

            let crawl_url = article.crawl_url();

            let content = match self.crawler.markdown(crawl_url).await {
                Ok(content) => Some(content),
                Err(e) => {
                    // Crawl failures leave ai_processed=false: a transient
                    // crawler outage must not burn through articles.
                    warn!(article = %article.id, url = crawl_url, error = %e, "crawl failed");
                    let message = format!("crawl failed: {e}");
                    if let Err(e) = self.store.set_crawl_error(article.id, &message).await {
                        warn!(article = %article.id, error = %e, "crawl error mark failed");
                    }
                    failed += 1;
                    let _ = tx.send(AnalyzeEvent::Progress { analyzed, failed, total }).await;
                    self.pause_between_articles(index, total).await;
                    continue;
                }
            };

            match self
                .analyze_article(&article.title, article.snippet.as_deref(), content.as_deref())
                .await
            {
                Ok(analysis) => {
                    let record = AnalysisRecord {
                        full_content: content,
                        summary: analysis.summary,
                        sentiment: analysis.sentiment.as_str().to_string(),
                        categories: analysis.categories,
                        reason: analysis.reason,
                    };
                    match self.store.save_analysis(article.id, &record).await {
                        Ok(()) => analyzed += 1,
                        Err(e) => {
                            warn!(article = %article.id, error = %e, "analysis persist failed");
                            failed += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(article = %article.id, error = %e, "analysis failed");
                    if let Err(e) = self
                        .store
                        .mark_analysis_failed(article.id, &e.to_string(), content.as_deref())
                        .await
                    {
                        warn!(article = %article.id, error = %e, "failure mark did not persist");
                    }
                    failed += 1;
                }
            }

            let _ = tx.send(AnalyzeEvent::Progress { analyzed, failed, total }).await;
            self.pause_between_articles(index, total).await;
        }

        info!(user_id = %user_id, analyzed, failed, total, "analyze run complete");
        let _ = tx.send(AnalyzeEvent::Complete { analyzed, failed, total }).await;
    }

    async fn pause_between_articles(&self, index: usize, total: usize) {
        if index + 1 < total {
            tokio::time::sleep(self.pacing.analyze_delay).await;
        }
    }
}
