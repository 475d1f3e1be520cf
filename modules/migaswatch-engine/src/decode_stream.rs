use gnews_client::{extract_article_id, is_aggregator_url};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::events::DecodeEvent;
use crate::Engine;

/// One decode run processes at most this many articles, oldest first.
pub const DECODE_BATCH_LIMIT: i64 = 100;

impl Engine {
    /// Start a decode run for the user's pending articles. Events arrive on
    /// the returned channel; dropping the receiver cancels the run at the
    /// next article boundary.
    pub fn spawn_decode_stream(&self, user_id: Uuid) -> mpsc::Receiver<DecodeEvent> {
        let (tx, rx) = mpsc::channel(32);
        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_decode(user_id, tx).await;
        });
        rx
    }

    async fn run_decode(&self, user_id: Uuid, tx: mpsc::Sender<DecodeEvent>) {
        let articles = match self.store.pending_decode(user_id, DECODE_BATCH_LIMIT).await {
            Ok(a) => a,
            Err(e) => {
                let _ = tx.send(DecodeEvent::Error { message: e.to_string() }).await;
                return;
            }
        };

        let total = articles.len();
        let mut decoded = 0usize;
        let mut failed = 0usize;

        // Warm the cache for the whole batch in one query.
        let ids: Vec<String> = articles
            .iter()
            .filter(|a| is_aggregator_url(&a.link))
            .filter_map(|a| extract_article_id(&a.link).ok())
            .collect();
        let cached = match self.store.cached_decodes(&ids).await {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "cache warmup failed, decoding without it");
                Default::default()
            }
        };
        self.decoder
            .seed_cache(cached.iter().map(|(k, v)| (k.clone(), v.clone())))
            .await;

        for article in articles {
            // Client gone: stop at the article boundary, close silently.
            if tx.is_closed() {
                info!(user_id = %user_id, "decode stream cancelled");
                return;
            }

            let mut made_remote_call = false;

            if !is_aggregator_url(&article.link) {
                // Already a publisher URL; nothing to resolve.
                match self.store.mark_decode_passthrough(article.id).await {
                    Ok(()) => decoded += 1,
                    Err(e) => {
                        warn!(article = %article.id, error = %e, "passthrough mark failed");
                        failed += 1;
                    }
                }
            } else {
                match extract_article_id(&article.link) {
                    Err(e) => {
                        warn!(article = %article.id, error = %e, "unusable aggregator link");
                        if self.store.mark_decode_failed(article.id).await.is_err() {
                            warn!(article = %article.id, "decode-failed mark did not persist");
                        }
                        failed += 1;
                    }
                    Ok(id) => match cached.get(&id) {
                        Some(url) => match self.store.mark_decoded(article.id, url).await {
                            Ok(()) => decoded += 1,
                            Err(e) => {
                                warn!(article = %article.id, error = %e, "decoded mark failed");
                                failed += 1;
                            }
                        },
                        None => match self.decoder.decode_id(&id).await {
                            Ok(resolution) => {
                                made_remote_call = resolution.was_remote();
                                let url = resolution.url();
                                if let Err(e) = self.store.cache_decode(&id, url).await {
                                    warn!(error = %e, "url cache write failed");
                                }
                                match self.store.mark_decoded(article.id, url).await {
                                    Ok(()) => decoded += 1,
                                    Err(e) => {
                                        warn!(article = %article.id, error = %e, "decoded mark failed");
                                        failed += 1;
                                    }
                                }
                            }
                            Err(e) => {
                                // The failed attempt still hit the aggregator.
                                made_remote_call = true;
                                warn!(article = %article.id, error = %e, "decode failed");
                                if self.store.mark_decode_failed(article.id).await.is_err() {
                                    warn!(article = %article.id, "decode-failed mark did not persist");
                                }
                                failed += 1;
                            }
                        },
                    },
                }
            }

            let _ = tx
                .send(DecodeEvent::Progress { decoded, failed, total })
                .await;

            // Pace only the iterations that touched the aggregator; cache
            // hits, direct decodes, and pass-throughs run back to back.
            if made_remote_call {
                tokio::time::sleep(self.pacing.decode_delay).await;
            }
        }

        info!(user_id = %user_id, decoded, failed, total, "decode run complete");
        let _ = tx
            .send(DecodeEvent::Complete { decoded, failed, total })
            .await;
    }
}
