pub mod error;

pub use error::{CrawlerError, Result};

use std::time::Duration;

use migaswatch_common::retry::{self, RetryPolicy};
use serde::Deserialize;
use tracing::{debug, warn};

/// Content below this length is rejected as too short to analyze.
pub const MIN_CONTENT_CHARS: usize = 50;
/// Content above this length is truncated before persistence.
pub const MAX_CONTENT_CHARS: usize = 4000;
/// Suffix appended when content is truncated.
pub const TRUNCATION_SENTINEL: &str = "... [truncated]";

#[derive(Deserialize)]
struct MarkdownResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

pub struct CrawlerClient {
    client: reqwest::Client,
    base_url: String,
}

impl CrawlerClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build crawler HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch article body text as markdown via the crawler's /md endpoint.
    /// Retries transient failures twice; enforces the content-length floor
    /// and the truncation ceiling.
    pub async fn markdown(&self, url: &str) -> Result<String> {
        let policy = RetryPolicy::default().with_attempts(3);
        let content = retry::with_backoff_if(
            policy,
            "crawler.markdown",
            || self.markdown_once(url),
            CrawlerError::is_transient,
        )
        .await?;

        let len = content.chars().count();
        if len < MIN_CONTENT_CHARS {
            warn!(url, len, "crawler returned too little content");
            return Err(CrawlerError::TooShort { len });
        }

        Ok(truncate_content(&content))
    }

    async fn markdown_once(&self, url: &str) -> Result<String> {
        let endpoint = format!("{}/md", self.base_url);

        debug!(url, "crawler markdown request");

        let resp = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(CrawlerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: MarkdownResponse = resp.json().await?;
        if !body.success {
            return Err(CrawlerError::Extraction(
                body.error_message
                    .unwrap_or_else(|| "unknown extraction error".to_string()),
            ));
        }

        body.markdown
            .filter(|m| !m.trim().is_empty())
            .ok_or(CrawlerError::TooShort { len: 0 })
    }
}

/// Cap content at [`MAX_CONTENT_CHARS`], appending the sentinel when cut.
pub fn truncate_content(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= MAX_CONTENT_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(MAX_CONTENT_CHARS).collect();
    cut.push_str(TRUNCATION_SENTINEL);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_untouched() {
        let body = "Harga minyak mentah naik tipis pada perdagangan hari ini.";
        assert_eq!(truncate_content(body), body);
    }

    #[test]
    fn long_content_gets_sentinel() {
        let body = "a".repeat(MAX_CONTENT_CHARS + 500);
        let out = truncate_content(&body);
        assert!(out.ends_with(TRUNCATION_SENTINEL));
        assert_eq!(out.chars().count(), MAX_CONTENT_CHARS + TRUNCATION_SENTINEL.chars().count());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let body = "m".repeat(MAX_CONTENT_CHARS - 1) + "énergie";
        let out = truncate_content(&body);
        assert!(out.ends_with(TRUNCATION_SENTINEL));
    }
}
