use chrono::{DateTime, Utc};
use migaswatch_common::SourceType;
use serde::Serialize;
use uuid::Uuid;

/// A user-owned keyword bundle driving both the aggregator search and the
/// RSS match filter.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Topic {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub keywords: Vec<String>,
    pub enabled: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user-owned RSS/Atom source.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Feed {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Article {
    pub id: Uuid,
    pub user_id: Uuid,
    pub link: String,
    pub decoded_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub source_type: SourceType,
    pub title: String,
    pub snippet: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub photo_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub matched_topic_ids: Vec<Uuid>,
    pub url_decoded: bool,
    pub decode_failed: bool,
    pub ai_processed: bool,
    pub ai_error: Option<String>,
    pub ai_processed_at: Option<DateTime<Utc>>,
    pub full_content: Option<String>,
    pub summary: Option<String>,
    pub sentiment: Option<String>,
    pub categories: Option<Vec<String>>,
    pub ai_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// The URL the crawler should fetch: the decoded publisher URL when one
    /// exists, otherwise the original link.
    pub fn crawl_url(&self) -> &str {
        self.decoded_url.as_deref().unwrap_or(&self.link)
    }
}

/// Insert shape for a new article row. Enrichment columns start unset;
/// `decode_failed` starts false.
#[derive(Debug, Clone)]
pub struct ArticleInsert {
    pub link: String,
    pub source_type: SourceType,
    pub title: String,
    pub snippet: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub photo_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub matched_topic_ids: Vec<Uuid>,
    pub url_decoded: bool,
}

/// Persisted enrichment produced by a successful analysis.
#[derive(Debug, Clone)]
pub struct AnalysisRecord {
    pub full_content: Option<String>,
    pub summary: String,
    pub sentiment: String,
    pub categories: Vec<String>,
    pub reason: String,
}

/// Derived per-period counters for the dashboard.
#[derive(Debug, Clone, Copy, Serialize, sqlx::FromRow)]
pub struct KpiCounts {
    pub total: i64,
    pub analyzed: i64,
    pub failed: i64,
    pub pending_analysis: i64,
    pub pending_decode: i64,
}
