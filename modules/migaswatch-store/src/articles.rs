use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{AnalysisRecord, Article, ArticleInsert, KpiCounts};
use crate::Store;

/// Multi-row inserts are chunked to keep bind counts bounded.
const INSERT_CHUNK: usize = 50;

impl Store {
    /// Load the `matched_topic_ids` of any existing rows among `links`,
    /// keyed by link. One query for the whole incoming batch.
    pub async fn existing_topic_sets(
        &self,
        user_id: Uuid,
        links: &[String],
    ) -> Result<HashMap<String, Vec<Uuid>>> {
        if links.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(String, Vec<Uuid>)> = sqlx::query_as(
            "SELECT link, matched_topic_ids FROM articles WHERE user_id = $1 AND link = ANY($2)",
        )
        .bind(user_id)
        .bind(links)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Insert new article rows in chunks. Conflicting rows (a concurrent
    /// upsert won the race) are skipped; the returned count reflects rows
    /// actually written.
    pub async fn insert_articles(&self, user_id: Uuid, rows: &[ArticleInsert]) -> Result<usize> {
        let mut inserted = 0usize;

        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut qb = QueryBuilder::new(
                "INSERT INTO articles (user_id, link, source_type, title, snippet, \
                 source_name, source_url, photo_url, published_at, matched_topic_ids, \
                 url_decoded) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(user_id)
                    .push_bind(&row.link)
                    .push_bind(row.source_type.to_string())
                    .push_bind(&row.title)
                    .push_bind(&row.snippet)
                    .push_bind(&row.source_name)
                    .push_bind(&row.source_url)
                    .push_bind(&row.photo_url)
                    .push_bind(row.published_at)
                    .push_bind(&row.matched_topic_ids)
                    .push_bind(row.url_decoded);
            });
            qb.push(" ON CONFLICT (user_id, link) DO NOTHING");

            let result = qb.build().execute(&self.pool).await?;
            inserted += result.rows_affected() as usize;
        }

        Ok(inserted)
    }

    /// Replace the matched-topic set of an existing row. Touches nothing
    /// else, in particular no enrichment column.
    pub async fn set_matched_topics(
        &self,
        user_id: Uuid,
        link: &str,
        topic_ids: &[Uuid],
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET matched_topic_ids = $3, updated_at = now()
            WHERE user_id = $1 AND link = $2
            "#,
        )
        .bind(user_id)
        .bind(link)
        .bind(topic_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Recent articles for the dashboard, newest publish date first.
    pub async fn list_articles(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT * FROM articles
            WHERE user_id = $1
            ORDER BY published_at DESC NULLS LAST, created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }

    /// Oldest articles still awaiting URL decoding.
    pub async fn pending_decode(&self, user_id: Uuid, limit: i64) -> Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT * FROM articles
            WHERE user_id = $1 AND NOT url_decoded
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }

    /// Oldest articles eligible for analysis: decoded, not decode-failed,
    /// not yet processed.
    pub async fn pending_analysis(&self, user_id: Uuid, limit: i64) -> Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT * FROM articles
            WHERE user_id = $1 AND NOT ai_processed AND url_decoded AND NOT decode_failed
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }

    pub async fn pending_analysis_count(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT count(*) FROM articles
            WHERE user_id = $1 AND NOT ai_processed AND url_decoded AND NOT decode_failed
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Mark a decode success. The article becomes eligible for crawling.
    pub async fn mark_decoded(&self, article_id: Uuid, decoded_url: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET decoded_url = $2, url_decoded = true, decode_failed = false, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(article_id)
        .bind(decoded_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a link that needs no decoding (already a publisher URL).
    pub async fn mark_decode_passthrough(&self, article_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE articles SET url_decoded = true, updated_at = now() WHERE id = $1",
        )
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a decode failure. Terminal: the article is excluded from analysis.
    pub async fn mark_decode_failed(&self, article_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET url_decoded = true, decode_failed = true, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a crawl failure without consuming the article: `ai_processed`
    /// stays false so the next run retries it.
    pub async fn set_crawl_error(&self, article_id: Uuid, message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE articles SET ai_error = $2, updated_at = now() WHERE id = $1",
        )
        .bind(article_id)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a terminal analysis failure.
    pub async fn mark_analysis_failed(
        &self,
        article_id: Uuid,
        message: &str,
        full_content: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET ai_processed = true,
                ai_error = $2,
                ai_processed_at = now(),
                full_content = COALESCE($3, full_content),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(article_id)
        .bind(message)
        .bind(full_content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist a successful enrichment.
    pub async fn save_analysis(&self, article_id: Uuid, record: &AnalysisRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET ai_processed = true,
                ai_error = NULL,
                ai_processed_at = now(),
                full_content = $2,
                summary = $3,
                sentiment = $4,
                categories = $5,
                ai_reason = $6,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(article_id)
        .bind(&record.full_content)
        .bind(&record.summary)
        .bind(&record.sentiment)
        .bind(&record.categories)
        .bind(&record.reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Admin retry: reset `ai_processed` so the analyzer picks the article up
    /// again. Allowed only for failed analyses (`ai_error` non-null).
    pub async fn reset_failed_analysis(&self, user_id: Uuid, article_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET ai_processed = false, ai_error = NULL, ai_processed_at = NULL, updated_at = now()
            WHERE user_id = $1 AND id = $2 AND ai_processed AND ai_error IS NOT NULL
            "#,
        )
        .bind(user_id)
        .bind(article_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "article {article_id} has no failed analysis to retry"
            )));
        }
        Ok(())
    }

    /// Derived counters for articles created on or after `since`
    /// (`None` = all time).
    pub async fn kpi_counts(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<KpiCounts> {
        let counts = sqlx::query_as::<_, KpiCounts>(
            r#"
            SELECT
                count(*) AS total,
                count(*) FILTER (WHERE ai_processed AND ai_error IS NULL) AS analyzed,
                count(*) FILTER (WHERE ai_processed AND ai_error IS NOT NULL) AS failed,
                count(*) FILTER (WHERE NOT ai_processed AND url_decoded AND NOT decode_failed)
                    AS pending_analysis,
                count(*) FILTER (WHERE NOT url_decoded) AS pending_decode
            FROM articles
            WHERE user_id = $1 AND ($2::timestamptz IS NULL OR created_at >= $2)
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }
}
