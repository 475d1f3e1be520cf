use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::Topic;
use crate::Store;

/// Hard caps on topic keyword sets.
pub const MAX_KEYWORDS: usize = 20;
pub const MAX_KEYWORD_LEN: usize = 100;

/// Trim, drop empties, and enforce the count/length caps.
pub fn normalize_keywords(raw: &[String]) -> Result<Vec<String>> {
    let cleaned: Vec<String> = raw
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();

    if cleaned.len() > MAX_KEYWORDS {
        return Err(StoreError::Validation(format!(
            "too many keywords: {} (max {MAX_KEYWORDS})",
            cleaned.len()
        )));
    }
    if let Some(long) = cleaned.iter().find(|k| k.chars().count() > MAX_KEYWORD_LEN) {
        return Err(StoreError::Validation(format!(
            "keyword too long ({} chars, max {MAX_KEYWORD_LEN}): {long}",
            long.chars().count()
        )));
    }
    Ok(cleaned)
}

impl Store {
    pub async fn create_topic(
        &self,
        user_id: Uuid,
        name: &str,
        keywords: &[String],
    ) -> Result<Topic> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("topic name must not be empty".into()));
        }
        let keywords = normalize_keywords(keywords)?;

        let topic = sqlx::query_as::<_, Topic>(
            r#"
            INSERT INTO topics (user_id, name, keywords)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(&keywords)
        .fetch_one(&self.pool)
        .await?;

        Ok(topic)
    }

    pub async fn list_topics(&self, user_id: Uuid) -> Result<Vec<Topic>> {
        let topics = sqlx::query_as::<_, Topic>(
            "SELECT * FROM topics WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(topics)
    }

    pub async fn enabled_topics(&self, user_id: Uuid) -> Result<Vec<Topic>> {
        let topics = sqlx::query_as::<_, Topic>(
            "SELECT * FROM topics WHERE user_id = $1 AND enabled ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(topics)
    }

    pub async fn update_topic(
        &self,
        user_id: Uuid,
        topic_id: Uuid,
        name: Option<&str>,
        keywords: Option<&[String]>,
        enabled: Option<bool>,
    ) -> Result<Topic> {
        let keywords = match keywords {
            Some(raw) => Some(normalize_keywords(raw)?),
            None => None,
        };
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(StoreError::Validation("topic name must not be empty".into()));
            }
        }

        let topic = sqlx::query_as::<_, Topic>(
            r#"
            UPDATE topics
            SET name = COALESCE($3, name),
                keywords = COALESCE($4, keywords),
                enabled = COALESCE($5, enabled),
                updated_at = now()
            WHERE user_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(topic_id)
        .bind(name.map(str::trim))
        .bind(keywords)
        .bind(enabled)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("topic {topic_id}")))?;

        Ok(topic)
    }

    /// Delete a topic and scrub its id from every article of the user, in one
    /// transaction. The scrub runs database-side so a concurrent ingest
    /// cannot re-attach the deleted id.
    pub async fn delete_topic(&self, user_id: Uuid, topic_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT detach_topic($1, $2)")
            .bind(user_id)
            .bind(topic_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM topics WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(topic_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound(format!("topic {topic_id}")));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Record a successful fetch for every listed topic. Last write wins;
    /// we only ever overwrite with `now`.
    pub async fn touch_topics_fetched(
        &self,
        user_id: Uuid,
        topic_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> Result<()> {
        if topic_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            UPDATE topics
            SET last_fetched_at = $3, updated_at = now()
            WHERE user_id = $1 AND id = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(topic_ids)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_trimmed_and_filtered() {
        let raw = vec!["  SKK Migas  ".to_string(), "".to_string(), "  ".to_string(), "Migas".to_string()];
        let cleaned = normalize_keywords(&raw).unwrap();
        assert_eq!(cleaned, vec!["SKK Migas", "Migas"]);
    }

    #[test]
    fn keyword_caps_enforced() {
        let too_many: Vec<String> = (0..MAX_KEYWORDS + 1).map(|i| format!("kw{i}")).collect();
        assert!(matches!(normalize_keywords(&too_many), Err(StoreError::Validation(_))));

        let too_long = vec!["k".repeat(MAX_KEYWORD_LEN + 1)];
        assert!(matches!(normalize_keywords(&too_long), Err(StoreError::Validation(_))));
    }
}
