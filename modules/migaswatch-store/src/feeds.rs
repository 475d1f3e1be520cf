use migaswatch_common::safety;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::Feed;
use crate::Store;

impl Store {
    pub async fn create_feed(&self, user_id: Uuid, name: &str, url: &str) -> Result<Feed> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("feed name must not be empty".into()));
        }
        let href = safety::validate_url(url).map_err(|e| StoreError::Validation(e.to_string()))?;

        let feed = sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (user_id, name, url)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(&href)
        .fetch_one(&self.pool)
        .await?;

        Ok(feed)
    }

    pub async fn list_feeds(&self, user_id: Uuid) -> Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>(
            "SELECT * FROM feeds WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    pub async fn enabled_feeds(&self, user_id: Uuid) -> Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>(
            "SELECT * FROM feeds WHERE user_id = $1 AND enabled ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    pub async fn update_feed(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
        name: Option<&str>,
        url: Option<&str>,
        enabled: Option<bool>,
    ) -> Result<Feed> {
        let href = match url {
            Some(raw) => {
                Some(safety::validate_url(raw).map_err(|e| StoreError::Validation(e.to_string()))?)
            }
            None => None,
        };

        let feed = sqlx::query_as::<_, Feed>(
            r#"
            UPDATE feeds
            SET name = COALESCE($3, name),
                url = COALESCE($4, url),
                enabled = COALESCE($5, enabled),
                updated_at = now()
            WHERE user_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(name.map(str::trim))
        .bind(href)
        .bind(enabled)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("feed {feed_id}")))?;

        Ok(feed)
    }

    pub async fn delete_feed(&self, user_id: Uuid, feed_id: Uuid) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM feeds WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("feed {feed_id}")));
        }
        Ok(())
    }
}
