use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::Store;

impl Store {
    pub async fn last_fetch_at(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT last_fetch_at FROM fetch_state WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(t,)| t))
    }

    pub async fn set_last_fetch_at(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fetch_state (user_id, last_fetch_at)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
                SET last_fetch_at = EXCLUDED.last_fetch_at, updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Every user with at least one enabled topic or feed. Drives the
    /// hourly scheduler tick.
    pub async fn active_user_ids(&self) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT user_id FROM topics WHERE enabled
            UNION
            SELECT DISTINCT user_id FROM feeds WHERE enabled
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
