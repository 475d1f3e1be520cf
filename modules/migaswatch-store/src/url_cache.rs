use std::collections::HashMap;

use crate::error::Result;
use crate::Store;

impl Store {
    /// Bulk-load cached resolutions for a batch of identifiers.
    pub async fn cached_decodes(&self, gnews_ids: &[String]) -> Result<HashMap<String, String>> {
        if gnews_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT gnews_id, decoded_url FROM gnews_url_cache WHERE gnews_id = ANY($1)",
        )
        .bind(gnews_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Record a successful resolution. Re-resolving the same identifier is
    /// idempotent.
    pub async fn cache_decode(&self, gnews_id: &str, decoded_url: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO gnews_url_cache (gnews_id, decoded_url)
            VALUES ($1, $2)
            ON CONFLICT (gnews_id) DO UPDATE SET decoded_url = EXCLUDED.decoded_url
            "#,
        )
        .bind(gnews_id)
        .bind(decoded_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
