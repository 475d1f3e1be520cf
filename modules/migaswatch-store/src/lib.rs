pub mod error;
mod models;

mod articles;
mod feeds;
mod fetch_state;
mod topics;
mod url_cache;

pub use error::{Result, StoreError};
pub use models::*;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Postgres-backed datastore. Row-level isolation is by `user_id`; every
/// per-user operation takes the caller's user id explicitly.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
