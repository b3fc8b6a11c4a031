//! Throwaway schemas for export tests.
//!
//! pgsnap exports exactly one schema, so each test gets its own
//! `test_<uuid>` schema to seed and point the exporter at.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

/// A schema created for one test and dropped (with its tables) afterwards.
///
/// Call [`ScratchSchema::drop_now`] at the end of a test to wait for the
/// drop; otherwise `Drop` hands it to the ambient tokio runtime.
pub struct ScratchSchema {
    pool: PgPool,
    name: String,
    dropped: bool,
}

impl ScratchSchema {
    pub async fn create(pool: PgPool) -> Result<Self> {
        let name = format!("test_{}", Uuid::new_v4().simple());
        sqlx::query(&format!("CREATE SCHEMA {}", name))
            .execute(&pool)
            .await
            .with_context(|| format!("creating scratch schema {}", name))?;
        debug!(schema = %name, "Created scratch schema");

        Ok(Self {
            pool,
            name,
            dropped: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run `sql` (one or more statements) with the scratch schema first on
    /// the search path, so unqualified `CREATE TABLE` lands inside it.
    pub async fn seed(&self, sql: &str) -> Result<()> {
        // search_path is per connection; keep both statements on one
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("SET LOCAL search_path TO {}", self.name))
            .execute(&mut *tx)
            .await?;
        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("seeding {}", self.name))?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn drop_now(mut self) -> Result<()> {
        self.dropped = true;
        drop_schema(&self.pool, &self.name).await
    }
}

async fn drop_schema(pool: &PgPool, name: &str) -> Result<()> {
    sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", name))
        .execute(pool)
        .await?;
    debug!(schema = %name, "Dropped scratch schema");
    Ok(())
}

impl Drop for ScratchSchema {
    fn drop(&mut self) {
        if self.dropped {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(schema = %self.name, "No tokio runtime; leaving scratch schema behind");
            return;
        };
        let pool = self.pool.clone();
        let name = std::mem::take(&mut self.name);
        runtime.spawn(async move {
            if let Err(e) = drop_schema(&pool, &name).await {
                warn!(schema = %name, "Failed to drop scratch schema: {:#}", e);
            }
        });
    }
}
