//! Pool onto the compose-managed PostgreSQL.

use crate::config::TestPgConfig;
use anyhow::{anyhow, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};

/// How long a freshly started container gets to accept queries.
const READY_DEADLINE: Duration = Duration::from_secs(60);
const RETRY_EVERY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct TestPgPool {
    pub pool: PgPool,
    pub config: TestPgConfig,
}

impl TestPgPool {
    pub async fn connect(config: TestPgConfig) -> Result<Self> {
        wait_for_healthy(&config).await?;
        let pool = options(5, Duration::from_secs(10))
            .connect(&config.postgres_url())
            .await?;
        info!(host = %config.host, port = config.port, "Test PostgreSQL pool ready");
        Ok(Self { pool, config })
    }

    /// Run one statement outside any scratch schema.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    pub fn inner(&self) -> &PgPool {
        &self.pool
    }
}

fn options(max_connections: u32, acquire: Duration) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire)
}

async fn answers_select(config: &TestPgConfig) -> Result<()> {
    let pool = options(1, Duration::from_secs(1))
        .connect(&config.postgres_url())
        .await?;
    sqlx::query("SELECT 1").execute(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Poll until the server answers `SELECT 1`, giving up after a minute.
pub async fn wait_for_healthy(config: &TestPgConfig) -> Result<()> {
    let deadline = Instant::now() + READY_DEADLINE;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let last_error = match timeout(Duration::from_secs(2), answers_select(config)).await {
            Ok(Ok(())) => {
                debug!(attempts, "PostgreSQL accepted a query");
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "attempt timed out".to_string(),
        };

        if Instant::now() >= deadline {
            return Err(anyhow!(
                "PostgreSQL on {}:{} not ready after {} attempts: {} \
                 (docker compose -f crates/pgsnap_test_utils/docker/docker-compose.yml up -d)",
                config.host,
                config.port,
                attempts,
                last_error
            ));
        }
        sleep(RETRY_EVERY).await;
    }
}
