//! pgsnap Test Utilities
//!
//! PostgreSQL fixtures for end-to-end export tests.
//!
//! Tests using these fixtures sit behind pgsnap's `docker-tests` feature and
//! need the compose PostgreSQL running
//! (`docker compose -f crates/pgsnap_test_utils/docker/docker-compose.yml up -d`).
//!
//! # Usage
//!
//! ```rust,ignore
//! use pgsnap_test_utils::{ScratchSchema, TestPgConfig, TestPgPool};
//!
//! #[tokio::test]
//! #[cfg(feature = "docker-tests")]
//! async fn test_export() {
//!     let pool = TestPgPool::connect(TestPgConfig::from_env()).await.unwrap();
//!     let schema = ScratchSchema::create(pool.inner().clone()).await.unwrap();
//!
//!     schema.seed("CREATE TABLE dim_customer (id INT)").await.unwrap();
//!     // export schema.name() ...
//!     schema.drop_now().await.unwrap();
//! }
//! ```

pub mod config;
pub mod pool;
pub mod schema;

pub use config::TestPgConfig;
pub use pool::{wait_for_healthy, TestPgPool};
pub use schema::ScratchSchema;
