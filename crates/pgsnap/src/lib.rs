//! pgsnap - PostgreSQL schema snapshots as Parquet
//!
//! Each run attaches one PostgreSQL schema read-only to an in-memory DuckDB
//! session and writes every base table to
//! `{mount}/{instance}/{database}/{schema}/{table}/{YYYYMMDDHHMMSS}-full.parquet`,
//! optionally uploading the file to an S3-compatible bucket.
//!
//! # Example
//!
//! ```rust,ignore
//! use pgsnap::{AppConfig, Exporter, PostgresSource};
//! use pgsnap_sinks::SnapshotLayout;
//!
//! let config = AppConfig::from_args(&args)?;
//! let layout = SnapshotLayout::new(
//!     &config.mount_path,
//!     &config.postgres.instance,
//!     &config.postgres.database,
//!     &config.postgres.schema,
//! )?;
//! let source = PostgresSource::connect(&config)?;
//! let report = Exporter::new(source, layout, config.export.parquet_options())
//!     .with_filter(config.export.filter()?)
//!     .run(&mut ())?;
//! ```

pub mod config;
mod error;
pub mod export;
pub mod filter;
pub mod report;
pub mod source;

pub use config::{AppConfig, ConfigArgs, ConfigError, ExportOptions, ObjectStoreConfig, PostgresConfig};
pub use error::ExportError;
pub use export::{local_now, Clock, ExportObserver, Exporter};
pub use filter::TableFilter;
pub use report::{ExportReport, FailureStage, TableOutcome, TableStatus};
pub use source::{PostgresSource, SnapshotSource};
