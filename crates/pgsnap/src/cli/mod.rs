//! CLI module for pgsnap
//!
//! Commands share the setup path in this module: validated config, snapshot
//! layout, DuckDB session with PostgreSQL attached, and optional object sink.

pub mod check;
pub mod error;
pub mod export;
pub mod output;
pub mod tables;

use crate::cli::error::HelpfulError;
use crate::cli::output::Console;
use anyhow::Result;
use clap::Args;
use pgsnap::{AppConfig, ConfigArgs, PostgresSource, TableFilter};
use pgsnap_db::{ExtensionSource, Session};
use pgsnap_sinks::{ObjectSink, SnapshotLayout};

/// Table selection shared by `export` and `tables`.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only tables matching this glob (repeatable, e.g. --table 'dim_*')
    #[arg(long = "table", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Skip tables matching this glob (repeatable, wins over --table)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,
}

/// Validate settings, applying table patterns.
pub fn load_config(args: &ConfigArgs, filter: &FilterArgs) -> Result<AppConfig> {
    AppConfig::from_args(args)
        .and_then(|config| {
            config.with_table_patterns(filter.include.clone(), filter.exclude.clone())
        })
        .map_err(|e| HelpfulError::config(&e).into())
}

pub fn table_filter(config: &AppConfig) -> Result<TableFilter> {
    config
        .export
        .filter()
        .map_err(|e| HelpfulError::config(&e).into())
}

pub fn snapshot_layout(config: &AppConfig) -> Result<SnapshotLayout> {
    SnapshotLayout::new(
        &config.mount_path,
        &config.postgres.instance,
        &config.postgres.database,
        &config.postgres.schema,
    )
    .map_err(|e| HelpfulError::invalid_name(&e).into())
}

/// Open DuckDB, install and load the extension, then attach the database,
/// one console step each.
pub fn open_source(config: &AppConfig, console: &Console) -> Result<PostgresSource> {
    let session = Session::open_in_memory()?;

    let extension = PostgresSource::extension_source(config);
    if let ExtensionSource::Repository = extension {
        tracing::warn!(
            path = %config.extension_path.display(),
            "Local postgres extension not found; installing from the extension repository"
        );
    }
    extension_steps(
        console,
        || session.install_extension(&extension),
        || session.load_extension(),
    )
    .map_err(|e| HelpfulError::extension_failed(&config.extension_path, &e))?;

    let attach = PostgresSource::attach_for(config);
    console
        .step(
            format!("Attaching PostgreSQL database {}", config.postgres.database),
            || session.attach_postgres(&attach),
        )
        .map_err(|e| {
            HelpfulError::attach_failed(
                &config.postgres.host,
                config.postgres.port,
                &config.postgres.database,
                &e,
            )
        })?;

    Ok(PostgresSource::new(session, attach))
}

/// Install, then load, as two console lines. Loading is skipped when the
/// install fails.
fn extension_steps<E>(
    console: &Console,
    install: impl FnOnce() -> Result<(), E>,
    load: impl FnOnce() -> Result<(), E>,
) -> Result<(), E> {
    console.step("Installing PostgreSQL extension", install)?;
    console.step("Loading PostgreSQL extension", load)
}

/// Connect to the bucket when upload is enabled. The bucket is checked by the caller.
pub fn connect_uploader(config: &AppConfig) -> Result<Option<ObjectSink>> {
    let Some(store) = &config.object_store else {
        return Ok(None);
    };
    let settings = store.to_settings();
    let sink = ObjectSink::connect(&settings).map_err(|e| {
        HelpfulError::bucket_unavailable(&settings.bucket, &settings.endpoint_url(), &e)
    })?;
    Ok(Some(sink))
}
