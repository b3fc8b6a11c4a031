//! Fatal errors the CLI reports to a human (or a `--json` caller).
//!
//! A `HelpfulError` is a message, what pgsnap was doing when it failed, and
//! commands to try next. The constructors below cover every setup failure
//! of an export run; anything else reaches the user as a plain `anyhow` chain.

use pgsnap::{ConfigError, ExportError};
use pgsnap_db::lock::lock_path_for;
use pgsnap_db::{DbError, LockError, LockHolder};
use pgsnap_sinks::SinkError;
use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    /// What was being attempted
    pub context: Option<String>,
    /// Each entry starts with `TRY:`
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn during(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn hint(mut self, suggestion: impl fmt::Display) -> Self {
        self.suggestions.push(format!("TRY: {}", suggestion));
        self
    }

    pub fn config(err: &ConfigError) -> Self {
        let base = Self::new(format!("Invalid configuration: {}", err))
            .during("Settings come from CLI flags, the environment, or ./.env");

        match err {
            ConfigError::Missing(var) | ConfigError::Empty(var) => base
                .hint(format_args!("export {}=<value>", var))
                .hint(format_args!("Add {}=<value> to .env in the working directory", var))
                .hint("Run 'pgsnap --help' to see every setting and its flag"),
            ConfigError::UploadMissing(var) => base
                .hint(format_args!("export {}=<value>", var))
                .hint("Set MINIO_ENABLED=false to export without uploading"),
            ConfigError::ZeroRowGroupSize => base.hint("Use the default: --row-group-size 100000"),
            ConfigError::UnknownCompression(_) => {
                base.hint("Valid codecs: zstd, snappy, gzip, lz4, uncompressed")
            }
            ConfigError::InvalidPattern { .. } => base
                .hint("Use shell-style globs like 'dim_*' or 'fact_orders_?'")
                .hint("Quote patterns so the shell does not expand them"),
        }
    }

    /// A name that cannot become a directory on the mount.
    pub fn invalid_name(err: &SinkError) -> Self {
        Self::new(format!("Cannot build snapshot path: {}", err))
            .during("Instance, database, schema and table names become directory names on the mount")
            .hint("Check POSTGRES_INSTANCE, POSTGRES_DB and POSTGRES_SCHEMA for '/' or '..'")
    }

    pub fn extension_failed(path: &Path, err: &DbError) -> Self {
        Self::new(format!("Failed to load the DuckDB postgres extension: {}", err))
            .during(format!(
                "Looked for a local extension at {} before trying the extension repository",
                path.display()
            ))
            .hint(format_args!("Check the file exists: ls -la {}", path.display()))
            .hint("Point DUCKDB_POSTGRES_EXTENSION at postgres_scanner.duckdb_extension")
            .hint("The extension must match the DuckDB version pgsnap was built with")
    }

    pub fn attach_failed(host: &str, port: u16, database: &str, err: &DbError) -> Self {
        Self::new(format!("Failed to attach PostgreSQL database {}: {}", database, err))
            .during(format!("Connecting to {}:{}", host, port))
            .hint(format_args!("Check the server is reachable: pg_isready -h {} -p {}", host, port))
            .hint("Verify POSTGRES_USER and POSTGRES_PASSWORD")
            .hint(format_args!("Confirm the database exists: psql -h {} -p {} -l", host, port))
    }

    pub fn bucket_unavailable(bucket: &str, endpoint: &str, err: &SinkError) -> Self {
        let base = Self::new(err.to_string())
            .during(format!("Checking bucket '{}' at {}", bucket, endpoint));
        let base = match err {
            SinkError::BucketMissing(_) => {
                base.hint(format_args!("Create it: mc mb <alias>/{}", bucket))
            }
            _ => base.hint(format_args!("Check the endpoint answers: curl -I {}", endpoint)),
        };
        base.hint("Verify MINIO_ENDPOINT, MINIO_SECURE and the access keys")
            .hint("Set MINIO_ENABLED=false to export without uploading")
    }

    pub fn snapshot_locked(dir: &Path, holder: Option<&LockHolder>) -> Self {
        let context = match holder {
            Some(holder) => format!("Another pgsnap run ({}) is exporting the same schema", holder),
            None => "Another pgsnap run is exporting the same schema".to_string(),
        };
        Self::new(format!("Snapshot directory is locked: {}", dir.display()))
            .during(context)
            .hint("Wait for the other run to finish")
            .hint(format_args!("Inspect the holder: cat {}", lock_path_for(dir).display()))
    }

    /// Map a run-level failure of [`pgsnap::Exporter::run`].
    pub fn export_setup(
        err: &ExportError,
        database: &str,
        schema: &str,
        endpoint: Option<&str>,
    ) -> Self {
        match err {
            ExportError::ListTables(_) => Self::new(err.to_string())
                .during(format!("Listing base tables of {}.{}", database, schema))
                .hint(format_args!("Check the schema exists: psql -c '\\dn {}'", schema))
                .hint("The user needs USAGE on the schema and SELECT on its tables"),
            ExportError::Bucket(sink_err) => Self::bucket_unavailable(
                sink_err.bucket().unwrap_or_default(),
                endpoint.unwrap_or("(unknown endpoint)"),
                sink_err,
            ),
            ExportError::Lock(LockError::Locked { dir, holder }) => {
                Self::snapshot_locked(dir, holder.as_ref())
            }
            ExportError::Lock(lock_err) => Self::new(lock_err.to_string())
                .during("Taking the snapshot directory lock")
                .hint("Check the mount is writable"),
            ExportError::Layout(sink_err) => Self::invalid_name(sink_err),
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;
        if let Some(context) = &self.context {
            writeln!(f, "CONTEXT: {}", context)?;
        }
        if let Some((first, rest)) = self.suggestions.split_first() {
            write!(f, "\n  {}\n", first)?;
            rest.iter().try_for_each(|s| writeln!(f, "  {}", s))?;
        }
        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Print a fatal error as `{"error": ...}` on stdout for `--json` callers.
pub fn print_json_error(err: &anyhow::Error) {
    let payload = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({
            "error": helpful.message,
            "context": helpful.context,
            "suggestions": helpful.suggestions,
        }),
        None => serde_json::json!({ "error": format!("{:#}", err) }),
    };
    println!("{}", payload);
}
