//! Where snapshots are read from.

use crate::config::AppConfig;
use pgsnap_db::{ExtensionSource, ParquetOptions, PostgresAttach, Relation, Result, Session};
use std::path::Path;

/// A schema whose tables can be written out as Parquet.
pub trait SnapshotSource {
    fn database(&self) -> &str;

    fn schema(&self) -> &str;

    /// Base tables in export order.
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Write every row of `table` to `dest`. Returns the engine's row count.
    fn export_table(&self, table: &str, dest: &Path, options: &ParquetOptions) -> Result<u64>;
}

/// A PostgreSQL schema attached read-only to an in-memory DuckDB session.
pub struct PostgresSource {
    session: Session,
    attach: PostgresAttach,
}

impl PostgresSource {
    /// Wrap a session that already has `attach` attached.
    pub fn new(session: Session, attach: PostgresAttach) -> Self {
        Self { session, attach }
    }

    /// Open a session, load the extension and attach in one go.
    pub fn connect(config: &AppConfig) -> Result<Self> {
        let session = Session::open_in_memory()?;
        session.install_postgres(&Self::extension_source(config))?;
        let attach = Self::attach_for(config);
        session.attach_postgres(&attach)?;
        Ok(Self::new(session, attach))
    }

    pub fn extension_source(config: &AppConfig) -> ExtensionSource {
        ExtensionSource::resolve(&config.extension_path)
    }

    /// The database is attached under its own name.
    pub fn attach_for(config: &AppConfig) -> PostgresAttach {
        PostgresAttach::new(
            config.postgres.connection_string(),
            config.postgres.database.clone(),
            config.postgres.schema.clone(),
        )
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl SnapshotSource for PostgresSource {
    fn database(&self) -> &str {
        self.attach.alias()
    }

    fn schema(&self) -> &str {
        self.attach.schema()
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        self.session
            .list_base_tables(self.attach.alias(), self.attach.schema())
    }

    fn export_table(&self, table: &str, dest: &Path, options: &ParquetOptions) -> Result<u64> {
        let relation = Relation::new(self.attach.alias(), self.attach.schema(), table);
        self.session.copy_to_parquet(&relation, dest, options)
    }
}
