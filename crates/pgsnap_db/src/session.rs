//! In-memory DuckDB session bridging PostgreSQL and Parquet.

use crate::error::{DbError, Result};
use crate::options::ParquetOptions;
use crate::sql::{base_tables_query, quote_ident, quote_literal, redact_conninfo, Relation};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the `postgres` extension is installed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionSource {
    /// A `postgres_scanner.duckdb_extension` file shipped next to the binary.
    LocalFile(PathBuf),
    /// DuckDB's default extension repository (needs network access).
    Repository,
}

impl ExtensionSource {
    /// Prefer the local extension file when it exists.
    pub fn resolve(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.is_file() {
            ExtensionSource::LocalFile(path.to_path_buf())
        } else {
            ExtensionSource::Repository
        }
    }

    fn install_sql(&self) -> String {
        match self {
            ExtensionSource::LocalFile(path) => {
                format!("FORCE INSTALL {}", quote_literal(&path.to_string_lossy()))
            }
            ExtensionSource::Repository => "INSTALL postgres".to_string(),
        }
    }
}

/// A PostgreSQL database to attach read-only under `alias`.
#[derive(Clone)]
pub struct PostgresAttach {
    conninfo: String,
    alias: String,
    schema: String,
}

impl PostgresAttach {
    pub fn new(
        conninfo: impl Into<String>,
        alias: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            conninfo: conninfo.into(),
            alias: alias.into(),
            schema: schema.into(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn attach_sql(&self, conninfo: &str) -> String {
        format!(
            "ATTACH {} AS {} (TYPE POSTGRES, READ_ONLY, SCHEMA {})",
            quote_literal(conninfo),
            quote_ident(&self.alias),
            quote_literal(&self.schema)
        )
    }
}

impl std::fmt::Debug for PostgresAttach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresAttach")
            .field("conninfo", &redact_conninfo(&self.conninfo))
            .field("alias", &self.alias)
            .field("schema", &self.schema)
            .finish()
    }
}

/// The scanner's connect errors quote the whole dsn, password included.
fn attach_error(attach: &PostgresAttach, cause: &dyn std::fmt::Display) -> DbError {
    DbError::attach(format!(
        "failed to attach {} (schema {}): {}",
        attach.alias, attach.schema, cause
    ))
    .redacted()
}

/// A single in-memory DuckDB connection.
///
/// Not shared across threads; the exporter drives one table at a time.
pub struct Session {
    conn: duckdb::Connection,
}

impl Session {
    /// Open a fresh in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = duckdb::Connection::open_in_memory()?;
        debug!("Opened in-memory DuckDB session");
        Ok(Self { conn })
    }

    /// Install and load the `postgres` extension.
    pub fn install_postgres(&self, source: &ExtensionSource) -> Result<()> {
        self.install_extension(source)?;
        self.load_extension()
    }

    pub fn install_extension(&self, source: &ExtensionSource) -> Result<()> {
        let install = source.install_sql();
        debug!("Installing postgres extension: {}", install);
        self.conn
            .execute_batch(&install)
            .map_err(|e| DbError::extension(format!("install failed ({:?}): {}", source, e)))?;
        info!(source = ?source, "Installed postgres extension");
        Ok(())
    }

    pub fn load_extension(&self) -> Result<()> {
        self.conn
            .execute_batch("LOAD postgres")
            .map_err(|e| DbError::extension(format!("load failed: {}", e)))?;
        debug!("Loaded postgres extension");
        Ok(())
    }

    /// Attach a PostgreSQL database read-only, scoped to one schema.
    pub fn attach_postgres(&self, attach: &PostgresAttach) -> Result<()> {
        debug!(
            "ATTACH: {}",
            attach.attach_sql(&redact_conninfo(&attach.conninfo))
        );
        self.conn
            .execute_batch(&attach.attach_sql(&attach.conninfo))
            .map_err(|e| attach_error(attach, &e))?;
        info!(
            alias = %attach.alias,
            schema = %attach.schema,
            "Attached PostgreSQL database (read-only)"
        );
        Ok(())
    }

    /// Base tables of `schema` in the database attached as `alias`, by name.
    pub fn list_base_tables(&self, alias: &str, schema: &str) -> Result<Vec<String>> {
        let sql = base_tables_query(alias, schema);
        debug!("Listing tables: {}", sql);
        let tables = self.query_strings(&sql).map_err(DbError::redacted)?;
        info!(count = tables.len(), "Discovered base tables in {}.{}", alias, schema);
        Ok(tables)
    }

    /// Copy a relation to a Parquet file. Returns the engine-reported row count.
    pub fn copy_to_parquet(
        &self,
        relation: &Relation,
        dest: &Path,
        options: &ParquetOptions,
    ) -> Result<u64> {
        let sql = format!(
            "COPY (SELECT * FROM {}) TO {} {}",
            relation,
            quote_literal(&dest.to_string_lossy()),
            options.to_copy_options()
        );
        debug!("COPY: {}", sql);
        let rows = self
            .conn
            .execute(&sql, [])
            .map_err(|e| DbError::from(e).redacted())?;
        Ok(rows as u64)
    }

    /// Run one or more statements with no result.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Run a query and collect its first column as strings.
    pub fn query_strings(&self, sql: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut values = Vec::new();
        for row in rows {
            values.push(row?);
        }
        Ok(values)
    }

    /// Get the underlying connection (escape hatch for ad-hoc queries).
    pub fn connection(&self) -> &duckdb::Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_source_resolves_missing_file_to_repository() {
        let source = ExtensionSource::resolve("/nonexistent/postgres_scanner.duckdb_extension");
        assert_eq!(source, ExtensionSource::Repository);
        assert_eq!(source.install_sql(), "INSTALL postgres");
    }

    #[test]
    fn test_extension_source_prefers_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("postgres_scanner.duckdb_extension");
        std::fs::write(&path, b"stub").unwrap();

        let source = ExtensionSource::resolve(&path);
        assert_eq!(source, ExtensionSource::LocalFile(path.clone()));
        assert_eq!(
            source.install_sql(),
            format!("FORCE INSTALL '{}'", path.display())
        );
    }

    #[test]
    fn test_attach_sql_is_read_only_and_quoted() {
        let attach = PostgresAttach::new(
            "host=db port=5432 dbname=sales user=u password=p",
            "sales",
            "public",
        );
        assert_eq!(
            attach.attach_sql(&attach.conninfo),
            "ATTACH 'host=db port=5432 dbname=sales user=u password=p' AS \"sales\" \
             (TYPE POSTGRES, READ_ONLY, SCHEMA 'public')"
        );
    }

    #[test]
    fn test_attach_debug_redacts_password() {
        let attach = PostgresAttach::new("host=db password=hunter2", "sales", "public");
        let debug = format!("{:?}", attach);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("password=***"));
    }

    #[test]
    fn test_attach_error_masks_password() {
        let attach = PostgresAttach::new(
            "host=10.0.0.9 port=5432 dbname=sales user=u password=hunter2",
            "sales",
            "public",
        );
        let cause = format!(
            "IO Error: Unable to connect to Postgres at \"{}\": Connection refused",
            attach.conninfo
        );
        let err = attach_error(&attach, &cause);

        let message = err.to_string();
        assert!(!message.contains("hunter2"), "{}", message);
        assert!(message.starts_with("Attach error: failed to attach sales (schema public)"));
        assert!(message.contains("user=u password=***\": Connection refused"));
        assert!(!format!("{:?}", err).contains("hunter2"));
    }

    #[test]
    fn test_query_strings() {
        let session = Session::open_in_memory().unwrap();
        session
            .execute_batch("CREATE TABLE t (name VARCHAR); INSERT INTO t VALUES ('b'), ('a');")
            .unwrap();
        let names = session
            .query_strings("SELECT name FROM t ORDER BY name")
            .unwrap();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
