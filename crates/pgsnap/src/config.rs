//! Runtime configuration.
//!
//! Every setting comes from a CLI flag or its environment variable (the names
//! deployments already use: `POSTGRES_*`, `GCS_MOUNT_PATH`, `MINIO_*`).
//! `AppConfig::from_args` turns the raw values into validated settings.

use crate::filter::TableFilter;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};
use pgsnap_db::{ParquetCompression, ParquetOptions, DEFAULT_ROW_GROUP_SIZE};
use pgsnap_sinks::ObjectStoreSettings;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_MOUNT_PATH: &str = "/mnt/gcs";
pub const DEFAULT_EXTENSION_PATH: &str = "./duckdb/postgres_scanner.duckdb_extension";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Retries per object-store request before an upload counts as failed.
const UPLOAD_MAX_RETRIES: usize = 3;

const REDACTED: &str = "***";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("MinIO upload is enabled (MINIO_ENABLED=true) but {0} is not set")]
    UploadMissing(&'static str),

    #[error("Row group size must be greater than zero")]
    ZeroRowGroupSize,

    #[error("{0}")]
    UnknownCompression(String),

    #[error("Invalid table pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

impl ConfigError {
    /// Environment variable the error is about, when there is one.
    pub fn variable(&self) -> Option<&'static str> {
        match self {
            ConfigError::Missing(var) | ConfigError::Empty(var) | ConfigError::UploadMissing(var) => {
                Some(var)
            }
            ConfigError::ZeroRowGroupSize => Some("PGSNAP_ROW_GROUP_SIZE"),
            ConfigError::UnknownCompression(_) => Some("PGSNAP_COMPRESSION"),
            ConfigError::InvalidPattern { .. } => None,
        }
    }
}

/// Raw settings as given on the command line or in the environment.
#[derive(Args, Clone)]
pub struct ConfigArgs {
    /// PostgreSQL server host
    #[arg(long, env = "POSTGRES_HOST", global = true)]
    pub postgres_host: Option<String>,

    /// PostgreSQL server port
    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432, global = true)]
    pub postgres_port: u16,

    /// Logical instance name (first directory level of the snapshot tree)
    #[arg(long, env = "POSTGRES_INSTANCE", global = true)]
    pub postgres_instance: Option<String>,

    /// Database to export
    #[arg(long, env = "POSTGRES_DB", global = true)]
    pub postgres_db: Option<String>,

    #[arg(long, env = "POSTGRES_USER", global = true)]
    pub postgres_user: Option<String>,

    #[arg(long, env = "POSTGRES_PASSWORD", hide_env_values = true, global = true)]
    pub postgres_password: Option<String>,

    /// Schema whose base tables are exported
    #[arg(long, env = "POSTGRES_SCHEMA", global = true)]
    pub postgres_schema: Option<String>,

    /// Root of the mounted snapshot volume
    #[arg(long = "mount-path", env = "GCS_MOUNT_PATH", default_value = DEFAULT_MOUNT_PATH, global = true)]
    pub mount_path: PathBuf,

    /// Upload each snapshot to MinIO/S3 when set to "true"
    #[arg(long, env = "MINIO_ENABLED", default_value = "false", global = true)]
    pub minio_enabled: String,

    /// MinIO endpoint: host[:port] or a full URL
    #[arg(long, env = "MINIO_ENDPOINT", global = true)]
    pub minio_endpoint: Option<String>,

    #[arg(long, env = "MINIO_ACCESS_KEY", global = true)]
    pub minio_access_key: Option<String>,

    #[arg(long, env = "MINIO_SECRET_KEY", hide_env_values = true, global = true)]
    pub minio_secret_key: Option<String>,

    #[arg(long, env = "MINIO_BUCKET", global = true)]
    pub minio_bucket: Option<String>,

    /// Use HTTPS for a bare host endpoint
    #[arg(
        long,
        env = "MINIO_SECURE",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub minio_secure: bool,

    #[arg(long, env = "MINIO_REGION", default_value = DEFAULT_REGION, global = true)]
    pub minio_region: String,

    /// Local postgres extension file; installed from the repository when absent
    #[arg(long = "extension-path", env = "DUCKDB_POSTGRES_EXTENSION", default_value = DEFAULT_EXTENSION_PATH, global = true)]
    pub extension_path: PathBuf,

    /// Parquet compression codec (zstd, snappy, gzip, lz4, uncompressed)
    #[arg(long, env = "PGSNAP_COMPRESSION", default_value = "zstd", global = true)]
    pub compression: String,

    /// Rows per Parquet row group
    #[arg(long, env = "PGSNAP_ROW_GROUP_SIZE", default_value_t = DEFAULT_ROW_GROUP_SIZE, global = true)]
    pub row_group_size: usize,
}

impl fmt::Debug for ConfigArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigArgs")
            .field("postgres_host", &self.postgres_host)
            .field("postgres_port", &self.postgres_port)
            .field("postgres_instance", &self.postgres_instance)
            .field("postgres_db", &self.postgres_db)
            .field("postgres_user", &self.postgres_user)
            .field("postgres_password", &self.postgres_password.as_ref().map(|_| REDACTED))
            .field("postgres_schema", &self.postgres_schema)
            .field("mount_path", &self.mount_path)
            .field("minio_enabled", &self.minio_enabled)
            .field("minio_endpoint", &self.minio_endpoint)
            .field("minio_access_key", &self.minio_access_key)
            .field("minio_secret_key", &self.minio_secret_key.as_ref().map(|_| REDACTED))
            .field("minio_bucket", &self.minio_bucket)
            .field("minio_secure", &self.minio_secure)
            .field("minio_region", &self.minio_region)
            .field("extension_path", &self.extension_path)
            .field("compression", &self.compression)
            .field("row_group_size", &self.row_group_size)
            .finish()
    }
}

/// PostgreSQL connection and scope.
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub instance: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub schema: String,
}

impl PostgresConfig {
    /// libpq keyword/value connection string.
    pub fn connection_string(&self) -> String {
        let port = self.port.to_string();
        [
            ("host", self.host.as_str()),
            ("port", port.as_str()),
            ("dbname", self.database.as_str()),
            ("user", self.user.as_str()),
            ("password", self.password.as_str()),
        ]
        .iter()
        .map(|(key, value)| format!("{}={}", key, conninfo_value(value)))
        .collect::<Vec<_>>()
        .join(" ")
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("instance", &self.instance)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &REDACTED)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Quote a conninfo value when libpq would otherwise split or unescape it.
fn conninfo_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

/// S3-compatible upload target.
#[derive(Clone, PartialEq, Eq)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub secure: bool,
    pub region: String,
}

impl ObjectStoreConfig {
    pub fn to_settings(&self) -> ObjectStoreSettings {
        ObjectStoreSettings {
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            bucket: self.bucket.clone(),
            secure: self.secure,
            region: self.region.clone(),
            max_retries: UPLOAD_MAX_RETRIES,
        }
    }
}

impl fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &REDACTED)
            .field("bucket", &self.bucket)
            .field("secure", &self.secure)
            .field("region", &self.region)
            .finish()
    }
}

/// Parquet settings and table selection for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub compression: ParquetCompression,
    pub row_group_size: usize,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ExportOptions {
    pub fn parquet_options(&self) -> ParquetOptions {
        ParquetOptions {
            compression: self.compression,
            row_group_size: self.row_group_size,
        }
    }

    pub fn filter(&self) -> Result<TableFilter, ConfigError> {
        TableFilter::new(&self.include, &self.exclude)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub postgres: PostgresConfig,
    pub mount_path: PathBuf,
    pub extension_path: PathBuf,
    /// `None` when upload is disabled.
    pub object_store: Option<ObjectStoreConfig>,
    pub export: ExportOptions,
}

impl AppConfig {
    /// Validate raw settings.
    pub fn from_args(args: &ConfigArgs) -> Result<Self, ConfigError> {
        let postgres = PostgresConfig {
            host: required(&args.postgres_host, "POSTGRES_HOST")?,
            port: args.postgres_port,
            instance: required(&args.postgres_instance, "POSTGRES_INSTANCE")?,
            database: required(&args.postgres_db, "POSTGRES_DB")?,
            user: required(&args.postgres_user, "POSTGRES_USER")?,
            password: args.postgres_password.clone().unwrap_or_default(),
            schema: required(&args.postgres_schema, "POSTGRES_SCHEMA")?,
        };

        let object_store = if upload_enabled(&args.minio_enabled) {
            Some(ObjectStoreConfig {
                endpoint: required_for_upload(&args.minio_endpoint, "MINIO_ENDPOINT")?,
                access_key: required_for_upload(&args.minio_access_key, "MINIO_ACCESS_KEY")?,
                secret_key: required_for_upload(&args.minio_secret_key, "MINIO_SECRET_KEY")?,
                bucket: required_for_upload(&args.minio_bucket, "MINIO_BUCKET")?,
                secure: args.minio_secure,
                region: args.minio_region.clone(),
            })
        } else {
            None
        };

        if args.row_group_size == 0 {
            return Err(ConfigError::ZeroRowGroupSize);
        }
        let compression = args
            .compression
            .parse::<ParquetCompression>()
            .map_err(ConfigError::UnknownCompression)?;

        Ok(Self {
            postgres,
            mount_path: args.mount_path.clone(),
            extension_path: args.extension_path.clone(),
            object_store,
            export: ExportOptions {
                compression,
                row_group_size: args.row_group_size,
                include: Vec::new(),
                exclude: Vec::new(),
            },
        })
    }

    /// Restrict the run to tables matching `include` and not `exclude`.
    pub fn with_table_patterns(
        mut self,
        include: Vec<String>,
        exclude: Vec<String>,
    ) -> Result<Self, ConfigError> {
        self.export.include = include;
        self.export.exclude = exclude;
        self.export.filter()?;
        Ok(self)
    }

    pub fn upload_enabled(&self) -> bool {
        self.object_store.is_some()
    }
}

/// Only the literal `true` (any case) turns upload on.
fn upload_enabled(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

fn required(value: &Option<String>, var: &'static str) -> Result<String, ConfigError> {
    match value.as_deref().map(str::trim) {
        None => Err(ConfigError::Missing(var)),
        Some("") => Err(ConfigError::Empty(var)),
        Some(v) => Ok(v.to_string()),
    }
}

fn required_for_upload(value: &Option<String>, var: &'static str) -> Result<String, ConfigError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Err(ConfigError::UploadMissing(var)),
        Some(v) => Ok(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ConfigArgs {
        ConfigArgs {
            postgres_host: Some("db.internal".to_string()),
            postgres_port: 5432,
            postgres_instance: Some("prod".to_string()),
            postgres_db: Some("warehouse".to_string()),
            postgres_user: Some("exporter".to_string()),
            postgres_password: Some("s3cr3t".to_string()),
            postgres_schema: Some("public".to_string()),
            mount_path: PathBuf::from(DEFAULT_MOUNT_PATH),
            minio_enabled: "false".to_string(),
            minio_endpoint: None,
            minio_access_key: None,
            minio_secret_key: None,
            minio_bucket: None,
            minio_secure: true,
            minio_region: DEFAULT_REGION.to_string(),
            extension_path: PathBuf::from(DEFAULT_EXTENSION_PATH),
            compression: "zstd".to_string(),
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    fn with_minio(mut args: ConfigArgs) -> ConfigArgs {
        args.minio_enabled = "true".to_string();
        args.minio_endpoint = Some("minio.internal:9000".to_string());
        args.minio_access_key = Some("AKIAEXAMPLE".to_string());
        args.minio_secret_key = Some("minio-secret".to_string());
        args.minio_bucket = Some("lake".to_string());
        args
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_args(&args()).unwrap();
        assert_eq!(config.postgres.port, 5432);
        assert_eq!(config.mount_path, PathBuf::from("/mnt/gcs"));
        assert!(!config.upload_enabled());
        assert_eq!(config.export.parquet_options(), ParquetOptions::default());
    }

    #[test]
    fn test_missing_required_names_variable() {
        let mut raw = args();
        raw.postgres_schema = None;
        let err = AppConfig::from_args(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("POSTGRES_SCHEMA")));
        assert_eq!(err.to_string(), "POSTGRES_SCHEMA is not set");
    }

    #[test]
    fn test_blank_database_rejected() {
        let mut raw = args();
        raw.postgres_db = Some("  ".to_string());
        assert!(matches!(
            AppConfig::from_args(&raw),
            Err(ConfigError::Empty("POSTGRES_DB"))
        ));
    }

    #[test]
    fn test_password_is_optional() {
        let mut raw = args();
        raw.postgres_password = None;
        let config = AppConfig::from_args(&raw).unwrap();
        assert!(config.postgres.connection_string().ends_with("password=''"));
    }

    #[test]
    fn test_minio_enabled_is_case_insensitive() {
        let mut raw = with_minio(args());
        raw.minio_enabled = "TRUE".to_string();
        assert!(AppConfig::from_args(&raw).unwrap().upload_enabled());

        raw.minio_enabled = "yes".to_string();
        assert!(!AppConfig::from_args(&raw).unwrap().upload_enabled());
    }

    #[test]
    fn test_minio_requires_bucket() {
        let mut raw = with_minio(args());
        raw.minio_bucket = None;
        let err = AppConfig::from_args(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::UploadMissing("MINIO_BUCKET")));
        assert_eq!(err.variable(), Some("MINIO_BUCKET"));
    }

    #[test]
    fn test_minio_settings_carry_through() {
        let config = AppConfig::from_args(&with_minio(args())).unwrap();
        let settings = config.object_store.unwrap().to_settings();
        assert_eq!(settings.endpoint_url(), "https://minio.internal:9000");
        assert_eq!(settings.bucket, "lake");
        assert_eq!(settings.region, "us-east-1");
    }

    #[test]
    fn test_zero_row_group_size_rejected() {
        let mut raw = args();
        raw.row_group_size = 0;
        assert!(matches!(
            AppConfig::from_args(&raw),
            Err(ConfigError::ZeroRowGroupSize)
        ));
    }

    #[test]
    fn test_unknown_compression_rejected() {
        let mut raw = args();
        raw.compression = "brotli".to_string();
        let err = AppConfig::from_args(&raw).unwrap_err();
        assert!(err.to_string().contains("brotli"));
    }

    #[test]
    fn test_invalid_table_pattern_rejected() {
        let config = AppConfig::from_args(&args()).unwrap();
        let err = config
            .with_table_patterns(vec!["dim_[".to_string()], Vec::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_connection_string_plain_values() {
        let config = AppConfig::from_args(&args()).unwrap();
        assert_eq!(
            config.postgres.connection_string(),
            "host=db.internal port=5432 dbname=warehouse user=exporter password=s3cr3t"
        );
    }

    #[test]
    fn test_connection_string_quotes_special_values() {
        let mut raw = args();
        raw.postgres_password = Some(r"it's a \secret".to_string());
        let config = AppConfig::from_args(&raw).unwrap();
        assert!(config
            .postgres
            .connection_string()
            .ends_with(r"password='it\'s a \\secret'"));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let raw = with_minio(args());
        let config = AppConfig::from_args(&raw).unwrap();

        for rendered in [format!("{:?}", raw), format!("{:?}", config)] {
            assert!(!rendered.contains("s3cr3t"), "{}", rendered);
            assert!(!rendered.contains("minio-secret"), "{}", rendered);
            assert!(rendered.contains("warehouse"));
        }
    }
}
