//! Parquet writer options passed to `COPY ... TO`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rows per Parquet row group unless overridden.
pub const DEFAULT_ROW_GROUP_SIZE: usize = 100_000;

/// Compression codec for snapshot files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    #[default]
    Zstd,
    Snappy,
    Gzip,
    Lz4,
    Uncompressed,
}

impl ParquetCompression {
    /// Codec keyword as DuckDB expects it in `COMPRESSION <codec>`.
    pub fn as_sql(&self) -> &'static str {
        match self {
            ParquetCompression::Zstd => "ZSTD",
            ParquetCompression::Snappy => "SNAPPY",
            ParquetCompression::Gzip => "GZIP",
            ParquetCompression::Lz4 => "LZ4",
            ParquetCompression::Uncompressed => "UNCOMPRESSED",
        }
    }

    pub fn all() -> &'static [ParquetCompression] {
        &[
            ParquetCompression::Zstd,
            ParquetCompression::Snappy,
            ParquetCompression::Gzip,
            ParquetCompression::Lz4,
            ParquetCompression::Uncompressed,
        ]
    }
}

impl fmt::Display for ParquetCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_sql().to_ascii_lowercase())
    }
}

impl FromStr for ParquetCompression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zstd" => Ok(ParquetCompression::Zstd),
            "snappy" => Ok(ParquetCompression::Snappy),
            "gzip" => Ok(ParquetCompression::Gzip),
            "lz4" => Ok(ParquetCompression::Lz4),
            "uncompressed" | "none" => Ok(ParquetCompression::Uncompressed),
            other => Err(format!(
                "Unknown compression '{}', expected one of: zstd, snappy, gzip, lz4, uncompressed",
                other
            )),
        }
    }
}

/// Options for a single `COPY ... TO ... (FORMAT PARQUET, ...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParquetOptions {
    pub compression: ParquetCompression,
    pub row_group_size: usize,
}

impl Default for ParquetOptions {
    fn default() -> Self {
        Self {
            compression: ParquetCompression::Zstd,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }
}

impl ParquetOptions {
    /// Render the parenthesized option list of the COPY statement.
    pub fn to_copy_options(&self) -> String {
        format!(
            "(FORMAT PARQUET, COMPRESSION {}, ROW_GROUP_SIZE {})",
            self.compression.as_sql(),
            self.row_group_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_match_snapshot_format() {
        assert_eq!(
            ParquetOptions::default().to_copy_options(),
            "(FORMAT PARQUET, COMPRESSION ZSTD, ROW_GROUP_SIZE 100000)"
        );
    }

    #[test]
    fn test_compression_parse() {
        assert_eq!("ZSTD".parse::<ParquetCompression>(), Ok(ParquetCompression::Zstd));
        assert_eq!(" snappy ".parse::<ParquetCompression>(), Ok(ParquetCompression::Snappy));
        assert_eq!("none".parse::<ParquetCompression>(), Ok(ParquetCompression::Uncompressed));
        assert!("brotli".parse::<ParquetCompression>().is_err());
    }

    #[test]
    fn test_compression_display_roundtrips() {
        for codec in ParquetCompression::all() {
            assert_eq!(codec.to_string().parse::<ParquetCompression>(), Ok(*codec));
        }
    }
}
