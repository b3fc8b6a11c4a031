//! Outcome of an export run.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Step at which a table's export stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Target path could not be built or created.
    Layout,
    /// Engine copy, footer check or commit.
    Export,
    /// The local snapshot is complete but did not reach the bucket.
    Upload,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureStage::Layout => "layout",
            FailureStage::Export => "export",
            FailureStage::Upload => "upload",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableStatus {
    Exported,
    Failed { stage: FailureStage, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TableOutcome {
    pub table: String,
    /// Final snapshot path; `None` if the layout step failed.
    pub path: Option<PathBuf>,
    /// Bucket key, set only when the upload succeeded.
    pub object_key: Option<String>,
    pub rows: Option<u64>,
    pub bytes: Option<u64>,
    pub duration_secs: f64,
    #[serde(flatten)]
    pub status: TableStatus,
}

impl TableOutcome {
    pub fn is_exported(&self) -> bool {
        self.status == TableStatus::Exported
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub database: String,
    pub schema: String,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    /// Whether upload was enabled for this run.
    pub uploaded: bool,
    pub tables: Vec<TableOutcome>,
}

impl ExportReport {
    pub fn exported(&self) -> usize {
        self.tables.iter().filter(|t| t.is_exported()).count()
    }

    pub fn failed(&self) -> usize {
        self.tables.len() - self.exported()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn total_rows(&self) -> u64 {
        self.tables
            .iter()
            .filter(|t| t.is_exported())
            .filter_map(|t| t.rows)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap()
    }

    fn outcome(table: &str, status: TableStatus) -> TableOutcome {
        TableOutcome {
            table: table.to_string(),
            path: Some(PathBuf::from(format!("/mnt/gcs/{}/20240601123005-full.parquet", table))),
            object_key: None,
            rows: Some(10),
            bytes: Some(512),
            duration_secs: 0.25,
            status,
        }
    }

    fn report(tables: Vec<TableOutcome>) -> ExportReport {
        ExportReport {
            database: "warehouse".to_string(),
            schema: "public".to_string(),
            started_at: ts(),
            finished_at: ts(),
            uploaded: false,
            tables,
        }
    }

    #[test]
    fn test_counts() {
        let report = report(vec![
            outcome("a", TableStatus::Exported),
            outcome(
                "b",
                TableStatus::Failed {
                    stage: FailureStage::Upload,
                    error: "timeout".to_string(),
                },
            ),
            outcome("c", TableStatus::Exported),
        ]);
        assert_eq!(report.exported(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
        assert_eq!(report.total_rows(), 20);
    }

    #[test]
    fn test_empty_run_is_success() {
        assert!(report(Vec::new()).is_success());
    }

    #[test]
    fn test_json_shape() {
        let report = report(vec![outcome(
            "fact_orders",
            TableStatus::Failed {
                stage: FailureStage::Export,
                error: "relation does not exist".to_string(),
            },
        )]);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["started_at"], "2024-06-01T12:30:05");
        let table = &json["tables"][0];
        assert_eq!(table["table"], "fact_orders");
        assert_eq!(table["status"], "failed");
        assert_eq!(table["stage"], "export");
        assert_eq!(table["error"], "relation does not exist");
    }

    #[test]
    fn test_exported_status_serializes_flat() {
        let json = serde_json::to_value(outcome("dim_region", TableStatus::Exported)).unwrap();
        assert_eq!(json["status"], "exported");
        assert!(json.get("stage").is_none());
    }
}
