//! The export loop: one staged Parquet snapshot per table, optionally uploaded.

use crate::error::{ExportError, TableError};
use crate::filter::TableFilter;
use crate::report::{ExportReport, FailureStage, TableOutcome, TableStatus};
use crate::source::SnapshotSource;
use chrono::{Local, NaiveDateTime};
use pgsnap_db::{try_lock_exclusive, ParquetOptions};
use pgsnap_sinks::{
    parquet_row_count, ObjectSink, SnapshotLayout, SnapshotTarget, StagedFile, UploadedObject,
};
use std::time::Instant;
use tracing::{error, info, warn};

/// Source of snapshot timestamps.
pub type Clock = fn() -> NaiveDateTime;

/// Wall-clock local time, the zone snapshot names have always used.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Progress hooks for console output. All methods default to no-ops.
pub trait ExportObserver {
    fn table_started(&mut self, _target: &SnapshotTarget, _started_at: NaiveDateTime) {}

    fn table_uploaded(&mut self, _object: &UploadedObject) {}

    fn table_finished(&mut self, _outcome: &TableOutcome) {}
}

impl ExportObserver for () {}

pub struct Exporter<S> {
    source: S,
    layout: SnapshotLayout,
    options: ParquetOptions,
    filter: TableFilter,
    uploader: Option<ObjectSink>,
    clock: Clock,
}

impl<S: SnapshotSource> Exporter<S> {
    pub fn new(source: S, layout: SnapshotLayout, options: ParquetOptions) -> Self {
        Self {
            source,
            layout,
            options,
            filter: TableFilter::all(),
            uploader: None,
            clock: local_now,
        }
    }

    pub fn with_filter(mut self, filter: TableFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_uploader(mut self, uploader: ObjectSink) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn layout(&self) -> &SnapshotLayout {
        &self.layout
    }

    /// Tables the run would export, in source order.
    pub fn selected_tables(&self) -> Result<Vec<String>, ExportError> {
        let tables = self.source.list_tables().map_err(ExportError::ListTables)?;
        let total = tables.len();
        let selected = self.filter.apply(tables);
        if selected.len() != total {
            info!(
                selected = selected.len(),
                total, "Table filter applied"
            );
        }
        Ok(selected)
    }

    /// Targets a run would write right now, without touching the mount.
    pub fn plan(&self) -> Result<Vec<SnapshotTarget>, ExportError> {
        let at = (self.clock)();
        self.selected_tables()?
            .iter()
            .map(|table| self.layout.target(table, at).map_err(ExportError::Layout))
            .collect()
    }

    /// Export every selected table.
    ///
    /// Fails only on setup problems (listing, bucket, lock). Per-table
    /// failures land in the report and the loop moves on.
    pub fn run(&self, observer: &mut dyn ExportObserver) -> Result<ExportReport, ExportError> {
        let started_at = (self.clock)();
        let tables = self.selected_tables()?;

        if let Some(uploader) = &self.uploader {
            uploader.ensure_bucket().map_err(ExportError::Bucket)?;
        }

        let _lock = try_lock_exclusive(&self.layout.schema_dir())?;

        info!(
            database = self.source.database(),
            schema = self.source.schema(),
            tables = tables.len(),
            "Starting export"
        );

        let mut outcomes = Vec::with_capacity(tables.len());
        for table in &tables {
            let outcome = self.export_one(table, observer);
            observer.table_finished(&outcome);
            outcomes.push(outcome);
        }

        let report = ExportReport {
            database: self.source.database().to_string(),
            schema: self.source.schema().to_string(),
            started_at,
            finished_at: (self.clock)(),
            uploaded: self.uploader.is_some(),
            tables: outcomes,
        };
        info!(
            exported = report.exported(),
            failed = report.failed(),
            rows = report.total_rows(),
            "Export finished"
        );
        Ok(report)
    }

    fn export_one(&self, table: &str, observer: &mut dyn ExportObserver) -> TableOutcome {
        let started = Instant::now();
        let mut outcome = TableOutcome {
            table: table.to_string(),
            path: None,
            object_key: None,
            rows: None,
            bytes: None,
            duration_secs: 0.0,
            status: TableStatus::Exported,
        };

        let at = (self.clock)();
        let target = match self
            .layout
            .target(table, at)
            .and_then(|target| self.layout.ensure_table_dir(&target).map(|_| target))
        {
            Ok(target) => target,
            Err(e) => return fail(outcome, started, FailureStage::Layout, &e),
        };
        outcome.path = Some(target.path.clone());

        observer.table_started(&target, at);
        info!(table, path = %target.path.display(), "Exporting table");

        match self.write_snapshot(table, &target) {
            Ok(rows) => outcome.rows = Some(rows),
            Err(e) => return fail(outcome, started, FailureStage::Export, &e),
        }
        outcome.bytes = std::fs::metadata(&target.path).map(|m| m.len()).ok();

        if let Some(uploader) = &self.uploader {
            match uploader.upload_file(&target.path, &target.object_key) {
                Ok(object) => {
                    observer.table_uploaded(&object);
                    outcome.object_key = Some(object.key);
                }
                Err(e) => return fail(outcome, started, FailureStage::Upload, &e),
            }
        }

        outcome.duration_secs = started.elapsed().as_secs_f64();
        info!(
            table,
            rows = outcome.rows,
            bytes = outcome.bytes,
            duration_secs = outcome.duration_secs,
            "Table exported"
        );
        outcome
    }

    /// Stage, copy, verify the footer, then commit.
    fn write_snapshot(&self, table: &str, target: &SnapshotTarget) -> Result<u64, TableError> {
        let mut staged = StagedFile::new(&target.path)?;
        let engine_rows = self
            .source
            .export_table(table, staged.temp_path(), &self.options)?;
        let footer_rows = parquet_row_count(staged.temp_path())?;
        if engine_rows != footer_rows {
            return Err(TableError::RowCountMismatch {
                path: staged.temp_path().to_path_buf(),
                engine: engine_rows,
                footer: footer_rows,
            });
        }
        staged.commit()?;
        Ok(footer_rows)
    }
}

fn fail(
    mut outcome: TableOutcome,
    started: Instant,
    stage: FailureStage,
    err: &dyn std::error::Error,
) -> TableOutcome {
    if stage == FailureStage::Upload {
        warn!(table = %outcome.table, "Snapshot kept locally after failed upload");
    }
    error!(table = %outcome.table, %stage, error = %err, "Table export failed");
    outcome.duration_secs = started.elapsed().as_secs_f64();
    outcome.status = TableStatus::Failed {
        stage,
        error: err.to_string(),
    };
    outcome
}
