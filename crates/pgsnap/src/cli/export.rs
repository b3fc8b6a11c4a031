//! Export command - snapshot every selected table
//!
//! The default command. Prints one line per table as it goes, then a summary.

use crate::cli::error::HelpfulError;
use crate::cli::output::{format_seconds, print_json, Console};
use crate::cli::{connect_uploader, open_source, snapshot_layout, table_filter};
use anyhow::Result;
use chrono::NaiveDateTime;
use pgsnap::{
    AppConfig, ExportError, ExportObserver, ExportReport, Exporter, FailureStage, TableOutcome,
    TableStatus,
};
use pgsnap_sinks::{SnapshotTarget, UploadedObject};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

/// Arguments for the export command
#[derive(Debug, Default)]
pub struct ExportArgs {
    pub dry_run: bool,
    pub json: bool,
}

/// A table a dry run would export.
#[derive(Debug, Serialize)]
struct PlannedTable {
    table: String,
    path: PathBuf,
    object_key: Option<String>,
}

/// Writes the per-table progress line.
struct ConsoleObserver {
    console: Console,
    database: String,
    schema: String,
}

impl ConsoleObserver {
    fn qualified(&self, table: &str) -> String {
        format!("{}.{}.{}", self.database, self.schema, table)
    }
}

impl ExportObserver for ConsoleObserver {
    fn table_started(&mut self, target: &SnapshotTarget, started_at: NaiveDateTime) {
        self.console.begin(format!(
            "Exporting {} to {} at {}",
            self.qualified(&target.table),
            target.path.display(),
            started_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    fn table_uploaded(&mut self, object: &UploadedObject) {
        self.console
            .append(format!("Uploaded to MinIO: {}", object.location()));
    }

    fn table_finished(&mut self, outcome: &TableOutcome) {
        match &outcome.status {
            TableStatus::Exported => self.console.end(format!(
                "done. (Duration: {} seconds)",
                format_seconds(outcome.duration_secs)
            )),
            TableStatus::Failed {
                stage: FailureStage::Layout,
                error,
            } => self.console.line(format!(
                "Skipping {}: Error: {}",
                self.qualified(&outcome.table),
                error
            )),
            TableStatus::Failed {
                stage: FailureStage::Upload,
                error,
            } => self.console.end(format!("MinIO Error: {}", error)),
            TableStatus::Failed { error, .. } => self.console.end(format!("Error: {}", error)),
        }
    }
}

/// Execute the export command
pub fn run(args: ExportArgs, config: &AppConfig) -> Result<ExitCode> {
    let console = Console::new(!args.json);
    let layout = snapshot_layout(config)?;
    let filter = table_filter(config)?;
    let source = open_source(config, &console)?;

    let mut exporter =
        Exporter::new(source, layout, config.export.parquet_options()).with_filter(filter);

    let endpoint = config
        .object_store
        .as_ref()
        .map(|store| store.to_settings().endpoint_url());
    let setup_error = |e: ExportError| -> anyhow::Error {
        HelpfulError::export_setup(
            &e,
            &config.postgres.database,
            &config.postgres.schema,
            endpoint.as_deref(),
        )
        .into()
    };

    if args.dry_run {
        let planned: Vec<PlannedTable> = exporter
            .plan()
            .map_err(setup_error)?
            .into_iter()
            .map(|target| PlannedTable {
                object_key: config.upload_enabled().then(|| target.object_key.clone()),
                table: target.table,
                path: target.path,
            })
            .collect();
        return print_plan(&planned, args.json, config).map(|_| ExitCode::SUCCESS);
    }

    if let Some(uploader) = connect_uploader(config)? {
        exporter = exporter.with_uploader(uploader);
    }

    let mut observer = ConsoleObserver {
        console,
        database: config.postgres.database.clone(),
        schema: config.postgres.schema.clone(),
    };
    let report = exporter.run(&mut observer).map_err(setup_error)?;

    if args.json {
        print_json(&report)?;
    } else {
        print_summary(&report, &observer.console);
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn print_plan(planned: &[PlannedTable], json: bool, config: &AppConfig) -> Result<()> {
    if json {
        return print_json(&planned);
    }

    for table in planned {
        print!(
            "Would export {}.{}.{} to {}",
            config.postgres.database,
            config.postgres.schema,
            table.table,
            table.path.display()
        );
        match (&table.object_key, &config.object_store) {
            (Some(key), Some(store)) => println!(" and upload to {}/{}", store.bucket, key),
            _ => println!(),
        }
    }
    println!("{} table(s) selected (dry run, nothing written).", planned.len());
    Ok(())
}

fn print_summary(report: &ExportReport, console: &Console) {
    if report.uploaded {
        console.line("Database exported successfully and uploaded to MinIO.");
    } else {
        console.line("Database exported successfully.");
    }
    if !report.is_success() {
        console.line(format!(
            "{} of {} table(s) failed; see the log for details.",
            report.failed(),
            report.tables.len()
        ));
    }
}
