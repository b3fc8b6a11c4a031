//! Tables command - list the base tables an export would cover

use crate::cli::error::HelpfulError;
use crate::cli::output::{print_json, print_table_colored, Console};
use crate::cli::{open_source, snapshot_layout, table_filter};
use anyhow::Result;
use comfy_table::Color;
use pgsnap::{AppConfig, SnapshotSource};
use pgsnap_sinks::SnapshotLayout;
use serde::Serialize;
use std::path::PathBuf;

/// Arguments for the tables command
#[derive(Debug, Default)]
pub struct TablesArgs {
    pub json: bool,
}

/// One selected table. A name that cannot become a directory keeps its row
/// with `error` set; the export reports the same table as failed.
#[derive(Debug, Serialize)]
struct TableEntry {
    table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn table_entries(layout: &SnapshotLayout, tables: Vec<String>) -> Vec<TableEntry> {
    tables
        .into_iter()
        .map(|table| match layout.table_dir(&table) {
            Ok(dir) => TableEntry {
                table,
                snapshot_dir: Some(dir),
                error: None,
            },
            Err(e) => TableEntry {
                table,
                snapshot_dir: None,
                error: Some(e.to_string()),
            },
        })
        .collect()
}

/// Execute the tables command
pub fn run(args: TablesArgs, config: &AppConfig) -> Result<()> {
    let layout = snapshot_layout(config)?;
    let filter = table_filter(config)?;
    let source = open_source(config, &Console::new(false))?;

    let tables = source.list_tables().map_err(|e| {
        HelpfulError::new(format!("Failed to list tables: {}", e)).during(format!(
            "Listing base tables of {}.{}",
            config.postgres.database, config.postgres.schema
        ))
    })?;
    let total = tables.len();

    let entries = table_entries(&layout, filter.apply(tables));

    if args.json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!(
            "No base tables selected in {}.{} ({} found).",
            config.postgres.database, config.postgres.schema, total
        );
        return Ok(());
    }

    print_table_colored(
        &["TABLE", "SNAPSHOT DIR"],
        entries
            .iter()
            .map(|e| match (&e.snapshot_dir, &e.error) {
                (Some(dir), _) => {
                    vec![(e.table.clone(), None), (dir.display().to_string(), None)]
                }
                (None, error) => vec![
                    (e.table.clone(), Some(Color::Red)),
                    (error.clone().unwrap_or_default(), Some(Color::Red)),
                ],
            })
            .collect(),
    );
    println!("{} of {} base table(s) selected.", entries.len(), total);
    Ok(())
}
