//! Check command - verify an export could start
//!
//! Runs every setup step an export performs, without writing snapshots, and
//! reports each one. Later steps are skipped once one they depend on fails.

use crate::cli::output::{print_json, print_table_colored};
use anyhow::Result;
use comfy_table::Color;
use pgsnap::{AppConfig, PostgresSource, SnapshotSource};
use pgsnap_db::{ExtensionSource, Session};
use pgsnap_sinks::{ObjectSink, SnapshotLayout};
use serde::Serialize;
use std::process::ExitCode;

/// Arguments for the check command
#[derive(Debug, Default)]
pub struct CheckArgs {
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warn,
    Fail,
    Skipped,
}

impl CheckStatus {
    fn label(self) -> &'static str {
        match self {
            CheckStatus::Ok => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "skipped",
        }
    }

    fn color(self) -> Color {
        match self {
            CheckStatus::Ok => Color::Green,
            CheckStatus::Warn => Color::Yellow,
            CheckStatus::Fail => Color::Red,
            CheckStatus::Skipped => Color::DarkGrey,
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckResult {
    check: &'static str,
    status: CheckStatus,
    detail: String,
}

#[derive(Default)]
struct Checks {
    results: Vec<CheckResult>,
}

impl Checks {
    fn push(&mut self, check: &'static str, status: CheckStatus, detail: impl Into<String>) {
        self.results.push(CheckResult {
            check,
            status,
            detail: detail.into(),
        });
    }

    /// Record `result`, returning its value when it succeeded.
    fn record<T, E: std::fmt::Display>(
        &mut self,
        check: &'static str,
        result: Result<T, E>,
        detail: impl FnOnce(&T) -> String,
    ) -> Option<T> {
        match result {
            Ok(value) => {
                self.push(check, CheckStatus::Ok, detail(&value));
                Some(value)
            }
            Err(e) => {
                self.push(check, CheckStatus::Fail, e.to_string());
                None
            }
        }
    }

    fn skip(&mut self, check: &'static str) {
        self.push(check, CheckStatus::Skipped, "a previous check failed");
    }

    fn failed(&self) -> bool {
        self.results.iter().any(|r| r.status == CheckStatus::Fail)
    }
}

/// Execute the check command
pub fn run(args: CheckArgs, config: &AppConfig) -> Result<ExitCode> {
    let mut checks = Checks::default();

    checks.push(
        "config",
        CheckStatus::Ok,
        format!(
            "{}@{}:{}/{} schema {}",
            config.postgres.user,
            config.postgres.host,
            config.postgres.port,
            config.postgres.database,
            config.postgres.schema
        ),
    );

    let layout = SnapshotLayout::new(
        &config.mount_path,
        &config.postgres.instance,
        &config.postgres.database,
        &config.postgres.schema,
    );
    checks.record("layout", layout, |layout| {
        layout.schema_dir().display().to_string()
    });
    if config.mount_path.is_dir() {
        checks.push("mount", CheckStatus::Ok, config.mount_path.display().to_string());
    } else {
        checks.push(
            "mount",
            CheckStatus::Warn,
            format!("{} does not exist yet; it will be created", config.mount_path.display()),
        );
    }

    let extension = PostgresSource::extension_source(config);
    let extension_detail = match &extension {
        ExtensionSource::LocalFile(path) => format!("loaded from {}", path.display()),
        ExtensionSource::Repository => "loaded from the extension repository".to_string(),
    };
    let session = checks.record(
        "extension",
        Session::open_in_memory().and_then(|session| {
            session.install_postgres(&extension)?;
            Ok(session)
        }),
        |_| extension_detail,
    );

    let source = match session {
        Some(session) => {
            let attach = PostgresSource::attach_for(config);
            checks
                .record("attach", session.attach_postgres(&attach), |_| {
                    format!("{} (read-only)", config.postgres.database)
                })
                .map(|_| PostgresSource::new(session, attach))
        }
        None => {
            checks.skip("attach");
            None
        }
    };

    match &source {
        Some(source) => {
            checks.record("tables", source.list_tables(), |tables| {
                format!("{} base table(s) in {}", tables.len(), config.postgres.schema)
            });
        }
        None => checks.skip("tables"),
    }

    match &config.object_store {
        Some(store) => {
            let settings = store.to_settings();
            let bucket = ObjectSink::connect(&settings).and_then(|sink| sink.ensure_bucket());
            checks.record("bucket", bucket, |_| {
                format!("{} at {}", settings.bucket, settings.endpoint_url())
            });
        }
        None => checks.push("bucket", CheckStatus::Ok, "upload disabled (MINIO_ENABLED)"),
    }

    if args.json {
        print_json(&checks.results)?;
    } else {
        print_table_colored(
            &["CHECK", "STATUS", "DETAIL"],
            checks
                .results
                .iter()
                .map(|r| {
                    vec![
                        (r.check.to_string(), None),
                        (r.status.label().to_string(), Some(r.status.color())),
                        (r.detail.clone(), None),
                    ]
                })
                .collect(),
        );
        if checks.failed() {
            println!("Not ready: fix the failed checks above.");
        } else {
            println!("Ready to export.");
        }
    }

    Ok(if checks.failed() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}
