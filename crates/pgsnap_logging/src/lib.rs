//! Tracing setup for the pgsnap binary.
//!
//! Two sinks: a size-capped log file under `$PGSNAP_HOME/logs` that keeps the
//! full `RUST_LOG` filter, and stderr, which only shows warnings unless
//! `--verbose` is given. stdout is left alone for reports and JSON.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "pgsnap=info,pgsnap_db=info,pgsnap_sinks=info";
const QUIET_CONSOLE_FILTER: &str = "warn";

/// Segments kept per app: `<app>.log` plus `<app>.log.1` .. `<app>.log.4`.
const KEEP_SEGMENTS: usize = 5;
const SEGMENT_BYTES: u64 = 10 * 1024 * 1024;

pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
}

/// Install the global subscriber.
///
/// If the log directory cannot be used (read-only container filesystem, no
/// home directory) logging falls back to stderr alone rather than failing.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let file_layer = match open_log_file(config.app_name) {
        Ok(log) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log))
                .with_filter(filter()),
        ),
        Err(err) => {
            eprintln!("Warning: file logging disabled: {:#}", err);
            None
        }
    };

    let console_filter = if config.verbose {
        filter()
    } else {
        EnvFilter::new(QUIET_CONSOLE_FILTER)
    };
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")
}

/// `$PGSNAP_HOME`, else `~/.pgsnap`.
pub fn pgsnap_home() -> Option<PathBuf> {
    match std::env::var_os("PGSNAP_HOME") {
        Some(home) if !home.is_empty() => Some(PathBuf::from(home)),
        _ => dirs::home_dir().map(|home| home.join(".pgsnap")),
    }
}

pub fn logs_dir() -> Option<PathBuf> {
    pgsnap_home().map(|home| home.join("logs"))
}

fn open_log_file(app_name: &str) -> Result<SegmentedLog> {
    let dir = logs_dir().context("Could not determine home directory (set PGSNAP_HOME)")?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    SegmentedLog::open(&dir, app_name, KEEP_SEGMENTS, SEGMENT_BYTES)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))
}

/// Append-only log file that shifts itself to `.1`, `.2`, ... once it
/// reaches `limit` bytes, dropping the oldest beyond `keep` segments.
struct SegmentedLog {
    active: PathBuf,
    keep: usize,
    limit: u64,
    file: File,
    written: u64,
}

impl SegmentedLog {
    fn open(dir: &Path, app_name: &str, keep: usize, limit: u64) -> io::Result<Self> {
        let stem: String = app_name
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
                _ => '_',
            })
            .collect();
        let active = dir.join(format!("{}.log", stem));
        let (file, written) = append_to(&active)?;
        let mut log = Self {
            active,
            keep: keep.max(1),
            limit,
            file,
            written,
        };
        if log.written >= log.limit {
            log.roll()?;
        }
        Ok(log)
    }

    fn segment(&self, n: usize) -> PathBuf {
        let mut name = self.active.clone().into_os_string();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;

        // Walk oldest to newest so each rename lands on a free name
        for n in (1..self.keep).rev() {
            let from = if n == 1 {
                self.active.clone()
            } else {
                self.segment(n - 1)
            };
            let to = self.segment(n);
            match fs::rename(&from, &to) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        if self.keep == 1 {
            fs::remove_file(&self.active).or_else(|e| match e.kind() {
                io::ErrorKind::NotFound => Ok(()),
                _ => Err(e),
            })?;
        }

        let (file, written) = append_to(&self.active)?;
        self.file = file;
        self.written = written;
        Ok(())
    }
}

fn append_to(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

impl Write for SegmentedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.limit {
            self.roll()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
