//! Output formatting utilities for CLI commands
//!
//! Human-readable progress goes to stdout through `Console`, which is muted in
//! `--json` mode so stdout carries exactly one JSON document.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt::{self, Display, Write as _};
use std::io::{self, Write};
use std::rc::Rc;

/// Line-oriented progress printer.
///
/// A step is printed as `label...` and finished on the same line, so a hung
/// connection shows where it hangs.
#[derive(Debug, Clone)]
pub struct Console {
    enabled: bool,
    /// Collects output instead of stdout when set
    capture: Option<Rc<RefCell<String>>>,
}

impl Console {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            capture: None,
        }
    }

    /// An enabled console that writes into the returned buffer.
    #[cfg(test)]
    pub fn capturing() -> (Self, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        let console = Self {
            enabled: true,
            capture: Some(Rc::clone(&buffer)),
        };
        (console, buffer)
    }

    fn emit(&self, text: fmt::Arguments<'_>) {
        if !self.enabled {
            return;
        }
        match &self.capture {
            Some(buffer) => {
                let _ = buffer.borrow_mut().write_fmt(text);
            }
            None => {
                print!("{}", text);
                let _ = io::stdout().flush();
            }
        }
    }

    /// Start a line: `label...`
    pub fn begin(&self, label: impl Display) {
        self.emit(format_args!("{}...", label));
    }

    /// Continue the current line.
    pub fn append(&self, text: impl Display) {
        self.emit(format_args!(" {}", text));
    }

    /// Finish the current line.
    pub fn end(&self, text: impl Display) {
        self.emit(format_args!(" {}\n", text));
    }

    pub fn line(&self, text: impl Display) {
        self.emit(format_args!("{}\n", text));
    }

    /// Run `f` as a named step, finishing the line with its result.
    pub fn step<T, E>(&self, label: impl Display, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        self.begin(label);
        let result = f();
        match &result {
            Ok(_) => self.end("done."),
            Err(_) => self.end("failed."),
        }
        result
    }
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a table, coloring the cells that carry a color
pub fn print_table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        let cells: Vec<Cell> = row
            .into_iter()
            .map(|(text, color)| match color {
                Some(c) => Cell::new(text).fg(c),
                None => Cell::new(text),
            })
            .collect();
        table.add_row(cells);
    }

    println!("{}", table);
}

/// `1.234` -> `1.23`, the precision the per-table line has always used.
pub fn format_seconds(secs: f64) -> String {
    format!("{:.2}", secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "0.00");
        assert_eq!(format_seconds(1.234), "1.23");
        assert_eq!(format_seconds(12.5), "12.50");
    }

    #[test]
    fn test_step_passes_result_through() {
        let console = Console::new(false);
        let ok: Result<u8, String> = console.step("Loading", || Ok(7));
        assert_eq!(ok, Ok(7));
        let err: Result<u8, String> = console.step("Loading", || Err("boom".to_string()));
        assert_eq!(err, Err("boom".to_string()));
    }

    #[test]
    fn test_step_lines_are_captured() {
        let (console, buffer) = Console::capturing();
        let _: Result<(), ()> = console.step("Attaching", || Ok(()));
        console.line("Database exported successfully.");
        assert_eq!(
            buffer.borrow().as_str(),
            "Attaching... done.\nDatabase exported successfully.\n"
        );
    }

    #[test]
    fn test_disabled_console_captures_nothing() {
        let (mut console, buffer) = Console::capturing();
        console.enabled = false;
        console.line("hidden");
        assert!(buffer.borrow().is_empty());
    }
}
