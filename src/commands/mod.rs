//! CLI command implementations.

pub mod sync;

use colored::Colorize;
use reconcile::{ChangeEvent, ChangeRecord, DiagnosticSink};

/// Sink that renders change records to the terminal as they happen.
///
/// Converged and unmanaged entries go to the debug log (or, at `-vv`,
/// straight to the terminal); everything that changes (or would change)
/// remote state is printed.
pub struct ConsoleSink {
    quiet: bool,
    verbose: u8,
}

impl ConsoleSink {
    pub fn new(quiet: bool, verbose: u8) -> Self {
        Self { quiet, verbose }
    }

    fn show_unchanged(&self) -> bool {
        !self.quiet && self.verbose >= 2
    }
}

impl DiagnosticSink for ConsoleSink {
    fn record(&mut self, record: ChangeRecord) {
        match &record.event {
            ChangeEvent::Unchanged { value: Some(v) } => {
                if self.show_unchanged() {
                    println!("  {} {}: {} (up to date)", "=".dimmed(), record.path, v);
                } else {
                    log::debug!("{}: {} (up to date)", record.path, v);
                }
            }
            ChangeEvent::Unchanged { value: None } => {
                if self.show_unchanged() {
                    println!("  {} {} (up to date)", "=".dimmed(), record.path);
                } else {
                    log::debug!("{} (up to date)", record.path);
                }
            }
            ChangeEvent::Unmanaged => log::debug!("{}: (unmanaged)", record.path),
            ChangeEvent::Changed { from, to } => {
                if !self.quiet {
                    println!("  {} {}: {} -> {}", "~".yellow().bold(), record.path, from, to);
                }
            }
            ChangeEvent::Created => {
                if !self.quiet {
                    println!("  {} {}", "+".green().bold(), record.path);
                }
            }
            ChangeEvent::Deleted => {
                if !self.quiet {
                    println!("  {} {}", "-".red().bold(), record.path);
                }
            }
        }
    }
}
