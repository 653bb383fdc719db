use std::io::Write;

use pagedeck_core::{Status, StatusSink};

/// Prints run status lines to stdout.
pub struct TerminalStatus;

impl StatusSink for TerminalStatus {
    fn report(&self, status: &Status) {
        let line = format_status(status);
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

fn format_status(status: &Status) -> String {
    let marker = match status {
        Status::ReadingPage | Status::GeneratingCards | Status::ImportingCards(_) => "..",
        Status::Finished(outcome) if outcome.failed() > 0 => "!!",
        Status::Finished(_) => "ok",
        Status::Failed(_) => "xx",
    };
    format!("[{marker}] {status}")
}
