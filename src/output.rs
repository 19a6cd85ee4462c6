use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressLevel, ProgressSink, RunSummary};

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Console,
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct ConsoleOutput {
    color: bool,
}

impl ConsoleOutput {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn print_summary(&self, summary: &RunSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        self.write_summary(&mut stdout, summary)
    }

    pub fn write_summary<W: Write>(&self, out: &mut W, summary: &RunSummary) -> io::Result<()> {
        let report = &summary.report;
        writeln!(out)?;
        writeln!(out, "{}", "=".repeat(50))?;
        if summary.dry_run {
            writeln!(
                out,
                "{}dry run: {} cover(s) would be fetched{}",
                self.paint(CYAN),
                summary.discovered.len(),
                self.paint(RESET)
            )?;
            return Ok(());
        }
        writeln!(
            out,
            "{}run complete: {} cover(s) downloaded, {} failed{}",
            self.paint(CYAN),
            report.success_count,
            report.failure_count,
            self.paint(RESET)
        )?;
        if !report.failures.is_empty() {
            writeln!(out, "{}failed downloads:{}", self.paint(YELLOW), self.paint(RESET))?;
            for failure in &report.failures {
                writeln!(
                    out,
                    "{}{} - error: {}{}",
                    self.paint(RED),
                    failure.identifier,
                    failure.error,
                    self.paint(RESET)
                )?;
            }
        }
        Ok(())
    }

    fn paint(&self, code: &'static str) -> &'static str {
        if self.color { code } else { "" }
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        let color = match event.level {
            ProgressLevel::Info => "",
            ProgressLevel::Success => GREEN,
            ProgressLevel::Failure => RED,
        };
        let elapsed = event
            .elapsed
            .map(|elapsed| format!(" ({:.1}s)", elapsed.as_secs_f64()))
            .unwrap_or_default();
        let reset = if color.is_empty() { "" } else { RESET };
        // A closed stdout (e.g. piped into `head`) must not stop the run.
        let _ = writeln!(
            io::stdout().lock(),
            "{}{}{elapsed}{}",
            self.paint(color),
            event.message,
            self.paint(reset)
        );
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, event: ProgressEvent) {
        if event.level == ProgressLevel::Failure {
            let _ = writeln!(io::stderr().lock(), "{}", event.message);
        }
    }
}
