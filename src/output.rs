use std::io::{self, BufRead, Write};

use serde::Serialize;

use crate::app::{DownloadReport, ProgressEvent, ProgressSink, SearchResult};
use crate::error::IcaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

pub const CONFIRM_PROMPT: &str = "Download these files? (y/N): ";

pub fn render_selection<W: Write>(out: &mut W, result: &SearchResult) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "There are {} matching files:", result.selection.len())?;
    for file in &result.selection {
        if result.run_filtered {
            writeln!(out, "- {} (run {})", file.name, file.run_id)?;
        } else {
            writeln!(out, "- {}", file.name)?;
        }
    }
    Ok(())
}

pub fn render_no_matches<W: Write>(out: &mut W, result: &SearchResult) -> io::Result<()> {
    let extensions = result.extensions.iter().collect::<Vec<_>>().join(", ");
    writeln!(
        out,
        "No files found matching extensions: {extensions} ({} listed)",
        result.listed
    )
}

pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

pub fn confirm<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<bool, IcaError> {
    write!(out, "\n{CONFIRM_PROMPT}").map_err(|err| IcaError::Console(err.to_string()))?;
    out.flush()
        .map_err(|err| IcaError::Console(err.to_string()))?;
    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .map_err(|err| IcaError::Console(err.to_string()))?;
    Ok(is_affirmative(&answer))
}

pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_report(report: &DownloadReport) -> io::Result<()> {
        let mut stdout = io::stdout();
        writeln!(
            stdout,
            "\nDownloaded {} files from project {}",
            report.items.len(),
            report.project_id
        )
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Starting {
                index,
                total,
                name,
                run_id,
            } => match run_id {
                Some(run) => println!("\nDownloading [{index}/{total}]: {name} (run {run})"),
                None => println!("\nDownloading [{index}/{total}]: {name}"),
            },
            ProgressEvent::Finished { name, elapsed } => {
                println!("  {name} done in {:.1}s", elapsed.as_secs_f64())
            }
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_search(result: &SearchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_report(report: &DownloadReport) -> io::Result<()> {
        Self::print_json(report)
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
    fn event(&self, _event: ProgressEvent) {}
}
