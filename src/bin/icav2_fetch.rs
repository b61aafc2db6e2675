use std::io::{self, Write};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use icav2_fetch::app::{App, Outcome, ProgressSink, SearchRequest};
use icav2_fetch::config::{ConfigLoader, ConfigOverrides};
use icav2_fetch::domain::ProjectId;
use icav2_fetch::matching::{ExtensionSet, RunFilter};
use icav2_fetch::output::{
    ConsoleOutput, JsonOutput, OutputMode, render_no_matches, render_selection,
};

#[derive(Parser)]
#[command(name = "icav2-fetch")]
#[command(about = "Select project data in an ICA workspace by name, extension and run, then download it")]
#[command(version, author)]
struct Cli {
    /// Project scope passed to every icav2 call
    project_id: String,

    /// Fuzzy file-name search terms (OR'd together)
    #[arg(required = true, num_args = 1..)]
    file_patterns: Vec<String>,

    /// Extensions to keep, e.g. bam .vcf.gz CRAM
    #[arg(long, required = true, num_args = 1..)]
    extensions: Vec<String>,

    /// Run identifier prefixes; files outside these runs are skipped
    #[arg(long, num_args = 1..)]
    runs: Vec<String>,

    #[arg(long)]
    config: Option<String>,

    /// Path to the icav2 client
    #[arg(long)]
    executable: Option<Utf8PathBuf>,

    /// Directory downloads are written to
    #[arg(long)]
    target_dir: Option<Utf8PathBuf>,

    /// Kill any icav2 call running longer than this (0 = no limit)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Show the matching files without downloading
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("Error: {report}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let project: ProjectId = cli.project_id.parse().into_diagnostic()?;
    let overrides = ConfigOverrides {
        executable: cli.executable,
        timeout_secs: cli.timeout_secs,
        target_dir: cli.target_dir,
    };
    let config = ConfigLoader::resolve(cli.config.as_deref(), overrides).into_diagnostic()?;

    let app = App::new(config.workspace());
    let request = SearchRequest {
        patterns: cli.file_patterns,
        extensions: ExtensionSet::from_raw(&cli.extensions),
        runs: RunFilter::from_runs(&cli.runs),
    };

    if cli.dry_run {
        let result = app.search(&project, &request).into_diagnostic()?;
        return match output_mode {
            OutputMode::Json => JsonOutput::print_search(&result).into_diagnostic(),
            OutputMode::Text if result.selection.is_empty() => {
                render_no_matches(&mut io::stdout(), &result).into_diagnostic()
            }
            OutputMode::Text => render_selection(&mut io::stdout(), &result).into_diagnostic(),
        };
    }

    // Keep stdout clean for the JSON document.
    let (mut prompt_out, sink): (Box<dyn Write>, &dyn ProgressSink) = match output_mode {
        OutputMode::Json => (
            Box::new(io::stderr()) as Box<dyn Write>,
            &JsonOutput as &dyn ProgressSink,
        ),
        OutputMode::Text => (
            Box::new(io::stdout()) as Box<dyn Write>,
            &ConsoleOutput as &dyn ProgressSink,
        ),
    };
    let outcome = app
        .run(
            &project,
            &request,
            &mut io::stdin().lock(),
            &mut prompt_out,
            sink,
        )
        .into_diagnostic()?;

    match (outcome, output_mode) {
        (Outcome::NoMatches(result), OutputMode::Json) => {
            JsonOutput::print_search(&result).into_diagnostic()
        }
        (Outcome::NoMatches(result), OutputMode::Text) => {
            render_no_matches(&mut io::stdout(), &result).into_diagnostic()
        }
        (Outcome::Cancelled(_), _) => Ok(()),
        (Outcome::Downloaded(report), OutputMode::Json) => {
            JsonOutput::print_report(&report).into_diagnostic()
        }
        (Outcome::Downloaded(report), OutputMode::Text) => {
            ConsoleOutput::print_report(&report).into_diagnostic()
        }
    }
}
