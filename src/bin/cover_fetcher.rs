use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use cover_fetcher::app::{App, RunOptions};
use cover_fetcher::config::{ConfigLoader, ConfigOverrides};
use cover_fetcher::error::CoverError;
use cover_fetcher::fetcher::ReqwestCatalogHttp;
use cover_fetcher::output::{ConsoleOutput, JsonOutput, OutputMode};
use cover_fetcher::page::HtmlPageResolver;
use cover_fetcher::store::FsCoverStore;

#[derive(Parser)]
#[command(name = "cover-fetcher")]
#[command(about = "Download missing cover images for the videos under a directory tree")]
#[command(version, author)]
struct Cli {
    /// Root directory to scan (overrides `root` in the config file)
    root: Option<PathBuf>,

    /// Path to a JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Forward proxy, e.g. socks5h://127.0.0.1:7897
    #[arg(long)]
    proxy: Option<String>,

    /// Maximum number of covers downloaded at the same time
    #[arg(long, short = 'j')]
    concurrency: Option<usize>,

    /// Attempts per HTTP request before giving up
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Only list the videos that need a cover
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CoverError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CoverError) -> u8 {
    match error {
        CoverError::PathNotFound(_)
        | CoverError::ConfigRead(_)
        | CoverError::ConfigParse(_)
        | CoverError::InvalidConfig(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Console
    };

    let overrides = ConfigOverrides {
        root: cli.root,
        proxy: cli.proxy,
        concurrency: cli.concurrency,
        max_attempts: cli.max_attempts,
    };
    let settings = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;
    let http = ReqwestCatalogHttp::new(settings.proxy.as_deref())?;
    let app = App::new(settings, http, HtmlPageResolver::new(), FsCoverStore::new());
    let options = RunOptions {
        dry_run: cli.dry_run,
    };

    match output_mode {
        OutputMode::Json => {
            let summary = app.run(options, Arc::new(JsonOutput))?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
        OutputMode::Console => {
            let console = ConsoleOutput::new(std::io::stdout().is_terminal());
            let summary = app.run(options, Arc::new(console))?;
            console.print_summary(&summary).into_diagnostic()?;
        }
    }
    Ok(())
}
