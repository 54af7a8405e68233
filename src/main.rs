use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use manifest_dl::{
    Config, Downloader, Error, HttpConfig, ProgressReporter, Result, RetryConfig, RunSummary,
    filter, manifest, shutdown_on_signal,
};

#[derive(Debug, Parser)]
#[command(
    name = "manifest-dl",
    version,
    about = "Download the images listed in one or more JSON manifests"
)]
#[command(long_about = r"

Download the images listed in one or more JSON manifests.

Each manifest holds an `images` array of records with `filename` and
`unsplash_url` fields. Every image is written to <OUTPUT_ROOT>/<filename>.

Examples:

manifest-dl --json train.json val.json --skip-exist
manifest-dl --json test.json --output-root ./images --concurrency 16

")]
struct Cli {
    /// Manifest files to read
    #[arg(
        long = "json",
        visible_alias = "manifests",
        value_name = "PATH",
        num_args = 1..,
        required = true
    )]
    manifests: Vec<PathBuf>,

    /// Directory the images are written to
    #[arg(long, value_name = "DIR", default_value = "./data/sqhy_data/intent_resize")]
    output_root: PathBuf,

    /// Skip images whose destination file already exists
    #[arg(long = "skip-exist", visible_alias = "skip-existing")]
    skip_existing: bool,

    /// Maximum number of simultaneous downloads
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..))]
    concurrency: u64,

    /// Attempts per image before giving up
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    retries: u32,

    /// Base backoff in milliseconds, multiplied by the attempt number
    #[arg(long, value_name = "MS", default_value_t = 200)]
    backoff_ms: u64,

    /// Per-attempt request timeout in seconds
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 20,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout_secs: u64,

    /// Randomize backoff delays
    #[arg(long)]
    jitter: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            manifests: self.manifests.clone(),
            output_root: self.output_root.clone(),
            skip_existing: self.skip_existing,
            concurrency: usize::try_from(self.concurrency).unwrap_or(usize::MAX),
            retry: RetryConfig {
                max_attempts: self.retries,
                base_delay: Duration::from_millis(self.backoff_ms),
                jitter: self.jitter,
            },
            http: HttpConfig {
                request_timeout: Duration::from_secs(self.timeout_secs),
                ..HttpConfig::default()
            },
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Pre-run line; `records` counts every manifest record, malformed ones included
fn plan_line(records: usize, pending: usize, skipped: usize) -> String {
    format!("Total: {records} | To download: {pending} | Skipped: {skipped}")
}

async fn run(config: Config, show_progress: bool) -> Result<RunSummary> {
    config.validate()?;
    tokio::fs::create_dir_all(&config.output_root).await?;

    let list = manifest::load_tasks(&config.manifests, &config.output_root).await?;
    for path in &list.missing {
        println!("Error: {}", Error::ManifestNotFound(path.clone()));
    }
    let list = list.ensure_loaded()?;

    let records = list.records;
    let (pending, skipped) = filter::partition(list.tasks, config.skip_existing);
    println!("{}", plan_line(records, pending.len(), skipped));

    let downloader = Downloader::new(config)?;
    let reporter = ProgressReporter::new(pending.len() as u64, show_progress);
    let failures = reporter.failure_printer();
    let progress = reporter.spawn(downloader.subscribe());
    let signals = tokio::spawn(shutdown_on_signal(downloader.clone()));

    let summary = downloader
        .execute_with(pending, skipped, |outcome| {
            failures.report(outcome);
        })
        .await;

    signals.abort();
    if let Err(e) = progress.await {
        tracing::warn!(error = %e, "Progress reporter stopped unexpectedly");
    }

    println!("\n{summary}");
    Ok(summary)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli.config(), !cli.no_progress).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
