//! Villa-Sweep main entry point
//!
//! This is the command-line interface for the Villa-Sweep listing harvester.

use anyhow::{anyhow, Context};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use villa_sweep::config::{apply_overrides, load_config_with_hash, Config, ConfigOverrides};
use villa_sweep::output::print_summary;
use villa_sweep::run_sweep;
use villa_sweep::url::SearchTemplate;

/// Villa-Sweep: a polite property-listing harvester
///
/// Villa-Sweep walks every page of a listing site's search results, fetches
/// each listing with bounded concurrency, and writes the extracted records
/// to CSV and XLSX, checkpointing as it goes.
#[derive(Parser, Debug)]
#[command(name = "villa-sweep")]
#[command(version)]
#[command(about = "A polite property-listing harvester", long_about = None)]
struct Cli {
    /// Search-results URL; `{page}` is replaced by the page number
    #[arg(value_name = "SEARCH_URL")]
    search_url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Visit at most this many search pages
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Requests in flight at once
    #[arg(long, value_name = "N")]
    max_concurrent: Option<u32>,

    /// Minimum seconds between request launches
    #[arg(long, value_name = "SECS")]
    delay: Option<f64>,

    /// Work items queued per batch
    #[arg(long, value_name = "N")]
    batch_size: Option<u32>,

    /// Records between checkpoints
    #[arg(long, value_name = "N")]
    checkpoint_interval: Option<u32>,

    /// Prefix for the CSV, XLSX and checkpoint files
    #[arg(long, value_name = "PREFIX")]
    output_prefix: Option<String>,

    /// Reuse complete records from the previous checkpoint
    #[arg(long)]
    resume: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            search_url: self.search_url.clone(),
            max_pages: self.max_pages,
            max_concurrent: self.max_concurrent,
            delay_seconds: self.delay,
            batch_size: self.batch_size,
            checkpoint_interval: self.checkpoint_interval,
            output_prefix: self.output_prefix.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration first: it names the log file
    let (config, config_hash) = match &cli.config {
        Some(path) => {
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };
    let config =
        apply_overrides(config, cli.overrides()).context("Invalid command-line options")?;

    setup_logging(cli.verbose, cli.quiet, &config.output.log_path);

    match (&cli.config, &config_hash) {
        (Some(path), Some(hash)) => tracing::info!(
            "Configuration loaded from {} (hash: {})",
            path.display(),
            hash
        ),
        _ => tracing::info!("Using built-in configuration defaults"),
    }

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else {
        handle_sweep(config, cli.resume).await?;
    }

    Ok(())
}

/// Sets up logging to stdout and to the run log file
fn setup_logging(verbose: u8, quiet: bool, log_path: &str) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("villa_sweep=info,warn"),
            1 => EnvFilter::new("villa_sweep=debug,info"),
            2 => EnvFilter::new("villa_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let (file_layer, file_error) = match OpenOptions::new().create(true).append(true).open(log_path)
    {
        Ok(file) => {
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file));
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        tracing::warn!("Could not open log file {}: {}; logging to stdout only", log_path, e);
    }
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Villa-Sweep Dry Run ===\n");

    let search_url = config
        .crawler
        .search_url
        .as_deref()
        .ok_or_else(|| anyhow!("No search URL given (pass SEARCH_URL or set crawler.search-url)"))?;
    let search = SearchTemplate::new(search_url, &config.crawler.page_param)?;

    println!("Search:");
    println!("  Template: {}", search.as_str());
    println!("  First page: {}", search.page_url(1)?);
    match config.crawler.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: all"),
    }

    println!("\nCrawler Configuration:");
    println!("  Max concurrent requests: {}", config.crawler.max_concurrent);
    println!("  Delay between requests: {}s", config.crawler.delay_seconds);
    println!("  Batch size: {}", config.crawler.batch_size);
    println!("  Checkpoint interval: {}", config.crawler.checkpoint_interval);

    println!("\nFetcher:");
    println!("  Timeout: {}s", config.fetcher.timeout_seconds);
    println!("  Max retries: {}", config.fetcher.max_retries);
    println!("  Backoff: {:?}", config.fetcher.backoff);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  CSV: {}", config.output.csv_path);
    println!("  XLSX: {}", config.output.xlsx_path);
    println!("  Checkpoint: {}", config.output.checkpoint_path);
    println!("  Log: {}", config.output.log_path);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main sweep, cancelling it on Ctrl-C
async fn handle_sweep(config: Config, resume: bool) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight requests");
            interrupt.cancel();
        }
    });

    if resume {
        tracing::info!("Resuming from checkpoint {}", config.output.checkpoint_path);
    }

    match run_sweep(config, cancel, resume).await {
        Ok(summary) => {
            if !summary.cancelled {
                tracing::info!("Sweep completed successfully");
            }
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Sweep failed: {}", e);
            Err(e.into())
        }
    }
}
