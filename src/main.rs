//! Page-Harvest main entry point
//!
//! This is the command-line interface for the Page-Harvest bulk page fetcher.

use anyhow::Context;
use clap::Parser;
use page_harvest::config::{load_config, Config};
use page_harvest::{BatchOutcome, FetchOutcome, Harvester};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Page-Harvest: a polite bulk page fetcher
///
/// Fetches every URL concurrently, respects robots.txt, retries transient
/// failures with exponential backoff and prints the readable content of each
/// page as markdown.
#[derive(Parser, Debug)]
#[command(name = "page-harvest")]
#[command(version)]
#[command(about = "A polite bulk page fetcher", long_about = None)]
struct Cli {
    /// URLs to fetch
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Attempts per URL, overriding the configuration
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Print the whole batch outcome as JSON
    #[arg(long)]
    json: bool,

    /// Validate config and show what would be fetched without fetching
    #[arg(long, conflicts_with = "json")]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    if cli.dry_run {
        handle_dry_run(&config, &cli);
        return Ok(ExitCode::SUCCESS);
    }

    let harvester = Harvester::from_config(&config).context("failed to set up crawler")?;
    let batch = harvester.fetch_all(&cli.urls, cli.max_retries).await;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&batch).context("failed to serialize batch outcome")?
        );
    } else {
        print_batch(&batch);
    }

    if batch.overall_success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr; stdout carries only fetched content.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("page_harvest=warn,warn"),
            1 => EnvFilter::new("page_harvest=info,warn"),
            2 => EnvFilter::new("page_harvest=debug,info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration and URLs
fn handle_dry_run(config: &Config, cli: &Cli) {
    println!("=== Dry Run Mode ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Max retries: {}",
        cli.max_retries.unwrap_or(config.crawler.max_retries)
    );
    println!(
        "  Backoff: {}ms base, {}ms ceiling",
        config.crawler.base_delay_ms, config.crawler.max_delay_ms
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    match config.crawler.overall_timeout_secs {
        Some(secs) => println!("  Overall timeout: {}s", secs),
        None => println!("  Overall timeout: none"),
    }

    println!("\nUser Agent:");
    println!("  Header: {}", config.user_agent.header_value());
    println!("  robots.txt agent: {}", config.user_agent.robots_agent);

    println!("\nCache:");
    println!("  Backend: {:?}", config.cache.backend);
    if let Some(path) = &config.cache.database_path {
        println!("  Database: {}", path.display());
    }
    println!("  TTL: {}s", config.cache.ttl_secs);

    println!("\nURLs ({}):", cli.urls.len());
    for url in &cli.urls {
        println!("  - {}", url);
    }
}

/// Prints each URL with its content or failure reason
fn print_batch(batch: &BatchOutcome) {
    for entry in &batch.per_url {
        println!("=== {} ===\n", entry.url);
        match &entry.outcome {
            FetchOutcome::Success { content } => println!("{}\n", content),
            FetchOutcome::Failure { reason } => println!("Error: {}\n", reason),
        }
    }

    if let Some(error) = &batch.aggregate_error {
        eprintln!("{}", error);
    }
}
