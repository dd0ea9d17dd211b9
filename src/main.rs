//! seo-crawl main entry point
//!
//! Command-line interface that runs one crawl job from a TOML configuration
//! and writes the outcome as JSON.

use anyhow::Context;
use clap::Parser;
use seo_crawl_engine::config::{load_config_with_hash, CrawlConfig, CrawlMode};
use seo_crawl_engine::output::generate_markdown_summary;
use seo_crawl_engine::robots::RobotsTxtRules;
use seo_crawl_engine::{CrawlJob, CrawlOutcome, JobStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// seo-crawl: a bounded, polite site crawler
///
/// Crawls a single site up to the configured depth and page limits, optionally
/// rendering JavaScript in a headless browser, and reports the SEO structure
/// of every page it fetched.
#[derive(Parser, Debug)]
#[command(name = "seo-crawl")]
#[command(version)]
#[command(about = "A bounded, polite SEO site crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Write the JSON outcome to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Pretty-print the JSON outcome
    #[arg(long)]
    pretty: bool,

    /// Also write a markdown summary of the run to this file
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// robots.txt file to enforce when respect-robots is on
    #[arg(long, value_name = "PATH")]
    robots_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &config_hash);
        return Ok(());
    }

    let outcome = handle_crawl(config, &cli).await?;
    write_outcome(&outcome, cli.output.as_deref(), cli.pretty)?;

    if let Some(path) = &cli.summary {
        generate_markdown_summary(&outcome.snapshot, &outcome.result, path)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        tracing::info!("Summary written to {}", path.display());
    }

    if outcome.snapshot.status == JobStatus::Failed {
        anyhow::bail!(
            "crawl failed: {}",
            outcome
                .snapshot
                .error_message
                .as_deref()
                .unwrap_or("unknown error")
        );
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("seo_crawl_engine=info,seo_crawl=info,warn"),
            1 => EnvFilter::new("seo_crawl_engine=debug,seo_crawl=debug,info"),
            2 => EnvFilter::new("seo_crawl_engine=trace,seo_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so the JSON outcome can be piped from stdout
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &CrawlConfig, config_hash: &str) {
    let crawl = &config.crawl;

    println!("=== seo-crawl Dry Run ===\n");
    println!("Config hash: {}\n", config_hash);

    println!("Crawl:");
    println!("  Start URL: {}", crawl.start_url);
    println!("  Mode: {}", crawl.mode);
    println!("  Max depth: {}", crawl.max_depth);
    println!("  Max pages: {}", crawl.max_pages);
    println!("  Concurrency: {}", crawl.concurrency_limit);
    println!("  Politeness delay: {}s", crawl.politeness_delay_seconds);
    println!("  User agent: {}", crawl.user_agent);
    println!("  Respect robots: {}", crawl.respect_robots);
    println!("  Timeout: {}s", crawl.timeout_seconds);
    if let Some(limit) = crawl.max_links_per_page {
        println!("  Links followed per page: {}", limit);
    }

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {}ms .. {}ms",
        config.retry.initial_backoff_ms, config.retry.max_backoff_ms
    );

    if crawl.mode == CrawlMode::Rendered {
        let rendered = &config.rendered;
        println!("\nRendering:");
        println!("  Headless: {}", rendered.headless);
        println!(
            "  Viewport: {}x{}",
            rendered.viewport.width, rendered.viewport.height
        );
        println!("  Wait until: {:?}", rendered.wait_until);
        println!("  Timeout: {}ms", rendered.timeout_ms);
        println!("  Settle: {}ms", rendered.settle_ms);
        println!("  Blocked resources: {:?}", rendered.blocked_resource_types);
        if rendered.capture_screenshot {
            println!("  Screenshots: {:?}", rendered.screenshot_type);
        }
        if let Some(selector) = &rendered.wait_for_selector {
            println!("  Wait for selector: {}", selector);
        }
    }

    println!("\n=== Dry run complete. Configuration is valid. ===");
}

/// Runs the job, cancelling it on Ctrl-C
async fn handle_crawl(config: CrawlConfig, cli: &Cli) -> anyhow::Result<CrawlOutcome> {
    let mut job = CrawlJob::new(config).context("Invalid crawl configuration")?;

    if let Some(path) = &cli.robots_file {
        let rules = RobotsTxtRules::from_file(path, &job.config().crawl.user_agent)
            .with_context(|| format!("Failed to read robots rules from {}", path.display()))?;
        tracing::info!("Enforcing robots rules from {}", path.display());
        job = job.with_robots(Arc::new(rules));
    }

    let handle = job.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling crawl");
            handle.cancel();
        }
    });

    let outcome = job.run().await;
    let snapshot = &outcome.snapshot;
    tracing::info!(
        "Crawl {}: {} crawled, {} failed, {} discovered, {} links",
        snapshot.status,
        snapshot.pages_crawled,
        snapshot.pages_failed,
        snapshot.pages_discovered,
        snapshot.links_found
    );

    Ok(outcome)
}

fn write_outcome(outcome: &CrawlOutcome, path: Option<&Path>, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(outcome)?
    } else {
        serde_json::to_string(outcome)?
    };

    match path {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            tracing::info!("Outcome written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
