//! tenacious-fetch main entry point
//!
//! Command-line front end for the resilient fetch engine.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tenacious_fetch::config::{load_config_with_hash, Config};
use tenacious_fetch::fetcher::{DelayRange, HttpTransport};
use tenacious_fetch::output::sanitize_label;
use tenacious_fetch::proxy::ProxyPool;
use tenacious_fetch::{FetchOutcome, FetchRequest, Fetcher, ReqwestTransport, Session};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

/// tenacious-fetch: fetch pages through rotating proxies and identities
///
/// Each URL is fetched with retries, jittered backoff, robots.txt compliance,
/// and block/CAPTCHA detection. One summary line is printed per URL.
#[derive(Parser, Debug)]
#[command(name = "tenacious-fetch")]
#[command(version = "1.0.0")]
#[command(about = "A resilient HTTP fetcher for scrapers", long_about = None)]
struct Cli {
    /// URLs to fetch
    #[arg(value_name = "URL", required_unless_present = "discover_proxies")]
    urls: Vec<String>,

    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the attempt budget per URL
    #[arg(long, value_name = "N")]
    attempts: Option<u32>,

    /// Maximum number of URLs fetched at once
    #[arg(long, value_name = "N", default_value_t = 4)]
    concurrency: usize,

    /// Write successful bodies into this directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Validate config and requests without fetching anything
    #[arg(long, conflicts_with = "discover_proxies")]
    dry_run: bool,

    /// Discover and validate proxies, print the working ones, and exit
    #[arg(long)]
    discover_proxies: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if let Some(attempts) = cli.attempts {
        config.fetch.max_attempts = attempts;
    }

    let requests = build_requests(&cli.urls, &config)?;

    if cli.dry_run {
        handle_dry_run(&config, &requests);
        return Ok(());
    }

    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new().context("Failed to build HTTP client")?);

    if cli.discover_proxies {
        return handle_discover_proxies(transport, config).await;
    }

    handle_fetch(transport, config, requests, cli.concurrency, cli.output.as_deref()).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tenacious_fetch=info,warn"),
            1 => EnvFilter::new("tenacious_fetch=debug,info"),
            2 => EnvFilter::new("tenacious_fetch=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn build_requests(urls: &[String], config: &Config) -> Result<Vec<FetchRequest>> {
    urls.iter()
        .map(|url| {
            FetchRequest::from_config(url, &config.fetch)
                .with_context(|| format!("Invalid request for {}", url))
        })
        .collect()
}

/// Handles the --dry-run mode: shows what would be fetched
fn handle_dry_run(config: &Config, requests: &[FetchRequest]) {
    println!("=== tenacious-fetch Dry Run ===\n");

    println!("Fetch:");
    println!("  Max attempts: {}", config.fetch.max_attempts);
    println!(
        "  Delay range: {:.1}s - {:.1}s",
        config.fetch.delay_min_secs, config.fetch.delay_max_secs
    );
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    if let Some(marker) = &config.fetch.expected_marker {
        println!("  Expected marker: {}", marker);
    }
    println!("  Warm-up pages: {}", config.fetch.warmup_urls.len());
    println!("  Pacing tiers: {}", config.fetch.pacing.len());

    println!("\nProxies:");
    if config.proxy.enabled {
        println!("  Sources ({}):", config.proxy.sources.len());
        for source in &config.proxy.sources {
            println!("    - {}", source);
        }
        println!("  Echo URL: {}", config.proxy.echo_url);
        println!("  Max proxies: {}", config.proxy.max_proxies);
        println!("  Strategy: {:?}", config.proxy.strategy);
    } else {
        println!("  Disabled (direct connections)");
    }

    println!("\nRobots.txt:");
    println!("  Respect: {}", config.robots.respect);
    println!("  Agent token: {}", config.robots.agent_token);
    println!("  Max crawl delay: {}s", config.robots.max_crawl_delay_secs);

    println!("\nDebug sink:");
    if config.debug.enabled {
        println!("  Directory: {}", config.debug.directory);
    } else {
        println!("  Disabled");
    }

    println!("\nURLs ({}):", requests.len());
    for request in requests {
        println!("  - {}", request.url());
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --discover-proxies mode: builds a pool and prints it
async fn handle_discover_proxies(transport: Arc<dyn HttpTransport>, mut config: Config) -> Result<()> {
    config.proxy.enabled = true;
    let pool = ProxyPool::build(transport, &config.proxy)
        .await
        .context("Failed to build proxy pool")?;

    println!("Working proxies ({}):", pool.len());
    for proxy in pool.iter() {
        println!("  {}", proxy);
    }

    Ok(())
}

/// Handles the main fetch operation
async fn handle_fetch(
    transport: Arc<dyn HttpTransport>,
    config: Config,
    requests: Vec<FetchRequest>,
    concurrency: usize,
    output: Option<&Path>,
) -> Result<()> {
    let session = Arc::new(
        Session::from_config(Arc::clone(&transport), &config)
            .await
            .context("Failed to start session")?,
    );
    let fetcher = Arc::new(Fetcher::from_config(transport, &config));

    if !config.fetch.warmup_urls.is_empty() {
        let range = DelayRange::from_secs(config.fetch.delay_min_secs, config.fetch.delay_max_secs)?;
        fetcher
            .warm_up(&session, &config.fetch.warmup_urls, range)
            .await;
    }

    if let Some(dir) = output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for (index, request) in requests.into_iter().enumerate() {
        let session = Arc::clone(&session);
        let fetcher = Arc::clone(&fetcher);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let report = fetcher.fetch_with_report(&session, &request).await;
            (index, report)
        });
    }

    let mut reports = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => reports.push(entry),
            Err(e) => tracing::error!("Fetch task failed: {}", e),
        }
    }
    reports.sort_by_key(|(index, _)| *index);

    let mut succeeded = 0;
    for (_, report) in &reports {
        println!(
            "{}\t{}\t{} attempt(s)",
            report.url,
            report.outcome,
            report.attempt_count()
        );

        if let FetchOutcome::Success { body, .. } = &report.outcome {
            succeeded += 1;
            if let Some(dir) = output {
                let name = format!(
                    "{}.html",
                    sanitize_label(&format!(
                        "{}{}",
                        report.url.host_str().unwrap_or("unknown"),
                        report.url.path()
                    ))
                );
                let path = dir.join(name);
                std::fs::write(&path, body)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
        }
    }

    let excluded = session.excluded_proxies();
    tracing::info!(
        "Finished: {}/{} succeeded, {} proxies excluded",
        succeeded,
        reports.len(),
        excluded.len()
    );

    Ok(())
}
