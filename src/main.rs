//! Sumi-Spider main entry point
//!
//! This is the command-line interface for the Sumi-Spider crawler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use sumi_spider::config::{load_config_with_hash, Config, FrontierBackend};
use sumi_spider::crawler::{Crawler, CrawlerOptions, HtmlParser, HttpFetcher};
use sumi_spider::frontier::{open_frontier, Frontier};
use sumi_spider::spider::{BoxedMiddleware, HostFilter, LinkFilter, LinkSpider};
use sumi_spider::url::{extract_domain, normalize_url, HostPattern};
use tracing_subscriber::EnvFilter;

/// Sumi-Spider: a polite, resumable web crawler
///
/// Sumi-Spider crawls from seed URLs, never visits a URL twice, and picks up
/// where it left off after an interruption.
#[derive(Parser, Debug)]
#[command(name = "sumi-spider")]
#[command(version)]
#[command(about = "A polite, resumable web crawler", long_about = None)]
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

    /// Forget all frontier state for the configured prefix before crawling
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "failed"])]
    dry_run: bool,

    /// Show frontier counts and exit
    #[arg(long, conflicts_with_all = ["dry_run", "failed"])]
    stats: bool,

    /// List failed URLs and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    failed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    let frontier = open_frontier(&config.frontier).context("Failed to open frontier")?;

    if cli.stats {
        handle_stats(&config, frontier.as_ref())
    } else if cli.failed {
        handle_failed(frontier.as_ref())
    } else {
        handle_crawl(config, frontier, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_spider=info,warn"),
            1 => EnvFilter::new("sumi_spider=debug,info"),
            2 => EnvFilter::new("sumi_spider=trace,debug"),
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

/// Host patterns for the default spider chain
///
/// Falls back to the seed hosts when the config has no `[[allow]]` entries.
fn allow_patterns(config: &Config) -> anyhow::Result<Vec<HostPattern>> {
    if !config.allow.is_empty() {
        return config
            .allow
            .iter()
            .map(|entry| HostPattern::parse(&entry.domain).map_err(Into::into))
            .collect();
    }

    let mut patterns = Vec::new();
    for seed in &config.seeds {
        let url = normalize_url(seed).with_context(|| format!("Invalid seed {}", seed))?;
        if let Some(host) = extract_domain(&url) {
            let pattern = HostPattern::parse(&host)?;
            if !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }
    }
    Ok(patterns)
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Sumi-Spider Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!(
        "  Politeness delay: {}s to {}s",
        config.crawler.sleep_min, config.crawler.sleep_max
    );
    println!("  Fetch timeout: {}s", config.crawler.fetch_timeout);
    println!("  Result queue capacity: {}", config.crawler.queue_capacity);
    println!("  Max page size: {} bytes", config.crawler.max_page_bytes);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.user_agent());
    if !config.user_agent.rotate.is_empty() {
        println!("  Rotating {} alternatives", config.user_agent.rotate.len());
    }

    println!("\nFrontier:");
    match config.frontier.backend {
        FrontierBackend::Sqlite => println!("  SQLite: {}", config.frontier.database_path),
        FrontierBackend::Memory => println!("  In-memory (not persisted)"),
    }
    println!("  Prefix: {}", config.frontier.prefix);

    let patterns = allow_patterns(config)?;
    println!("\nAllowed Hosts ({}):", patterns.len());
    for pattern in &patterns {
        println!("  - {}", pattern);
    }

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} seed URLs", config.seeds.len());

    Ok(())
}

/// Handles the --stats mode: shows frontier counts
fn handle_stats(config: &Config, frontier: &dyn Frontier) -> anyhow::Result<()> {
    let counts = frontier.counts()?;

    println!("Frontier prefix: {}\n", config.frontier.prefix);
    println!("  Ready:   {}", counts.ready);
    println!("  Pending: {}", counts.pending);
    println!("  Done:    {}", counts.done);
    println!("  Failed:  {}", counts.failed);
    println!("  Total:   {}", counts.total());

    Ok(())
}

/// Handles the --failed mode: lists failed URLs
fn handle_failed(frontier: &dyn Frontier) -> anyhow::Result<()> {
    let failed = frontier.failed_urls()?;

    println!("Failed URLs ({}):", failed.len());
    for url in &failed {
        println!("  - {}", url);
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    frontier: Arc<dyn Frontier>,
    fresh: bool,
) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (forgetting previous state)");
        frontier.reset()?;
    } else {
        tracing::info!("Starting crawl (resuming previous state if any)");
    }

    let patterns = allow_patterns(&config)?;
    let fetcher = HttpFetcher::new(&config.user_agent).context("Failed to build HTTP client")?;
    let parser = HtmlParser::new(config.crawler.max_page_bytes);

    let mut crawler = Crawler::new(
        CrawlerOptions::from(&config.crawler),
        frontier,
        Arc::new(fetcher),
        Arc::new(parser),
    );
    let middlewares: Vec<BoxedMiddleware> = vec![
        Box::new(HostFilter::new(patterns.clone())),
        Box::new(LinkFilter::new(patterns)),
    ];
    crawler.register_spider(LinkSpider, middlewares);

    let token = crawler.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing in-flight pages");
            token.cancel();
        }
    });

    let report = crawler.crawl(&config.seeds).await?;
    println!("{}", report);

    Ok(())
}
