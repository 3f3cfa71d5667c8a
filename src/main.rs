//! TrueGL main entry point
//!
//! This is the command-line interface for crawling, searching and rating the
//! TrueGL index.

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use truegl::config::load_config_with_hash;
use truegl::output;
use truegl::{SearchEngine, SearchFilters, StopSignal};
use tracing_subscriber::EnvFilter;

/// Number of recent crawl runs listed by `stats`
const RECENT_RUNS: usize = 5;

/// TrueGL: crawl the web into a local index and search it, ranked by relevance
/// and a per-document truth score
#[derive(Parser, Debug)]
#[command(name = "truegl")]
#[command(version)]
#[command(about = "Crawl, index and search with truth-weighted ranking", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl from a seed URL and index what is found
    Crawl {
        seed: String,

        /// Override the configured page cap
        #[arg(long)]
        max_pages: Option<u32>,
    },

    /// Search the index
    Search {
        query: String,

        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Defaults to the configured page size
        #[arg(long)]
        per_page: Option<usize>,

        /// Only documents containing this term (repeatable)
        #[arg(long = "require", value_name = "TERM")]
        required_terms: Vec<String>,

        /// Only documents from this host; `*.example.com` matches subdomains (repeatable)
        #[arg(long = "domain", value_name = "HOST")]
        domains: Vec<String>,

        #[arg(long)]
        language: Option<String>,

        /// Crawled at or after this RFC 3339 timestamp
        #[arg(long, value_parser = parse_timestamp)]
        after: Option<DateTime<Utc>>,

        /// Crawled at or before this RFC 3339 timestamp
        #[arg(long, value_parser = parse_timestamp)]
        before: Option<DateTime<Utc>>,

        #[arg(long)]
        min_truth: Option<f64>,
    },

    /// Set the truth score of an indexed document
    Truth { url: String, score: f64 },

    /// Show index statistics and recent crawl runs
    Stats,

    /// Suggest indexed terms starting with a prefix
    Suggest {
        prefix: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show a stored document
    Show { url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::debug!("Configuration loaded (hash: {})", config_hash);

    let engine = SearchEngine::open(config, config_hash).context("failed to open the index")?;

    match cli.command {
        Command::Crawl { seed, max_pages } => handle_crawl(&engine, &seed, max_pages, cli.json).await,
        Command::Search {
            query,
            page,
            per_page,
            required_terms,
            domains,
            language,
            after,
            before,
            min_truth,
        } => {
            let filters = SearchFilters {
                required_terms,
                domains,
                crawled_after: after,
                crawled_before: before,
                language,
                min_truth_score: min_truth,
            };
            let per_page = per_page.unwrap_or(engine.config().search.default_per_page);
            let results = engine.search(&query, page, per_page, &filters)?;
            if cli.json {
                output::print_json(&results)?;
            } else {
                output::print_search_results(&query, &results);
            }
            Ok(())
        }
        Command::Truth { url, score } => {
            if !engine.update_truth_score(&url, score)? {
                bail!("no indexed document for {}", url);
            }
            if !cli.quiet {
                println!("Truth score of {} set to {:.2}", url, score);
            }
            Ok(())
        }
        Command::Stats => {
            let stats = engine.get_stats()?;
            let runs = engine.recent_runs(RECENT_RUNS)?;
            if cli.json {
                output::print_json(&serde_json::json!({ "stats": stats, "recent_runs": runs }))?;
            } else {
                println!("Database: {}\n", engine.config().index.database_path);
                output::print_stats(&stats, &runs);
            }
            Ok(())
        }
        Command::Suggest { prefix, limit } => {
            let suggestions = engine.suggest(&prefix, limit)?;
            if cli.json {
                output::print_json(&suggestions)?;
            } else {
                output::print_suggestions(&prefix, &suggestions);
            }
            Ok(())
        }
        Command::Show { url } => {
            let Some(doc) = engine.document(&url)? else {
                bail!("no indexed document for {}", url);
            };
            if cli.json {
                output::print_json(&doc)?;
            } else {
                output::print_document(&doc);
            }
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("truegl=info,warn"),
            1 => EnvFilter::new("truegl=debug,info"),
            2 => EnvFilter::new("truegl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs a crawl; Ctrl-C stops dispatching and lets in-flight fetches finish
async fn handle_crawl(
    engine: &SearchEngine,
    seed: &str,
    max_pages: Option<u32>,
    json: bool,
) -> anyhow::Result<()> {
    let stop = StopSignal::new();
    let on_interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight fetches");
            on_interrupt.stop();
        }
    });

    let summary = engine
        .start_crawl_with_stop(seed, max_pages, stop)
        .await
        .with_context(|| format!("crawl from {} failed", seed))?;

    if json {
        output::print_json(&summary)?;
    } else {
        output::print_crawl_summary(&summary);
    }
    Ok(())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}
