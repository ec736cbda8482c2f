//! Newsletter Relocator main entry point
//!
//! This is the command-line interface for relocating the resources of one
//! newsletter document into a content store.

use anyhow::Context;
use clap::Parser;
use newsletter_relocator::config::{load_config_with_hash, Config};
use newsletter_relocator::extract::{check_document, extract, ExtractOptions};
use newsletter_relocator::fetch::HttpFetcher;
use newsletter_relocator::output::{print_discovery, print_summary, write_json, write_markdown_report};
use newsletter_relocator::store::open_store;
use newsletter_relocator::Pipeline;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Newsletter Relocator: moves linked documents and images into a managed store
///
/// Reads an HTML newsletter, copies every externally hosted document or image it
/// links to into the configured content store, and writes a copy of the
/// newsletter in which only those references point at the store.
#[derive(Parser, Debug)]
#[command(name = "newsletter-relocator")]
#[command(version = "1.0.0")]
#[command(about = "Relocates newsletter resources into a managed store", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// HTML document to process
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Base URL relative references resolve against (overrides the config)
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Where to write the rewritten document [default: <INPUT>.relocated.html]
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Also write a Markdown report of the run
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Print the outcome as JSON instead of the console summary
    #[arg(long)]
    json: bool,

    /// Only list the resources that would be relocated
    #[arg(long, conflicts_with_all = ["json", "report"])]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
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

    let html = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read document {}", cli.input.display()))?;
    let base_url = resolve_base_url(cli.base_url.as_deref(), &config)?;

    if cli.dry_run {
        handle_dry_run(&config, &html, &base_url)?;
    } else {
        handle_run(&cli, config, &config_hash, &html, &base_url).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("newsletter_relocator=info,warn"),
            1 => EnvFilter::new("newsletter_relocator=debug,info"),
            2 => EnvFilter::new("newsletter_relocator=trace,debug"),
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

/// The command line wins over the config; one of them must supply a base URL
fn resolve_base_url(cli_value: Option<&str>, config: &Config) -> anyhow::Result<Url> {
    let raw = cli_value
        .or(config.pipeline.base_url.as_deref())
        .context("No base URL: pass --base-url or set pipeline.base-url")?;
    Url::parse(raw).with_context(|| format!("Invalid base URL '{}'", raw))
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "newsletter".to_string());
    input.with_file_name(format!("{}.relocated.html", stem))
}

/// Handles the --dry-run mode: extraction only, nothing is fetched or stored
fn handle_dry_run(config: &Config, html: &str, base_url: &Url) -> Result<(), Box<dyn std::error::Error>> {
    check_document(html, config.pipeline.max_document_bytes)?;

    let options = ExtractOptions::from_config(&config.pipeline, &config.extraction);
    let extraction = extract(html, base_url, &options, &config.resource_table());
    print_discovery(&extraction);

    Ok(())
}

/// Handles the main relocation run
async fn handle_run(
    cli: &Cli,
    config: Config,
    config_hash: &str,
    html: &str,
    base_url: &Url,
) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = Arc::new(HttpFetcher::from_config(&config.user_agent)?);
    let store = open_store(&config.store, &config.user_agent).await?;
    let pipeline = Pipeline::new(&config, fetcher, store);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, finishing in-flight requests");
                cancel.cancel();
            }
        })
    };

    let result = pipeline.process_with_cancel(html, base_url, cancel).await;
    interrupt.abort();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            return Err(e.into());
        }
    };

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));
    std::fs::write(&output_path, &outcome.final_html)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    tracing::info!("Rewritten document written to {}", output_path.display());

    if let Some(report_path) = &cli.report {
        write_markdown_report(&outcome, Some(config_hash), report_path)?;
        tracing::info!("Report written to {}", report_path.display());
    }

    if cli.json {
        write_json(&outcome, std::io::stdout().lock())?;
    } else if !cli.quiet {
        print_summary(&outcome);
    }

    Ok(())
}
