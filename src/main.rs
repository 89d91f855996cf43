//! MarketLens - market analytics for the accounting-firm acquisition marketplace
//!
//! A CLI tool that pulls pre-aggregated market statistics from a hosted
//! data gateway, joins them client-side by geography, and renders ranked
//! market reports in Markdown or JSON.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (gateway unreachable, config, I/O failure, etc.)
//!   2 - Report empty with --fail-on-empty set

mod analysis;
mod cli;
mod config;
mod gateway;
mod models;
mod pipeline;
mod report;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::Config;
use gateway::HttpGateway;
use indicatif::{ProgressBar, ProgressStyle};
use pipeline::{Pipeline, ReportView};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("MarketLens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_report(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Report failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .marketlens.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".marketlens.toml");

    if path.exists() {
        eprintln!("⚠️  .marketlens.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .marketlens.toml")?;

    println!("✅ Created .marketlens.toml with default settings.");
    println!("   Edit it to set the gateway URL, API key, and report defaults.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete report workflow. Returns exit code (0 or 2).
async fn run_report(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let view = args.report_view().map_err(anyhow::Error::msg)?;

    // Handle --dry-run: list queries and exit
    if args.dry_run {
        return handle_dry_run(&view);
    }

    println!("📊 Generating report: {}", view.title());
    println!("   Gateway: {}", config.gateway.base_url);
    println!("   Metric:  {}", args.metric.label());
    println!("   Top:     {}", config.report.top_n);

    let gateway = HttpGateway::new(
        config.gateway.base_url.clone(),
        config.gateway.api_key.clone(),
        config.gateway.timeout_seconds,
    )?;
    let source = gateway.base_url().to_string();
    let pipeline = Pipeline::new(gateway, source);

    let spinner = make_spinner(args.quiet);
    spinner.set_message("Fetching market data...");

    let market_report = pipeline.run(&view, args.metric, config.report.top_n).await?;

    spinner.finish_and_clear();

    if market_report.is_empty() {
        warn!("Report came back empty");
    }

    // Render and save the report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&market_report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&market_report),
    };

    std::fs::write(&config.report.output, &output)
        .with_context(|| format!("Failed to write report to {}", config.report.output))?;

    // Print summary
    println!("\n📈 Report Summary:");
    println!("   Queries issued: {}", market_report.metadata.queries_issued);
    println!("   Rows fetched:   {}", market_report.metadata.rows_fetched);
    match market_report.headline() {
        Some(top) => println!(
            "   Top market:     {} ({} {:.1})",
            top.name, market_report.metric_label, top.score
        ),
        None => println!("   No data for this selection."),
    }
    println!(
        "   Duration:       {:.1}s",
        market_report.metadata.duration_seconds
    );
    println!("\n✅ Report saved to: {}", config.report.output);

    if args.fail_on_empty && market_report.is_empty() {
        eprintln!("\n⛔ Report is empty. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: print the queries the view would issue, exit.
fn handle_dry_run(view: &ReportView) -> Result<i32> {
    println!("\n🔍 Dry run: planned queries for {} (no network calls)\n", view.title());

    let plan = view.plan();
    for (index, query) in plan.iter().enumerate() {
        let role = if index == 0 { "primary" } else { "secondary" };
        println!("   📡 {} ({}) {}", query.name(), role, query.describe_args());
    }
    println!("\n   Total: {} queries", plan.len());

    println!("\n✅ Dry run complete. No gateway calls were made.");
    Ok(0)
}

/// Build a progress spinner, hidden in quiet mode.
fn make_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("spinner template is static"),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .marketlens.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
