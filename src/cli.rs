//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::{geo, RankMetric};
use crate::pipeline::ReportView;
use clap::Parser;
use std::path::PathBuf;

/// MarketLens - market analytics for the accounting-firm acquisition marketplace
///
/// Pulls pre-aggregated market statistics from the hosted data gateway,
/// joins them by geography, and renders ranked market reports.
///
/// Examples:
///   marketlens
///   marketlens --view opportunities --state-fp 48 --metric growth-rate
///   marketlens --view profile --state-fp 01 --county "Jefferson County"
///   marketlens --format json --output report.json
///   marketlens --dry-run --view overview
///   marketlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Which report view to produce
    #[arg(long, value_enum, default_value = "overview")]
    pub view: View,

    /// State FIPS code to scope the report to (e.g. 48, or 6 for California)
    ///
    /// Required for the opportunities and profile views.
    #[arg(long, value_name = "FIPS")]
    pub state_fp: Option<String>,

    /// County name for the profile view (e.g. "Jefferson County")
    #[arg(long, value_name = "NAME")]
    pub county: Option<String>,

    /// Metric to rank entries by
    #[arg(short, long, value_enum, default_value = "market-score")]
    pub metric: RankMetric,

    /// Number of ranked entries to keep
    ///
    /// Overrides the config file; default is 5.
    #[arg(long, value_name = "COUNT")]
    pub top: Option<usize>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report
    ///
    /// Defaults to market_report.md (from config).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Data gateway base URL
    #[arg(long, value_name = "URL", env = "MARKETLENS_URL")]
    pub base_url: Option<String>,

    /// API key for the data gateway
    #[arg(long, value_name = "KEY", env = "MARKETLENS_API_KEY")]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .marketlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: list the queries the view would issue, without calling the gateway
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .marketlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Exit with code 2 when the report comes back empty
    ///
    /// Useful for CI checks against the data feed.
    #[arg(long)]
    pub fail_on_empty: bool,
}

/// Report view selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum View {
    /// All states ranked against each other
    #[default]
    Overview,
    /// Counties within one state ranked as opportunities
    Opportunities,
    /// One county's profile plus its most similar markets
    Profile,
    /// Metro areas ranked nationally
    Metro,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref base_url) = self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err("Gateway URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref state_fp) = self.state_fp {
            if geo::pad_statefp(state_fp).is_none() {
                return Err(format!("Invalid state FIPS code: {}", state_fp));
            }
        }

        match self.view {
            View::Opportunities if self.state_fp.is_none() => {
                return Err("--view opportunities requires --state-fp".to_string());
            }
            View::Profile if self.state_fp.is_none() || self.county.is_none() => {
                return Err("--view profile requires --state-fp and --county".to_string());
            }
            _ => {}
        }

        if let Some(top) = self.top {
            if top == 0 {
                return Err("--top must be at least 1".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Build the normalized report view from the arguments.
    ///
    /// Call after `validate()`; state FIPS codes are padded and county
    /// names normalized here so downstream code never re-parses them.
    pub fn report_view(&self) -> Result<ReportView, String> {
        let statefp = || {
            self.state_fp
                .as_deref()
                .and_then(geo::pad_statefp)
                .ok_or_else(|| "Missing or invalid --state-fp".to_string())
        };

        match self.view {
            View::Overview => Ok(ReportView::StateOverview),
            View::Metro => Ok(ReportView::MetroRankings),
            View::Opportunities => Ok(ReportView::CountyOpportunities { statefp: statefp()? }),
            View::Profile => {
                let county = self
                    .county
                    .as_deref()
                    .and_then(geo::normalize_county)
                    .ok_or_else(|| "Missing or empty --county".to_string())?;
                Ok(ReportView::CountyProfile {
                    county,
                    statefp: statefp()?,
                })
            }
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            view: View::Overview,
            state_fp: None,
            county: None,
            metric: RankMetric::MarketScore,
            top: None,
            format: OutputFormat::Markdown,
            output: None,
            base_url: None,
            api_key: None,
            timeout: None,
            config: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
            fail_on_empty: false,
        }
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.base_url = Some("localhost:54321".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_view_requirements() {
        let mut args = make_args();
        args.view = View::Opportunities;
        assert!(args.validate().is_err());

        args.state_fp = Some("48".to_string());
        assert!(args.validate().is_ok());

        args.view = View::Profile;
        assert!(args.validate().is_err());
        args.county = Some("Travis County".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_fips() {
        let mut args = make_args();
        args.state_fp = Some("TX".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_report_view_pads_fips() {
        let mut args = make_args();
        args.view = View::Opportunities;
        args.state_fp = Some("6".to_string());

        match args.report_view().unwrap() {
            crate::pipeline::ReportView::CountyOpportunities { statefp } => {
                assert_eq!(statefp, "06");
            }
            other => panic!("unexpected view: {:?}", other),
        }
    }

    #[test]
    fn test_report_view_normalizes_county() {
        let mut args = make_args();
        args.view = View::Profile;
        args.state_fp = Some("01".to_string());
        args.county = Some("  Jefferson   County ".to_string());

        match args.report_view().unwrap() {
            crate::pipeline::ReportView::CountyProfile { county, statefp } => {
                assert_eq!(county, "Jefferson County");
                assert_eq!(statefp, "01");
            }
            other => panic!("unexpected view: {:?}", other),
        }
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
