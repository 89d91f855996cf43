//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.marketlens.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Data gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { verbose: false }
    }
}

/// Remote data gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key sent as `apikey` and bearer token.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Number of ranked entries per report.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            top_n: default_top_n(),
        }
    }
}

fn default_output() -> String {
    "market_report.md".to_string()
}

fn default_top_n() -> usize {
    crate::analysis::DEFAULT_TOP_N
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".marketlens.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; optional
    /// arguments only override when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref base_url) = args.base_url {
            self.gateway.base_url = base_url.clone();
        }
        if let Some(ref api_key) = args.api_key {
            self.gateway.api_key = Some(api_key.clone());
        }
        if let Some(timeout) = args.timeout {
            self.gateway.timeout_seconds = timeout;
        }

        if let Some(top) = args.top {
            self.report.top_n = top;
        }
        if let Some(ref output) = args.output {
            self.report.output = output.display().to_string();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway.base_url, "http://localhost:54321");
        assert_eq!(config.gateway.timeout_seconds, 30);
        assert_eq!(config.report.top_n, 5);
        assert_eq!(config.report.output, "market_report.md");
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true

[gateway]
base_url = "https://data.example.com"
api_key = "anon-key"
timeout_seconds = 10

[report]
output = "custom_report.md"
top_n = 10
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.gateway.base_url, "https://data.example.com");
        assert_eq!(config.gateway.api_key.as_deref(), Some("anon-key"));
        assert_eq!(config.gateway.timeout_seconds, 10);
        assert_eq!(config.report.output, "custom_report.md");
        assert_eq!(config.report.top_n, 10);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".marketlens.toml");
        std::fs::write(&path, "[report]\ntop_n = 3\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.report.top_n, 3);
        // Unspecified sections fall back to defaults.
        assert_eq!(config.gateway.base_url, "http://localhost:54321");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[gateway]"));
        assert!(toml_str.contains("[report]"));
    }
}
