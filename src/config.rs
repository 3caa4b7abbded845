//! Configuration file handling.
//!
//! This module provides loading and saving of depscan configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/depscan/config.toml`
//! - macOS: `~/Library/Application Support/depscan/config.toml`
//! - Windows: `%APPDATA%\depscan\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! api_url = "https://api.osv.dev"
//! batch_size = 1000
//! retry_delay_ms = 2000
//! max_pages = 10
//! rate_limit_policy = "fail-scan"
//! default_format = "table"
//!
//! [ignore]
//! packages = ["@types/*"]
//! vulnerabilities = ["CVE-2021-23337"]
//!
//! [logging]
//! level = "warn"
//! format = "pretty"
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checker::{RateLimitPolicy, BATCH_SIZE, DEFAULT_API_URL, MAX_PAGES, RETRY_DELAY};
use crate::model::NormalizedVulnerability;

/// Application configuration.
///
/// Every field has a default, so a partial (or missing) file is valid.
///
/// # Example
///
/// ```no_run
/// use depscan::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("API: {}", config.api_url);
/// println!("Batch size: {}", config.batch_size);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the OSV-compatible vulnerability database.
    ///
    /// Default: `https://api.osv.dev`
    pub api_url: String,

    /// Maximum number of packages per batch query.
    ///
    /// Default: 1000
    pub batch_size: usize,

    /// Wait before retrying a rate-limited batch, in milliseconds.
    ///
    /// Default: 2000
    pub retry_delay_ms: u64,

    /// Maximum number of result pages followed per batch.
    ///
    /// Default: 10
    pub max_pages: usize,

    /// What to do when a batch is still rate limited after its retry.
    ///
    /// Valid values: "fail-scan", "skip-batch"
    /// Default: "fail-scan"
    pub rate_limit_policy: RateLimitPolicy,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "table", "json", "sarif"
    /// Default: "table"
    pub default_format: String,

    /// Ignore list configuration for suppressing known issues.
    pub ignore: IgnoreConfig,

    pub logging: LoggingConfig,
}

/// Configuration for ignoring specific packages or vulnerabilities.
///
/// Use this to suppress known false positives or accepted risks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names to exclude from scanning.
    ///
    /// Matching packages are never sent to the vulnerability database.
    /// Supports glob patterns (e.g., "lodash*", "@types/*").
    pub packages: Vec<String>,

    /// Vulnerability IDs to ignore (e.g., "CVE-2021-12345", "GHSA-xxxx").
    ///
    /// A finding is dropped when its id or any of its aliases is listed.
    pub vulnerabilities: Vec<String>,
}

impl IgnoreConfig {
    /// Check if a package should be ignored.
    pub fn should_ignore_package(&self, name: &str) -> bool {
        self.packages.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, name)
            } else {
                pattern == name
            }
        })
    }

    /// Check if a vulnerability should be ignored, by id or alias.
    pub fn should_ignore_vulnerability(&self, vuln: &NormalizedVulnerability) -> bool {
        self.vulnerabilities.iter().any(|id| vuln.matches_id(id))
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.vulnerabilities.is_empty()
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    ///
    /// Default: "warn"
    pub level: String,

    /// Valid values: "pretty", "json"
    /// Default: "pretty"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    // Check prefix (before first *)
    if !parts[0].is_empty() {
        match remaining.strip_prefix(parts[0]) {
            Some(rest) => remaining = rest,
            None => return false,
        }
    }

    // Check suffix (after last *)
    let last_part = parts[parts.len() - 1];
    if !last_part.is_empty() {
        match remaining.strip_suffix(last_part) {
            Some(rest) => remaining = rest,
            None => return false,
        }
    }

    // Check middle parts
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            batch_size: BATCH_SIZE,
            retry_delay_ms: RETRY_DELAY.as_millis() as u64,
            max_pages: MAX_PAGES,
            rate_limit_policy: RateLimitPolicy::default(),
            default_format: "table".to_string(),
            ignore: IgnoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read, parsed
    /// or validated.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use depscan::Config;
    ///
    /// let config = Config::load()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from a specific file, falling back to defaults
    /// when it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.max_pages == 0 {
            bail!("max_pages must be at least 1");
        }
        if !matches!(self.default_format.as_str(), "table" | "json" | "sarif") {
            bail!(
                "unknown default_format {:?} (expected table, json or sarif)",
                self.default_format
            );
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            bail!(
                "unknown logging format {:?} (expected pretty or json)",
                self.logging.format
            );
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use depscan::Config;
    ///
    /// let path = Config::config_path();
    /// assert!(path.ends_with("depscan/config.toml"));
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("depscan")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ecosystem, Severity};

    fn vuln(id: &str, aliases: &[&str]) -> NormalizedVulnerability {
        NormalizedVulnerability {
            id: id.to_string(),
            package_name: "lodash".to_string(),
            version: "4.17.20".to_string(),
            ecosystem: Ecosystem::Npm,
            severity: Severity::High,
            summary: "summary".to_string(),
            details: String::new(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            references: Vec::new(),
            cvss_score: None,
            fixed_versions: Vec::new(),
            manifest_file: "package.json".to_string(),
        }
    }

    #[test]
    fn test_glob_match_exact() {
        assert!(glob_match("lodash", "lodash"));
        assert!(!glob_match("lodash", "underscore"));
    }

    #[test]
    fn test_glob_match_prefix() {
        assert!(glob_match("lodash*", "lodash"));
        assert!(glob_match("lodash*", "lodash.debounce"));
        assert!(!glob_match("lodash*", "underscore"));
    }

    #[test]
    fn test_glob_match_suffix_and_contains() {
        assert!(glob_match("*-cli", "typescript-cli"));
        assert!(!glob_match("*-cli", "typescript"));
        assert!(glob_match("*lodash*", "my-lodash-plugin"));
        assert!(glob_match("org.*:log4j-*", "org.apache.logging.log4j:log4j-core"));
    }

    #[test]
    fn test_glob_match_overlapping_prefix_suffix() {
        assert!(!glob_match("ab*ba", "aba"));
        assert!(glob_match("ab*ba", "abba"));
    }

    #[test]
    fn test_ignore_config_packages() {
        let config = IgnoreConfig {
            packages: vec!["lodash".to_string(), "@types/*".to_string()],
            vulnerabilities: vec![],
        };

        assert!(config.should_ignore_package("lodash"));
        assert!(config.should_ignore_package("@types/node"));
        assert!(!config.should_ignore_package("underscore"));
        assert!(!config.should_ignore_package("@babel/core"));
    }

    #[test]
    fn test_ignore_config_vulnerabilities_match_aliases() {
        let config = IgnoreConfig {
            packages: vec![],
            vulnerabilities: vec!["CVE-2021-23337".to_string()],
        };

        assert!(config.should_ignore_vulnerability(&vuln("CVE-2021-23337", &[])));
        assert!(config.should_ignore_vulnerability(&vuln("GHSA-35jh-r3h4-6jhm", &["CVE-2021-23337"])));
        assert!(!config.should_ignore_vulnerability(&vuln("GHSA-p6mc-m468-83gw", &["CVE-2020-8203"])));
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.api_url, "https://api.osv.dev");
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.max_pages, 10);
        assert_eq!(config.rate_limit_policy, RateLimitPolicy::FailScan);
        assert_eq!(config.default_format, "table");
        assert_eq!(config.logging.level, "warn");
        assert!(config.ignore.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            "rate_limit_policy = \"skip-batch\"\n\n[ignore]\npackages = [\"@types/*\"]\n",
        )
        .unwrap();

        assert_eq!(config.rate_limit_policy, RateLimitPolicy::SkipBatch);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.ignore.packages, vec!["@types/*"]);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = Config {
            batch_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_format() {
        let config = Config {
            default_format: "xml".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            batch_size: 250,
            ignore: IgnoreConfig {
                packages: vec!["lodash*".to_string()],
                vulnerabilities: vec!["GHSA-xxxx".to_string()],
            },
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "batch_size = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_generate_default_config_parses() {
        let generated = Config::generate_default_config();
        assert!(generated.contains("api_url"));
        let parsed: Config = toml::from_str(&generated).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
