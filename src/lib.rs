//! Dependency manifest scanning against the OSV.dev vulnerability database.
//!
//! The pipeline: manifest files are recognised by name and parsed into
//! [`PackageInfo`]s, looked up in batches through [`OsvClient`], classified
//! onto a four-level [`Severity`] scale and aggregated into a [`ScanResult`].
//!
//! # Example
//!
//! ```no_run
//! use depscan::{Config, DependencyScanner, ManifestFile};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let scanner = DependencyScanner::from_config(&config);
//!
//!     let files = vec![ManifestFile::new(
//!         "package.json",
//!         r#"{"dependencies":{"lodash":"^4.17.20"}}"#,
//!     )];
//!     let result = scanner.scan(&files).await;
//!
//!     for vuln in &result.vulnerabilities {
//!         println!("{} {} {}", vuln.severity, vuln.package_name, vuln.id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod checker;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod model;
pub mod output;
pub mod scanner;

pub use aggregate::Aggregator;
pub use checker::{OsvApi, OsvClient, RateLimitPolicy};
pub use config::Config;
pub use error::{ApiError, ScanError};
pub use model::{
    Diagnostic, DiagnosticKind, Ecosystem, ManifestFile, NormalizedVulnerability, PackageInfo,
    ScanResult, ScanStats, Severity,
};
pub use scanner::DependencyScanner;
