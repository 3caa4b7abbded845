//! Scan orchestration.
//!
//! [`DependencyScanner`] runs the whole pipeline over a set of
//! [`ManifestFile`]s: detection, parsing, batched lookup, aggregation.
//! [`collect_manifest_files`] gathers those files from disk.
//!
//! # Example
//!
//! ```no_run
//! use depscan::{DependencyScanner, ManifestFile};
//!
//! #[tokio::main]
//! async fn main() {
//!     let scanner = DependencyScanner::new();
//!     let files = vec![ManifestFile::new("requirements.txt", "flask==2.0.1\n")];
//!     let result = scanner.scan(&files).await;
//!     println!("{} vulnerabilities", result.stats.total);
//! }
//! ```

mod files;

pub use files::{collect_manifest_files, SKIP_DIRS};

use std::collections::BTreeSet;
use std::time::Instant;

use crate::aggregate::Aggregator;
use crate::checker::{HttpOsvApi, OsvApi, OsvClient};
use crate::config::{Config, IgnoreConfig};
use crate::error::ScanError;
use crate::manifest::{detect_ecosystem, parse_manifest};
use crate::model::{Diagnostic, DiagnosticKind, ManifestFile, PackageInfo, ScanResult};

/// Packages extracted from a set of input files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedPackages {
    /// Number of inputs recognised as manifests.
    pub manifest_files: usize,
    pub packages: Vec<PackageInfo>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs dependency scans against a vulnerability database.
///
/// The scanner owns its client; nothing is shared between instances.
pub struct DependencyScanner<A = HttpOsvApi> {
    client: OsvClient<A>,
    ignore: IgnoreConfig,
}

impl DependencyScanner<HttpOsvApi> {
    /// Scanner for the public OSV.dev API with default settings.
    pub fn new() -> Self {
        Self::with_client(OsvClient::new())
    }

    /// Scanner configured from a [`Config`].
    pub fn from_config(config: &Config) -> Self {
        let client = OsvClient::with_api(HttpOsvApi::with_base_url(&config.api_url))
            .batch_size(config.batch_size)
            .retry_delay(config.retry_delay())
            .max_pages(config.max_pages)
            .rate_limit_policy(config.rate_limit_policy);
        Self::with_client(client).ignore(config.ignore.clone())
    }
}

impl Default for DependencyScanner<HttpOsvApi> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: OsvApi> DependencyScanner<A> {
    pub fn with_client(client: OsvClient<A>) -> Self {
        Self {
            client,
            ignore: IgnoreConfig::default(),
        }
    }

    pub fn ignore(mut self, ignore: IgnoreConfig) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn client(&self) -> &OsvClient<A> {
        &self.client
    }

    /// Detects and parses every input. Unrecognised files are reported as
    /// diagnostics and otherwise skipped.
    pub fn collect_packages(&self, files: &[ManifestFile]) -> CollectedPackages {
        let mut collected = CollectedPackages::default();

        for file in files {
            let Some(ecosystem) = detect_ecosystem(&file.path) else {
                tracing::debug!(file = %file.path, "not a recognised manifest");
                collected.diagnostics.push(Diagnostic::in_file(
                    DiagnosticKind::UnsupportedManifest,
                    &file.path,
                    "not a recognised dependency manifest",
                ));
                continue;
            };

            collected.manifest_files += 1;
            let parsed = parse_manifest(ecosystem, &file.content, &file.path);
            collected.packages.extend(parsed.packages);
            collected.diagnostics.extend(parsed.diagnostics);
        }

        collected
    }

    /// Scans `files` and returns the terminal [`ScanResult`].
    ///
    /// Never fails: problems that stop the scan are reported through
    /// `success: false` and `error`.
    pub async fn scan(&self, files: &[ManifestFile]) -> ScanResult {
        let started = Instant::now();
        tracing::info!(files = files.len(), "starting dependency scan");

        let result = self.run(files).await;

        match &result.error {
            Some(error) => tracing::warn!(%error, "dependency scan failed"),
            None => tracing::info!(
                packages = result.scanned_packages,
                vulnerabilities = result.stats.total,
                "dependency scan finished"
            ),
        }
        result.with_duration(started.elapsed())
    }

    async fn run(&self, files: &[ManifestFile]) -> ScanResult {
        if files.is_empty() {
            return ScanResult::failed(ScanError::NoFiles.to_string(), 0, 0);
        }

        let CollectedPackages {
            manifest_files,
            packages,
            mut diagnostics,
        } = self.collect_packages(files);

        if manifest_files == 0 {
            return ScanResult::failed(ScanError::NoManifests.to_string(), 0, 0)
                .with_diagnostics(diagnostics);
        }
        if packages.is_empty() {
            return ScanResult::completed(Vec::new(), manifest_files, 0).with_diagnostics(diagnostics);
        }

        let to_query: Vec<PackageInfo> = packages
            .iter()
            .filter(|p| !self.ignore.should_ignore_package(&p.name))
            .cloned()
            .collect();

        let outcome = match self.client.query(&to_query).await {
            Ok(outcome) => outcome,
            Err(e) => {
                return ScanResult::failed(e.to_string(), manifest_files, packages.len())
                    .with_diagnostics(diagnostics);
            }
        };

        diagnostics.extend(outcome.diagnostics);
        let unchecked = unchecked_packages(&to_query, &outcome.unchecked);

        Aggregator::with_ignore(self.ignore.clone())
            .aggregate(manifest_files, &packages, &outcome.vulnerabilities)
            .with_unchecked(unchecked)
            .with_diagnostics(diagnostics)
    }
}

fn unchecked_packages(packages: &[PackageInfo], keys: &BTreeSet<String>) -> Vec<PackageInfo> {
    if keys.is_empty() {
        return Vec::new();
    }
    packages
        .iter()
        .filter(|p| keys.contains(&p.key()))
        .cloned()
        .collect()
}
