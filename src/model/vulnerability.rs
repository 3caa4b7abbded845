use super::{Ecosystem, PackageInfo};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Vulnerability severity, ordered by descending risk
/// (`Critical < High < Medium < Low < Unknown`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Unknown => "UNKNOWN",
        }
    }

    /// True when `self` carries at least as much risk as `threshold`.
    pub fn is_at_least(&self, threshold: Severity) -> bool {
        *self <= threshold
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "type")]
    pub ref_type: String,
    pub url: String,
}

/// A vulnerability joined with the package it was found in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedVulnerability {
    pub id: String,
    pub package_name: String,
    pub version: String,
    pub ecosystem: Ecosystem,
    pub severity: Severity,
    pub summary: String,
    pub details: String,
    pub aliases: Vec<String>,
    pub references: Vec<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss_score: Option<f64>,
    pub fixed_versions: Vec<String>,
    pub manifest_file: String,
}

impl NormalizedVulnerability {
    /// Lowest fixed version, compared as semver where possible.
    pub fn earliest_fix(&self) -> Option<&str> {
        self.fixed_versions
            .iter()
            .min_by(|a, b| compare_versions(a, b))
            .map(String::as_str)
    }

    /// True when `id` names this vulnerability or one of its aliases.
    pub fn matches_id(&self, id: &str) -> bool {
        self.id == id || self.aliases.iter().any(|alias| alias == id)
    }
}

fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    match (
        semver::Version::parse(a.trim_start_matches('v')),
        semver::Version::parse(b.trim_start_matches('v')),
    ) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ScanStats {
    pub fn from_vulnerabilities(vulns: &[NormalizedVulnerability]) -> Self {
        let mut stats = ScanStats {
            total: vulns.len(),
            ..Default::default()
        };
        for vuln in vulns {
            match vuln.severity {
                Severity::Critical => stats.critical += 1,
                Severity::High => stats.high += 1,
                Severity::Medium => stats.medium += 1,
                Severity::Low => stats.low += 1,
                Severity::Unknown => {}
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// The manifest could not be parsed at all.
    Parse,
    /// A single dependency entry was ignored.
    SkippedEntry,
    /// The file name is not a recognised manifest.
    UnsupportedManifest,
    /// A detail record could not be fetched; the batch summary was used.
    DetailFallback,
    /// A batch was abandoned after repeated rate limiting.
    BatchSkipped,
}

/// A recoverable problem encountered during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            file: None,
            message: message.into(),
        }
    }

    pub fn in_file(kind: DiagnosticKind, file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            file: Some(file.into()),
            message: message.into(),
        }
    }
}

/// Terminal artifact of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub success: bool,
    pub vulnerabilities: Vec<NormalizedVulnerability>,
    pub stats: ScanStats,
    pub scanned_files: usize,
    pub scanned_packages: usize,
    /// Packages whose batch was skipped under the `skip-batch` rate-limit policy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unchecked_packages: Vec<PackageInfo>,
    pub scan_duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl ScanResult {
    pub fn completed(
        vulnerabilities: Vec<NormalizedVulnerability>,
        scanned_files: usize,
        scanned_packages: usize,
    ) -> Self {
        let stats = ScanStats::from_vulnerabilities(&vulnerabilities);
        Self {
            success: true,
            vulnerabilities,
            stats,
            scanned_files,
            scanned_packages,
            unchecked_packages: Vec::new(),
            scan_duration_ms: 0,
            error: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn failed(error: impl Into<String>, scanned_files: usize, scanned_packages: usize) -> Self {
        Self {
            success: false,
            vulnerabilities: Vec::new(),
            stats: ScanStats::default(),
            scanned_files,
            scanned_packages,
            unchecked_packages: Vec::new(),
            scan_duration_ms: 0,
            error: Some(error.into()),
            diagnostics: Vec::new(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.scan_duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_unchecked(mut self, packages: Vec<PackageInfo>) -> Self {
        self.unchecked_packages = packages;
        self
    }

    /// Highest severity present, if any vulnerability was found.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.vulnerabilities.iter().map(|v| v.severity).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vuln(id: &str, severity: Severity) -> NormalizedVulnerability {
        NormalizedVulnerability {
            id: id.to_string(),
            package_name: "lodash".to_string(),
            version: "4.17.20".to_string(),
            ecosystem: Ecosystem::Npm,
            severity,
            summary: "summary".to_string(),
            details: String::new(),
            aliases: vec!["CVE-2021-23337".to_string()],
            references: Vec::new(),
            cvss_score: None,
            fixed_versions: Vec::new(),
            manifest_file: "package.json".to_string(),
        }
    }

    #[test]
    fn test_severity_order_is_descending_risk() {
        assert!(Severity::Critical < Severity::High);
        assert!(Severity::High < Severity::Medium);
        assert!(Severity::Medium < Severity::Low);
        assert!(Severity::Low < Severity::Unknown);
        assert!(Severity::Critical.is_at_least(Severity::High));
        assert!(!Severity::Low.is_at_least(Severity::Medium));
    }

    #[test]
    fn test_stats_count_each_bucket() {
        let vulns = vec![
            vuln("A", Severity::Critical),
            vuln("B", Severity::High),
            vuln("C", Severity::High),
            vuln("D", Severity::Low),
        ];
        let stats = ScanStats::from_vulnerabilities(&vulns);
        assert_eq!(
            stats,
            ScanStats {
                total: 4,
                critical: 1,
                high: 2,
                medium: 0,
                low: 1
            }
        );
    }

    #[test]
    fn test_earliest_fix_prefers_semver_order() {
        let mut v = vuln("A", Severity::High);
        v.fixed_versions = vec!["4.17.21".to_string(), "3.10.2".to_string(), "4.9.0".to_string()];
        assert_eq!(v.earliest_fix(), Some("3.10.2"));

        v.fixed_versions.clear();
        assert_eq!(v.earliest_fix(), None);
    }

    #[test]
    fn test_matches_id_checks_aliases() {
        let v = vuln("GHSA-35jh-r3h4-6jhm", Severity::High);
        assert!(v.matches_id("GHSA-35jh-r3h4-6jhm"));
        assert!(v.matches_id("CVE-2021-23337"));
        assert!(!v.matches_id("CVE-2020-8203"));
    }

    #[test]
    fn test_scan_result_serializes_camel_case() {
        let result = ScanResult::completed(vec![vuln("A", Severity::Medium)], 1, 3)
            .with_duration(Duration::from_millis(42));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["scannedFiles"], 1);
        assert_eq!(json["scannedPackages"], 3);
        assert_eq!(json["scanDurationMs"], 42);
        assert_eq!(json["stats"]["medium"], 1);
        assert_eq!(json["vulnerabilities"][0]["severity"], "MEDIUM");
        assert_eq!(json["vulnerabilities"][0]["packageName"], "lodash");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failed_result_has_no_vulnerabilities() {
        let result = ScanResult::failed("nothing to scan", 0, 0);
        assert!(!result.success);
        assert!(result.vulnerabilities.is_empty());
        assert_eq!(result.error.as_deref(), Some("nothing to scan"));
        assert_eq!(result.worst_severity(), None);
    }
}
