//! Joins parsed packages with the vulnerability records returned for them.

use std::collections::HashSet;

use crate::checker::{classify, cvss_score, OsvVulnerability, VulnerabilityMap};
use crate::config::IgnoreConfig;
use crate::model::{NormalizedVulnerability, PackageInfo, Reference, ScanResult};

const MAX_SUMMARY_LEN: usize = 200;

/// Builds the final [`ScanResult`] from packages and their raw records.
///
/// Aggregation is pure: the same packages and map always produce the same
/// result (apart from the duration, which the caller sets).
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    ignore: IgnoreConfig,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignore(ignore: IgnoreConfig) -> Self {
        Self { ignore }
    }

    /// Normalizes every record found for every package.
    ///
    /// `scanned_files` and `packages.len()` are reported as-is, before any
    /// ignore rule is applied. Each package receives the records stored
    /// under its key, so duplicate declarations in different manifests
    /// each get their own findings.
    pub fn aggregate(
        &self,
        scanned_files: usize,
        packages: &[PackageInfo],
        vulnerabilities: &VulnerabilityMap,
    ) -> ScanResult {
        let mut seen = HashSet::new();
        let mut findings = Vec::new();

        for package in packages {
            if self.ignore.should_ignore_package(&package.name) {
                continue;
            }
            let Some(records) = vulnerabilities.get(&package.key()) else {
                continue;
            };

            for raw in records {
                let vuln = normalize(package, raw);
                if self.ignore.should_ignore_vulnerability(&vuln) {
                    tracing::debug!(id = %vuln.id, package = %package.name, "ignored by config");
                    continue;
                }
                let identity = (
                    vuln.id.clone(),
                    vuln.ecosystem,
                    vuln.package_name.clone(),
                    vuln.version.clone(),
                    vuln.manifest_file.clone(),
                );
                if seen.insert(identity) {
                    findings.push(vuln);
                }
            }
        }

        findings.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| a.package_name.cmp(&b.package_name))
                .then_with(|| a.version.cmp(&b.version))
                .then_with(|| a.id.cmp(&b.id))
                .then_with(|| a.manifest_file.cmp(&b.manifest_file))
        });

        ScanResult::completed(findings, scanned_files, packages.len())
    }
}

/// Converts one raw record for `package` into a [`NormalizedVulnerability`].
pub fn normalize(package: &PackageInfo, raw: &OsvVulnerability) -> NormalizedVulnerability {
    NormalizedVulnerability {
        id: raw.id.clone(),
        package_name: package.name.clone(),
        version: package.version.clone(),
        ecosystem: package.ecosystem,
        severity: classify(raw),
        summary: summarize(raw, &package.name),
        details: raw.details.clone().unwrap_or_default(),
        aliases: raw.aliases.clone(),
        references: raw
            .references
            .iter()
            .map(|r| Reference {
                ref_type: r.ref_type.clone(),
                url: r.url.clone(),
            })
            .collect(),
        cvss_score: cvss_score(raw),
        fixed_versions: fixed_versions(raw, &package.name),
        manifest_file: package.manifest_file.clone(),
    }
}

/// Every distinct `fixed` event in affected entries for `name`, in order of
/// appearance.
fn fixed_versions(raw: &OsvVulnerability, name: &str) -> Vec<String> {
    let mut fixed: Vec<String> = Vec::new();
    let events = raw
        .affected
        .iter()
        .filter(|a| {
            a.package
                .as_ref()
                .is_some_and(|p| p.name.eq_ignore_ascii_case(name))
        })
        .flat_map(|a| a.ranges.iter())
        .flat_map(|r| r.events.iter());

    for version in events.filter_map(|e| e.fixed.as_deref()) {
        if !fixed.iter().any(|v| v == version) {
            fixed.push(version.to_string());
        }
    }
    fixed
}

fn summarize(raw: &OsvVulnerability, package_name: &str) -> String {
    if let Some(summary) = raw.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        return summary.to_string();
    }
    if let Some(sentence) = raw.details.as_deref().and_then(first_sentence) {
        return sentence;
    }
    format!("Security vulnerability in {}", package_name)
}

/// First line or sentence of `details`, truncated to a readable length.
fn first_sentence(details: &str) -> Option<String> {
    let text = details.trim();
    let line = text.lines().next().unwrap_or_default().trim();

    let mut end = line.len();
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '.' && chars.peek().is_none_or(|(_, next)| next.is_whitespace()) {
            end = i + 1;
            break;
        }
    }
    let sentence = line[..end].trim();
    if sentence.is_empty() {
        return None;
    }

    if sentence.chars().count() > MAX_SUMMARY_LEN {
        let truncated: String = sentence.chars().take(MAX_SUMMARY_LEN).collect();
        Some(format!("{}...", truncated.trim_end()))
    } else {
        Some(sentence.to_string())
    }
}
