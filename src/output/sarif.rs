//! SARIF (Static Analysis Results Interchange Format) output for GitHub Actions integration.
//!
//! When used with `--format sarif`, the output can be uploaded to GitHub Code Scanning
//! to show vulnerability annotations on the manifest that declares each package.

use crate::model::{NormalizedVulnerability, ScanResult, Severity};
use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashSet;

const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";

/// SARIF v2.1.0 schema root
#[derive(Serialize)]
struct SarifReport {
    #[serde(rename = "$schema")]
    schema: &'static str,
    version: &'static str,
    runs: Vec<SarifRun>,
}

#[derive(Serialize)]
struct SarifRun {
    tool: SarifTool,
    invocations: Vec<SarifInvocation>,
    results: Vec<SarifResult>,
}

#[derive(Serialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize)]
struct SarifDriver {
    name: &'static str,
    version: &'static str,
    #[serde(rename = "informationUri")]
    information_uri: &'static str,
    rules: Vec<SarifRule>,
}

#[derive(Serialize)]
struct SarifInvocation {
    #[serde(rename = "executionSuccessful")]
    execution_successful: bool,
    #[serde(rename = "endTimeUtc")]
    end_time_utc: String,
    #[serde(rename = "toolExecutionNotifications", skip_serializing_if = "Vec::is_empty")]
    notifications: Vec<SarifNotification>,
}

#[derive(Serialize)]
struct SarifNotification {
    level: &'static str,
    message: SarifMessage,
}

#[derive(Serialize)]
struct SarifRule {
    id: String,
    name: String,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    #[serde(rename = "fullDescription", skip_serializing_if = "Option::is_none")]
    full_description: Option<SarifMessage>,
    #[serde(rename = "helpUri", skip_serializing_if = "Option::is_none")]
    help_uri: Option<String>,
    #[serde(rename = "defaultConfiguration")]
    default_configuration: SarifRuleConfiguration,
}

#[derive(Serialize)]
struct SarifRuleConfiguration {
    level: &'static str,
}

#[derive(Serialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    level: &'static str,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifactLocation,
}

#[derive(Serialize)]
struct SarifArtifactLocation {
    uri: String,
}

fn severity_to_sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low | Severity::Unknown => "note",
    }
}

fn rule_for(vuln: &NormalizedVulnerability) -> SarifRule {
    SarifRule {
        id: vuln.id.clone(),
        name: vuln.summary.clone(),
        short_description: SarifMessage {
            text: vuln.summary.clone(),
        },
        full_description: (!vuln.details.is_empty()).then(|| SarifMessage {
            text: vuln.details.clone(),
        }),
        help_uri: vuln.references.first().map(|r| r.url.clone()),
        default_configuration: SarifRuleConfiguration {
            level: severity_to_sarif_level(vuln.severity),
        },
    }
}

fn result_for(vuln: &NormalizedVulnerability) -> SarifResult {
    SarifResult {
        rule_id: vuln.id.clone(),
        level: severity_to_sarif_level(vuln.severity),
        message: SarifMessage {
            text: format!(
                "{} vulnerability in {} {} ({}): {}{}",
                vuln.severity.as_str(),
                vuln.package_name,
                vuln.version,
                vuln.ecosystem,
                vuln.summary,
                vuln.earliest_fix()
                    .map(|v| format!(" (fixed in {})", v))
                    .unwrap_or_default()
            ),
        },
        locations: vec![SarifLocation {
            physical_location: SarifPhysicalLocation {
                artifact_location: SarifArtifactLocation {
                    uri: vuln.manifest_file.replace('\\', "/"),
                },
            },
        }],
    }
}

fn build_report(result: &ScanResult) -> SarifReport {
    let mut seen_rules = HashSet::new();
    let mut rules = Vec::new();
    let mut results = Vec::new();

    for vuln in &result.vulnerabilities {
        // One rule per vulnerability id, one result per finding
        if seen_rules.insert(vuln.id.as_str()) {
            rules.push(rule_for(vuln));
        }
        results.push(result_for(vuln));
    }

    let mut notifications: Vec<SarifNotification> = result
        .diagnostics
        .iter()
        .map(|d| SarifNotification {
            level: "warning",
            message: SarifMessage {
                text: match &d.file {
                    Some(file) => format!("{}: {}", file, d.message),
                    None => d.message.clone(),
                },
            },
        })
        .collect();
    if let Some(error) = &result.error {
        notifications.insert(
            0,
            SarifNotification {
                level: "error",
                message: SarifMessage { text: error.clone() },
            },
        );
    }

    SarifReport {
        schema: SARIF_SCHEMA,
        version: "2.1.0",
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: "depscan",
                    version: env!("CARGO_PKG_VERSION"),
                    information_uri: "https://osv.dev",
                    rules,
                },
            },
            invocations: vec![SarifInvocation {
                execution_successful: result.success,
                end_time_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                notifications,
            }],
            results,
        }],
    }
}

/// Generate and print SARIF output
pub fn print_sarif(result: &ScanResult) -> Result<()> {
    println!("{}", generate_sarif_string(result)?);
    Ok(())
}

/// Generate SARIF as a string (for file output)
pub fn generate_sarif_string(result: &ScanResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(&build_report(result))?)
}
