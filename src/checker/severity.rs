use super::cvss::cvss_v3_base_score;
use super::osv::OsvVulnerability;
use crate::model::Severity;
use serde_json::Value;

/// Maps an upstream record onto the severity scale.
///
/// Rules, first match wins:
/// 1. a CVSS score (database-specific `cvss_score`, or a `CVSS*` severity entry)
/// 2. a textual severity (non-CVSS severity entry or ecosystem-specific field)
/// 3. a database-specific textual severity
/// 4. `MEDIUM`
///
/// Never returns [`Severity::Unknown`].
pub fn classify(vuln: &OsvVulnerability) -> Severity {
    if let Some(score) = cvss_score(vuln) {
        return severity_from_score(score);
    }
    if let Some(severity) = textual_severities(vuln).find_map(severity_from_label) {
        return severity;
    }
    if let Some(severity) = database_severities(vuln).find_map(severity_from_label) {
        return severity;
    }
    Severity::Medium
}

/// The first usable CVSS base score of a record.
pub fn cvss_score(vuln: &OsvVulnerability) -> Option<f64> {
    let database_score = vuln
        .database_specific
        .as_ref()
        .and_then(|db| db.get("cvss_score"))
        .and_then(score_from_value);

    database_score.or_else(|| {
        vuln.severity
            .iter()
            .chain(vuln.affected.iter().flat_map(|a| a.severity.iter()))
            .filter(|s| s.severity_type.to_uppercase().contains("CVSS"))
            .find_map(|s| parse_score(&s.score))
    })
}

/// Buckets a CVSS score: `>= 9.0` critical, `>= 7.0` high, `>= 4.0` medium.
pub fn severity_from_score(score: f64) -> Severity {
    match score {
        s if s >= 9.0 => Severity::Critical,
        s if s >= 7.0 => Severity::High,
        s if s >= 4.0 => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Substring match of a free-form label, in descending risk order.
pub fn severity_from_label(label: &str) -> Option<Severity> {
    let label = label.to_uppercase();
    if label.contains("CRITICAL") {
        Some(Severity::Critical)
    } else if label.contains("HIGH") {
        Some(Severity::High)
    } else if label.contains("MEDIUM") || label.contains("MODERATE") {
        Some(Severity::Medium)
    } else if label.contains("LOW") {
        Some(Severity::Low)
    } else {
        None
    }
}

/// Numeric string or CVSS v3 vector.
fn parse_score(score: &str) -> Option<f64> {
    let score = score.trim();
    match score.parse::<f64>() {
        Ok(value) => valid_score(value),
        Err(_) => cvss_v3_base_score(score),
    }
}

fn score_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().and_then(valid_score),
        Value::String(s) => parse_score(s),
        _ => None,
    }
}

fn valid_score(value: f64) -> Option<f64> {
    (0.0..=10.0).contains(&value).then_some(value)
}

fn textual_severities(vuln: &OsvVulnerability) -> impl Iterator<Item = &str> {
    let entries = vuln
        .severity
        .iter()
        .filter(|s| !s.severity_type.to_uppercase().contains("CVSS"))
        .map(|s| s.score.as_str());

    let ecosystem_specific = vuln
        .affected
        .iter()
        .filter_map(|a| string_field(a.ecosystem_specific.as_ref(), "severity"));

    entries.chain(ecosystem_specific)
}

fn database_severities(vuln: &OsvVulnerability) -> impl Iterator<Item = &str> {
    string_field(vuln.database_specific.as_ref(), "severity")
        .into_iter()
        .chain(
            vuln.affected
                .iter()
                .filter_map(|a| string_field(a.database_specific.as_ref(), "severity")),
        )
}

fn string_field<'a>(value: Option<&'a Value>, field: &str) -> Option<&'a str> {
    value?.get(field)?.as_str()
}
