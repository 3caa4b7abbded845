use crate::model::{Ecosystem, ScanResult, Severity};
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt::Write;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct VulnRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Summary")]
    summary: String,
    #[tabled(rename = "Fixed In")]
    fixed_in: String,
    #[tabled(rename = "Manifest")]
    manifest: String,
}

pub fn print_cli_table(result: &ScanResult) -> Result<()> {
    print!("{}", render_table(result, true)?);
    Ok(())
}

/// Human-readable report. `color` adds ANSI severity colouring.
pub fn render_table(result: &ScanResult, color: bool) -> Result<String> {
    let mut out = String::new();
    write_report(&mut out, result, color)?;
    Ok(out)
}

fn write_report(out: &mut String, result: &ScanResult, color: bool) -> std::fmt::Result {
    writeln!(out)?;

    if let Some(error) = &result.error {
        writeln!(out, "Scan failed: {}", error)?;
        write_diagnostics(out, result)?;
        return Ok(());
    }

    writeln!(
        out,
        "Scanned {} packages in {} manifest files ({} ms)",
        result.scanned_packages, result.scanned_files, result.scan_duration_ms
    )?;
    writeln!(out)?;

    if result.vulnerabilities.is_empty() {
        writeln!(out, "No known vulnerabilities found.")?;
    } else {
        writeln!(out, "Found {} vulnerabilities:", result.vulnerabilities.len())?;
        writeln!(out)?;

        let rows: Vec<VulnRow> = result
            .vulnerabilities
            .iter()
            .map(|v| VulnRow {
                severity: format_severity(v.severity, color),
                package: truncate(&v.package_name, 40),
                version: v.version.clone(),
                id: v.id.clone(),
                summary: truncate(&v.summary, 50),
                fixed_in: v.earliest_fix().unwrap_or("-").to_string(),
                manifest: truncate(&v.manifest_file, 40),
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        writeln!(out, "{}", table)?;
    }

    if !result.unchecked_packages.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "{} packages could not be checked (rate limited):",
            result.unchecked_packages.len()
        )?;
        for package in &result.unchecked_packages {
            writeln!(
                out,
                "  {} {}@{} ({})",
                package.ecosystem, package.name, package.version, package.manifest_file
            )?;
        }
    }

    write_diagnostics(out, result)?;

    writeln!(out)?;
    write_summary(out, result)
}

fn write_diagnostics(out: &mut String, result: &ScanResult) -> std::fmt::Result {
    if result.diagnostics.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "Warnings:")?;
    for diagnostic in &result.diagnostics {
        match &diagnostic.file {
            Some(file) => writeln!(out, "  {}: {}", file, diagnostic.message)?,
            None => writeln!(out, "  {}", diagnostic.message)?,
        }
    }
    Ok(())
}

fn write_summary(out: &mut String, result: &ScanResult) -> std::fmt::Result {
    let mut by_ecosystem: BTreeMap<Ecosystem, usize> = BTreeMap::new();
    for vuln in &result.vulnerabilities {
        *by_ecosystem.entry(vuln.ecosystem).or_default() += 1;
    }

    writeln!(out, "Summary:")?;
    writeln!(out, "  Manifest files: {}", result.scanned_files)?;
    writeln!(out, "  Packages: {}", result.scanned_packages)?;

    let stats = &result.stats;
    writeln!(
        out,
        "  Vulnerabilities: {} ({} critical, {} high, {} medium, {} low)",
        stats.total, stats.critical, stats.high, stats.medium, stats.low
    )?;

    // Show breakdown by ecosystem if multiple ecosystems
    if by_ecosystem.len() > 1 {
        let breakdown: Vec<String> = by_ecosystem
            .iter()
            .map(|(e, c)| format!("{} {}", c, e.display_name()))
            .collect();
        writeln!(out, "  By ecosystem: {}", breakdown.join(", "))?;
    }
    Ok(())
}

fn format_severity(severity: Severity, color: bool) -> String {
    if !color {
        return severity.as_str().to_string();
    }
    match severity {
        Severity::Critical => "\x1b[31mCRITICAL\x1b[0m".to_string(),
        Severity::High => "\x1b[91mHIGH\x1b[0m".to_string(),
        Severity::Medium => "\x1b[33mMEDIUM\x1b[0m".to_string(),
        Severity::Low => "\x1b[32mLOW\x1b[0m".to_string(),
        Severity::Unknown => "UNKNOWN".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Diagnostic, DiagnosticKind, NormalizedVulnerability};

    fn vuln(name: &str, severity: Severity) -> NormalizedVulnerability {
        NormalizedVulnerability {
            id: format!("GHSA-{}", name),
            package_name: name.to_string(),
            version: "1.0.0".to_string(),
            ecosystem: Ecosystem::Npm,
            severity,
            summary: "Prototype pollution".to_string(),
            details: String::new(),
            aliases: Vec::new(),
            references: Vec::new(),
            cvss_score: None,
            fixed_versions: vec!["1.0.5".to_string(), "1.0.1".to_string()],
            manifest_file: "package.json".to_string(),
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-package-name", 10), "a-very-...");
        assert_eq!(truncate("ünïcödé-ünïcödé", 8), "ünïcö...");
    }

    #[test]
    fn test_render_lists_findings_and_summary() {
        let result = ScanResult::completed(
            vec![vuln("lodash", Severity::Critical), vuln("minimist", Severity::Low)],
            1,
            12,
        );

        let text = render_table(&result, false).unwrap();

        assert!(text.contains("Found 2 vulnerabilities"));
        assert!(text.contains("GHSA-lodash"));
        assert!(text.contains("CRITICAL"));
        assert!(text.contains("1.0.1"));
        assert!(text.contains("Vulnerabilities: 2 (1 critical, 0 high, 0 medium, 1 low)"));
        assert!(!text.contains("\x1b["));
    }

    #[test]
    fn test_render_failed_scan() {
        let result = ScanResult::failed("No supported dependency manifest files found", 0, 0)
            .with_diagnostics(vec![Diagnostic::in_file(
                DiagnosticKind::UnsupportedManifest,
                "notes.txt",
                "not a recognised dependency manifest",
            )]);

        let text = render_table(&result, true).unwrap();

        assert!(text.contains("Scan failed: No supported dependency manifest files found"));
        assert!(text.contains("notes.txt: not a recognised dependency manifest"));
    }

    #[test]
    fn test_render_clean_scan() {
        let text = render_table(&ScanResult::completed(Vec::new(), 2, 30), true).unwrap();
        assert!(text.contains("No known vulnerabilities found."));
        assert!(text.contains("Packages: 30"));
    }
}
