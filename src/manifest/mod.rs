//! Dependency manifest parsers.
//!
//! This module provides the [`ManifestParser`] trait, one implementation per
//! [`Ecosystem`], and filename-based detection.
//!
//! # Supported Manifests
//!
//! | Parser | Ecosystem | Files |
//! |--------|-----------|-------|
//! | [`NpmParser`] | npm | `package.json` |
//! | [`PypiParser`] | PyPI | `requirements.txt`, `Pipfile`, `pyproject.toml` |
//! | [`GoModParser`] | Go | `go.mod` |
//! | [`CargoParser`] | crates.io | `Cargo.toml` |
//! | [`MavenParser`] | Maven | `pom.xml` |
//! | [`NugetParser`] | NuGet | `*.csproj`, `packages.config` |
//! | [`ComposerParser`] | Packagist | `composer.json` |
//! | [`GemfileParser`] | RubyGems | `Gemfile` |
//! | [`MixParser`] | Hex | `mix.exs` |
//!
//! Parsers are total: malformed input never fails, it produces whatever
//! packages could be extracted plus [`Diagnostic`]s for the rest.
//!
//! # Example
//!
//! ```
//! use depscan::manifest::{detect_ecosystem, parse_manifest};
//! use depscan::Ecosystem;
//!
//! let path = "app/requirements.txt";
//! let ecosystem = detect_ecosystem(path).unwrap();
//! assert_eq!(ecosystem, Ecosystem::PyPI);
//!
//! let parsed = parse_manifest(ecosystem, "flask==2.0.1\n", path);
//! assert_eq!(parsed.packages[0].name, "flask");
//! ```

mod cargo;
mod go;
mod hex;
mod maven;
mod npm;
mod nuget;
mod packagist;
mod pypi;
mod rubygems;
mod version;

pub use cargo::CargoParser;
pub use go::GoModParser;
pub use hex::MixParser;
pub use maven::MavenParser;
pub use npm::NpmParser;
pub use nuget::NugetParser;
pub use packagist::ComposerParser;
pub use pypi::PypiParser;
pub use rubygems::GemfileParser;
pub use version::clean_version;

use crate::model::{Diagnostic, DiagnosticKind, Ecosystem, PackageInfo};
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

/// Extracts declared dependencies from one manifest format.
///
/// Implementations must not panic or fail on malformed content.
pub trait ManifestParser: Send + Sync {
    /// The ecosystem every returned package belongs to.
    fn ecosystem(&self) -> Ecosystem;

    /// Parses `content`, read from `path`.
    fn parse(&self, content: &str, path: &str) -> ParsedManifest;
}

/// Packages extracted from one manifest, plus anything that was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedManifest {
    pub packages: Vec<PackageInfo>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedManifest {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records a dependency after cleaning its version. Entries whose
    /// version cleans to nothing are reported and dropped.
    pub(crate) fn add(&mut self, ecosystem: Ecosystem, path: &str, name: &str, raw_version: &str) {
        let version = clean_version(raw_version);
        if version.is_empty() {
            self.skip(path, format!("{}: no usable version in {:?}", name, raw_version));
            return;
        }
        self.packages
            .push(PackageInfo::new(name, version, ecosystem, path));
    }

    pub(crate) fn skip(&mut self, path: &str, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::in_file(DiagnosticKind::SkippedEntry, path, message));
    }

    pub(crate) fn fail(path: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!(file = path, "{}", message);
        Self {
            packages: Vec::new(),
            diagnostics: vec![Diagnostic::in_file(DiagnosticKind::Parse, path, message)],
        }
    }
}

/// File name patterns recognised for each ecosystem, matched
/// case-insensitively against the last path component.
pub fn manifest_patterns(ecosystem: Ecosystem) -> &'static str {
    match ecosystem {
        Ecosystem::Npm => r"^package\.json$",
        Ecosystem::PyPI => r"^requirements\.txt$|^Pipfile$|^pyproject\.toml$",
        Ecosystem::Go => r"^go\.mod$",
        Ecosystem::CratesIo => r"^Cargo\.toml$",
        Ecosystem::Maven => r"^pom\.xml$",
        Ecosystem::NuGet => r"\.csproj$|^packages\.config$",
        Ecosystem::Packagist => r"^composer\.json$",
        Ecosystem::RubyGems => r"^Gemfile$",
        Ecosystem::Hex => r"^mix\.exs$",
    }
}

static DETECTORS: LazyLock<Vec<(Ecosystem, Regex)>> = LazyLock::new(|| {
    Ecosystem::ALL
        .iter()
        .filter_map(|&ecosystem| {
            RegexBuilder::new(manifest_patterns(ecosystem))
                .case_insensitive(true)
                .build()
                .ok()
                .map(|re| (ecosystem, re))
        })
        .collect()
});

/// Infers the ecosystem of a manifest from its filename alone.
///
/// Returns `None` for files that are not recognised manifests.
pub fn detect_ecosystem(path: &str) -> Option<Ecosystem> {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    DETECTORS
        .iter()
        .find(|(_, re)| re.is_match(file_name))
        .map(|(ecosystem, _)| *ecosystem)
}

/// Returns the parser for a specific ecosystem.
pub fn get_parser(ecosystem: Ecosystem) -> Box<dyn ManifestParser> {
    match ecosystem {
        Ecosystem::Npm => Box::new(NpmParser),
        Ecosystem::PyPI => Box::new(PypiParser),
        Ecosystem::Go => Box::new(GoModParser),
        Ecosystem::CratesIo => Box::new(CargoParser),
        Ecosystem::Maven => Box::new(MavenParser),
        Ecosystem::NuGet => Box::new(NugetParser),
        Ecosystem::Packagist => Box::new(ComposerParser),
        Ecosystem::RubyGems => Box::new(GemfileParser),
        Ecosystem::Hex => Box::new(MixParser),
    }
}

/// Parses one manifest with the parser for `ecosystem`.
pub fn parse_manifest(ecosystem: Ecosystem, content: &str, path: &str) -> ParsedManifest {
    let parsed = get_parser(ecosystem).parse(content, path);
    tracing::debug!(
        file = path,
        ecosystem = %ecosystem,
        packages = parsed.packages.len(),
        skipped = parsed.diagnostics.len(),
        "parsed manifest"
    );
    parsed
}

/// Compiles a pattern that is known to be valid at build time.
pub(crate) fn pattern(re: &str) -> Regex {
    match Regex::new(re) {
        Ok(regex) => regex,
        Err(e) => panic!("invalid built-in pattern {re:?}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_ecosystem() {
        assert_eq!(detect_ecosystem("package.json"), Some(Ecosystem::Npm));
        assert_eq!(detect_ecosystem("web/Package.JSON"), Some(Ecosystem::Npm));
        assert_eq!(detect_ecosystem("requirements.txt"), Some(Ecosystem::PyPI));
        assert_eq!(detect_ecosystem("svc/Pipfile"), Some(Ecosystem::PyPI));
        assert_eq!(detect_ecosystem("pyproject.toml"), Some(Ecosystem::PyPI));
        assert_eq!(detect_ecosystem("go.mod"), Some(Ecosystem::Go));
        assert_eq!(detect_ecosystem("crates/core/Cargo.toml"), Some(Ecosystem::CratesIo));
        assert_eq!(detect_ecosystem("pom.xml"), Some(Ecosystem::Maven));
        assert_eq!(detect_ecosystem("src/App.csproj"), Some(Ecosystem::NuGet));
        assert_eq!(detect_ecosystem("packages.config"), Some(Ecosystem::NuGet));
        assert_eq!(detect_ecosystem(r"C:\src\web\package.json"), Some(Ecosystem::Npm));
        assert_eq!(detect_ecosystem("composer.json"), Some(Ecosystem::Packagist));
        assert_eq!(detect_ecosystem("Gemfile"), Some(Ecosystem::RubyGems));
        assert_eq!(detect_ecosystem("mix.exs"), Some(Ecosystem::Hex));
    }

    #[test]
    fn test_detect_ignores_other_files() {
        assert_eq!(detect_ecosystem("README.md"), None);
        assert_eq!(detect_ecosystem("package-lock.json"), None);
        assert_eq!(detect_ecosystem("Cargo.lock"), None);
        assert_eq!(detect_ecosystem("go.sum"), None);
        assert_eq!(detect_ecosystem("Gemfile.lock"), None);
        assert_eq!(detect_ecosystem("src/main.rs"), None);
        assert_eq!(detect_ecosystem("fixtures/old-package.json"), None);
        assert_eq!(detect_ecosystem("dev-requirements.txt"), None);
    }

    #[test]
    fn test_get_parser_matches_ecosystem() {
        for ecosystem in Ecosystem::ALL {
            assert_eq!(get_parser(ecosystem).ecosystem(), ecosystem);
        }
    }

    #[test]
    fn test_add_drops_empty_versions() {
        let mut parsed = ParsedManifest::new();
        parsed.add(Ecosystem::Npm, "package.json", "left-pad", "^1.3.0");
        parsed.add(Ecosystem::Npm, "package.json", "broken", "^");
        assert_eq!(parsed.packages.len(), 1);
        assert_eq!(parsed.packages[0].version, "1.3.0");
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::SkippedEntry);
    }
}
