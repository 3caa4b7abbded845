use super::{pattern, ManifestParser, ParsedManifest};
use crate::model::Ecosystem;
use regex::Regex;
use std::sync::LazyLock;

/// Reads `<PackageReference>` items from SDK-style project files and
/// `<package>` entries from `packages.config`.
pub struct NugetParser;

static PACKAGE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?s)<PackageReference\b([^>]*?)(?:/>|>(.*?)</PackageReference>)")
});
static PACKAGES_CONFIG_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"<package\s([^>]*?)/?>"));
static NAME_ATTR: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"(?i)\b(?:include|id)\s*=\s*"([^"]+)""#));
static VERSION_ATTR: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"(?i)\bversion\s*=\s*"([^"]+)""#));
static VERSION_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"<Version>\s*([^<]+?)\s*</Version>"));

impl ManifestParser for NugetParser {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::NuGet
    }

    fn parse(&self, content: &str, path: &str) -> ParsedManifest {
        let mut parsed = ParsedManifest::new();

        for item in PACKAGE_REFERENCE.captures_iter(content) {
            let attrs = &item[1];
            let version = attribute(&VERSION_ATTR, attrs).or_else(|| {
                item.get(2)
                    .and_then(|body| attribute(&VERSION_ELEMENT, body.as_str()))
            });
            add_entry(&mut parsed, path, attribute(&NAME_ATTR, attrs), version);
        }

        for item in PACKAGES_CONFIG_ENTRY.captures_iter(content) {
            let attrs = &item[1];
            add_entry(
                &mut parsed,
                path,
                attribute(&NAME_ATTR, attrs),
                attribute(&VERSION_ATTR, attrs),
            );
        }

        parsed
    }
}

fn attribute<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn add_entry(parsed: &mut ParsedManifest, path: &str, name: Option<&str>, version: Option<&str>) {
    match (name, version) {
        (Some(name), Some(version)) => {
            parsed.add(Ecosystem::NuGet, path, name, lower_bound(version))
        }
        (Some(name), None) => {
            parsed.skip(path, format!("{}: no version (centrally managed?)", name))
        }
        _ => parsed.skip(path, "package reference without a name"),
    }
}

/// NuGet interval notation: `[1.0,2.0)` -> `1.0`.
fn lower_bound(version: &str) -> &str {
    let version = version.trim().trim_start_matches(['[', '(']);
    version
        .split(',')
        .next()
        .unwrap_or_default()
        .trim_end_matches([']', ')'])
}
