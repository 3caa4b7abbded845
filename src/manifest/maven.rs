use super::{pattern, ManifestParser, ParsedManifest};
use crate::model::Ecosystem;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Extracts `<dependency>` blocks from `pom.xml`.
///
/// Packages are named `groupId:artifactId`. `${property}` versions are
/// resolved from the pom's `<properties>` block.
pub struct MavenParser;

static DEPENDENCY: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?s)<dependency>(.*?)</dependency>"));
static GROUP_ID: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"<groupId>\s*([^<]+?)\s*</groupId>"));
static ARTIFACT_ID: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"<artifactId>\s*([^<]+?)\s*</artifactId>"));
static VERSION: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"<version>\s*([^<]+?)\s*</version>"));
static PROPERTIES: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?s)<properties>(.*?)</properties>"));
static PROPERTY: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"<([A-Za-z0-9_.\-]+)>\s*([^<]*?)\s*</([A-Za-z0-9_.\-]+)>"));
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\$\{([^}]+)\}$"));

impl ManifestParser for MavenParser {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Maven
    }

    fn parse(&self, content: &str, path: &str) -> ParsedManifest {
        let mut parsed = ParsedManifest::new();
        let properties = read_properties(content);

        for block in DEPENDENCY.captures_iter(content) {
            let body = &block[1];
            let group = capture(&GROUP_ID, body);
            let artifact = capture(&ARTIFACT_ID, body);
            let (Some(group), Some(artifact)) = (group, artifact) else {
                parsed.skip(path, "dependency without groupId or artifactId");
                continue;
            };
            let name = format!("{}:{}", group, artifact);

            let Some(raw_version) = capture(&VERSION, body) else {
                parsed.skip(path, format!("{}: no version (managed by a parent or BOM)", name));
                continue;
            };
            match resolve(raw_version, &properties) {
                Some(version) => parsed.add(Ecosystem::Maven, path, &name, version),
                None => parsed.skip(path, format!("{}: unresolved version {}", name, raw_version)),
            }
        }

        parsed
    }
}

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn read_properties(content: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    for block in PROPERTIES.captures_iter(content) {
        for prop in PROPERTY.captures_iter(&block[1]) {
            if prop[1] == prop[3] {
                properties.insert(prop[1].to_string(), prop[2].to_string());
            }
        }
    }
    properties
}

fn resolve<'a>(version: &'a str, properties: &'a HashMap<String, String>) -> Option<&'a str> {
    match PLACEHOLDER.captures(version).and_then(|caps| caps.get(1)) {
        Some(key) => properties.get(key.as_str()).map(String::as_str),
        None => Some(version),
    }
}
