use super::{pattern, ManifestParser, ParsedManifest};
use crate::model::Ecosystem;
use regex::Regex;
use std::sync::LazyLock;

/// Pattern-based reader for the dependency tables of `Cargo.toml`.
///
/// Recognises `name = "1.2.3"` and `name = { version = "1.2.3", ... }`
/// inside `[dependencies]` and `[dev-dependencies]`.
pub struct CargoParser;

static SIMPLE_DEP: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"^([A-Za-z0-9_\-]+)\s*=\s*"([^"]+)""#));
static TABLE_DEP: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"^([A-Za-z0-9_\-]+)\s*=\s*\{.*?\bversion\s*=\s*"([^"]+)""#));
static INLINE_TABLE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^([A-Za-z0-9_\-]+)\s*=\s*\{"));

impl ManifestParser for CargoParser {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::CratesIo
    }

    fn parse(&self, content: &str, path: &str) -> ParsedManifest {
        let mut parsed = ParsedManifest::new();
        let mut in_dependencies = false;

        for line in content.lines() {
            let line = line.trim();

            if line.starts_with('[') {
                in_dependencies = is_dependency_table(line);
                continue;
            }
            if !in_dependencies || line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(caps) = SIMPLE_DEP.captures(line) {
                parsed.add(Ecosystem::CratesIo, path, &caps[1], &caps[2]);
            } else if let Some(caps) = TABLE_DEP.captures(line) {
                parsed.add(Ecosystem::CratesIo, path, &caps[1], &caps[2]);
            } else if let Some(caps) = INLINE_TABLE.captures(line) {
                parsed.skip(path, format!("{}: no registry version (path, git or workspace dependency)", &caps[1]));
            }
        }

        parsed
    }
}

/// `[dependencies]`, `[dev-dependencies]` and their `[target.<cfg>.*]` forms,
/// allowing whitespace inside the brackets and a trailing comment.
fn is_dependency_table(header: &str) -> bool {
    let header = header.split('#').next().unwrap_or_default().trim();
    let Some(name) = header.strip_prefix('[').and_then(|h| h.strip_suffix(']')) else {
        return false;
    };
    let name: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    let table = name.rsplit('.').next().unwrap_or_default();
    matches!(table, "dependencies" | "dev-dependencies")
        && (name == table || name.starts_with("target."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_form_with_features() {
        let content = "[dependencies]\nserde = { version = \"1.0.100\", features = [\"derive\"] }\n";
        let parsed = CargoParser.parse(content, "Cargo.toml");

        assert_eq!(parsed.packages.len(), 1);
        assert_eq!(parsed.packages[0].name, "serde");
        assert_eq!(parsed.packages[0].version, "1.0.100");
        assert_eq!(parsed.packages[0].ecosystem, Ecosystem::CratesIo);
    }

    #[test]
    fn test_only_dependency_tables_are_read() {
        let content = r#"
[package]
name = "app"
version = "0.1.0"

[dependencies]
tokio = { features = ["full"], version = "1.28" }
anyhow = "1"
local = { path = "../local" }

[features]
default = "std"

[dev-dependencies]
tempfile = "^3.5"

[build-dependencies]
cc = "1.0"
"#;
        let parsed = CargoParser.parse(content, "Cargo.toml");
        let found: Vec<_> = parsed
            .packages
            .iter()
            .map(|p| (p.name.as_str(), p.version.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![("tokio", "1.28"), ("anyhow", "1"), ("tempfile", "3.5")]
        );
        assert_eq!(parsed.diagnostics.len(), 1);
        assert!(parsed.diagnostics[0].message.contains("local"));
    }

    #[test]
    fn test_garbage_does_not_panic() {
        let parsed = CargoParser.parse("[dependencies\nserde = {\n= \"1\"\n", "Cargo.toml");
        assert!(parsed.packages.is_empty());
    }

    #[test]
    fn test_table_headers_with_comments_and_spacing() {
        let content = "\
[dependencies] # runtime
serde = \"1.0.100\"

[ dev-dependencies ]
tempfile = \"3.5\"

[target.'cfg(unix)'.dependencies]
libc = \"0.2.150\"

[build-dependencies] # not scanned
cc = \"1.0\"
";
        let parsed = CargoParser.parse(content, "Cargo.toml");
        let found: Vec<_> = parsed
            .packages
            .iter()
            .map(|p| (p.name.as_str(), p.version.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![("serde", "1.0.100"), ("tempfile", "3.5"), ("libc", "0.2.150")]
        );
    }

    #[test]
    fn test_is_dependency_table() {
        assert!(is_dependency_table("[dependencies]"));
        assert!(is_dependency_table("[ dependencies ]  # comment"));
        assert!(is_dependency_table("[target.x86_64-pc-windows-msvc.dev-dependencies]"));
        assert!(!is_dependency_table("[build-dependencies]"));
        assert!(!is_dependency_table("[package]"));
        assert!(!is_dependency_table("[dependencies"));
        assert!(!is_dependency_table("[dependencies.serde]"));
    }
}
