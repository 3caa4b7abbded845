use super::{ManifestParser, ParsedManifest};
use crate::model::Ecosystem;
use serde_json::Value;

/// Reads `require` and `require-dev` from `composer.json`.
pub struct ComposerParser;

const DEPENDENCY_SECTIONS: [&str; 2] = ["require", "require-dev"];

impl ManifestParser for ComposerParser {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Packagist
    }

    fn parse(&self, content: &str, path: &str) -> ParsedManifest {
        let root: Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(e) => return ParsedManifest::fail(path, format!("invalid composer.json: {}", e)),
        };

        let mut parsed = ParsedManifest::new();
        for section in DEPENDENCY_SECTIONS {
            let Some(deps) = root.get(section).and_then(Value::as_object) else {
                continue;
            };
            for (name, spec) in deps {
                if is_platform_package(name) {
                    continue;
                }
                let Some(constraint) = spec.as_str() else {
                    parsed.skip(path, format!("{}: version is not a string", name));
                    continue;
                };
                if constraint.starts_with("dev-") {
                    parsed.skip(path, format!("{}: branch constraint {}", name, constraint));
                    continue;
                }
                // composer accepts a single `|` as OR
                let first = constraint.split('|').next().unwrap_or_default();
                parsed.add(Ecosystem::Packagist, path, name, first);
            }
        }
        parsed
    }
}

fn is_platform_package(name: &str) -> bool {
    name == "php"
        || name.starts_with("ext-")
        || name.starts_with("lib-")
        || name.starts_with("composer-")
}
