use super::{ManifestParser, ParsedManifest};
use crate::model::Ecosystem;
use serde_json::{Map, Value};

/// Reads `dependencies` and `devDependencies` from `package.json`.
pub struct NpmParser;

const DEPENDENCY_SECTIONS: [&str; 2] = ["dependencies", "devDependencies"];

impl ManifestParser for NpmParser {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    fn parse(&self, content: &str, path: &str) -> ParsedManifest {
        let root: Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(e) => return ParsedManifest::fail(path, format!("invalid package.json: {}", e)),
        };

        let mut parsed = ParsedManifest::new();
        for section in DEPENDENCY_SECTIONS {
            let Some(deps) = root.get(section).and_then(Value::as_object) else {
                continue;
            };
            collect_section(&mut parsed, deps, path);
        }
        parsed
    }
}

fn collect_section(parsed: &mut ParsedManifest, deps: &Map<String, Value>, path: &str) {
    for (name, spec) in deps {
        match spec.as_str() {
            Some(version) => parsed.add(Ecosystem::Npm, path, name, version),
            None => parsed.skip(path, format!("{}: version is not a string", name)),
        }
    }
}
