use super::{pattern, ManifestParser, ParsedManifest};
use crate::model::Ecosystem;
use regex::Regex;
use std::sync::LazyLock;

/// Reads `gem "name", "constraint"` lines from a `Gemfile`.
pub struct GemfileParser;

static GEM: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r#"^gem\s+['"]([^'"]+)['"]\s*,\s*['"]([^'"]+)['"]"#)
});

impl ManifestParser for GemfileParser {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::RubyGems
    }

    fn parse(&self, content: &str, path: &str) -> ParsedManifest {
        let mut parsed = ParsedManifest::new();

        for line in content.lines() {
            let line = line.trim();
            if let Some(caps) = GEM.captures(line) {
                parsed.add(Ecosystem::RubyGems, path, &caps[1], &caps[2]);
            }
        }

        parsed
    }
}
