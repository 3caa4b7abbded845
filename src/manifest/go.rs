use super::{ManifestParser, ParsedManifest};
use crate::model::Ecosystem;

/// Reads `require` directives from `go.mod`, in both the block and the
/// single-line form.
pub struct GoModParser;

impl ManifestParser for GoModParser {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Go
    }

    fn parse(&self, content: &str, path: &str) -> ParsedManifest {
        let mut parsed = ParsedManifest::new();
        let mut in_require = false;

        for line in content.lines() {
            let line = line.trim();

            if in_require {
                if line.starts_with(')') {
                    in_require = false;
                } else {
                    add_requirement(&mut parsed, line, path);
                }
                continue;
            }

            let Some(rest) = line.strip_prefix("require") else {
                continue;
            };
            if !rest.starts_with(|c: char| c.is_whitespace() || c == '(') {
                continue;
            }
            let rest = rest.trim_start();
            if rest.starts_with('(') {
                in_require = true;
            } else {
                add_requirement(&mut parsed, rest, path);
            }
        }

        parsed
    }
}

fn add_requirement(parsed: &mut ParsedManifest, line: &str, path: &str) {
    if line.is_empty() || line.starts_with("//") {
        return;
    }
    let mut parts = line.split_whitespace();
    if let (Some(module), Some(version)) = (parts.next(), parts.next()) {
        parsed.add(Ecosystem::Go, path, module, version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GO_MOD: &str = "\
module example.com/app

go 1.21

require github.com/pkg/errors v0.9.1

require (
\tgithub.com/gin-gonic/gin v1.9.1
\t// pinned for CVE fix
\tgolang.org/x/net v0.17.0 // indirect
)

replace github.com/old/dep => github.com/new/dep v1.0.0
";

    #[test]
    fn test_block_and_single_line_requires() {
        let parsed = GoModParser.parse(GO_MOD, "go.mod");
        let found: Vec<_> = parsed
            .packages
            .iter()
            .map(|p| (p.name.as_str(), p.version.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("github.com/pkg/errors", "v0.9.1"),
                ("github.com/gin-gonic/gin", "v1.9.1"),
                ("golang.org/x/net", "v0.17.0"),
            ]
        );
        assert!(parsed.packages.iter().all(|p| p.ecosystem == Ecosystem::Go));
    }

    #[test]
    fn test_lines_outside_require_are_ignored() {
        let parsed = GoModParser.parse("module x\n\ngo 1.20\nrequirements v1\n", "go.mod");
        assert!(parsed.packages.is_empty());
    }
}
