use super::{pattern, ManifestParser, ParsedManifest};
use crate::model::Ecosystem;
use regex::Regex;
use std::sync::LazyLock;

/// Reads `{:name, "constraint"}` tuples from the `deps` function of `mix.exs`.
pub struct MixParser;

static DEP_TUPLE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"\{\s*:([a-z0-9_]+)\s*,\s*"([^"]+)""#));

impl ManifestParser for MixParser {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Hex
    }

    fn parse(&self, content: &str, path: &str) -> ParsedManifest {
        let mut parsed = ParsedManifest::new();
        let deps = content
            .find("defp deps")
            .or_else(|| content.find("def deps"))
            .map_or(content, |start| &content[start..]);

        for caps in DEP_TUPLE.captures_iter(deps) {
            parsed.add(Ecosystem::Hex, path, &caps[1], &caps[2]);
        }

        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deps_tuples() {
        let content = r#"
defmodule App.MixProject do
  use Mix.Project

  def project do
    [app: :app, version: "0.1.0", deps: deps()]
  end

  defp deps do
    [
      {:phoenix, "~> 1.6.0"},
      {:plug_cowboy, "~> 2.5", only: :prod},
      {:local_dep, path: "../local_dep"}
    ]
  end
end
"#;
        let parsed = MixParser.parse(content, "mix.exs");
        let found: Vec<_> = parsed
            .packages
            .iter()
            .map(|p| (p.name.as_str(), p.version.as_str()))
            .collect();
        assert_eq!(found, vec![("phoenix", "1.6.0"), ("plug_cowboy", "2.5")]);
        assert!(parsed.packages.iter().all(|p| p.ecosystem == Ecosystem::Hex));
    }
}
