use super::{pattern, ManifestParser, ParsedManifest};
use crate::model::Ecosystem;
use regex::Regex;
use std::sync::LazyLock;
use toml::{Table, Value};

/// Parser for Python manifests.
///
/// `requirements.txt` is read line by line: only `name<op>version` pins are
/// understood, while URLs, editable installs, extras and environment markers
/// are skipped silently. `Pipfile` and `pyproject.toml` are read as TOML.
pub struct PypiParser;

static REQUIREMENT: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^([A-Za-z0-9_.\-]+)\s*[=<>~]+\s*([0-9][A-Za-z0-9_.*+!\-]*)"));
static REQUIREMENT_NAME: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[A-Za-z0-9_.\-]+"));

impl ManifestParser for PypiParser {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::PyPI
    }

    fn parse(&self, content: &str, path: &str) -> ParsedManifest {
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        if file_name.eq_ignore_ascii_case("Pipfile") {
            parse_pipfile(content, path)
        } else if file_name.eq_ignore_ascii_case("pyproject.toml") {
            parse_pyproject(content, path)
        } else {
            parse_requirements(content, path)
        }
    }
}

fn parse_requirements(content: &str, path: &str) -> ParsedManifest {
    let mut parsed = ParsedManifest::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(caps) = REQUIREMENT.captures(line) {
            parsed.add(Ecosystem::PyPI, path, &caps[1], &caps[2]);
        }
    }

    parsed
}

fn parse_pipfile(content: &str, path: &str) -> ParsedManifest {
    let doc: Table = match toml::from_str(content) {
        Ok(doc) => doc,
        Err(e) => return ParsedManifest::fail(path, format!("invalid Pipfile: {}", e)),
    };

    let mut parsed = ParsedManifest::new();
    for section in ["packages", "dev-packages"] {
        if let Some(Value::Table(deps)) = doc.get(section) {
            add_dependency_table(&mut parsed, path, deps);
        }
    }
    parsed
}

fn parse_pyproject(content: &str, path: &str) -> ParsedManifest {
    let doc: Table = match toml::from_str(content) {
        Ok(doc) => doc,
        Err(e) => return ParsedManifest::fail(path, format!("invalid pyproject.toml: {}", e)),
    };

    let mut parsed = ParsedManifest::new();

    if let Some(project) = doc.get("project").and_then(Value::as_table) {
        if let Some(deps) = project.get("dependencies").and_then(Value::as_array) {
            add_requirement_list(&mut parsed, path, deps);
        }
        if let Some(extras) = project.get("optional-dependencies").and_then(Value::as_table) {
            for deps in extras.values().filter_map(Value::as_array) {
                add_requirement_list(&mut parsed, path, deps);
            }
        }
    }

    let poetry = doc
        .get("tool")
        .and_then(|tool| tool.get("poetry"))
        .and_then(Value::as_table);
    if let Some(poetry) = poetry {
        for section in ["dependencies", "dev-dependencies"] {
            if let Some(Value::Table(deps)) = poetry.get(section) {
                add_dependency_table(&mut parsed, path, deps);
            }
        }
    }

    parsed
}

/// PEP 508 strings such as `"flask==2.0.1"` or `"requests>=2.28; python_version>'3.7'"`.
fn add_requirement_list(parsed: &mut ParsedManifest, path: &str, deps: &[Value]) {
    for requirement in deps.iter().filter_map(Value::as_str) {
        let requirement = requirement.trim();
        if let Some(caps) = REQUIREMENT.captures(requirement) {
            parsed.add(Ecosystem::PyPI, path, &caps[1], &caps[2]);
        } else {
            let name = REQUIREMENT_NAME
                .find(requirement)
                .map_or(requirement, |m| m.as_str());
            parsed.skip(path, format!("{}: no pinned version", name));
        }
    }
}

/// `name = "==1.0"` or `name = { version = "^1.0", ... }` tables.
fn add_dependency_table(parsed: &mut ParsedManifest, path: &str, deps: &Table) {
    for (name, value) in deps {
        if name.eq_ignore_ascii_case("python") {
            continue;
        }
        let version = match value {
            Value::String(version) => Some(version.as_str()),
            Value::Table(table) => table.get("version").and_then(Value::as_str),
            _ => None,
        };
        match version.map(str::trim) {
            Some(version) if version != "*" => parsed.add(Ecosystem::PyPI, path, name, version),
            Some(_) => parsed.skip(path, format!("{}: any version (\"*\")", name)),
            None => parsed.skip(path, format!("{}: no registry version (path, git or url dependency)", name)),
        }
    }
}
