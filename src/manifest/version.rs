//! Version-range canonicalization.
//!
//! Manifests declare constraints (`^1.2.3`, `>=3.2`, `~2.0.0 || 3.0.0`,
//! `1.2.x`), while the vulnerability database needs one concrete version.
//! [`clean_version`] picks the lower bound of the first alternative.

const CONSTRAINT_CHARS: [char; 5] = ['^', '~', '>', '=', '<'];

/// Reduces a version constraint to a single concrete version string.
///
/// Returns an empty string when nothing usable remains; callers skip
/// such dependencies.
///
/// # Example
///
/// ```
/// use depscan::manifest::clean_version;
///
/// assert_eq!(clean_version("^1.2.3"), "1.2.3");
/// assert_eq!(clean_version("~2.0.0 || 3.0.0"), "2.0.0");
/// assert_eq!(clean_version("1.x"), "1.0");
/// ```
pub fn clean_version(raw: &str) -> String {
    let version = raw
        .trim()
        .trim_start_matches(|c: char| CONSTRAINT_CHARS.contains(&c) || c.is_whitespace());

    let version = version.split("||").next().unwrap_or_default();
    let version = version.split(" - ").next().unwrap_or_default();
    let version = version.split_whitespace().next().unwrap_or_default();

    replace_wildcard(version)
}

/// `1.2.x` -> `1.2.0`, `1.x.x` -> `1.0`, `*` -> `0`.
fn replace_wildcard(version: &str) -> String {
    let segments: Vec<&str> = version.split('.').collect();
    match segments.iter().position(|s| is_wildcard(s)) {
        Some(pos) => {
            let mut kept: Vec<&str> = segments[..pos].to_vec();
            kept.push("0");
            kept.join(".")
        }
        None => version.to_string(),
    }
}

fn is_wildcard(segment: &str) -> bool {
    matches!(segment, "*" | "x" | "X")
}
