//! CVSS v3.x base score calculation from a vector string.

const ROUNDING_SCALE: f64 = 100_000.0;

/// Computes the base score of a `CVSS:3.0/...` or `CVSS:3.1/...` vector.
///
/// Returns `None` for other CVSS versions or incomplete vectors.
///
/// # Example
///
/// ```
/// use depscan::checker::cvss_v3_base_score;
///
/// let score = cvss_v3_base_score("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H");
/// assert_eq!(score, Some(9.8));
/// ```
pub fn cvss_v3_base_score(vector: &str) -> Option<f64> {
    let mut parts = vector.trim().split('/');
    let round: fn(f64) -> f64 = match parts.next()? {
        "CVSS:3.0" => round_up_v30,
        "CVSS:3.1" => round_up,
        _ => return None,
    };

    let mut metrics = BaseMetrics::default();
    for part in parts {
        let (key, value) = part.split_once(':')?;
        match key {
            "AV" => metrics.av = Some(value),
            "AC" => metrics.ac = Some(value),
            "PR" => metrics.pr = Some(value),
            "UI" => metrics.ui = Some(value),
            "S" => metrics.s = Some(value),
            "C" => metrics.c = Some(value),
            "I" => metrics.i = Some(value),
            "A" => metrics.a = Some(value),
            // temporal / environmental metrics do not affect the base score
            _ => {}
        }
    }
    metrics.score(round)
}

#[derive(Default)]
struct BaseMetrics<'a> {
    av: Option<&'a str>,
    ac: Option<&'a str>,
    pr: Option<&'a str>,
    ui: Option<&'a str>,
    s: Option<&'a str>,
    c: Option<&'a str>,
    i: Option<&'a str>,
    a: Option<&'a str>,
}

impl BaseMetrics<'_> {
    fn score(&self, round: fn(f64) -> f64) -> Option<f64> {
        let scope_changed = match self.s? {
            "U" => false,
            "C" => true,
            _ => return None,
        };

        let av = match self.av? {
            "N" => 0.85,
            "A" => 0.62,
            "L" => 0.55,
            "P" => 0.2,
            _ => return None,
        };
        let ac = match self.ac? {
            "L" => 0.77,
            "H" => 0.44,
            _ => return None,
        };
        let pr = match (self.pr?, scope_changed) {
            ("N", _) => 0.85,
            ("L", false) => 0.62,
            ("L", true) => 0.68,
            ("H", false) => 0.27,
            ("H", true) => 0.5,
            _ => return None,
        };
        let ui = match self.ui? {
            "N" => 0.85,
            "R" => 0.62,
            _ => return None,
        };
        let c = impact_weight(self.c?)?;
        let i = impact_weight(self.i?)?;
        let a = impact_weight(self.a?)?;

        let iss = 1.0 - (1.0 - c) * (1.0 - i) * (1.0 - a);
        let impact = if scope_changed {
            7.52 * (iss - 0.029) - 3.25 * (iss - 0.02).powi(15)
        } else {
            6.42 * iss
        };
        let exploitability = 8.22 * av * ac * pr * ui;

        if impact <= 0.0 {
            return Some(0.0);
        }
        let raw = if scope_changed {
            1.08 * (impact + exploitability)
        } else {
            impact + exploitability
        };
        Some(round(raw.min(10.0)))
    }
}

fn impact_weight(value: &str) -> Option<f64> {
    match value {
        "H" => Some(0.56),
        "L" => Some(0.22),
        "N" => Some(0.0),
        _ => None,
    }
}

/// CVSS 3.0 Roundup: the plain ceiling to one decimal.
fn round_up_v30(value: f64) -> f64 {
    (value * 10.0).ceil() / 10.0
}

/// CVSS 3.1 Roundup (appendix A), which works on an integer scale to
/// avoid floating point artifacts.
fn round_up(value: f64) -> f64 {
    let int_input = (value * ROUNDING_SCALE).round() as i64;
    if int_input % 10_000 == 0 {
        int_input as f64 / ROUNDING_SCALE
    } else {
        ((int_input / 10_000) + 1) as f64 / 10.0
    }
}
