//! Vulnerability lookup and severity classification.
//!
//! [`OsvClient`] talks to the OSV.dev database through the [`OsvApi`]
//! trait; [`classify`] maps the returned records onto [`Severity`](crate::model::Severity).

pub mod cvss;
mod osv;
mod severity;

pub use cvss::cvss_v3_base_score;
pub use osv::{
    HttpOsvApi, OsvAffected, OsvApi, OsvBatchResponse, OsvBatchResult, OsvClient, OsvEvent,
    OsvPackage, OsvQuery, OsvRange, OsvReference, OsvSeverity, OsvVulnerability, QueryOutcome,
    RateLimitPolicy, VulnerabilityMap, BATCH_SIZE, DEFAULT_API_URL, MAX_PAGES, RETRY_DELAY,
};
pub use severity::{classify, cvss_score, severity_from_label, severity_from_score};

#[cfg(test)]
pub(crate) use osv::testing;
