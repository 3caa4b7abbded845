use crate::error::{ApiError, ScanError};
use crate::model::{Diagnostic, DiagnosticKind, PackageInfo};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.osv.dev";

/// Maximum number of packages to query in a single batch request.
pub const BATCH_SIZE: usize = 1000;

/// Fixed wait before the single retry of a rate-limited batch.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Upper bound on `next_page_token` follow-ups per batch.
pub const MAX_PAGES: usize = 10;

/// Raw vulnerability records keyed by `ecosystem:name@version`.
pub type VulnerabilityMap = BTreeMap<String, Vec<OsvVulnerability>>;

/// What to do when a batch is still rate limited after its retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitPolicy {
    /// Abort the whole scan.
    #[default]
    FailScan,
    /// Give up on that batch only and report its packages as unchecked.
    SkipBatch,
}

// --- Wire schema (https://ossf.github.io/osv-schema/) ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsvPackage {
    pub name: String,
    pub ecosystem: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsvQuery {
    pub package: OsvPackage,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

impl OsvQuery {
    pub fn for_package(package: &PackageInfo) -> Self {
        Self {
            package: OsvPackage {
                name: package.name.clone(),
                ecosystem: package.ecosystem.as_str().to_string(),
            },
            version: package.version.clone(),
            page_token: None,
        }
    }

    fn next_page(mut self, token: String) -> Self {
        self.page_token = Some(token);
        self
    }
}

#[derive(Serialize)]
struct OsvBatchQuery<'a> {
    queries: &'a [OsvQuery],
}

/// Response of the batch endpoint; `results` is aligned with the queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OsvBatchResponse {
    #[serde(default)]
    pub results: Vec<OsvBatchResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OsvBatchResult {
    #[serde(default)]
    pub vulns: Vec<OsvVulnerability>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A vulnerability record. The batch endpoint only fills `id` and
/// `modified`; the detail endpoint returns the full record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsvVulnerability {
    pub id: String,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub severity: Vec<OsvSeverity>,
    #[serde(default)]
    pub affected: Vec<OsvAffected>,
    #[serde(default)]
    pub references: Vec<OsvReference>,
    /// Free-form per database; `severity` and `cvss_score` are read from it.
    #[serde(default)]
    pub database_specific: Option<Value>,
}

impl OsvVulnerability {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsvSeverity {
    #[serde(rename = "type")]
    pub severity_type: String,
    pub score: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsvAffected {
    #[serde(default)]
    pub package: Option<OsvPackage>,
    #[serde(default)]
    pub severity: Vec<OsvSeverity>,
    #[serde(default)]
    pub ranges: Vec<OsvRange>,
    #[serde(default)]
    pub ecosystem_specific: Option<Value>,
    #[serde(default)]
    pub database_specific: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsvRange {
    #[serde(rename = "type", default)]
    pub range_type: String,
    #[serde(default)]
    pub events: Vec<OsvEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsvEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduced: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_affected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsvReference {
    #[serde(rename = "type", default)]
    pub ref_type: String,
    pub url: String,
}

// --- Transport ---

/// The two endpoints of the vulnerability database.
#[async_trait]
pub trait OsvApi: Send + Sync {
    /// Looks up many packages at once; results are positionally aligned
    /// with `queries`.
    async fn query_batch(&self, queries: &[OsvQuery]) -> Result<OsvBatchResponse, ApiError>;

    /// Fetches the full record for one vulnerability id.
    async fn get_vulnerability(&self, id: &str) -> Result<OsvVulnerability, ApiError>;
}

/// [`OsvApi`] over HTTPS with `reqwest`.
pub struct HttpOsvApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOsvApi {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_API_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl Default for HttpOsvApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OsvApi for HttpOsvApi {
    async fn query_batch(&self, queries: &[OsvQuery]) -> Result<OsvBatchResponse, ApiError> {
        let response = self
            .client
            .post(format!("{}/v1/querybatch", self.base_url))
            .json(&OsvBatchQuery { queries })
            .send()
            .await?;

        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))
    }

    async fn get_vulnerability(&self, id: &str) -> Result<OsvVulnerability, ApiError> {
        let response = self
            .client
            .get(format!("{}/v1/vulns/{}", self.base_url, id))
            .send()
            .await?;

        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))
    }
}

// --- Client ---

/// Result of querying every package.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub vulnerabilities: VulnerabilityMap,
    /// Keys of packages whose batch was skipped.
    pub unchecked: BTreeSet<String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Default)]
struct BatchOutcome {
    vulnerabilities: VulnerabilityMap,
    diagnostics: Vec<Diagnostic>,
}

/// Batched vulnerability lookups with rate-limit retry and concurrent
/// detail fetches.
///
/// Batches run one after another; the detail fetches of a batch run
/// concurrently and are all awaited before the next batch starts.
pub struct OsvClient<A = HttpOsvApi> {
    api: A,
    batch_size: usize,
    retry_delay: Duration,
    max_pages: usize,
    rate_limit_policy: RateLimitPolicy,
}

impl OsvClient<HttpOsvApi> {
    pub fn new() -> Self {
        Self::with_api(HttpOsvApi::new())
    }
}

impl Default for OsvClient<HttpOsvApi> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: OsvApi> OsvClient<A> {
    pub fn with_api(api: A) -> Self {
        Self {
            api,
            batch_size: BATCH_SIZE,
            retry_delay: RETRY_DELAY,
            max_pages: MAX_PAGES,
            rate_limit_policy: RateLimitPolicy::default(),
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit_policy = policy;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Looks up every distinct package identity in `packages`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::RateLimited`] when a batch is rate limited twice
    /// (unless the policy is [`RateLimitPolicy::SkipBatch`]) and
    /// [`ScanError::Upstream`] for any other failed batch request.
    pub async fn query(&self, packages: &[PackageInfo]) -> Result<QueryOutcome, ScanError> {
        let mut seen = HashSet::new();
        let unique: Vec<&PackageInfo> = packages.iter().filter(|p| seen.insert(p.key())).collect();

        let mut outcome = QueryOutcome::default();
        let batch_count = unique.len().div_ceil(self.batch_size);

        for (index, chunk) in unique.chunks(self.batch_size).enumerate() {
            let batch = index + 1;
            tracing::debug!(batch, batch_count, packages = chunk.len(), "querying batch");

            match self.query_chunk(batch, chunk).await {
                Ok(result) => {
                    outcome.vulnerabilities.extend(result.vulnerabilities);
                    outcome.diagnostics.extend(result.diagnostics);
                }
                Err(ScanError::RateLimited { batch })
                    if self.rate_limit_policy == RateLimitPolicy::SkipBatch =>
                {
                    tracing::warn!(batch, packages = chunk.len(), "skipping rate-limited batch");
                    outcome.unchecked.extend(chunk.iter().map(|p| p.key()));
                    outcome.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::BatchSkipped,
                        format!(
                            "batch {} of {} ({} packages) skipped after repeated rate limiting",
                            batch,
                            batch_count,
                            chunk.len()
                        ),
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(outcome)
    }

    async fn query_chunk(&self, batch: usize, chunk: &[&PackageInfo]) -> Result<BatchOutcome, ScanError> {
        let mut matches: Vec<Vec<OsvVulnerability>> = vec![Vec::new(); chunk.len()];
        let mut pending: Vec<(usize, OsvQuery)> = chunk
            .iter()
            .map(|p| OsvQuery::for_package(p))
            .enumerate()
            .collect();
        let mut pages = 0;

        while !pending.is_empty() {
            let queries: Vec<OsvQuery> = pending.iter().map(|(_, q)| q.clone()).collect();
            let response = self.send_batch(batch, &queries).await?;

            if response.results.len() != queries.len() {
                return Err(ScanError::Upstream {
                    batch,
                    source: ApiError::MalformedResponse(format!(
                        "expected {} results, got {}",
                        queries.len(),
                        response.results.len()
                    )),
                });
            }

            let mut next = Vec::new();
            for ((index, query), result) in pending.into_iter().zip(response.results) {
                matches[index].extend(result.vulns);
                if let Some(token) = result.next_page_token {
                    next.push((index, query.next_page(token)));
                }
            }

            pages += 1;
            if pages >= self.max_pages && !next.is_empty() {
                tracing::warn!(batch, remaining = next.len(), "page limit reached, results truncated");
                break;
            }
            pending = next;
        }

        let mut outcome = BatchOutcome::default();
        let details = self.fetch_details(&matches, &mut outcome.diagnostics).await;

        for (package, found) in chunk.iter().zip(matches) {
            if found.is_empty() {
                continue;
            }
            let records = found
                .into_iter()
                .map(|minimal| details.get(&minimal.id).cloned().unwrap_or(minimal))
                .collect();
            outcome.vulnerabilities.insert(package.key(), records);
        }

        Ok(outcome)
    }

    /// Sends one batch request, retrying once after a 429.
    async fn send_batch(&self, batch: usize, queries: &[OsvQuery]) -> Result<OsvBatchResponse, ScanError> {
        match self.api.query_batch(queries).await {
            Err(ApiError::RateLimited) => {
                tracing::warn!(
                    batch,
                    delay_ms = self.retry_delay.as_millis() as u64,
                    "rate limited, retrying once"
                );
                tokio::time::sleep(self.retry_delay).await;
                match self.api.query_batch(queries).await {
                    Err(ApiError::RateLimited) => Err(ScanError::RateLimited { batch }),
                    other => other.map_err(|source| ScanError::Upstream { batch, source }),
                }
            }
            other => other.map_err(|source| ScanError::Upstream { batch, source }),
        }
    }

    /// Fetches each distinct vulnerability id once, concurrently. Failures
    /// are reported and left out of the returned map.
    async fn fetch_details(
        &self,
        matches: &[Vec<OsvVulnerability>],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> BTreeMap<String, OsvVulnerability> {
        let ids: Vec<&str> = matches
            .iter()
            .flatten()
            .map(|v| v.id.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let results = join_all(ids.iter().map(|id| self.api.get_vulnerability(id))).await;

        let mut details = BTreeMap::new();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(record) => {
                    details.insert(id.to_string(), record);
                }
                Err(e) => {
                    tracing::warn!(id, error = %e, "detail fetch failed, using batch summary");
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::DetailFallback,
                        format!("{}: {}", id, e),
                    ));
                }
            }
        }
        details
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MockApi;
    use super::*;
    use crate::model::Ecosystem;

    fn npm(name: &str, version: &str) -> PackageInfo {
        PackageInfo::new(name, version, Ecosystem::Npm, "package.json")
    }

    fn client(api: MockApi) -> OsvClient<MockApi> {
        OsvClient::with_api(api).retry_delay(Duration::from_millis(1))
    }

    fn full_record(id: &str, summary: &str) -> OsvVulnerability {
        OsvVulnerability {
            summary: Some(summary.to_string()),
            ..OsvVulnerability::with_id(id)
        }
    }

    #[test]
    fn test_query_serializes_osv_shape() {
        let query = OsvQuery::for_package(&PackageInfo::new("serde", "1.0.100", Ecosystem::CratesIo, "Cargo.toml"));
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "package": { "name": "serde", "ecosystem": "crates.io" },
                "version": "1.0.100"
            })
        );
    }

    #[test]
    fn test_batch_response_accepts_minimal_records() {
        let body = r#"{"results":[{"vulns":[{"id":"GHSA-1","modified":"2024-01-01T00:00:00Z"}]},{}]}"#;
        let response: OsvBatchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].vulns[0].id, "GHSA-1");
        assert!(response.results[1].vulns.is_empty());
    }

    #[tokio::test]
    async fn test_query_keys_results_by_package_identity() {
        let api = MockApi::new()
            .known("npm", "lodash", "4.17.20", vec!["GHSA-35jh-r3h4-6jhm"])
            .detail(full_record("GHSA-35jh-r3h4-6jhm", "Command injection in lodash"));
        let client = client(api);

        let outcome = client
            .query(&[npm("lodash", "4.17.20"), npm("express", "4.18.2")])
            .await
            .unwrap();

        assert_eq!(outcome.vulnerabilities.len(), 1);
        let records = &outcome.vulnerabilities["npm:lodash@4.17.20"];
        assert_eq!(records[0].summary.as_deref(), Some("Command injection in lodash"));
        assert!(outcome.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_batches_are_capped_and_duplicates_queried_once() {
        let client = client(MockApi::new()).batch_size(2);
        let packages = vec![
            npm("a", "1.0.0"),
            npm("b", "1.0.0"),
            npm("a", "1.0.0"),
            npm("c", "1.0.0"),
            npm("d", "1.0.0"),
            npm("e", "1.0.0"),
        ];

        client.query(&packages).await.unwrap();

        assert_eq!(*client.api().batch_sizes.lock().unwrap(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried_once() {
        let api = MockApi::new()
            .script(Err(ApiError::RateLimited))
            .known("npm", "lodash", "4.17.20", vec!["GHSA-1"]);
        let client = client(api);

        let outcome = client.query(&[npm("lodash", "4.17.20")]).await.unwrap();

        assert_eq!(client.api().batch_calls(), 2);
        assert_eq!(outcome.vulnerabilities["npm:lodash@4.17.20"][0].id, "GHSA-1");
    }

    #[tokio::test]
    async fn test_second_rate_limit_fails_the_scan() {
        let api = MockApi::new()
            .script(Err(ApiError::RateLimited))
            .script(Err(ApiError::RateLimited));
        let client = client(api);

        let err = client.query(&[npm("lodash", "4.17.20")]).await.unwrap_err();

        assert!(matches!(err, ScanError::RateLimited { batch: 1 }));
        assert_eq!(client.api().batch_calls(), 2);
    }

    #[tokio::test]
    async fn test_skip_batch_policy_marks_packages_unchecked() {
        let api = MockApi::new()
            .script(Err(ApiError::RateLimited))
            .script(Err(ApiError::RateLimited))
            .known("npm", "c", "1.0.0", vec!["GHSA-c"]);
        let client = client(api)
            .batch_size(2)
            .rate_limit_policy(RateLimitPolicy::SkipBatch);

        let outcome = client
            .query(&[npm("a", "1.0.0"), npm("b", "1.0.0"), npm("c", "1.0.0")])
            .await
            .unwrap();

        assert_eq!(
            outcome.unchecked.iter().cloned().collect::<Vec<_>>(),
            vec!["npm:a@1.0.0".to_string(), "npm:b@1.0.0".to_string()]
        );
        assert!(outcome.vulnerabilities.contains_key("npm:c@1.0.0"));
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::BatchSkipped);
    }

    #[tokio::test]
    async fn test_other_http_errors_are_not_retried() {
        let api = MockApi::new().script(Err(ApiError::Status {
            status: 500,
            body: "boom".to_string(),
        }));
        let client = client(api);

        let err = client.query(&[npm("lodash", "4.17.20")]).await.unwrap_err();

        assert!(matches!(
            err,
            ScanError::Upstream {
                batch: 1,
                source: ApiError::Status { status: 500, .. }
            }
        ));
        assert_eq!(client.api().batch_calls(), 1);
    }

    #[tokio::test]
    async fn test_misaligned_response_is_rejected() {
        let api = MockApi::new().script(Ok(OsvBatchResponse { results: Vec::new() }));
        let client = client(api);

        let err = client.query(&[npm("lodash", "4.17.20")]).await.unwrap_err();

        assert!(matches!(
            err,
            ScanError::Upstream {
                source: ApiError::MalformedResponse(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_detail_fetch_falls_back_to_batch_record() {
        let api = MockApi::new()
            .known("npm", "a", "1.0.0", vec!["GHSA-known", "GHSA-missing"])
            .detail(full_record("GHSA-known", "Known issue"));
        let client = client(api);

        let outcome = client.query(&[npm("a", "1.0.0")]).await.unwrap();

        let records = &outcome.vulnerabilities["npm:a@1.0.0"];
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].summary.as_deref(), Some("Known issue"));
        assert_eq!(records[1], OsvVulnerability::with_id("GHSA-missing"));
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::DetailFallback);
    }

    #[tokio::test]
    async fn test_shared_ids_are_fetched_once_per_batch() {
        let api = MockApi::new()
            .known("npm", "a", "1.0.0", vec!["GHSA-shared"])
            .known("npm", "b", "2.0.0", vec!["GHSA-shared"])
            .detail(full_record("GHSA-shared", "Shared"));
        let client = client(api);

        let outcome = client
            .query(&[npm("a", "1.0.0"), npm("b", "2.0.0")])
            .await
            .unwrap();

        assert_eq!(client.api().detail_calls(), 1);
        assert_eq!(outcome.vulnerabilities.len(), 2);
    }

    #[tokio::test]
    async fn test_follows_next_page_tokens() {
        let first_page = OsvBatchResponse {
            results: vec![
                OsvBatchResult {
                    vulns: vec![OsvVulnerability::with_id("GHSA-1")],
                    next_page_token: Some("page-2".to_string()),
                },
                OsvBatchResult::default(),
            ],
        };
        let second_page = OsvBatchResponse {
            results: vec![OsvBatchResult {
                vulns: vec![OsvVulnerability::with_id("GHSA-2")],
                next_page_token: None,
            }],
        };
        let api = MockApi::new().script(Ok(first_page)).script(Ok(second_page));
        let client = client(api);

        let outcome = client
            .query(&[npm("a", "1.0.0"), npm("b", "1.0.0")])
            .await
            .unwrap();

        let ids: Vec<_> = outcome.vulnerabilities["npm:a@1.0.0"]
            .iter()
            .map(|v| v.id.as_str())
            .collect();
        assert_eq!(ids, vec!["GHSA-1", "GHSA-2"]);
        assert_eq!(*client.api().batch_sizes.lock().unwrap(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_requests() {
        let client = client(MockApi::new());
        let outcome = client.query(&[]).await.unwrap();
        assert!(outcome.vulnerabilities.is_empty());
        assert_eq!(client.api().batch_calls(), 0);
    }
}
