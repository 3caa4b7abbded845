//! Error types.
//!
//! [`ApiError`] describes a single failed call to the vulnerability
//! database. [`ScanError`] describes why a whole scan could not finish;
//! [`DependencyScanner::scan`](crate::scanner::DependencyScanner::scan)
//! turns it into a failed [`ScanResult`](crate::model::ScanResult).

/// Failure of one upstream request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP 429.
    #[error("rate limited by vulnerability database")]
    RateLimited,

    /// Any other non-success HTTP status.
    #[error("vulnerability database returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Connection, TLS or timeout failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response did not match the documented schema.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Reason a scan was aborted.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("No files provided for dependency scanning")]
    NoFiles,

    #[error("No supported dependency manifest files found")]
    NoManifests,

    #[error("Vulnerability database rate limit exceeded for batch {batch} after retry")]
    RateLimited {
        /// 1-based batch number
        batch: usize,
    },

    #[error("Vulnerability lookup failed for batch {batch}: {source}")]
    Upstream {
        /// 1-based batch number
        batch: usize,
        source: ApiError,
    },
}
