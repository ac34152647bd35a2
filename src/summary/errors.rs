//! Error types for summary composition.

use thiserror::Error;

/// Failures talking to the external generative-text service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Transport failure: unreachable host, TLS, timeout.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The configured endpoint cannot be used as a base URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// The service answered with a non-success status.
    #[error("upstream returned status {0}")]
    Status(u16),
    /// The response body did not contain a usable summary.
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
}

impl UpstreamError {
    /// True when the failure was a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(err) if err.is_timeout())
    }
}

/// Summary composer error type.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Empty text supplied for summarization.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The external strategy was selected and the call failed.
    #[error("upstream summary error: {0}")]
    UpstreamSummary(#[from] UpstreamError),
}

/// Convenience result alias for summary operations.
pub type SummaryResultOf<T> = Result<T, SummaryError>;
