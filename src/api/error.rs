use thiserror::Error;

/// Coarse classification used by the paging engine to pick a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeout, connection failure, 5xx, undecodable body. Retryable.
    Network,
    /// 401/403. Escalated to session handling, never retried.
    Auth,
    /// 404 on a single-item fetch. Excluded from batch results.
    NotFound,
}

/// Errors from the backend HTTP collaborator.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx status not covered by the variants below
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Not authorized (status {0})")]
    Auth(u16),
    #[error("Not found")]
    NotFound,
    #[error("Request timed out")]
    Timeout,
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body was not the JSON shape we expected
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// A fetcher was asked for a resource it does not serve
    #[error("{0} is not served by this endpoint")]
    Unsupported(&'static str),
}

impl ApiError {
    /// Map an HTTP status to the matching variant.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ApiError::Auth(status),
            404 => ApiError::NotFound,
            other => ApiError::HttpStatus(other),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ApiError::Auth(_) => ErrorClass::Auth,
            ApiError::NotFound => ErrorClass::NotFound,
            // Malformed input is not expected here; treat it like any other failure.
            _ => ErrorClass::Network,
        }
    }

    /// Returns true if this error is transient and the request should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::Network(_) | ApiError::IncompleteResponse { .. } => true,
            ApiError::HttpStatus(status) => *status >= 500,
            ApiError::Auth(_)
            | ApiError::NotFound
            | ApiError::RateLimited(_)
            | ApiError::ResponseTooLarge(_)
            | ApiError::Decode(_)
            | ApiError::InvalidUrl(_)
            | ApiError::Unsupported(_) => false,
        }
    }

    /// True for errors that drop an item from a batch instead of failing it.
    pub fn is_excluded_from_batch(&self) -> bool {
        matches!(self.class(), ErrorClass::NotFound | ErrorClass::Auth)
    }
}
