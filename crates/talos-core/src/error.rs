use thiserror::Error;

/// Application-wide error types for Talos.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// Page render/fetch failed before a response was obtained.
    #[error("Render error: {0}")]
    Render(String),

    /// Render timed out.
    #[error("Render timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    Network(String),

    /// A URL could not be parsed or rebuilt.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Field extraction from rendered markup failed.
    #[error("Extraction error: {0}")]
    Extract(String),

    /// Checkpoint read/write failed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Writing a record to the output sink failed.
    #[error("Sink error: {0}")]
    Sink(String),

    /// Loading session credentials failed.
    #[error("Credential error: {0}")]
    Credential(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The crawl was cancelled externally.
    #[error("Crawl cancelled")]
    Cancelled,

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl CrawlError {
    /// Returns true if this error is transient: the fetch may succeed on a
    /// retry, so the controller routes it through the backoff path instead
    /// of failing the crawl.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CrawlError::Render(_) | CrawlError::Timeout(_) | CrawlError::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(CrawlError::Network("reset".into()).is_transient());
        assert!(CrawlError::Timeout(30).is_transient());
        assert!(CrawlError::Render("tab crashed".into()).is_transient());
        assert!(!CrawlError::InvalidUrl("not-a-url".into()).is_transient());
        assert!(!CrawlError::Checkpoint("disk full".into()).is_transient());
    }
}
