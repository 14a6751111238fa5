use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CrawlError;
use crate::models::{RawRecord, Review};

/// Opaque render configuration owned by the render client: how long to
/// wait for navigation and how long to let the page settle afterwards.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    pub navigation_timeout: Duration,
    pub settle_delay: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(45),
            settle_delay: Duration::from_millis(1500),
        }
    }
}

/// Outcome of rendering a page: the markup, the HTTP status, and the URL
/// the navigation actually ended on (redirects included).
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    pub http_status: u16,
    pub final_url: String,
}

/// Fetches and renders a page, returning markup and status.
///
/// Implementations must not treat 4xx/5xx as errors — blocked responses
/// are data for the block detector, not failures.
pub trait RenderClient: Send + Sync + Clone {
    fn fetch(
        &self,
        url: &str,
        wait: &WaitPolicy,
    ) -> impl Future<Output = Result<RenderedPage, CrawlError>> + Send;
}

/// Derives raw records and pagination hints from rendered markup.
/// Keyed to one site's layout; the engine never parses markup itself.
pub trait PageExtractor: Send + Sync + Clone {
    fn extract(&self, html: &str) -> Result<Vec<RawRecord>, CrawlError>;

    /// An explicit "next page" link, if the markup surfaces one.
    fn find_next_page_link(&self, html: &str) -> Option<String>;

    /// All pagination links discovered in the markup (for the query-scan
    /// pagination tier).
    fn find_page_links(&self, html: &str) -> Vec<String>;

    /// Highest page number advertised by the pagination UI, if any.
    fn find_max_page_number(&self, html: &str) -> Option<u32>;
}

/// A browser cookie captured from an authenticated session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// Opaque session state applied to the render client before the first
/// fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionBundle {
    pub cookies: Vec<SessionCookie>,
}

impl SessionBundle {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Serialise as a `Cookie` request-header value.
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Supplies an authenticated session, when one is available.
pub trait CredentialProvider: Send + Sync {
    fn session(&self) -> Result<Option<SessionBundle>, CrawlError>;
}

/// Provider for unauthenticated crawls.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn session(&self) -> Result<Option<SessionBundle>, CrawlError> {
        Ok(None)
    }
}

/// Receives typed records as the crawl emits them.
pub trait RecordSink: Send + Sync {
    fn emit(&self, review: &Review) -> impl Future<Output = Result<(), CrawlError>> + Send;
}

/// A no-op sink for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RecordSink for NullSink {
    async fn emit(&self, _review: &Review) -> Result<(), CrawlError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_bundle_header_value() {
        let bundle = SessionBundle {
            cookies: vec![
                SessionCookie {
                    name: "sid".into(),
                    value: "abc".into(),
                    domain: None,
                    path: None,
                },
                SessionCookie {
                    name: "lang".into(),
                    value: "en".into(),
                    domain: Some(".trustpilot.com".into()),
                    path: Some("/".into()),
                },
            ],
        };
        assert_eq!(bundle.header_value(), "sid=abc; lang=en");
        assert!(!bundle.is_empty());
        assert!(SessionBundle::default().is_empty());
    }
}
