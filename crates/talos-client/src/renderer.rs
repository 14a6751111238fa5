use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderValue};
use talos_core::error::CrawlError;
use talos_core::traits::{RenderClient, RenderedPage, SessionBundle, WaitPolicy};

/// Browser-like User-Agent. Review sites serve a reduced (or blocked)
/// experience to obvious bot agents.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Plain-HTTP render client using reqwest.
///
/// Suitable for sites that server-render their listings. Non-success
/// statuses are returned as data, never as errors: the crawl engine's
/// block detector decides what a 403 or 429 means. The wait policy's
/// settle delay is meaningless without a JS runtime and is ignored here;
/// only the navigation timeout applies.
#[derive(Clone)]
pub struct HttpRenderClient {
    client: Client,
    cookie_header: Option<String>,
}

impl HttpRenderClient {
    pub fn new() -> Result<Self, CrawlError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(|e| CrawlError::Network(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            cookie_header: None,
        })
    }

    /// Attach an authenticated session; its cookies ride along on every
    /// request as a `Cookie` header.
    pub fn with_session(mut self, session: &SessionBundle) -> Self {
        if !session.is_empty() {
            self.cookie_header = Some(session.header_value());
        }
        self
    }
}

impl RenderClient for HttpRenderClient {
    async fn fetch(&self, url: &str, wait: &WaitPolicy) -> Result<RenderedPage, CrawlError> {
        let mut request = self.client.get(url).timeout(wait.navigation_timeout);
        if let Some(cookie) = &self.cookie_header {
            request = request.header(COOKIE, cookie.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CrawlError::Timeout(wait.navigation_timeout.as_secs())
            } else if e.is_connect() {
                CrawlError::Network(format!("connection failed: {e}"))
            } else {
                CrawlError::Network(e.to_string())
            }
        })?;

        let http_status = response.status().as_u16();
        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| CrawlError::Network(format!("reading response body: {e}")))?;

        Ok(RenderedPage {
            html,
            http_status,
            final_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talos_core::traits::SessionCookie;

    #[test]
    fn test_client_builds() {
        assert!(HttpRenderClient::new().is_ok());
    }

    #[test]
    fn test_empty_session_sets_no_cookie_header() {
        let client = HttpRenderClient::new().unwrap();
        let client = client.with_session(&SessionBundle::default());
        assert!(client.cookie_header.is_none());
    }

    #[test]
    fn test_session_serialises_to_cookie_header() {
        let bundle = SessionBundle {
            cookies: vec![SessionCookie {
                name: "sid".into(),
                value: "abc".into(),
                domain: None,
                path: None,
            }],
        };
        let client = HttpRenderClient::new().unwrap().with_session(&bundle);
        assert_eq!(client.cookie_header.as_deref(), Some("sid=abc"));
    }
}
