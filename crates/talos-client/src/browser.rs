use std::path::PathBuf;
use std::sync::Arc;

use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use talos_core::error::CrawlError;
use talos_core::traits::{RenderClient, RenderedPage, SessionBundle, WaitPolicy};

/// Headless-browser render client using Chromium via the Chrome DevTools
/// Protocol.
///
/// Unlike [`super::HttpRenderClient`], this executes JavaScript before
/// returning the markup, which review sites with client-rendered listings
/// require. A single Chromium process is shared across all clones; each
/// fetch opens a new tab, waits for the page to settle, and closes it.
///
/// CDP does not surface the navigation's HTTP status at this level, so
/// every rendered page reports 200; blocked sessions are still caught via
/// the final URL (login redirects).
#[derive(Clone)]
pub struct BrowserRenderClient {
    browser: Arc<Browser>,
    cookies: Vec<CookieParam>,
}

impl BrowserRenderClient {
    /// Launch a headless Chromium without session state.
    pub async fn new() -> Result<Self, CrawlError> {
        Self::launch(None).await
    }

    /// Launch a headless Chromium and apply the session's cookies to every
    /// tab before navigation.
    pub async fn with_session(session: &SessionBundle) -> Result<Self, CrawlError> {
        Self::launch(Some(session)).await
    }

    async fn launch(session: Option<&SessionBundle>) -> Result<Self, CrawlError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        // Snap-packaged Chromium exposes a wrapper that rejects standard
        // Chrome CLI flags. Look for the real binary first, then fall back
        // to chromiumoxide's own lookup.
        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .build()
            .map_err(|e| CrawlError::Render(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlError::Render(format!("failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection
        // to stay alive.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let cookies = match session {
            Some(session) if !session.is_empty() => cookie_params(session)?,
            _ => Vec::new(),
        };

        Ok(Self {
            browser: Arc::new(browser),
            cookies,
        })
    }

    /// Locate the real Chrome/Chromium binary, preferring an explicit
    /// `CHROME_BIN` override, then snap/flatpak/apt install locations.
    fn find_chrome_binary() -> Option<PathBuf> {
        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        let candidates: &[&str] = &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];
        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }
}

fn cookie_params(session: &SessionBundle) -> Result<Vec<CookieParam>, CrawlError> {
    session
        .cookies
        .iter()
        .map(|cookie| {
            let mut builder = CookieParam::builder()
                .name(&cookie.name)
                .value(&cookie.value);
            if let Some(domain) = &cookie.domain {
                builder = builder.domain(domain);
            }
            if let Some(path) = &cookie.path {
                builder = builder.path(path);
            }
            builder
                .build()
                .map_err(|e| CrawlError::Credential(format!("cookie {}: {e}", cookie.name)))
        })
        .collect()
}

impl RenderClient for BrowserRenderClient {
    async fn fetch(&self, url: &str, wait: &WaitPolicy) -> Result<RenderedPage, CrawlError> {
        let result = tokio::time::timeout(wait.navigation_timeout, async {
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| CrawlError::Render(format!("failed to open tab: {e}")))?;

            if !self.cookies.is_empty() {
                page.set_cookies(self.cookies.clone())
                    .await
                    .map_err(|e| CrawlError::Render(format!("failed to set cookies: {e}")))?;
            }

            page.goto(url)
                .await
                .map_err(|e| CrawlError::Render(format!("failed to navigate to {url}: {e}")))?;

            // <body> present is the minimal signal the page rendered its
            // main content; the settle delay then lets lazy content land.
            page.find_element("body")
                .await
                .map_err(|e| CrawlError::Render(format!("page did not render body: {e}")))?;
            if !wait.settle_delay.is_zero() {
                tokio::time::sleep(wait.settle_delay).await;
            }

            let html = page
                .content()
                .await
                .map_err(|e| CrawlError::Render(format!("failed to read page content: {e}")))?;
            let final_url = page
                .url()
                .await
                .map_err(|e| CrawlError::Render(format!("failed to read page URL: {e}")))?
                .unwrap_or_else(|| url.to_string());

            let _ = page.close().await;

            Ok::<RenderedPage, CrawlError>(RenderedPage {
                html,
                http_status: 200,
                final_url,
            })
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(CrawlError::Timeout(wait.navigation_timeout.as_secs())),
        }
    }
}
