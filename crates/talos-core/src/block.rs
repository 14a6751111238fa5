//! Classification of fetch outcomes into block categories.
//!
//! Review sites defend themselves with rate limits (429), IP blocks (403)
//! and login-wall redirects. The detector maps a rendered response to a
//! [`BlockKind`] so the controller can pick the right backoff or give up.

use std::fmt;

use crate::traits::RenderedPage;

/// Category of a fetch outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Response is usable; proceed to extraction.
    Ok,
    /// HTTP 429 — back off and retry.
    RateLimited,
    /// HTTP 403 — likely an IP block; long backoff.
    HardBlocked,
    /// Redirected to a login/auth page. Terminal for the whole crawl.
    AuthWall,
    /// HTTP 5xx — transient server-side failure.
    ServerError,
    /// Any other HTTP ≥ 400.
    Unknown,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Ok => "ok",
            BlockKind::RateLimited => "rate-limited",
            BlockKind::HardBlocked => "hard-blocked",
            BlockKind::AuthWall => "auth-wall",
            BlockKind::ServerError => "server-error",
            BlockKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pure classifier from rendered response to [`BlockKind`].
///
/// The auth-wall check runs before the status-code checks: a login redirect
/// usually lands with a 200, so the final URL is the only reliable signal.
#[derive(Debug, Clone)]
pub struct BlockDetector {
    /// Substrings that mark a final URL as a login/auth page.
    auth_fragments: Vec<String>,
}

impl Default for BlockDetector {
    fn default() -> Self {
        Self {
            auth_fragments: vec!["/users/connect".to_string(), "login".to_string()],
        }
    }
}

impl BlockDetector {
    pub fn new(auth_fragments: Vec<String>) -> Self {
        Self { auth_fragments }
    }

    pub fn classify(&self, page: &RenderedPage) -> BlockKind {
        if self.is_auth_url(&page.final_url) {
            return BlockKind::AuthWall;
        }
        match page.http_status {
            429 => BlockKind::RateLimited,
            403 => BlockKind::HardBlocked,
            s if s >= 500 => BlockKind::ServerError,
            s if s >= 400 => BlockKind::Unknown,
            _ => BlockKind::Ok,
        }
    }

    fn is_auth_url(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        self.auth_fragments.iter().any(|f| lower.contains(f.as_str()))
    }
}
