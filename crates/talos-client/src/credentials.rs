use std::path::PathBuf;

use serde::Deserialize;
use talos_core::error::CrawlError;
use talos_core::traits::{CredentialProvider, SessionBundle, SessionCookie};

/// Loads session cookies from a JSON file captured out-of-band (e.g. a
/// browser extension export after a manual login).
///
/// Accepts either a bare cookie array or a `{"cookies": [...]}` wrapper.
/// A missing file means "crawl unauthenticated" and is not an error; a
/// file that exists but cannot be parsed is.
#[derive(Debug, Clone)]
pub struct FileCredentialProvider {
    path: PathBuf,
}

#[derive(Deserialize)]
struct CookieFile {
    cookies: Vec<SessionCookie>,
}

impl FileCredentialProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialProvider for FileCredentialProvider {
    fn session(&self) -> Result<Option<SessionBundle>, CrawlError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No cookie file, crawling unauthenticated");
                return Ok(None);
            }
            Err(e) => {
                return Err(CrawlError::Credential(format!(
                    "reading {}: {e}",
                    self.path.display()
                )));
            }
        };

        let cookies = match serde_json::from_slice::<Vec<SessionCookie>>(&bytes) {
            Ok(cookies) => cookies,
            Err(_) => {
                serde_json::from_slice::<CookieFile>(&bytes)
                    .map_err(|e| {
                        CrawlError::Credential(format!("parsing {}: {e}", self.path.display()))
                    })?
                    .cookies
            }
        };

        if cookies.is_empty() {
            tracing::warn!(path = %self.path.display(), "Cookie file contains no cookies");
            return Ok(None);
        }
        tracing::info!(count = cookies.len(), "Loaded session cookies");
        Ok(Some(SessionBundle { cookies }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileCredentialProvider::new(dir.path().join("none.json"));
        assert!(provider.session().unwrap().is_none());
    }

    #[test]
    fn test_bare_array_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(
            &path,
            r#"[{"name": "sid", "value": "abc", "domain": ".trustpilot.com"}]"#,
        )
        .unwrap();

        let session = FileCredentialProvider::new(&path).session().unwrap().unwrap();
        assert_eq!(session.cookies.len(), 1);
        assert_eq!(session.cookies[0].name, "sid");
        assert_eq!(session.cookies[0].domain.as_deref(), Some(".trustpilot.com"));
    }

    #[test]
    fn test_wrapped_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, r#"{"cookies": [{"name": "sid", "value": "abc"}]}"#).unwrap();

        let session = FileCredentialProvider::new(&path).session().unwrap().unwrap();
        assert_eq!(session.header_value(), "sid=abc");
    }

    #[test]
    fn test_unparseable_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, b"not json at all").unwrap();

        let err = FileCredentialProvider::new(&path).session().unwrap_err();
        assert!(matches!(err, CrawlError::Credential(_)));
    }

    #[test]
    fn test_empty_array_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, b"[]").unwrap();
        assert!(FileCredentialProvider::new(&path).session().unwrap().is_none());
    }
}
