//! Checkpoint persistence for resumable crawls.
//!
//! The persisted form is a small JSON document holding the seen-identity
//! set and the last fully-completed page. Loading is deliberately
//! forgiving: a missing or corrupt file degrades to a fresh empty state
//! with a warning, never a failed crawl. Saving is a full atomic
//! overwrite (write to a temp file, then rename).

use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CrawlError;
use crate::models::{CrawlState, compute_hash};

/// Persists and reloads crawl progress.
pub trait CheckpointStore: Send + Sync {
    /// Reload persisted state. Infallible by contract: implementations
    /// degrade missing/corrupt data to an empty state.
    fn load(&self) -> impl Future<Output = CrawlState> + Send;

    /// Atomically overwrite the persisted state.
    fn save(&self, state: &CrawlState) -> impl Future<Output = Result<(), CrawlError>> + Send;
}

/// On-disk JSON shape. Field defaults keep partially-written files loadable.
#[derive(Debug, Serialize, Deserialize)]
struct CheckpointForm {
    #[serde(default)]
    seen_record_ids: Vec<String>,
    #[serde(default)]
    last_page_completed: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

impl CheckpointForm {
    fn snapshot(state: &CrawlState) -> Self {
        Self {
            seen_record_ids: state.seen_ids().map(str::to_string).collect(),
            last_page_completed: state.last_page_completed(),
            saved_at: Some(Utc::now()),
        }
    }

    fn into_state(self) -> CrawlState {
        CrawlState::restore(self.last_page_completed, self.seen_record_ids)
    }
}

/// File-backed checkpoint store, one file per crawl target.
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under `dir`, with a filename derived from the target's start
    /// URL so each target owns exactly one checkpoint file.
    pub fn for_target(dir: impl AsRef<Path>, start_url: &str) -> Self {
        let digest = compute_hash(start_url);
        Self {
            path: dir.as_ref().join(format!("checkpoint-{}.json", &digest[..16])),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for JsonCheckpointStore {
    async fn load(&self) -> CrawlState {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No checkpoint found, starting fresh");
                return CrawlState::default();
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read checkpoint, starting fresh"
                );
                return CrawlState::default();
            }
        };

        match serde_json::from_slice::<CheckpointForm>(&bytes) {
            Ok(form) => {
                let state = form.into_state();
                tracing::info!(
                    path = %self.path.display(),
                    seen = state.seen_count(),
                    last_page = state.last_page_completed(),
                    "Loaded checkpoint"
                );
                state
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Corrupt checkpoint, starting fresh"
                );
                CrawlState::default()
            }
        }
    }

    async fn save(&self, state: &CrawlState) -> Result<(), CrawlError> {
        let form = CheckpointForm::snapshot(state);
        let json = serde_json::to_vec_pretty(&form)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CrawlError::Checkpoint(format!("create {}: {e}", parent.display())))?;
        }

        // Write-then-rename keeps readers from ever observing a torn file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| CrawlError::Checkpoint(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| CrawlError::Checkpoint(format!("rename {}: {e}", self.path.display())))?;

        tracing::debug!(
            path = %self.path.display(),
            seen = state.seen_count(),
            last_page = state.last_page_completed(),
            "Checkpoint saved"
        );
        Ok(())
    }
}

/// Checkpoint store that persists nothing. Every run starts fresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCheckpointStore;

impl CheckpointStore for NullCheckpointStore {
    async fn load(&self) -> CrawlState {
        CrawlState::default()
    }

    async fn save(&self, _state: &CrawlState) -> Result<(), CrawlError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordIdentity;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCheckpointStore::new(dir.path().join("none.json"));
        let state = store.load().await;
        assert_eq!(state.seen_count(), 0);
        assert_eq!(state.last_page_completed(), 0);
    }

    #[tokio::test]
    async fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCheckpointStore::new(dir.path().join("cp.json"));

        let mut state = CrawlState::default();
        state.mark_seen(RecordIdentity::derive(Some("Jane"), Some("2024-05-01")));
        state.mark_seen(RecordIdentity::derive(Some("Bob"), Some("2024-05-02")));
        state.complete_page(4);
        store.save(&state).await.unwrap();

        let reloaded = store.load().await;
        assert_eq!(reloaded.seen_count(), 2);
        assert_eq!(reloaded.last_page_completed(), 4);
        assert!(reloaded.is_duplicate(&RecordIdentity::derive(Some("Jane"), Some("2024-05-01"))));
    }

    #[tokio::test]
    async fn test_corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp.json");
        tokio::fs::write(&path, b"{\"seen_record_ids\": [tr").await.unwrap();

        let store = JsonCheckpointStore::new(&path);
        let state = store.load().await;
        assert_eq!(state.seen_count(), 0);
        assert_eq!(state.last_page_completed(), 0);
    }

    #[tokio::test]
    async fn test_partial_form_is_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp.json");
        tokio::fs::write(&path, b"{\"last_page_completed\": 9}").await.unwrap();

        let store = JsonCheckpointStore::new(&path);
        let state = store.load().await;
        assert_eq!(state.last_page_completed(), 9);
        assert_eq!(state.seen_count(), 0);
    }

    #[tokio::test]
    async fn test_save_overwrites_fully() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCheckpointStore::new(dir.path().join("cp.json"));

        let mut state = CrawlState::default();
        state.mark_seen(RecordIdentity::derive(Some("Jane"), Some("d1")));
        state.complete_page(1);
        store.save(&state).await.unwrap();

        // Second save from a state without Jane must not resurrect her.
        let mut other = CrawlState::default();
        other.mark_seen(RecordIdentity::derive(Some("Bob"), Some("d2")));
        other.complete_page(2);
        store.save(&other).await.unwrap();

        let reloaded = store.load().await;
        assert_eq!(reloaded.seen_count(), 1);
        assert!(reloaded.is_duplicate(&RecordIdentity::derive(Some("Bob"), Some("d2"))));
    }

    #[test]
    fn test_for_target_derives_distinct_paths() {
        let a = JsonCheckpointStore::for_target("/tmp/talos", "https://x/reviews/a");
        let b = JsonCheckpointStore::for_target("/tmp/talos", "https://x/reviews/b");
        assert_ne!(a.path(), b.path());
    }
}
