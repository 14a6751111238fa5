use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::block::BlockKind;

/// Immutable configuration for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlTarget {
    /// Listing URL the crawl starts from.
    pub start_url: String,
    /// Stop once this many unique records have been collected.
    pub target_records: usize,
    /// Never fetch beyond this page number.
    pub max_pages: u32,
    /// Delay between consecutive page fetches.
    pub politeness_delay: Duration,
    /// Discover the total page count on the first page and pre-enqueue the
    /// rest, instead of discovering the next page one step at a time.
    pub seed_pagination: bool,
}

impl CrawlTarget {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            target_records: 2000,
            max_pages: 100,
            politeness_delay: Duration::from_secs(3),
            seed_pagination: false,
        }
    }

    pub fn with_target_records(mut self, n: usize) -> Self {
        self.target_records = n;
        self
    }

    pub fn with_max_pages(mut self, n: u32) -> Self {
        self.max_pages = n;
        self
    }

    pub fn with_politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay = delay;
        self
    }

    pub fn with_seed_pagination(mut self, seed: bool) -> Self {
        self.seed_pagination = seed;
        self
    }
}

/// Mutable crawl progress, owned exclusively by the controller.
///
/// `last_page_completed` and the seen-set only ever grow; retry counters
/// are per (page, block kind) and are not persisted across runs.
#[derive(Debug, Clone, Default)]
pub struct CrawlState {
    last_page_completed: u32,
    seen: HashSet<String>,
    retry_counters: HashMap<(u32, BlockKind), u32>,
}

impl CrawlState {
    /// Rebuild state from a persisted checkpoint.
    pub fn restore(last_page_completed: u32, seen: impl IntoIterator<Item = String>) -> Self {
        Self {
            last_page_completed,
            seen: seen.into_iter().collect(),
            retry_counters: HashMap::new(),
        }
    }

    pub fn last_page_completed(&self) -> u32 {
        self.last_page_completed
    }

    /// Mark a page as fully processed. Monotone: an earlier page number
    /// never lowers the watermark.
    pub fn complete_page(&mut self, page: u32) {
        self.last_page_completed = self.last_page_completed.max(page);
    }

    pub fn is_duplicate(&self, identity: &RecordIdentity) -> bool {
        self.seen.contains(identity.as_str())
    }

    /// Record an identity. Returns false if it was already present.
    pub fn mark_seen(&mut self, identity: RecordIdentity) -> bool {
        self.seen.insert(identity.into_string())
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn seen_ids(&self) -> impl Iterator<Item = &str> {
        self.seen.iter().map(String::as_str)
    }

    pub fn retry_count(&self, page: u32, kind: BlockKind) -> u32 {
        self.retry_counters.get(&(page, kind)).copied().unwrap_or(0)
    }

    /// Increment the retry counter for (page, kind) and return the new value.
    pub fn record_retry(&mut self, page: u32, kind: BlockKind) -> u32 {
        let counter = self.retry_counters.entry((page, kind)).or_insert(0);
        *counter += 1;
        *counter
    }
}

/// A single page fetch about to be issued. Transient: produced by the
/// pagination driver, consumed by the render client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub page: u32,
    pub attempt: u32,
}

impl PageRequest {
    pub fn new(url: impl Into<String>, page: u32) -> Self {
        Self {
            url: url.into(),
            page,
            attempt: 0,
        }
    }
}

/// Untyped extraction output: field name → cleaned text (or absent).
///
/// Never persisted; converted into a [`Review`] at the controller boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: HashMap<String, Option<String>>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, normalising whitespace. Empty or whitespace-only text
    /// is stored as absent.
    pub fn set(&mut self, name: &str, value: Option<&str>) {
        self.fields
            .insert(name.to_string(), value.and_then(clean_text));
    }

    pub fn with(mut self, name: &str, value: Option<&str>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(|v| v.is_none())
    }
}

/// Collapse all whitespace runs (including newlines) to single spaces and
/// trim. Returns None for empty results.
pub fn clean_text(value: &str) -> Option<String> {
    let cleaned = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// Typed output record for a review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub reviewer_name: Option<String>,
    pub date: Option<String>,
    pub rating: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub source_url: String,
    pub page: u32,
}

impl Review {
    /// Convert an untyped record, validating at the boundary. A record
    /// carrying neither a reviewer name nor a date has no usable identity
    /// and is rejected.
    pub fn from_raw(raw: &RawRecord, source_url: &str, page: u32) -> Option<Self> {
        let reviewer_name = raw.get("reviewer_name").map(str::to_string);
        let date = raw.get("date").map(str::to_string);
        if reviewer_name.is_none() && date.is_none() {
            return None;
        }
        Some(Self {
            reviewer_name,
            date,
            rating: raw.get("rating").map(str::to_string),
            title: raw.get("title").map(str::to_string),
            body: raw.get("body").map(str::to_string),
            source_url: source_url.to_string(),
            page,
        })
    }

    /// Dedup key for this review.
    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity::derive(self.reviewer_name.as_deref(), self.date.as_deref())
    }
}

/// Derived dedup key: `{reviewer}_{date}`.
///
/// Deliberately weak — two distinct reviews by the same reviewer on the
/// same day collapse. [`RecordIdentity::with_content_hash`] strengthens the
/// key with a body digest for callers that opt in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordIdentity(String);

impl RecordIdentity {
    pub fn derive(reviewer_name: Option<&str>, date: Option<&str>) -> Self {
        Self(format!(
            "{}_{}",
            reviewer_name.unwrap_or("unknown"),
            date.unwrap_or("unknown")
        ))
    }

    /// Identity strengthened with the first 16 hex chars of a SHA-256 of
    /// the review body.
    pub fn with_content_hash(
        reviewer_name: Option<&str>,
        date: Option<&str>,
        body: Option<&str>,
    ) -> Self {
        let base = Self::derive(reviewer_name, date);
        match body {
            Some(body) if !body.is_empty() => {
                let digest = compute_hash(body);
                Self(format!("{}_{}", base.0, &digest[..16]))
            }
            _ => base,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for RecordIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_builder() {
        let target = CrawlTarget::new("https://x/reviews")
            .with_target_records(3)
            .with_max_pages(10)
            .with_politeness_delay(Duration::from_millis(5))
            .with_seed_pagination(true);
        assert_eq!(target.target_records, 3);
        assert_eq!(target.max_pages, 10);
        assert!(target.seed_pagination);
    }

    #[test]
    fn test_state_page_watermark_is_monotone() {
        let mut state = CrawlState::default();
        state.complete_page(3);
        state.complete_page(1);
        assert_eq!(state.last_page_completed(), 3);
        state.complete_page(4);
        assert_eq!(state.last_page_completed(), 4);
    }

    #[test]
    fn test_state_seen_set_grows() {
        let mut state = CrawlState::default();
        assert!(state.mark_seen(RecordIdentity::derive(Some("Alice"), Some("2024-01-01"))));
        assert!(!state.mark_seen(RecordIdentity::derive(Some("Alice"), Some("2024-01-01"))));
        assert_eq!(state.seen_count(), 1);
        assert!(state.is_duplicate(&RecordIdentity::derive(Some("Alice"), Some("2024-01-01"))));
    }

    #[test]
    fn test_retry_counters_increment_per_page_and_kind() {
        let mut state = CrawlState::default();
        assert_eq!(state.retry_count(2, BlockKind::RateLimited), 0);
        assert_eq!(state.record_retry(2, BlockKind::RateLimited), 1);
        assert_eq!(state.record_retry(2, BlockKind::RateLimited), 2);
        assert_eq!(state.record_retry(2, BlockKind::ServerError), 1);
        assert_eq!(state.retry_count(3, BlockKind::RateLimited), 0);
    }

    #[test]
    fn test_restore_round_trip() {
        let state = CrawlState::restore(7, vec!["a_b".to_string(), "c_d".to_string()]);
        assert_eq!(state.last_page_completed(), 7);
        assert_eq!(state.seen_count(), 2);
        assert!(state.is_duplicate(&RecordIdentity::from("a_b".to_string())));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  a \n b\t c "), Some("a b c".to_string()));
        assert_eq!(clean_text("   \n\t"), None);
    }

    #[test]
    fn test_raw_record_normalises_on_set() {
        let raw = RawRecord::new()
            .with("reviewer_name", Some("  Jane\n Doe "))
            .with("body", Some("   "));
        assert_eq!(raw.get("reviewer_name"), Some("Jane Doe"));
        assert_eq!(raw.get("body"), None);
    }

    #[test]
    fn test_review_from_raw_requires_an_identity_field() {
        let raw = RawRecord::new().with("body", Some("great service"));
        assert!(Review::from_raw(&raw, "https://x", 1).is_none());

        let raw = RawRecord::new().with("reviewer_name", Some("Jane"));
        let review = Review::from_raw(&raw, "https://x", 1).unwrap();
        assert_eq!(review.reviewer_name.as_deref(), Some("Jane"));
        assert_eq!(review.page, 1);
    }

    #[test]
    fn test_identity_matches_original_format() {
        let id = RecordIdentity::derive(Some("Jane Doe"), Some("2024-05-01"));
        assert_eq!(id.as_str(), "Jane Doe_2024-05-01");
        let id = RecordIdentity::derive(None, Some("2024-05-01"));
        assert_eq!(id.as_str(), "unknown_2024-05-01");
    }

    #[test]
    fn test_identity_collapses_different_bodies() {
        // Known precision limitation: body text does not participate.
        let a = RecordIdentity::derive(Some("Jane"), Some("2024-05-01"));
        let b = RecordIdentity::derive(Some("Jane"), Some("2024-05-01"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_hash_strengthens_identity() {
        let a = RecordIdentity::with_content_hash(Some("Jane"), Some("d"), Some("loved it"));
        let b = RecordIdentity::with_content_hash(Some("Jane"), Some("d"), Some("hated it"));
        assert_ne!(a, b);
        let c = RecordIdentity::with_content_hash(Some("Jane"), Some("d"), None);
        assert_eq!(c.as_str(), "Jane_d");
    }
}
