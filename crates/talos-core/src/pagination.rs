//! Next-page resolution and the pre-seeded page queue.
//!
//! Three strategies, tried in strict priority order:
//! 1. an explicit "next" link surfaced by the page extractor;
//! 2. a scan of discovered pagination links for one pointing at
//!    `current + 1`;
//! 3. manual construction via the page-URL builder, bounded by the
//!    configured page cap.
//!
//! The first strategy that yields a URL wins; conflicts between them are
//! not reconciled. Seed mode additionally pre-enqueues every page up to a
//! max page number discovered once on the first page, for sites whose
//! pagination UI advertises the total count up front.

use std::collections::VecDeque;

use crate::error::CrawlError;
use crate::models::PageRequest;
use crate::page_url::{build_page_url, page_number, resolve};

/// Pagination evidence gathered from one rendered page.
#[derive(Debug, Clone, Default)]
pub struct PageHints {
    pub next_link: Option<String>,
    pub page_links: Vec<String>,
    pub max_page: Option<u32>,
}

/// Decides which page to fetch next.
#[derive(Debug)]
pub struct PaginationDriver {
    max_pages: u32,
    seed_mode: bool,
    seeded: bool,
    queue: VecDeque<PageRequest>,
}

impl PaginationDriver {
    pub fn new(max_pages: u32, seed_mode: bool) -> Self {
        Self {
            max_pages,
            seed_mode,
            seeded: false,
            queue: VecDeque::new(),
        }
    }

    /// Whether seed-mode discovery still needs to run.
    pub fn wants_seed(&self) -> bool {
        self.seed_mode && !self.seeded
    }

    /// Pre-enqueue pages `current+1 ..= max_page` (bounded by the page
    /// cap), built from the current page's URL. Runs at most once.
    pub fn seed_from(
        &mut self,
        current_page: u32,
        current_url: &str,
        max_page: Option<u32>,
    ) -> Result<(), CrawlError> {
        if self.seeded {
            return Ok(());
        }
        self.seeded = true;

        let Some(max_page) = max_page else {
            tracing::debug!("Seed mode: no max page discovered, falling back to step-wise pagination");
            return Ok(());
        };
        let upper = max_page.min(self.max_pages);
        if upper <= current_page {
            return Ok(());
        }

        for page in (current_page + 1)..=upper {
            let url = build_page_url(current_url, page)?;
            self.queue.push_back(PageRequest::new(url, page));
        }
        tracing::info!(
            from = current_page + 1,
            to = upper,
            "Seed mode: pre-enqueued pagination"
        );
        Ok(())
    }

    /// Resolve the request for the page after `current`, or None when
    /// pagination is exhausted.
    pub fn next_request(&mut self, current: &PageRequest, hints: &PageHints) -> Option<PageRequest> {
        // Pre-enqueued pages take precedence over per-page discovery.
        if let Some(queued) = self.queue.pop_front() {
            return Some(queued);
        }

        let next_page = current.page + 1;

        // Tier 1: explicit next link.
        if let Some(link) = &hints.next_link {
            match resolve(&current.url, link) {
                Ok(url) => return Some(PageRequest::new(url, next_page)),
                Err(e) => {
                    tracing::warn!(link = %link, error = %e, "Ignoring malformed next-page link");
                }
            }
        }

        // Tier 2: scan discovered pagination links for current + 1.
        for link in &hints.page_links {
            let Ok(url) = resolve(&current.url, link) else {
                continue;
            };
            if page_number(&url) == Some(next_page) {
                return Some(PageRequest::new(url, next_page));
            }
        }

        // Tier 3: build the URL ourselves, while under the page cap.
        if next_page <= self.max_pages
            && let Ok(url) = build_page_url(&current.url, next_page)
        {
            tracing::debug!(page = next_page, "Building next page URL manually");
            return Some(PageRequest::new(url, next_page));
        }

        None
    }

    /// Number of pre-enqueued pages not yet handed out.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current(page: u32) -> PageRequest {
        PageRequest::new(format!("https://x/reviews?page={page}"), page)
    }

    #[test]
    fn test_explicit_next_link_wins() {
        let mut driver = PaginationDriver::new(100, false);
        let hints = PageHints {
            next_link: Some("/reviews?page=2&sort=recent".into()),
            page_links: vec!["https://x/reviews?page=99".into()],
            max_page: None,
        };
        let next = driver.next_request(&current(1), &hints).unwrap();
        assert_eq!(next.url, "https://x/reviews?page=2&sort=recent");
        assert_eq!(next.page, 2);
        assert_eq!(next.attempt, 0);
    }

    #[test]
    fn test_malformed_next_link_falls_through_to_scan() {
        let mut driver = PaginationDriver::new(100, false);
        let hints = PageHints {
            next_link: Some("http://[broken".into()),
            page_links: vec![
                "https://x/reviews?page=5".into(),
                "https://x/reviews?page=2".into(),
            ],
            max_page: None,
        };
        let next = driver.next_request(&current(1), &hints).unwrap();
        assert_eq!(next.url, "https://x/reviews?page=2");
    }

    #[test]
    fn test_scan_matches_only_current_plus_one() {
        let mut driver = PaginationDriver::new(100, false);
        let hints = PageHints {
            next_link: None,
            page_links: vec![
                "https://x/reviews?page=1".into(),
                "https://x/reviews?page=7".into(),
            ],
            max_page: None,
        };
        // No page=3 link; falls through to manual construction.
        let next = driver.next_request(&current(2), &hints).unwrap();
        assert_eq!(next.url, "https://x/reviews?page=3");
        assert_eq!(next.page, 3);
    }

    #[test]
    fn test_manual_construction_respects_page_cap() {
        let mut driver = PaginationDriver::new(3, false);
        assert!(driver.next_request(&current(2), &PageHints::default()).is_some());
        assert!(driver.next_request(&current(3), &PageHints::default()).is_none());
    }

    #[test]
    fn test_seed_enqueues_through_discovered_max() {
        let mut driver = PaginationDriver::new(100, true);
        assert!(driver.wants_seed());
        driver
            .seed_from(1, "https://x/reviews?sort=recent", Some(4))
            .unwrap();
        assert!(!driver.wants_seed());
        assert_eq!(driver.queued(), 3);

        let next = driver.next_request(&current(1), &PageHints::default()).unwrap();
        assert_eq!(next.url, "https://x/reviews?sort=recent&page=2");
        let next = driver.next_request(&next, &PageHints::default()).unwrap();
        assert_eq!(next.page, 3);
        let next = driver.next_request(&next, &PageHints::default()).unwrap();
        assert_eq!(next.page, 4);
    }

    #[test]
    fn test_seed_is_bounded_by_max_pages() {
        let mut driver = PaginationDriver::new(3, true);
        driver.seed_from(1, "https://x/reviews", Some(50)).unwrap();
        assert_eq!(driver.queued(), 2); // pages 2 and 3 only
    }

    #[test]
    fn test_seed_runs_once() {
        let mut driver = PaginationDriver::new(100, true);
        driver.seed_from(1, "https://x/reviews", Some(3)).unwrap();
        driver.seed_from(1, "https://x/reviews", Some(50)).unwrap();
        assert_eq!(driver.queued(), 2);
    }

    #[test]
    fn test_seed_without_discovery_degrades_to_stepwise() {
        let mut driver = PaginationDriver::new(100, true);
        driver.seed_from(1, "https://x/reviews", None).unwrap();
        assert_eq!(driver.queued(), 0);
        // Step-wise tiers still work.
        assert!(driver.next_request(&current(1), &PageHints::default()).is_some());
    }

    #[test]
    fn test_queue_takes_precedence_over_hints() {
        let mut driver = PaginationDriver::new(100, true);
        driver.seed_from(1, "https://x/reviews", Some(3)).unwrap();
        let hints = PageHints {
            next_link: Some("https://elsewhere/?page=9".into()),
            ..Default::default()
        };
        let next = driver.next_request(&current(1), &hints).unwrap();
        assert_eq!(next.page, 2);
        assert!(next.url.starts_with("https://x/reviews"));
    }
}
