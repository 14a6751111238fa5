//! Hand-rolled test doubles for the crawl collaborator traits.
//!
//! Shared by unit tests across the workspace; not compiled into release
//! builds unless the `testutil` consumers opt in via dev-dependencies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::checkpoint::CheckpointStore;
use crate::crawl::{CrawlEvent, CrawlReporter};
use crate::error::CrawlError;
use crate::models::{CrawlState, RawRecord, Review};
use crate::traits::{PageExtractor, RecordSink, RenderClient, RenderedPage, WaitPolicy};

/// A scripted 200 response. The final URL is filled in with the requested
/// URL at fetch time.
pub fn ok_page(html: &str) -> Result<RenderedPage, CrawlError> {
    Ok(RenderedPage {
        html: html.to_string(),
        http_status: 200,
        final_url: String::new(),
    })
}

/// A scripted empty response with the given HTTP status.
pub fn status_page(status: u16) -> Result<RenderedPage, CrawlError> {
    Ok(RenderedPage {
        html: String::new(),
        http_status: status,
        final_url: String::new(),
    })
}

/// A minimal raw record with the two identity fields set.
pub fn make_raw(reviewer_name: &str, date: &str) -> RawRecord {
    RawRecord::new()
        .with("reviewer_name", Some(reviewer_name))
        .with("date", Some(date))
}

/// Render client that replays a scripted response sequence and records
/// every requested URL. Once the script is exhausted it serves empty 200
/// pages.
#[derive(Clone, Default)]
pub struct MockRenderClient {
    responses: Arc<Mutex<Vec<Result<RenderedPage, CrawlError>>>>,
    pub fetched: Arc<Mutex<Vec<String>>>,
}

impl MockRenderClient {
    pub fn new(responses: Vec<Result<RenderedPage, CrawlError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            fetched: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl RenderClient for MockRenderClient {
    async fn fetch(&self, url: &str, _wait: &WaitPolicy) -> Result<RenderedPage, CrawlError> {
        self.fetched.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(RenderedPage {
                html: String::new(),
                http_status: 200,
                final_url: url.to_string(),
            });
        }
        let mut response = responses.remove(0);
        if let Ok(page) = &mut response
            && page.final_url.is_empty()
        {
            page.final_url = url.to_string();
        }
        response
    }
}

/// What the extractor should report for one page of markup.
#[derive(Clone, Default)]
pub struct ScriptedPage {
    pub records: Vec<RawRecord>,
    pub next_link: Option<String>,
    pub page_links: Vec<String>,
    pub max_page: Option<u32>,
}

/// Extractor keyed on the exact markup string handed to it.
#[derive(Clone, Default)]
pub struct MockPageExtractor {
    pages: Arc<Mutex<HashMap<String, ScriptedPage>>>,
    extract_error: Arc<Mutex<Option<CrawlError>>>,
}

impl MockPageExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, html: &str, page: ScriptedPage) {
        self.pages.lock().unwrap().insert(html.to_string(), page);
    }

    /// Make the next `extract` call fail once.
    pub fn fail_next_extract(&self, error: CrawlError) {
        *self.extract_error.lock().unwrap() = Some(error);
    }

    fn scripted(&self, html: &str) -> ScriptedPage {
        self.pages.lock().unwrap().get(html).cloned().unwrap_or_default()
    }
}

impl PageExtractor for MockPageExtractor {
    fn extract(&self, html: &str) -> Result<Vec<RawRecord>, CrawlError> {
        if let Some(error) = self.extract_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.scripted(html).records)
    }

    fn find_next_page_link(&self, html: &str) -> Option<String> {
        self.scripted(html).next_link
    }

    fn find_page_links(&self, html: &str) -> Vec<String> {
        self.scripted(html).page_links
    }

    fn find_max_page_number(&self, html: &str) -> Option<u32> {
        self.scripted(html).max_page
    }
}

/// Sink that collects emitted reviews, with optional injected failure.
#[derive(Clone, Default)]
pub struct MockSink {
    pub emitted: Arc<Mutex<Vec<Review>>>,
    emit_error: Arc<Mutex<Option<CrawlError>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose first emit fails with the given error.
    pub fn with_error(error: CrawlError) -> Self {
        Self {
            emitted: Arc::new(Mutex::new(Vec::new())),
            emit_error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl RecordSink for MockSink {
    async fn emit(&self, review: &Review) -> Result<(), CrawlError> {
        if let Some(error) = self.emit_error.lock().unwrap().take() {
            return Err(error);
        }
        self.emitted.lock().unwrap().push(review.clone());
        Ok(())
    }
}

/// In-memory checkpoint store recording a `(last_page_completed,
/// seen_count)` pair for every successful save.
#[derive(Clone, Default)]
pub struct MemoryCheckpointStore {
    state: Arc<Mutex<Option<CrawlState>>>,
    pub history: Arc<Mutex<Vec<(u32, usize)>>>,
    fail_saves: bool,
}

impl MemoryCheckpointStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_state(state: CrawlState) -> Self {
        Self {
            state: Arc::new(Mutex::new(Some(state))),
            ..Default::default()
        }
    }

    /// Store whose every save fails.
    pub fn failing_saves() -> Self {
        Self {
            fail_saves: true,
            ..Default::default()
        }
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> CrawlState {
        self.state.lock().unwrap().clone().unwrap_or_default()
    }

    async fn save(&self, state: &CrawlState) -> Result<(), CrawlError> {
        if self.fail_saves {
            return Err(CrawlError::Checkpoint("injected save failure".into()));
        }
        self.history
            .lock()
            .unwrap()
            .push((state.last_page_completed(), state.seen_count()));
        *self.state.lock().unwrap() = Some(state.clone());
        Ok(())
    }
}

/// Reporter recording event names in order.
#[derive(Clone, Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<&'static str>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CrawlReporter for MockReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        let label = match event {
            CrawlEvent::Started { .. } => "Started",
            CrawlEvent::PageFetched { .. } => "PageFetched",
            CrawlEvent::PageBlocked { .. } => "PageBlocked",
            CrawlEvent::PageAbandoned { .. } => "PageAbandoned",
            CrawlEvent::RecordsExtracted { .. } => "RecordsExtracted",
            CrawlEvent::CheckpointSkipped { .. } => "CheckpointSkipped",
            CrawlEvent::PageCompleted { .. } => "PageCompleted",
            CrawlEvent::Finished { .. } => "Finished",
        };
        self.events.lock().unwrap().push(label);
    }
}
