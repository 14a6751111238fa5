//! The crawl controller: a state machine driving one paginated crawl.
//!
//! Per page: fetch → classify → (backoff loop | extract) → dedup →
//! checkpoint → pagination decision. Resumption from an existing
//! checkpoint is the default and only mode; the controller starts from
//! `last_page_completed + 1` whenever a checkpoint exists.
//!
//! A page is only marked complete after all of its records have been
//! evaluated for dedup; cancellation mid-page never persists partial
//! results.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backoff::{BackoffDecision, BackoffPolicy};
use crate::block::{BlockDetector, BlockKind};
use crate::checkpoint::CheckpointStore;
use crate::error::CrawlError;
use crate::models::{CrawlState, CrawlTarget, PageRequest, Review};
use crate::page_url::{build_page_url, page_number};
use crate::pagination::{PageHints, PaginationDriver};
use crate::traits::{PageExtractor, RecordSink, RenderClient, WaitPolicy};

/// Why a crawl stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Enough unique records were collected.
    TargetReached,
    /// The next page number would exceed the configured cap.
    MaxPagesReached,
    /// No next-page URL could be resolved.
    NoNextPage,
    /// The session hit a login wall; unrecoverable.
    AuthWall { page: u32 },
    /// Retries exhausted with no further pagination branch.
    Abandoned { page: u32, kind: BlockKind },
    /// Externally cancelled.
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::TargetReached => "target-reached",
            StopReason::MaxPagesReached => "max-pages-reached",
            StopReason::NoNextPage => "no-next-page",
            StopReason::AuthWall { .. } => "auth-wall",
            StopReason::Abandoned { .. } => "abandoned",
            StopReason::Cancelled => "cancelled",
        }
    }
}

/// Final accounting for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Records emitted by this run (excludes records from prior runs).
    pub records_emitted: usize,
    /// Unique identities seen across all runs, per the checkpoint.
    pub total_seen: usize,
    pub last_page_completed: u32,
    pub stop_reason: StopReason,
}

/// Events emitted by the controller for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CrawlEvent<'a> {
    Started {
        start_url: &'a str,
        resumed_from: u32,
        seen: usize,
    },
    PageFetched {
        page: u32,
        status: u16,
    },
    PageBlocked {
        page: u32,
        kind: BlockKind,
        attempt: u32,
        wait: Duration,
    },
    PageAbandoned {
        page: u32,
        kind: BlockKind,
    },
    RecordsExtracted {
        page: u32,
        found: usize,
        new: usize,
    },
    CheckpointSkipped {
        page: u32,
        error: &'a str,
    },
    PageCompleted {
        page: u32,
        total_seen: usize,
    },
    Finished {
        reason: &'a StopReason,
        total_seen: usize,
    },
}

/// Trait for receiving crawl events (decoupled logging).
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl CrawlReporter for TracingReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        match event {
            CrawlEvent::Started {
                start_url,
                resumed_from,
                seen,
            } => {
                if resumed_from > 0 {
                    tracing::info!(%start_url, %resumed_from, %seen, "Resuming crawl from checkpoint");
                } else {
                    tracing::info!(%start_url, "Starting crawl");
                }
            }
            CrawlEvent::PageFetched { page, status } => {
                tracing::debug!(%page, %status, "Page fetched");
            }
            CrawlEvent::PageBlocked {
                page,
                kind,
                attempt,
                wait,
            } => {
                tracing::warn!(
                    %page,
                    %kind,
                    %attempt,
                    wait_secs = wait.as_secs(),
                    "Blocked, backing off"
                );
            }
            CrawlEvent::PageAbandoned { page, kind } => {
                tracing::warn!(%page, %kind, "Retries exhausted, abandoning page");
            }
            CrawlEvent::RecordsExtracted { page, found, new } => {
                tracing::info!(%page, %found, %new, "Records extracted");
            }
            CrawlEvent::CheckpointSkipped { page, error } => {
                tracing::warn!(%page, %error, "Checkpoint write failed, continuing without persistence");
            }
            CrawlEvent::PageCompleted { page, total_seen } => {
                tracing::info!(%page, %total_seen, "Page completed");
            }
            CrawlEvent::Finished { reason, total_seen } => {
                tracing::info!(reason = reason.as_str(), %total_seen, "Crawl finished");
            }
        }
    }
}

enum BlockOutcome {
    /// Backoff elapsed; refetch the same page.
    Retry,
    /// Page abandoned; continue with a fallback pagination branch.
    Continue(PageRequest),
    Stop(StopReason),
}

/// Top-level crawl state machine, generic over all collaborators.
pub struct CrawlController<R, X, S, K>
where
    R: RenderClient,
    X: PageExtractor,
    S: CheckpointStore,
    K: RecordSink,
{
    renderer: R,
    extractor: X,
    store: S,
    sink: K,
    detector: BlockDetector,
    policy: BackoffPolicy,
    wait: WaitPolicy,
}

impl<R, X, S, K> CrawlController<R, X, S, K>
where
    R: RenderClient,
    X: PageExtractor,
    S: CheckpointStore,
    K: RecordSink,
{
    pub fn new(renderer: R, extractor: X, store: S, sink: K) -> Self {
        Self {
            renderer,
            extractor,
            store,
            sink,
            detector: BlockDetector::default(),
            policy: BackoffPolicy::default(),
            wait: WaitPolicy::default(),
        }
    }

    pub fn with_block_detector(mut self, detector: BlockDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_backoff_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Run the crawl to a terminal condition, resuming from any existing
    /// checkpoint. The last good checkpoint is flushed on every exit path.
    pub async fn crawl<Rep: CrawlReporter>(
        &self,
        target: &CrawlTarget,
        cancel: CancellationToken,
        reporter: &Rep,
    ) -> Result<CrawlSummary, CrawlError> {
        let mut state = self.store.load().await;
        let resumed_from = state.last_page_completed();
        reporter.report(CrawlEvent::Started {
            start_url: &target.start_url,
            resumed_from,
            seen: state.seen_count(),
        });

        if state.seen_count() >= target.target_records {
            return self
                .finish(state, 0, StopReason::TargetReached, reporter)
                .await;
        }

        let start_page = page_number(&target.start_url).unwrap_or(1);
        let first_page = if resumed_from >= start_page {
            resumed_from + 1
        } else {
            start_page
        };
        if first_page > target.max_pages {
            return self
                .finish(state, 0, StopReason::MaxPagesReached, reporter)
                .await;
        }

        let mut request = if first_page == start_page {
            PageRequest::new(target.start_url.clone(), first_page)
        } else {
            PageRequest::new(build_page_url(&target.start_url, first_page)?, first_page)
        };

        let mut driver = PaginationDriver::new(target.max_pages, target.seed_pagination);
        let mut emitted = 0usize;
        let mut first_fetch = true;

        let stop = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            if !first_fetch
                && !target.politeness_delay.is_zero()
                && !sleep_cancellable(target.politeness_delay, &cancel).await
            {
                break StopReason::Cancelled;
            }
            first_fetch = false;

            let outcome = tokio::select! {
                outcome = self.renderer.fetch(&request.url, &self.wait) => outcome,
                () = cancel.cancelled() => break StopReason::Cancelled,
            };

            let page = match outcome {
                Ok(page) => page,
                Err(e) if e.is_transient() => {
                    tracing::warn!(page = request.page, error = %e, "Fetch failed, treating as unknown error");
                    match self
                        .handle_block(
                            &mut state,
                            &mut driver,
                            &request,
                            BlockKind::Unknown,
                            &cancel,
                            reporter,
                        )
                        .await
                    {
                        BlockOutcome::Retry => {
                            request.attempt += 1;
                            continue;
                        }
                        BlockOutcome::Continue(next) => {
                            request = next;
                            continue;
                        }
                        BlockOutcome::Stop(reason) => break reason,
                    }
                }
                Err(e) => return Err(e),
            };

            reporter.report(CrawlEvent::PageFetched {
                page: request.page,
                status: page.http_status,
            });

            let kind = self.detector.classify(&page);
            match kind {
                BlockKind::Ok => {}
                BlockKind::AuthWall => {
                    tracing::warn!(
                        page = request.page,
                        final_url = %page.final_url,
                        collected = state.seen_count(),
                        "Redirected to login page; session no longer authorized, stopping"
                    );
                    break StopReason::AuthWall { page: request.page };
                }
                _ => {
                    match self
                        .handle_block(&mut state, &mut driver, &request, kind, &cancel, reporter)
                        .await
                    {
                        BlockOutcome::Retry => {
                            request.attempt += 1;
                            continue;
                        }
                        BlockOutcome::Continue(next) => {
                            request = next;
                            continue;
                        }
                        BlockOutcome::Stop(reason) => break reason,
                    }
                }
            }

            // Extracting. Extraction failure and an empty page both count
            // as zero records: logged, but not proof of end-of-data.
            let raws = match self.extractor.extract(&page.html) {
                Ok(raws) => raws,
                Err(e) => {
                    tracing::warn!(page = request.page, error = %e, "Extraction failed, treating page as empty");
                    Vec::new()
                }
            };
            if raws.is_empty() {
                tracing::warn!(
                    page = request.page,
                    "No records on page; may be a rendering hiccup rather than end of data"
                );
            }

            // Deduping.
            let mut new_on_page = 0usize;
            for raw in &raws {
                let Some(review) = Review::from_raw(raw, &page.final_url, request.page) else {
                    tracing::warn!(page = request.page, "Dropping record without identity fields");
                    continue;
                };
                let identity = review.identity();
                if state.is_duplicate(&identity) {
                    tracing::debug!(%identity, "Skipping duplicate record");
                    continue;
                }
                self.sink.emit(&review).await?;
                state.mark_seen(identity);
                emitted += 1;
                new_on_page += 1;
            }
            reporter.report(CrawlEvent::RecordsExtracted {
                page: request.page,
                found: raws.len(),
                new: new_on_page,
            });

            // The page is complete only now: every record evaluated.
            state.complete_page(request.page);
            if let Err(e) = self.store.save(&state).await {
                let error = e.to_string();
                reporter.report(CrawlEvent::CheckpointSkipped {
                    page: request.page,
                    error: &error,
                });
            }
            reporter.report(CrawlEvent::PageCompleted {
                page: request.page,
                total_seen: state.seen_count(),
            });

            // Pagination decision.
            if state.seen_count() >= target.target_records {
                break StopReason::TargetReached;
            }
            if driver.wants_seed()
                && let Err(e) = driver.seed_from(
                    request.page,
                    &page.final_url,
                    self.extractor.find_max_page_number(&page.html),
                )
            {
                tracing::warn!(error = %e, "Seed-mode discovery failed, continuing step-wise");
            }
            if request.page + 1 > target.max_pages {
                break StopReason::MaxPagesReached;
            }

            let hints = PageHints {
                next_link: self.extractor.find_next_page_link(&page.html),
                page_links: self.extractor.find_page_links(&page.html),
                max_page: None,
            };
            // Pagination resolves against the URL the page actually landed
            // on, redirects included.
            let basis = PageRequest::new(page.final_url.clone(), request.page);
            match driver.next_request(&basis, &hints) {
                Some(next) => request = next,
                None => break StopReason::NoNextPage,
            }
        };

        self.finish(state, emitted, stop, reporter).await
    }

    async fn handle_block<Rep: CrawlReporter>(
        &self,
        state: &mut CrawlState,
        driver: &mut PaginationDriver,
        request: &PageRequest,
        kind: BlockKind,
        cancel: &CancellationToken,
        reporter: &Rep,
    ) -> BlockOutcome {
        let attempt = state.retry_count(request.page, kind);
        match self.policy.decide(kind, attempt) {
            BackoffDecision::Wait(wait) => {
                state.record_retry(request.page, kind);
                reporter.report(CrawlEvent::PageBlocked {
                    page: request.page,
                    kind,
                    attempt,
                    wait,
                });
                if sleep_cancellable(wait, cancel).await {
                    BlockOutcome::Retry
                } else {
                    BlockOutcome::Stop(StopReason::Cancelled)
                }
            }
            BackoffDecision::Abandon => {
                reporter.report(CrawlEvent::PageAbandoned {
                    page: request.page,
                    kind,
                });
                // Abandonment kills only this branch. If another page can
                // still be reached (seed queue or manual construction),
                // the crawl moves on; the abandoned page is never marked
                // complete.
                match driver.next_request(request, &PageHints::default()) {
                    Some(next) => {
                        tracing::warn!(
                            abandoned = request.page,
                            next = next.page,
                            %kind,
                            "Abandoning page, continuing with next pagination branch"
                        );
                        BlockOutcome::Continue(next)
                    }
                    None => BlockOutcome::Stop(StopReason::Abandoned {
                        page: request.page,
                        kind,
                    }),
                }
            }
        }
    }

    /// Flush the final checkpoint and assemble the summary. No further
    /// requests are issued after this point.
    async fn finish<Rep: CrawlReporter>(
        &self,
        state: CrawlState,
        emitted: usize,
        stop: StopReason,
        reporter: &Rep,
    ) -> Result<CrawlSummary, CrawlError> {
        if let Err(e) = self.store.save(&state).await {
            tracing::warn!(error = %e, "Final checkpoint flush failed");
        }
        reporter.report(CrawlEvent::Finished {
            reason: &stop,
            total_seen: state.seen_count(),
        });
        Ok(CrawlSummary {
            records_emitted: emitted,
            total_seen: state.seen_count(),
            last_page_completed: state.last_page_completed(),
            stop_reason: stop,
        })
    }
}

async fn sleep_cancellable(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = tokio::time::sleep(duration) => true,
        () = cancel.cancelled() => false,
    }
}
