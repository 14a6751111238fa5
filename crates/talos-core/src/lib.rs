pub mod backoff;
pub mod block;
pub mod checkpoint;
pub mod crawl;
pub mod error;
pub mod models;
pub mod page_url;
pub mod pagination;
pub mod testutil;
pub mod traits;

pub use backoff::{BackoffDecision, BackoffPolicy};
pub use block::{BlockDetector, BlockKind};
pub use checkpoint::{CheckpointStore, JsonCheckpointStore, NullCheckpointStore};
pub use crawl::{
    CrawlController, CrawlEvent, CrawlReporter, CrawlSummary, StopReason, TracingReporter,
};
pub use error::CrawlError;
pub use models::{CrawlState, CrawlTarget, PageRequest, RawRecord, RecordIdentity, Review, compute_hash};
pub use traits::{
    CredentialProvider, NoCredentials, NullSink, PageExtractor, RecordSink, RenderClient,
    RenderedPage, SessionBundle, SessionCookie, WaitPolicy,
};
