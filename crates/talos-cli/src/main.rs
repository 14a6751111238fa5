use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use talos_client::{
    CapterraExtractor, FileCredentialProvider, HttpRenderClient, TrustpilotExtractor,
};
use talos_core::checkpoint::JsonCheckpointStore;
use talos_core::crawl::{CrawlController, CrawlSummary, TracingReporter};
use talos_core::models::CrawlTarget;
use talos_core::traits::{CredentialProvider, PageExtractor};

mod output;
use output::{FileSink, OutputFormat};

#[derive(Parser)]
#[command(name = "talos", version, about = "Resumable paginated review crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a paginated review listing to a local file
    Crawl {
        /// Listing URL to start from
        #[arg(short, long)]
        url: String,

        /// Site whose markup to expect
        #[arg(short, long, value_enum)]
        site: Site,

        /// Stop after this many unique records
        #[arg(short, long, default_value_t = 2000)]
        target: usize,

        /// Never fetch beyond this page number
        #[arg(long, default_value_t = 100)]
        max_pages: u32,

        /// Seconds to wait between page fetches
        #[arg(long, default_value_t = 3)]
        delay: u64,

        /// Discover the page count up front and pre-enqueue every page
        #[arg(long, default_value_t = false)]
        seed: bool,

        /// Directory for checkpoint files
        #[arg(long, env = "TALOS_CHECKPOINT_DIR", default_value = ".talos")]
        checkpoint_dir: PathBuf,

        /// JSON file with session cookies for authenticated crawls
        #[arg(long, env = "TALOS_COOKIES")]
        cookies: Option<PathBuf>,

        /// Output file (appended to on resume)
        #[arg(short, long)]
        out: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Jsonl)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Site {
    Trustpilot,
    Capterra,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("talos=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            url,
            site,
            target,
            max_pages,
            delay,
            seed,
            checkpoint_dir,
            cookies,
            out,
            format,
        } => {
            let target = CrawlTarget::new(&url)
                .with_target_records(target)
                .with_max_pages(max_pages)
                .with_politeness_delay(Duration::from_secs(delay))
                .with_seed_pagination(seed);

            let session = match &cookies {
                Some(path) => FileCredentialProvider::new(path)
                    .session()
                    .map_err(|e| anyhow::anyhow!(e))?,
                None => None,
            };

            let mut renderer = HttpRenderClient::new().map_err(|e| anyhow::anyhow!(e))?;
            if let Some(session) = &session {
                renderer = renderer.with_session(session);
            }

            let store = JsonCheckpointStore::for_target(&checkpoint_dir, &target.start_url);
            let sink = FileSink::create(&out, format).map_err(|e| anyhow::anyhow!(e))?;

            // Ctrl-C requests a clean stop: the engine finishes the page in
            // flight and flushes the checkpoint before exiting.
            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, stopping after the current page");
                    interrupt.cancel();
                }
            });

            let summary = match site {
                Site::Trustpilot => {
                    run_crawl(renderer, TrustpilotExtractor::new(), store, sink, &target, cancel)
                        .await?
                }
                Site::Capterra => {
                    run_crawl(renderer, CapterraExtractor::new(), store, sink, &target, cancel)
                        .await?
                }
            };

            println!(
                "{} records written ({} unique across runs), last page {}, stopped: {}",
                summary.records_emitted,
                summary.total_seen,
                summary.last_page_completed,
                summary.stop_reason.as_str()
            );
        }
    }

    Ok(())
}

async fn run_crawl<X: PageExtractor>(
    renderer: HttpRenderClient,
    extractor: X,
    store: JsonCheckpointStore,
    sink: FileSink,
    target: &CrawlTarget,
    cancel: CancellationToken,
) -> Result<CrawlSummary> {
    let controller = CrawlController::new(renderer, extractor, store, sink);
    controller
        .crawl(target, cancel, &TracingReporter)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}
