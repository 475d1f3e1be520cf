pub mod analyzer;
pub mod events;
pub mod ingest;
pub mod matcher;
pub mod pacing;
pub mod reader;
pub mod scheduler;

mod analyze_stream;
mod decode_stream;

pub use analyze_stream::{ANALYZE_DEFAULT_LIMIT, ANALYZE_MAX_LIMIT};
pub use decode_stream::DECODE_BATCH_LIMIT;
pub use events::{AnalyzeEvent, DecodeEvent};
pub use pacing::Pacing;
pub use scheduler::{FetchOutcome, Scheduler, UserFetchState};

use std::collections::HashSet;
use std::sync::Arc;

use crawler_client::CrawlerClient;
use gnews_client::GnewsDecoder;
use llm_client::LlmClient;
use migaswatch_store::Store;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::reader::FeedReader;

/// The ingestion-and-enrichment engine. Cheap to clone; all heavy state is
/// shared behind `Arc`s.
#[derive(Clone)]
pub struct Engine {
    store: Store,
    reader: FeedReader,
    decoder: Arc<GnewsDecoder>,
    crawler: Arc<CrawlerClient>,
    llm: Arc<LlmClient>,
    pacing: Pacing,
    /// Users with an analyzer stream currently running. A second stream for
    /// the same user is refused while the first is live.
    analyzing: Arc<Mutex<HashSet<Uuid>>>,
}

impl Engine {
    pub fn new(
        store: Store,
        decoder: Arc<GnewsDecoder>,
        crawler: Arc<CrawlerClient>,
        llm: Arc<LlmClient>,
        pacing: Pacing,
    ) -> Self {
        Self {
            store,
            reader: FeedReader::new(),
            decoder,
            crawler,
            llm,
            pacing,
            analyzing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}
