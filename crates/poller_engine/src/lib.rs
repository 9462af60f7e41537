//! Poller engine: feed fetching and the durable stores behind the pipeline.
mod cycle;
mod fetch;
mod persist;
mod records;
mod state;
mod types;

pub use cycle::{run_cycle, RunError};
pub use fetch::{
    build_request_url, normalize_response, FeedSettings, FeedSource, ReqwestFeedSource,
    SAMPLE_RESPONSE,
};
pub use persist::{ensure_output_dir, ArtifactWriter, AtomicFileWriter};
pub use records::SqliteRecordStore;
pub use state::RonStateStore;
pub use types::{FailureKind, FetchError};
