//! Poller core: item model, checkpointing and the fetch-cycle pipeline.
mod hook;
mod item;
mod notify;
mod pipeline;
mod reset;
mod sink;
mod state;

pub use hook::{AlterHook, Decision, HookChain, HookError, SkipReplies, SkipRetweets};
pub use item::{parse_created_at, Item, ItemError};
pub use notify::{
    CycleObserver, LogNotifier, NoopObserver, Notifier, RecordingNotifier, RecordingObserver,
    Severity,
};
pub use pipeline::{CycleError, CycleOutcome, CycleReport, Poller};
pub use reset::{ResetAspect, ResetError, ResetReport, UnknownAspect};
pub use sink::{
    artifact_filename, encode_artifact, ArtifactSink, MemoryArtifactStore, MemoryRecordStore,
    PersistError, RecordSink, StorageError, StoredRecord,
};
pub use state::{
    MemoryStateStore, StateStore, StoreError, WatermarkStore, COUNTER_KEY, SINCE_ID_KEY,
};
