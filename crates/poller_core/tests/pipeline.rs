use std::path::PathBuf;

use poller_core::{
    ArtifactSink, CycleError, CycleOutcome, Decision, HookChain, HookError, Item,
    MemoryArtifactStore, MemoryRecordStore, MemoryStateStore, PersistError, Poller, RecordSink,
    RecordingNotifier, RecordingObserver, Severity, StorageError, StoredRecord, WatermarkStore,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn init_logging() {
    poller_logging::initialize_for_tests();
}

fn tweet(id: &str, ts: i64) -> Item {
    Item {
        id: id.to_string(),
        created_at: format!("@{ts}"),
        created_timestamp: ts,
        payload: json!({ "id_str": id, "text": format!("tweet {id}") }),
    }
}

fn processed(outcome: CycleOutcome) -> poller_core::CycleReport {
    match outcome {
        CycleOutcome::Processed(report) => report,
        other => panic!("expected processed batch, got {other:?}"),
    }
}

#[test]
fn empty_feed_is_a_noop_without_watermark() {
    init_logging();
    let mut state = MemoryStateStore::new();
    let mut records = MemoryRecordStore::new();
    let artifacts = MemoryArtifactStore::new("tweets");
    let notifier = RecordingNotifier::new();

    let outcome = Poller::new(&mut state, &mut records, &artifacts, &notifier)
        .process(Vec::new())
        .unwrap();

    assert_eq!(outcome, CycleOutcome::NoNewItems { since_id: None });
    assert!(state.snapshot().is_empty());
    assert_eq!(
        notifier.take(),
        vec![(Severity::Normal, "No tweets available.".to_string())]
    );
}

#[test]
fn empty_feed_names_prior_watermark() {
    init_logging();
    let mut state = MemoryStateStore::new();
    state.set_since_id(Some("991")).unwrap();
    state.set_counter(Some(12)).unwrap();
    let before = state.snapshot();
    let mut records = MemoryRecordStore::new();
    let artifacts = MemoryArtifactStore::new("tweets");
    let notifier = RecordingNotifier::new();

    let outcome = Poller::new(&mut state, &mut records, &artifacts, &notifier)
        .process(Vec::new())
        .unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::NoNewItems {
            since_id: Some("991".into())
        }
    );
    assert_eq!(state.snapshot(), before);
    assert_eq!(
        notifier.take(),
        vec![(Severity::Normal, "No new tweets since 991.".to_string())]
    );
}

#[test]
fn first_fetch_assigns_counters_from_zero() {
    init_logging();
    let mut state = MemoryStateStore::new();
    let mut records = MemoryRecordStore::new();
    let artifacts = MemoryArtifactStore::new("tweets");
    let notifier = RecordingNotifier::new();
    let observer = RecordingObserver::default();

    // Feed order is newest first.
    let report = processed(
        Poller::new(&mut state, &mut records, &artifacts, &notifier)
            .with_observer(&observer)
            .process(vec![tweet("b", 200), tweet("a", 100)])
            .unwrap(),
    );

    assert_eq!(report.processed_count(), 2);
    assert_eq!(report.counter, Some(1));
    assert_eq!(report.since_id.as_deref(), Some("b"));
    let ids: Vec<_> = records.rows().iter().map(|r| (r.id.as_str(), r.counter)).collect();
    assert_eq!(ids, vec![("a", 0), ("b", 1)]);
    assert_eq!(artifacts.counters(), vec![0, 1]);
    assert_eq!(state.counter().unwrap(), Some(1));
    assert_eq!(state.since_id().as_deref(), Some("b"));
    assert_eq!(
        *observer.artifacts.lock().unwrap(),
        vec![
            Some(PathBuf::from("tweets/0.json")),
            Some(PathBuf::from("tweets/1.json"))
        ]
    );
}

#[test]
fn watermark_tracks_timestamp_maximum_not_last_processed() {
    init_logging();
    let mut state = MemoryStateStore::new();
    let mut records = MemoryRecordStore::new();
    let artifacts = MemoryArtifactStore::new("tweets");
    let notifier = RecordingNotifier::new();

    let report = processed(
        Poller::new(&mut state, &mut records, &artifacts, &notifier)
            .process(vec![tweet("t100", 100), tweet("t300", 300), tweet("t200", 200)])
            .unwrap(),
    );

    let order: Vec<_> = report.items.iter().map(|i| i.created_timestamp).collect();
    assert_eq!(order, vec![200, 300, 100]);
    let counters: Vec<_> = records
        .rows()
        .iter()
        .map(|r| (r.created_timestamp, r.counter))
        .collect();
    assert_eq!(counters, vec![(200, 0), (300, 1), (100, 2)]);
    assert_eq!(state.since_id().as_deref(), Some("t300"));
}

#[test]
fn counters_continue_across_cycles() {
    init_logging();
    let mut state = MemoryStateStore::new();
    let mut records = MemoryRecordStore::new();
    let artifacts = MemoryArtifactStore::new("tweets");
    let notifier = RecordingNotifier::new();

    Poller::new(&mut state, &mut records, &artifacts, &notifier)
        .process(vec![tweet("2", 20), tweet("1", 10)])
        .unwrap();
    let report = processed(
        Poller::new(&mut state, &mut records, &artifacts, &notifier)
            .process(vec![tweet("4", 40), tweet("3", 30)])
            .unwrap(),
    );

    assert_eq!(report.counter, Some(3));
    let counters: Vec<_> = records.rows().iter().map(|r| r.counter).collect();
    assert_eq!(counters, vec![0, 1, 2, 3]);
    assert_eq!(state.since_id().as_deref(), Some("4"));
}

#[test]
fn skipped_item_consumes_no_counter() {
    init_logging();
    let mut state = MemoryStateStore::new();
    let mut records = MemoryRecordStore::new();
    let artifacts = MemoryArtifactStore::new("tweets");
    let notifier = RecordingNotifier::new();
    let observer = RecordingObserver::default();
    let mut hooks = HookChain::new();
    hooks.register(
        |item: &mut Item, decision: &mut Decision| -> Result<(), HookError> {
            if item.id == "skip-me" {
                *decision = Decision::Skip;
            }
            Ok(())
        },
    );

    let report = processed(
        Poller::new(&mut state, &mut records, &artifacts, &notifier)
            .with_hooks(&hooks)
            .with_observer(&observer)
            .process(vec![tweet("c", 30), tweet("skip-me", 20), tweet("a", 10)])
            .unwrap(),
    );

    assert_eq!(report.saved, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.items.len(), 3);
    let rows: Vec<_> = records.rows().iter().map(|r| (r.id.as_str(), r.counter)).collect();
    assert_eq!(rows, vec![("a", 0), ("c", 1)]);
    assert_eq!(artifacts.counters(), vec![0, 1]);
    assert_eq!(observer.artifacts.lock().unwrap().len(), 2);
    assert_eq!(state.since_id().as_deref(), Some("c"));
}

#[test]
fn skipped_newest_item_still_advances_watermark() {
    init_logging();
    let mut state = MemoryStateStore::new();
    let mut records = MemoryRecordStore::new();
    let artifacts = MemoryArtifactStore::new("tweets");
    let notifier = RecordingNotifier::new();
    let mut hooks = HookChain::new();
    hooks.register(
        |item: &mut Item, decision: &mut Decision| -> Result<(), HookError> {
            if item.id == "newest" {
                *decision = Decision::Skip;
            }
            Ok(())
        },
    );

    Poller::new(&mut state, &mut records, &artifacts, &notifier)
        .with_hooks(&hooks)
        .process(vec![tweet("newest", 50), tweet("older", 40)])
        .unwrap();

    assert_eq!(state.since_id().as_deref(), Some("newest"));
    assert_eq!(state.counter().unwrap(), Some(0));
}

#[test]
fn hooks_run_in_order_and_may_rewrite_payload() {
    init_logging();
    let mut state = MemoryStateStore::new();
    let mut records = MemoryRecordStore::new();
    let artifacts = MemoryArtifactStore::new("tweets");
    let notifier = RecordingNotifier::new();
    let mut hooks = HookChain::new();
    hooks
        .register(
            |item: &mut Item, _decision: &mut Decision| -> Result<(), HookError> {
                item.payload["tag"] = json!("first");
                Ok(())
            },
        )
        .register(
            |item: &mut Item, decision: &mut Decision| -> Result<(), HookError> {
                assert_eq!(item.payload["tag"], json!("first"));
                item.payload["tag"] = json!("second");
                *decision = Decision::Save;
                Ok(())
            },
        );

    Poller::new(&mut state, &mut records, &artifacts, &notifier)
        .with_hooks(&hooks)
        .process(vec![tweet("x", 1)])
        .unwrap();

    let stored: Value = serde_json::from_str(&records.rows()[0].payload_json).unwrap();
    assert_eq!(stored["tag"], json!("second"));
    let file: Value = serde_json::from_str(&artifacts.contents(0).unwrap()).unwrap();
    assert_eq!(file, json!([stored]));
}

#[test]
fn hook_failure_aborts_without_moving_watermark() {
    init_logging();
    let mut state = MemoryStateStore::new();
    let mut records = MemoryRecordStore::new();
    let artifacts = MemoryArtifactStore::new("tweets");
    let notifier = RecordingNotifier::new();
    let mut hooks = HookChain::new();
    hooks.register(
        |item: &mut Item, _decision: &mut Decision| -> Result<(), HookError> {
            if item.id == "bad" {
                return Err(HookError::new("test", "boom"));
            }
            Ok(())
        },
    );

    let err = Poller::new(&mut state, &mut records, &artifacts, &notifier)
        .with_hooks(&hooks)
        .process(vec![tweet("later", 30), tweet("bad", 20), tweet("first", 10)])
        .unwrap_err();

    assert!(matches!(err, CycleError::Hook(_)));
    assert_eq!(records.rows().len(), 1);
    assert_eq!(state.since_id(), None);
    assert_eq!(state.counter().unwrap(), Some(0));
}

struct FailingRecords {
    inner: MemoryRecordStore,
    fail_on: &'static str,
}

impl RecordSink for FailingRecords {
    fn insert(&mut self, record: &StoredRecord) -> Result<(), StorageError> {
        if record.id == self.fail_on {
            return Err(StorageError::Query("disk full".into()));
        }
        self.inner.insert(record)
    }

    fn clear(&mut self) -> Result<usize, StorageError> {
        self.inner.clear()
    }

    fn count(&self) -> Result<usize, StorageError> {
        self.inner.count()
    }
}

#[test]
fn storage_failure_is_fatal_to_the_batch() {
    init_logging();
    let mut state = MemoryStateStore::new();
    let mut records = FailingRecords {
        inner: MemoryRecordStore::new(),
        fail_on: "2",
    };
    let artifacts = MemoryArtifactStore::new("tweets");
    let notifier = RecordingNotifier::new();

    let err = Poller::new(&mut state, &mut records, &artifacts, &notifier)
        .process(vec![tweet("3", 30), tweet("2", 20), tweet("1", 10)])
        .unwrap_err();

    assert!(matches!(err, CycleError::Storage(_)));
    assert_eq!(records.inner.rows().len(), 1);
    assert_eq!(artifacts.counters(), vec![0]);
    assert_eq!(state.counter().unwrap(), Some(0));
    assert_eq!(state.since_id(), None);
    assert!(notifier
        .take()
        .iter()
        .any(|(severity, message)| *severity == Severity::Error
            && message.contains("Could not store tweet 2")));
}

#[test]
fn storage_failure_on_out_of_order_feed_keeps_prior_watermark() {
    init_logging();
    let mut state = MemoryStateStore::new();
    state.set_since_id(Some("t50")).unwrap();
    let mut records = FailingRecords {
        inner: MemoryRecordStore::new(),
        fail_on: "t100",
    };
    let artifacts = MemoryArtifactStore::new("tweets");
    let notifier = RecordingNotifier::new();

    // Processed as t200, t300, t100; the failing item is older than the running maximum.
    let err = Poller::new(&mut state, &mut records, &artifacts, &notifier)
        .process(vec![tweet("t100", 100), tweet("t300", 300), tweet("t200", 200)])
        .unwrap_err();

    assert!(matches!(err, CycleError::Storage(_)));
    assert_eq!(records.inner.rows().len(), 2);
    assert_eq!(state.counter().unwrap(), Some(1));
    assert_eq!(state.since_id().as_deref(), Some("t50"));
}

struct BrokenArtifacts {
    inner: MemoryArtifactStore,
    fail_counter: u64,
}

impl ArtifactSink for BrokenArtifacts {
    fn dir(&self) -> &std::path::Path {
        self.inner.dir()
    }

    fn write(&self, counter: u64, payload: &Value) -> Result<PathBuf, PersistError> {
        if counter == self.fail_counter {
            return Err(PersistError::OutputDir("read-only".into()));
        }
        self.inner.write(counter, payload)
    }

    fn clear(&self) -> Result<usize, PersistError> {
        self.inner.clear()
    }

    fn count(&self) -> Result<usize, PersistError> {
        self.inner.count()
    }
}

#[test]
fn file_failure_keeps_record_and_continues() {
    init_logging();
    let mut state = MemoryStateStore::new();
    let mut records = MemoryRecordStore::new();
    let artifacts = BrokenArtifacts {
        inner: MemoryArtifactStore::new("tweets"),
        fail_counter: 0,
    };
    let notifier = RecordingNotifier::new();
    let observer = RecordingObserver::default();

    let report = processed(
        Poller::new(&mut state, &mut records, &artifacts, &notifier)
            .with_observer(&observer)
            .process(vec![tweet("b", 2), tweet("a", 1)])
            .unwrap(),
    );

    assert_eq!(report.failed_writes, vec![0]);
    assert_eq!(report.saved, 2);
    assert_eq!(records.rows().len(), 2);
    assert_eq!(artifacts.inner.counters(), vec![1]);
    assert_eq!(
        *observer.artifacts.lock().unwrap(),
        vec![None, Some(PathBuf::from("tweets/1.json"))]
    );
    assert_eq!(state.since_id().as_deref(), Some("b"));
    let messages = notifier.take();
    assert!(messages
        .iter()
        .any(|(severity, message)| *severity == Severity::Error && message.contains("tweet a")));
}

#[test]
fn watermark_update_is_announced() {
    init_logging();
    let mut state = MemoryStateStore::new();
    state.set_since_id(Some("5")).unwrap();
    let mut records = MemoryRecordStore::new();
    let artifacts = MemoryArtifactStore::new("tweets");
    let notifier = RecordingNotifier::new();

    Poller::new(&mut state, &mut records, &artifacts, &notifier)
        .process(vec![tweet("6", 60)])
        .unwrap();

    assert_eq!(
        notifier.take(),
        vec![(Severity::Normal, "Updated since_id from 5 to 6.".to_string())]
    );
}
