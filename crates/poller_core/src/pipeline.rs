use poller_logging::{poller_debug, poller_warn};
use thiserror::Error;

use crate::{
    ArtifactSink, CycleObserver, Decision, HookChain, HookError, Item, NoopObserver, Notifier,
    RecordSink, Severity, StateStore, StorageError, StoreError, StoredRecord, WatermarkStore,
};

static NO_HOOKS: HookChain = HookChain::empty();
static NO_OBSERVER: NoopObserver = NoopObserver;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    State(#[from] StoreError),
    #[error("could not encode payload of item {id}: {source}")]
    Encode {
        id: String,
        source: serde_json::Error,
    },
}

/// Result of one processed batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Every fetched item, oldest first, as left by the alteration hooks.
    pub items: Vec<Item>,
    /// Items classified as save; each got a record and a counter value.
    pub saved: usize,
    pub skipped: usize,
    /// Counters whose artifact file could not be written.
    pub failed_writes: Vec<u64>,
    pub since_id: Option<String>,
    pub counter: Option<u64>,
}

impl CycleReport {
    pub fn processed_count(&self) -> usize {
        self.saved
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The feed had nothing new; carries the watermark that was in force.
    NoNewItems { since_id: Option<String> },
    Processed(CycleReport),
}

/// Running maximum of `(created_timestamp, id)` across a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LatestSeen(Option<(i64, String)>);

impl LatestSeen {
    fn observe(&self, item: &Item) -> Self {
        match &self.0 {
            Some((timestamp, _)) if item.created_timestamp <= *timestamp => self.clone(),
            _ => Self(Some((item.created_timestamp, item.id.clone()))),
        }
    }

    fn id(&self) -> Option<&str> {
        self.0.as_ref().map(|(_, id)| id.as_str())
    }
}

/// Wires the watermark store, sinks and collaborators for one invocation.
pub struct Poller<'a> {
    pub(crate) state: &'a mut dyn StateStore,
    pub(crate) records: &'a mut dyn RecordSink,
    pub(crate) artifacts: &'a dyn ArtifactSink,
    pub(crate) notifier: &'a dyn Notifier,
    pub(crate) hooks: &'a HookChain,
    pub(crate) observer: &'a dyn CycleObserver,
}

impl<'a> Poller<'a> {
    pub fn new(
        state: &'a mut dyn StateStore,
        records: &'a mut dyn RecordSink,
        artifacts: &'a dyn ArtifactSink,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            state,
            records,
            artifacts,
            notifier,
            hooks: &NO_HOOKS,
            observer: &NO_OBSERVER,
        }
    }

    pub fn with_hooks(mut self, hooks: &'a HookChain) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn CycleObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn since_id(&self) -> Option<String> {
        self.state.since_id()
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier
    }

    /// Process a newest-first batch.
    ///
    /// Items are handled oldest first. The counter is persisted after every
    /// saved item; the watermark is persisted once, after the loop, and names
    /// the item with the greatest timestamp. A hook or record-store failure
    /// aborts the batch and leaves the watermark where it was.
    pub fn process(&mut self, mut items: Vec<Item>) -> Result<CycleOutcome, CycleError> {
        if items.is_empty() {
            let since_id = self.state.since_id();
            let message = match &since_id {
                Some(id) => format!("No new tweets since {id}."),
                None => "No tweets available.".to_string(),
            };
            self.notifier.notify(Severity::Normal, &message);
            return Ok(CycleOutcome::NoNewItems { since_id });
        }

        items.reverse();
        let previous_since_id = self.state.since_id();
        let mut counter = self.state.counter()?;
        let mut latest = LatestSeen::default();
        let mut report = CycleReport {
            items: Vec::with_capacity(items.len()),
            ..CycleReport::default()
        };

        for mut item in items {
            let candidate = latest.observe(&item);

            let decision = self.hooks.classify(&mut item)?;

            if decision == Decision::Skip {
                poller_debug!("Skipping tweet {}", item.id);
                report.skipped += 1;
            } else {
                let next = counter.map_or(0, |value| value + 1);
                self.save(&item, next)?;
                counter = Some(next);
                self.state.set_counter(counter)?;
                report.saved += 1;

                match self.artifacts.write(next, &item.payload) {
                    Ok(path) => self.observer.artifact_written(Some(&path)),
                    Err(err) => {
                        self.notifier.notify(
                            Severity::Error,
                            &format!(
                                "Could not write tweet {} to {}: {}",
                                item.id,
                                self.artifacts
                                    .dir()
                                    .join(crate::artifact_filename(next))
                                    .display(),
                                err
                            ),
                        );
                        report.failed_writes.push(next);
                        self.observer.artifact_written(None);
                    }
                }
            }

            latest = candidate;
            report.items.push(item);
        }

        self.commit_watermark(&latest)?;
        self.state.set_counter(counter)?;

        report.since_id = latest.id().map(str::to_string);
        report.counter = counter;

        if report.since_id != previous_since_id {
            self.notifier.notify(
                Severity::Normal,
                &format!(
                    "Updated since_id from {} to {}.",
                    previous_since_id.as_deref().unwrap_or("(unset)"),
                    report.since_id.as_deref().unwrap_or("(unset)")
                ),
            );
        }
        if !report.failed_writes.is_empty() {
            poller_warn!(
                "{} tweet file(s) failed to write; their records were kept",
                report.failed_writes.len()
            );
        }

        Ok(CycleOutcome::Processed(report))
    }

    fn save(&mut self, item: &Item, counter: u64) -> Result<(), CycleError> {
        let record =
            StoredRecord::from_item(item, counter).map_err(|source| CycleError::Encode {
                id: item.id.clone(),
                source,
            })?;
        self.records.insert(&record).map_err(|err| {
            self.notifier.notify(
                Severity::Error,
                &format!("Could not store tweet {}: {}", item.id, err),
            );
            CycleError::from(err)
        })
    }

    fn commit_watermark(&mut self, latest: &LatestSeen) -> Result<(), StoreError> {
        match latest.id() {
            Some(id) => self.state.set_since_id(Some(id)),
            None => Ok(()),
        }
    }
}
