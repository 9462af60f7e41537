use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::Utc;
use poller_core::{
    ArtifactSink, CycleOutcome, LogNotifier, Poller, RecordSink, ResetAspect, StateStore,
    WatermarkStore,
};
use poller_engine::{run_cycle, ArtifactWriter, ReqwestFeedSource, RonStateStore, SqliteRecordStore};
use poller_logging::{poller_info, poller_warn};

use crate::config::PollerConfig;

/// Timestamp of the last cycle that completed without error.
const LAST_RUN_KEY: &str = "last_run";

struct Stores {
    state: RonStateStore,
    records: SqliteRecordStore,
    artifacts: ArtifactWriter,
}

impl Stores {
    fn open(config: &PollerConfig) -> Result<Self> {
        let state = RonStateStore::open(&config.state_path)
            .with_context(|| format!("failed to open state {}", config.state_path.display()))?;
        let records = SqliteRecordStore::open(&config.database_path).with_context(|| {
            format!("failed to open database {}", config.database_path.display())
        })?;
        let artifacts = ArtifactWriter::new(config.tweets_directory.clone());
        Ok(Self {
            state,
            records,
            artifacts,
        })
    }
}

pub fn fetch(config: &PollerConfig) -> Result<()> {
    let mut stores = Stores::open(config)?;
    let source = ReqwestFeedSource::new(config.feed_settings());
    let hooks = config.hooks();
    let notifier = LogNotifier;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let outcome = {
        let mut poller = Poller::new(
            &mut stores.state,
            &mut stores.records,
            &stores.artifacts,
            &notifier,
        )
        .with_hooks(&hooks);
        runtime.block_on(run_cycle(&source, &mut poller))?
    };

    match outcome {
        CycleOutcome::NoNewItems { .. } => {}
        CycleOutcome::Processed(report) => {
            poller_info!(
                "Fetched {} tweet(s): {} saved, {} skipped, {} file write failure(s)",
                report.items.len(),
                report.saved,
                report.skipped,
                report.failed_writes.len()
            );
            for item in &report.items {
                println!("{}\t{}", item.id, item.created_at);
            }
        }
    }

    stores
        .state
        .set(LAST_RUN_KEY, &Utc::now().to_rfc3339())
        .context("failed to record last run")?;
    Ok(())
}

pub fn reset(config: &PollerConfig, preserve: &BTreeSet<ResetAspect>) -> Result<()> {
    let mut stores = Stores::open(config)?;
    let notifier = LogNotifier;

    let report = Poller::new(
        &mut stores.state,
        &mut stores.records,
        &stores.artifacts,
        &notifier,
    )
    .reset(preserve)?;

    if preserve.len() == ResetAspect::ALL.len() {
        poller_warn!("Every aspect was preserved; nothing was reset");
    }
    if let Some(deleted) = report.files_deleted {
        println!(
            "Deleted {deleted} file(s) from {}",
            config.tweets_directory.display()
        );
    }
    if let Some(deleted) = report.records_deleted {
        println!("Deleted {deleted} stored record(s)");
    }
    Ok(())
}

pub fn status(config: &PollerConfig) -> Result<()> {
    let stores = Stores::open(config)?;

    let since_id = stores.state.since_id();
    let counter = stores.state.counter()?;
    println!("since_id:  {}", since_id.as_deref().unwrap_or("(unset)"));
    println!(
        "counter:   {}",
        counter.map_or_else(|| "(unset)".to_string(), |value| value.to_string())
    );
    println!("records:   {}", stores.records.count()?);
    println!(
        "files:     {} in {}",
        stores.artifacts.count()?,
        stores.artifacts.dir().display()
    );
    println!("last run:  {}", stores.state.get_or(LAST_RUN_KEY, "never"));
    Ok(())
}
