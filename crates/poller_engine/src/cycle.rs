use poller_core::{CycleError, CycleOutcome, Poller, Severity};
use thiserror::Error;

use crate::{FeedSource, FetchError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("feed request failed: {0}")]
    Transport(#[from] FetchError),
    #[error(transparent)]
    Cycle(#[from] CycleError),
}

/// One fetch cycle: read the watermark, fetch newer items, process them.
///
/// A transport failure returns before any state is touched.
pub async fn run_cycle(
    source: &dyn FeedSource,
    poller: &mut Poller<'_>,
) -> Result<CycleOutcome, RunError> {
    let since_id = poller.since_id();
    let items = match source.fetch(since_id.as_deref()).await {
        Ok(items) => items,
        Err(err) => {
            poller
                .notifier()
                .notify(Severity::Error, &format!("Could not fetch tweets: {err}"));
            return Err(err.into());
        }
    };
    Ok(poller.process(items)?)
}
