use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{PersistError, Poller, Severity, StorageError, StoreError, WatermarkStore};

/// One resettable piece of poller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetAspect {
    SinceId,
    Count,
    Db,
    Files,
}

impl ResetAspect {
    pub const ALL: [ResetAspect; 4] = [
        ResetAspect::SinceId,
        ResetAspect::Count,
        ResetAspect::Db,
        ResetAspect::Files,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResetAspect::SinceId => "since_id",
            ResetAspect::Count => "count",
            ResetAspect::Db => "db",
            ResetAspect::Files => "files",
        }
    }
}

impl fmt::Display for ResetAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown reset aspect {0:?} (expected since_id, count, db or files)")]
pub struct UnknownAspect(pub String);

impl FromStr for ResetAspect {
    type Err = UnknownAspect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResetAspect::ALL
            .into_iter()
            .find(|aspect| aspect.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownAspect(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum ResetError {
    #[error(transparent)]
    State(#[from] StoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// What a reset actually cleared. `None` means the aspect was preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub since_id_cleared: Option<Option<String>>,
    pub counter_cleared: Option<Option<u64>>,
    pub records_deleted: Option<usize>,
    pub files_deleted: Option<usize>,
}

impl Poller<'_> {
    /// Clear every aspect not named in `preserve`.
    pub fn reset(&mut self, preserve: &BTreeSet<ResetAspect>) -> Result<ResetReport, ResetError> {
        let mut report = ResetReport::default();

        for aspect in ResetAspect::ALL {
            if preserve.contains(&aspect) {
                self.notifier
                    .notify(Severity::Normal, &format!("Preserved {aspect}."));
                continue;
            }
            match aspect {
                ResetAspect::SinceId => {
                    let previous = self.state.since_id();
                    self.state.set_since_id(None)?;
                    self.notifier.notify(
                        Severity::Normal,
                        &format!(
                            "Reset since_id (was {}).",
                            previous.as_deref().unwrap_or("unset")
                        ),
                    );
                    report.since_id_cleared = Some(previous);
                }
                ResetAspect::Count => {
                    let previous = self.state.counter().unwrap_or(None);
                    self.state.set_counter(None)?;
                    self.notifier
                        .notify(Severity::Normal, "Reset tweet counter.");
                    report.counter_cleared = Some(previous);
                }
                ResetAspect::Db => {
                    let deleted = self.records.clear()?;
                    self.notifier.notify(
                        Severity::Normal,
                        &format!("Deleted {deleted} stored tweet(s)."),
                    );
                    report.records_deleted = Some(deleted);
                }
                ResetAspect::Files => {
                    let deleted = self.artifacts.clear()?;
                    self.notifier.notify(
                        Severity::Normal,
                        &format!(
                            "Deleted {deleted} tweet file(s) from {}.",
                            self.artifacts.dir().display()
                        ),
                    );
                    report.files_deleted = Some(deleted);
                }
            }
        }

        self.observer.reset_completed(self.artifacts.dir());
        self.notifier.notify(
            Severity::Warning,
            &format!(
                "Tweet files under {} may still be served from downstream caches; clear them manually.",
                self.artifacts.dir().display()
            ),
        );

        Ok(report)
    }
}
