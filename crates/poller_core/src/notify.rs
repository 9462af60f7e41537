use std::path::{Path, PathBuf};
use std::sync::Mutex;

use poller_logging::{poller_error, poller_info, poller_warn};

/// Severity tier of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Warning,
    Error,
}

/// Receives every notable outcome of a cycle or reset.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// Forwards notifications to the global logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Normal => poller_info!("{}", message),
            Severity::Warning => poller_warn!("{}", message),
            Severity::Error => poller_error!("{}", message),
        }
    }
}

/// Captures notifications in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(Severity, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<(Severity, String)> {
        match self.messages.lock() {
            Ok(mut messages) => messages.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((severity, message.to_string()));
        }
    }
}

/// Observer hooks fired after artifact writes and after a reset.
pub trait CycleObserver: Send + Sync {
    /// `None` when the artifact write failed.
    fn artifact_written(&self, _path: Option<&Path>) {}

    fn reset_completed(&self, _tweets_dir: &Path) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CycleObserver for NoopObserver {}

/// Observer that remembers what it was told.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub artifacts: Mutex<Vec<Option<PathBuf>>>,
    pub resets: Mutex<Vec<PathBuf>>,
}

impl CycleObserver for RecordingObserver {
    fn artifact_written(&self, path: Option<&Path>) {
        if let Ok(mut artifacts) = self.artifacts.lock() {
            artifacts.push(path.map(Path::to_path_buf));
        }
    }

    fn reset_completed(&self, tweets_dir: &Path) {
        if let Ok(mut resets) = self.resets.lock() {
            resets.push(tweets_dir.to_path_buf());
        }
    }
}
