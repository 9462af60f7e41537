use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use poller_core::{HookChain, ResetAspect, SkipReplies, SkipRetweets};
use poller_engine::FeedSettings;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "poller.ron";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchLimits {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_bytes: u64,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub api_base: String,
    pub request: String,
    pub bearer_token: Option<String>,
    pub response_key: String,
    pub debug: bool,
    pub tweets_directory: PathBuf,
    pub database_path: PathBuf,
    pub state_path: PathBuf,
    pub log_file: PathBuf,
    pub preserve_on_reset: BTreeSet<ResetAspect>,
    pub skip_replies: bool,
    pub skip_retweets: bool,
    pub fetch: FetchLimits,
}

impl Default for PollerConfig {
    fn default() -> Self {
        let feed = FeedSettings::default();
        Self {
            api_base: feed.api_base,
            request: feed.request,
            bearer_token: None,
            response_key: feed.response_key,
            debug: false,
            tweets_directory: PathBuf::from("tweets"),
            database_path: PathBuf::from("tweets.sqlite"),
            state_path: PathBuf::from("poller_state.ron"),
            log_file: PathBuf::from(poller_logging::DEFAULT_LOG_FILE),
            preserve_on_reset: BTreeSet::new(),
            skip_replies: false,
            skip_retweets: false,
            fetch: FetchLimits::default(),
        }
    }
}

/// Where a loaded config came from, reported once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigOrigin::File(path) => write!(f, "Loaded config from {:?}", path),
            ConfigOrigin::Defaults => write!(f, "No config file found; using defaults"),
        }
    }
}

impl PollerConfig {
    /// Read the config file; a missing file yields the defaults.
    ///
    /// Nothing is logged here, the logger is configured from the result.
    pub fn load(path: &Path) -> Result<(Self, ConfigOrigin)> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let config = ron::from_str(&text)
                    .with_context(|| format!("failed to parse config {}", path.display()))?;
                Ok((config, ConfigOrigin::File(path.to_path_buf())))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok((Self::default(), ConfigOrigin::Defaults))
            }
            Err(err) => {
                Err(err).with_context(|| format!("failed to read config {}", path.display()))
            }
        }
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            api_base: self.api_base.clone(),
            request: self.request.clone(),
            bearer_token: self.bearer_token.clone(),
            response_key: self.response_key.clone(),
            debug: self.debug,
            connect_timeout: Duration::from_secs(self.fetch.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.fetch.request_timeout_secs),
            max_bytes: self.fetch.max_bytes,
        }
    }

    pub fn hooks(&self) -> HookChain {
        let mut hooks = HookChain::new();
        if self.skip_replies {
            hooks.register(SkipReplies);
        }
        if self.skip_retweets {
            hooks.register(SkipRetweets);
        }
        hooks
    }
}
