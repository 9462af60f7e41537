use std::time::Duration;

use futures_util::StreamExt;
use poller_core::Item;
use poller_logging::{poller_debug, poller_info};
use serde_json::Value;

use crate::{FailureKind, FetchError};

/// Fixed response served in debug mode instead of calling the network.
pub const SAMPLE_RESPONSE: &str = include_str!("../resources/sample_timeline.json");

#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Endpoint, e.g. `https://api.twitter.com/1.1/statuses/user_timeline.json`.
    pub api_base: String,
    /// Query appended to `api_base`, e.g. `?screen_name=someone&count=200`.
    pub request: String,
    pub bearer_token: Option<String>,
    /// Key under which an object-shaped response carries its item list.
    pub response_key: String,
    pub debug: bool,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.twitter.com/1.1/statuses/user_timeline.json".to_string(),
            request: "?count=200".to_string(),
            bearer_token: None,
            response_key: "statuses".to_string(),
            debug: false,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Source of newest-first feed items.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, since_id: Option<&str>) -> Result<Vec<Item>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFeedSource {
    settings: FeedSettings,
}

impl ReqwestFeedSource {
    pub fn new(settings: FeedSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    fn build_client(&self) -> Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = self.build_client()?;

        let mut request = client.get(parsed);
        if let Some(token) = self.settings.bearer_token.as_deref() {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

#[async_trait::async_trait]
impl FeedSource for ReqwestFeedSource {
    async fn fetch(&self, since_id: Option<&str>) -> Result<Vec<Item>, FetchError> {
        let url = build_request_url(&self.settings.api_base, &self.settings.request, since_id);

        let body = if self.settings.debug {
            poller_info!("Debug mode: serving bundled sample instead of {}", url);
            SAMPLE_RESPONSE.as_bytes().to_vec()
        } else {
            poller_debug!("Requesting {}", url);
            self.download(&url).await?
        };

        let items = normalize_response(&body, &self.settings.response_key)?;
        poller_debug!("Feed returned {} item(s)", items.len());
        Ok(items)
    }
}

/// Base request plus `&since_id=<id>` when a watermark is set.
pub fn build_request_url(api_base: &str, request: &str, since_id: Option<&str>) -> String {
    let mut url = format!("{api_base}{request}");
    if let Some(id) = since_id.filter(|id| !id.is_empty()) {
        let separator = if url.contains('?') { '&' } else { '?' };
        url.push(separator);
        url.push_str("since_id=");
        url.push_str(id);
    }
    url
}

/// Accepts a bare item list or an object wrapping it under `response_key`.
pub fn normalize_response(body: &[u8], response_key: &str) -> Result<Vec<Item>, FetchError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| FetchError::new(FailureKind::InvalidResponse, err.to_string()))?;

    let list = match value {
        Value::Array(list) => list,
        Value::Object(mut object) => match object.remove(response_key) {
            Some(Value::Array(list)) => list,
            Some(Value::Null) | None if object.contains_key("errors") => {
                let errors = object.get("errors").map(Value::to_string).unwrap_or_default();
                return Err(FetchError::new(FailureKind::Api, errors));
            }
            Some(Value::Null) => Vec::new(),
            None => {
                return Err(FetchError::new(
                    FailureKind::InvalidResponse,
                    format!("response has no `{response_key}` list"),
                ))
            }
            Some(other) => {
                return Err(FetchError::new(
                    FailureKind::InvalidResponse,
                    format!("`{response_key}` is not a list: {other}"),
                ))
            }
        },
        other => {
            return Err(FetchError::new(
                FailureKind::InvalidResponse,
                format!("unexpected response document: {other}"),
            ))
        }
    };

    list.into_iter()
        .map(|payload| {
            Item::from_payload(payload)
                .map_err(|err| FetchError::new(FailureKind::InvalidResponse, err.to_string()))
        })
        .collect()
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
