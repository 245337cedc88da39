//! Config store adapters.

use crate::StoreError;
use async_trait::async_trait;
use cascade_core::{ConfigDocument, ConfigStore, FetchFailure, FetchOutcome, SourceRef};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_RAW_CONTENT_URL: &str = "https://raw.githubusercontent.com";

/// Reads files straight from GitHub's raw content host.
pub struct GithubRawStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GithubRawStore {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, StoreError> {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(StoreError::InvalidBaseUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .user_agent(concat!("cascade/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn url(&self, source: &SourceRef, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.base_url,
            source.owner,
            source.repository(),
            source.git_ref,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ConfigStore for GithubRawStore {
    async fn fetch(&self, source: &SourceRef, path: &str) -> FetchOutcome {
        let url = self.url(source, path);
        debug!(url = %url, "requesting config");

        let mut req = self.client.get(&url);
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("token {}", token));
        }

        let res = match req.send().await {
            Ok(res) => res,
            Err(e) => {
                return FetchOutcome::Missing(FetchFailure {
                    status: None,
                    detail: e.to_string(),
                });
            }
        };

        let status = res.status();
        let body = match res.text().await {
            Ok(body) => body,
            Err(e) => {
                return FetchOutcome::Missing(FetchFailure {
                    status: Some(status.as_u16()),
                    detail: e.to_string(),
                });
            }
        };

        match status {
            StatusCode::OK => match serde_yaml::from_str::<Option<ConfigDocument>>(&body) {
                Ok(document) => FetchOutcome::Found(document.unwrap_or_default()),
                Err(e) => FetchOutcome::Missing(FetchFailure {
                    status: Some(status.as_u16()),
                    detail: format!("invalid config: {}", e),
                }),
            },
            _ => FetchOutcome::Missing(FetchFailure {
                status: Some(status.as_u16()),
                detail: body.trim().to_string(),
            }),
        }
    }
}

/// Store backed by a map, for tests and dry runs.
#[derive(Default)]
pub struct InMemoryStore {
    entries: HashMap<String, FetchOutcome>,
    delay: Option<Duration>,
    requests: Mutex<Vec<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the outcome for `owner/repo@ref` and `path`.
    pub fn with(mut self, source: &str, path: &str, outcome: FetchOutcome) -> Self {
        self.entries.insert(Self::key(source, path), outcome);
        self
    }

    /// Delay every fetch by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fetches made so far, as `owner/repo@ref:path`.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn key(source: &str, path: &str) -> String {
        format!("{}:{}", source, path)
    }
}

#[async_trait]
impl ConfigStore for InMemoryStore {
    async fn fetch(&self, source: &SourceRef, path: &str) -> FetchOutcome {
        let key = Self::key(&source.to_string(), path);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(key.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.entries.get(&key).cloned().unwrap_or_else(|| {
            FetchOutcome::Missing(FetchFailure {
                status: Some(StatusCode::NOT_FOUND.as_u16()),
                detail: "404: Not Found".to_string(),
            })
        })
    }
}
