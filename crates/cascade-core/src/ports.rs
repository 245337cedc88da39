//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the core domain and external adapters.

use crate::Result;
use crate::matrix::ConfigDocument;
use crate::setup::SourceRef;
use async_trait::async_trait;
use std::fmt;

/// Why a config could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// HTTP status, when the store got that far.
    pub status: Option<u16>,
    pub detail: String,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "status {}: {}", status, self.detail),
            None => f.write_str(&self.detail),
        }
    }
}

/// Result of a config fetch. Every failure is reported the same way; the
/// caller decides whether it is fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(ConfigDocument),
    Missing(FetchFailure),
}

/// Remote store of per-package CI configs.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch the config at `path` in the repository at `source`.
    async fn fetch(&self, source: &SourceRef, path: &str) -> FetchOutcome;
}

/// Destination for named step outputs consumed by later jobs.
pub trait OutputSink {
    /// Publish a single-line value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Publish a value that may span several lines.
    fn set_multiline(&mut self, key: &str, value: &str) -> Result<()>;
}
