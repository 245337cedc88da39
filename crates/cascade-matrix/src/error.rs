//! Matrix assembly errors.

use cascade_core::{FetchFailure, SourceRef};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("Config file for triggering package {package} not found at {location}: {failure}")]
    TriggerConfigMissing {
        package: String,
        location: SourceRef,
        failure: FetchFailure,
    },
    #[error("Triggering repository {0} is not part of the setup config")]
    UnknownTriggerPackage(String),
    #[error("Invalid input for {package}: {message}")]
    InvalidInput { package: String, message: String },
    #[error("Failed to publish output {key}: {message}")]
    Output { key: String, message: String },
    #[error(transparent)]
    Core(#[from] cascade_core::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}
