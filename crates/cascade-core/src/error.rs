//! Error types for Cascade.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Dependency tree errors
    #[error("Invalid dependency tree: {0}")]
    InvalidDependencyTree(String),

    #[error("Invalid package {package}: {message}")]
    InvalidPackage { package: String, message: String },

    // Workflow errors
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    #[error("Invalid workflow configuration: {0}")]
    InvalidWorkflow(String),

    // Source coordinates
    #[error("Invalid source reference '{0}', expected owner/repo@ref")]
    InvalidSourceRef(String),

    #[error("Invalid repository '{0}', expected owner/repo")]
    InvalidRepository(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
