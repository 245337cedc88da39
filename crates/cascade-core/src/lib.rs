//! Cascade Core
//!
//! Core domain types, traits, and error handling for Cascade.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used across all other crates: the dependency tree, workflow
//! configuration, build matrices and the ports to remote config stores and
//! output sinks.

pub mod error;
pub mod matrix;
pub mod ports;
pub mod setup;
pub mod spec;
pub mod workflow;

pub use error::{Error, Result};
pub use matrix::{BuildMatrix, ConfigDocument, MatrixRow, OptionalMatrixCatalog};
pub use ports::{ConfigStore, FetchFailure, FetchOutcome, OutputSink};
pub use setup::{PackageSetup, SetupConfig, SourceRef, TriggerContext};
pub use spec::{DependencyTree, PackageKind, PackageSpec, PackageVars};
pub use workflow::{WorkflowConfig, WorkflowContext, WorkflowSet, WorkflowType};
