//! GitHub Actions workflow emitter for Cascade.
//!
//! Renders the job graph of a workflow variant into a workflow file: the
//! setup job that runs the matrix assembler, the gate jobs, and one build
//! job per package.

pub mod jobs;
pub mod model;
pub mod render;
pub mod settings;
pub mod setup;

pub use jobs::gate_inputs;
pub use model::{Job, OrderedMap, RunsOn, Step, Workflow};
pub use render::{BANNER, render_workflow};
pub use settings::EmitSettings;
pub use setup::{derive_setup_config, input_expression};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
    #[error(transparent)]
    Core(#[from] cascade_core::Error),
    #[error(transparent)]
    Graph(#[from] cascade_graph::GraphError),
}
