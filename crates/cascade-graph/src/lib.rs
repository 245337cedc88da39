//! Dependency graph resolution for Cascade.
//!
//! Turns a dependency tree and a workflow configuration into the job graph
//! of one workflow variant: which packages get a job, what each job waits
//! for and when it runs.

pub mod activation;
pub mod closure;
pub mod dag;
pub mod fragment;

pub use activation::{active_packages, has_job, is_active};
pub use closure::{OrderedSet, by_kind, closure};
pub use dag::{
    Gate, GraphError, JobCondition, JobGraph, JobGraphBuilder, JobNode, JobRole, SETUP_JOB,
    SetupOutput, enabled_gates,
};
pub use fragment::{
    DependencyFragment, FRAGMENT_NAME_KEY, FragmentEntry, FragmentPackages, derive_all, parse_fragments,
    render_fragments,
};
