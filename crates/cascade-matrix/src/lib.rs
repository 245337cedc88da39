//! Run-time build matrix assembly for Cascade.
//!
//! Runs inside the setup job of a generated workflow: resolves each
//! package's source ref, fetches its CI config, derives its build matrix
//! and publishes the results for the jobs that follow.

pub mod assembler;
pub mod branch;
pub mod error;
pub mod output;
pub mod publish;
pub mod store;

pub use assembler::{AssemblerSettings, Assembly, MatrixAssembler, RunInputs};
pub use branch::select_ref;
pub use error::{MatrixError, StoreError};
pub use output::{GithubOutputFile, MemoryOutput};
pub use publish::publish;
pub use store::{DEFAULT_RAW_CONTENT_URL, GithubRawStore, InMemoryStore};
