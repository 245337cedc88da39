//! CLI command definitions.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Generate workflow files from the dependency tree
    Generate {
        /// Workflow configuration file
        #[arg(short, long, default_value = "workflows.yml")]
        config: PathBuf,

        /// Dependency tree file
        #[arg(short, long, default_value = "dependency_tree.yml")]
        dep_tree: PathBuf,

        /// Directory the workflow files are written to
        #[arg(short, long, default_value = ".github/workflows")]
        output: PathBuf,

        /// Where dependency fragments are written; defaults to the configured fragments file
        #[arg(long)]
        fragments: Option<PathBuf>,

        /// Workflows to generate; all when omitted
        workflows: Vec<String>,
    },

    /// Assemble build matrices inside a setup job
    Setup(SetupArgs),

    /// Print the job graph of a workflow
    Graph {
        /// Workflow name
        workflow: String,

        /// Workflow configuration file
        #[arg(short, long, default_value = "workflows.yml")]
        config: PathBuf,

        /// Dependency tree file
        #[arg(short, long, default_value = "dependency_tree.yml")]
        dep_tree: PathBuf,
    },

    /// Print the JSON schema of the configuration files
    Schema {
        #[arg(value_enum, default_value = "workflows")]
        target: SchemaTarget,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchemaTarget {
    /// The workflow configuration file
    Workflows,
    /// Per-package variables in the dependency tree
    Package,
}

/// Inputs of the setup job. Every value can come from the environment the
/// generated workflow sets up.
#[derive(Debug, Clone, Args)]
pub struct SetupArgs {
    /// Setup config: one entry per package
    #[arg(long, env = "CONFIG")]
    pub config: String,

    /// Base build matrix
    #[arg(long, env = "MATRIX")]
    pub matrix: String,

    /// Catalog of optional matrix rows
    #[arg(long, env = "OPTIONAL_MATRIX", default_value = "")]
    pub optional_matrix: String,

    /// Interpreter versions for Python packages
    #[arg(long, env = "PYTHON_VERSIONS", default_value = "")]
    pub python_versions: String,

    /// Matrix rows Python packages run on
    #[arg(long, env = "PYTHON_JOBS", default_value = "")]
    pub python_jobs: String,

    /// Newline-separated matrix rows to skip
    #[arg(long, env = "SKIP_MATRIX_JOBS", default_value = "")]
    pub skip_matrix_jobs: String,

    /// Token for reading package repositories
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Ref of the triggering run, preferred over GITHUB_REF_NAME
    #[arg(long, env = "TRIGGER_REF_NAME")]
    pub trigger_ref_name: Option<String>,

    #[arg(long, env = "GITHUB_REF_NAME", hide = true)]
    pub github_ref_name: Option<String>,

    /// Triggering repository as owner/repo, preferred over GITHUB_REPOSITORY
    #[arg(long, env = "TRIGGER_REPOSITORY")]
    pub trigger_repository: Option<String>,

    #[arg(long, env = "GITHUB_REPOSITORY", hide = true)]
    pub github_repository: Option<String>,

    /// File step outputs are appended to
    #[arg(long, env = "GITHUB_OUTPUT")]
    pub output: PathBuf,

    /// Dependency fragments published alongside the matrices
    #[arg(long)]
    pub fragments: Option<PathBuf>,
}

impl SetupArgs {
    pub fn ref_name(&self) -> Option<&str> {
        first_set(&self.trigger_ref_name, &self.github_ref_name)
    }

    pub fn repository(&self) -> Option<&str> {
        first_set(&self.trigger_repository, &self.github_repository)
    }
}

fn first_set<'a>(preferred: &'a Option<String>, fallback: &'a Option<String>) -> Option<&'a str> {
    [preferred, fallback]
        .into_iter()
        .filter_map(|value| value.as_deref())
        .map(str::trim)
        .find(|value| !value.is_empty())
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current settings
    Show,

    /// Set a settings value in the user config file
    Set {
        /// Key
        key: String,

        /// Value
        value: String,
    },
}
