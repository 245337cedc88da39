//! Workflow configuration types.
//!
//! A workflow is one pipeline variant compiled from the dependency tree. Its
//! name scopes package overrides and its `private` flag selects which
//! packages take part.

use crate::matrix::{BuildMatrix, OptionalMatrixCatalog};
use crate::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum WorkflowType {
    /// Builds on hosted runners.
    #[serde(rename = "build-package")]
    BuildPackage,
    /// Builds on the HPC through remote execution.
    #[serde(rename = "build-package-hpc")]
    BuildPackageHpc,
}

impl WorkflowType {
    pub const ALL: [WorkflowType; 2] = [WorkflowType::BuildPackage, WorkflowType::BuildPackageHpc];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::BuildPackage => "build-package",
            WorkflowType::BuildPackageHpc => "build-package-hpc",
        }
    }

    /// Where a package keeps its CI config when it does not say otherwise.
    pub fn default_config_path(&self) -> &'static str {
        match self {
            WorkflowType::BuildPackage => ".github/ci-config.yml",
            WorkflowType::BuildPackageHpc => ".github/ci-hpc-config.yml",
        }
    }

    /// `repository_dispatch` event type that triggers the private variant.
    pub fn dispatch_type(&self) -> &'static str {
        match self {
            WorkflowType::BuildPackage => "downstream-ci",
            WorkflowType::BuildPackageHpc => "downstream-ci-hpc",
        }
    }

    /// Setup output carrying this variant's dependency fragment.
    pub fn dep_tree_output(&self) -> &'static str {
        match self {
            WorkflowType::BuildPackage => "build_package_dep_tree",
            WorkflowType::BuildPackageHpc => "build_package_hpc_dep_tree",
        }
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the variant being compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowContext {
    pub name: String,
    pub private: bool,
    pub workflow_type: WorkflowType,
}

impl WorkflowContext {
    pub fn new(name: impl Into<String>, workflow_type: WorkflowType) -> Self {
        Self {
            name: name.into(),
            private: false,
            workflow_type,
        }
    }

    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    pub fn from_config(name: impl Into<String>, config: &WorkflowConfig) -> Self {
        Self::new(name, config.workflow_type).with_private(config.private)
    }
}

/// Per-workflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowConfig {
    #[serde(rename = "type")]
    pub workflow_type: WorkflowType,
    #[serde(default)]
    pub private: bool,
    /// Base test matrix shared by every package.
    pub matrix: BuildMatrix,
    #[serde(default)]
    pub optional_matrix: OptionalMatrixCatalog,
    /// Interpreter versions injected into Python package matrices.
    #[serde(default)]
    pub python_versions: Vec<Value>,
    /// Matrix rows Python packages are restricted to. Empty means no restriction.
    #[serde(default)]
    pub python_jobs: Vec<String>,
    /// Extra `workflow_call` inputs.
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
    #[serde(default)]
    pub python_qa: bool,
    #[serde(default)]
    pub clang_format: bool,
}

/// All workflows from the configuration file, in file order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "Mapping")]
pub struct WorkflowSet {
    workflows: Vec<(String, WorkflowConfig)>,
}

impl TryFrom<Mapping> for WorkflowSet {
    type Error = Error;

    fn try_from(mapping: Mapping) -> Result<Self> {
        let mut workflows = Vec::with_capacity(mapping.len());
        for (key, body) in mapping {
            let name = key
                .as_str()
                .ok_or_else(|| Error::InvalidWorkflow(format!("workflow names must be strings, got {:?}", key)))?
                .to_string();
            let config = serde_yaml::from_value(body)
                .map_err(|e| Error::InvalidWorkflow(format!("{}: {}", name, e)))?;
            workflows.push((name, config));
        }
        Ok(Self { workflows })
    }
}

impl WorkflowSet {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let mapping: Option<Mapping> = serde_yaml::from_str(content)?;
        Self::try_from(mapping.unwrap_or_default())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn get(&self, name: &str) -> Result<&WorkflowConfig> {
        self.workflows
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, config)| config)
            .ok_or_else(|| Error::UnknownWorkflow(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkflowConfig)> {
        self.workflows.iter().map(|(name, config)| (name.as_str(), config))
    }

    /// Select workflows by name, keeping file order. An empty selection means all.
    ///
    /// Requesting a workflow that is not configured is an error.
    pub fn select(&self, names: &[String]) -> Result<Vec<(&str, &WorkflowConfig)>> {
        if let Some(unknown) = names.iter().find(|name| self.get(name).is_err()) {
            return Err(Error::UnknownWorkflow(unknown.clone()));
        }
        Ok(self
            .iter()
            .filter(|(name, _)| names.is_empty() || names.iter().any(|n| n == name))
            .collect())
    }
}
