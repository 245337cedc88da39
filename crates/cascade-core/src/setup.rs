//! Setup configuration handed from the generated workflow to the setup job.
//!
//! The generator serializes one [`PackageSetup`] per active package; at run
//! time the matrix assembler reads it back, together with the
//! [`TriggerContext`] of the run.

use crate::spec::{DEFAULT_DEVELOP_BRANCH, DEFAULT_MASTER_BRANCH};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where and how to fetch one package's CI config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSetup {
    pub name: String,
    pub owner: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
    /// Config path inside the repository. Empty means the package has none.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub python: bool,
    #[serde(default = "default_master_branch")]
    pub master_branch: String,
    #[serde(default = "default_develop_branch")]
    pub develop_branch: String,
    /// Explicit `owner/repo@ref` passed to the workflow, usually empty.
    #[serde(default)]
    pub input: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_matrix: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_matrix_jobs: Vec<String>,
}

fn default_master_branch() -> String {
    DEFAULT_MASTER_BRANCH.to_string()
}

fn default_develop_branch() -> String {
    DEFAULT_DEVELOP_BRANCH.to_string()
}

impl PackageSetup {
    pub fn new(name: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            repo: repo.into(),
            subdir: None,
            path: String::new(),
            python: false,
            master_branch: default_master_branch(),
            develop_branch: default_develop_branch(),
            input: String::new(),
            optional_matrix: vec![],
            skip_matrix_jobs: vec![],
        }
    }

    /// `owner/repo` with the optional subdirectory appended.
    pub fn coordinate(&self) -> String {
        match self.subdir.as_deref().filter(|s| !s.is_empty()) {
            Some(subdir) => format!("{}/{}/{}", self.owner, self.repo, subdir.trim_matches('/')),
            None => format!("{}/{}", self.owner, self.repo),
        }
    }

    /// Parse the explicit input, if one was given.
    pub fn input_ref(&self) -> Result<Option<SourceRef>> {
        let input = self.input.trim();
        if input.is_empty() {
            return Ok(None);
        }
        input.parse().map(Some)
    }
}

/// Ordered list of packages the setup job resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetupConfig {
    pub packages: Vec<PackageSetup>,
}

impl SetupConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Option<Self> = serde_yaml::from_str(content)?;
        Ok(config.unwrap_or_default())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn find(&self, name: &str) -> Option<&PackageSetup> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Find the package built from `owner/repo`.
    pub fn find_by_repository(&self, owner: &str, repo: &str) -> Option<&PackageSetup> {
        self.packages
            .iter()
            .find(|p| p.owner == owner && p.repo == repo)
    }
}

/// A resolved source coordinate: `owner/repo@ref`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    pub owner: String,
    /// Repository name, possibly followed by `/subdir`.
    pub repo: String,
    pub git_ref: String,
}

impl SourceRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            git_ref: git_ref.into(),
        }
    }

    /// Repository name without any subdirectory.
    pub fn repository(&self) -> &str {
        self.repo.split('/').next().unwrap_or(&self.repo)
    }
}

impl FromStr for SourceRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidSourceRef(s.to_string());
        let (coordinate, git_ref) = s.trim().rsplit_once('@').ok_or_else(invalid)?;
        let (owner, repo) = coordinate.split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || repo.is_empty() || git_ref.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(owner, repo, git_ref))
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.git_ref)
    }
}

/// What started the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerContext {
    /// Branch or tag name the run was triggered from.
    pub ref_name: String,
    pub owner: String,
    pub repo: String,
    /// Matrix rows the operator asked to skip for this run.
    pub skip_jobs: Vec<String>,
}

impl TriggerContext {
    /// Build from a ref name and an `owner/repo` repository string.
    pub fn new(ref_name: impl Into<String>, repository: &str) -> Result<Self> {
        let (owner, repo) = repository
            .split_once('/')
            .filter(|(o, r)| !o.is_empty() && !r.is_empty())
            .ok_or_else(|| Error::InvalidRepository(repository.to_string()))?;
        Ok(Self {
            ref_name: ref_name.into(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            skip_jobs: vec![],
        })
    }

    /// Set the skip list from newline-separated job names.
    pub fn with_skip_jobs(mut self, lines: &str) -> Self {
        self.skip_jobs = lines
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        self
    }
}
