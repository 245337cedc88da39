//! Per-run matrix assembly.
//!
//! For every package in the setup config the assembler picks a source ref,
//! fetches the package's own CI config and derives the package's build
//! matrix from the run's base matrix. Fetches run concurrently; everything
//! after the fetch is applied per package in a fixed order.

use crate::MatrixError;
use crate::branch::select_ref;
use cascade_core::{
    BuildMatrix, ConfigStore, FetchFailure, FetchOutcome, OptionalMatrixCatalog, PackageSetup,
    SetupConfig, SourceRef, TriggerContext,
};
use futures::StreamExt;
use futures::stream;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct AssemblerSettings {
    /// Upper bound for a single config fetch. A timeout counts as not found.
    pub fetch_timeout: Duration,
    /// Fetches in flight at once.
    pub fetch_concurrency: usize,
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            fetch_concurrency: 8,
        }
    }
}

/// Values the workflow passes to the setup job for this run.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    pub matrix: BuildMatrix,
    pub optional_matrix: OptionalMatrixCatalog,
    pub python_versions: Vec<Value>,
    pub python_jobs: Vec<String>,
}

/// Result of one assembly run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    /// Triggering repository name, without the owner.
    pub trigger_repo: String,
    /// Package name -> matrix, in setup config order.
    pub matrices: Vec<(String, BuildMatrix)>,
    /// Packages left out of this run because their config could not be fetched.
    pub excluded: Vec<(String, FetchFailure)>,
    /// Packages left out because no matrix rows remained after assembly.
    pub empty: Vec<String>,
    /// Matrix row that uploads coverage for an interpreted trigger package.
    pub codecov_platform: Option<String>,
}

impl Assembly {
    pub fn matrix(&self, package: &str) -> Option<&BuildMatrix> {
        self.matrices
            .iter()
            .find(|(name, _)| name == package)
            .map(|(_, matrix)| matrix)
    }
}

pub struct MatrixAssembler {
    store: Arc<dyn ConfigStore>,
    settings: AssemblerSettings,
}

impl MatrixAssembler {
    pub fn new(store: Arc<dyn ConfigStore>, settings: AssemblerSettings) -> Self {
        Self { store, settings }
    }

    /// Build the matrices for every package in `setup`.
    ///
    /// Fails without a partial result when the trigger repository is not in
    /// the setup config or its config cannot be fetched.
    pub async fn assemble(
        &self,
        setup: &SetupConfig,
        inputs: &RunInputs,
        trigger: &TriggerContext,
    ) -> Result<Assembly, MatrixError> {
        if setup
            .find_by_repository(&trigger.owner, &trigger.repo)
            .is_none()
        {
            return Err(MatrixError::UnknownTriggerPackage(format!(
                "{}/{}",
                trigger.owner, trigger.repo
            )));
        }
        info!(
            owner = %trigger.owner,
            repo = %trigger.repo,
            git_ref = %trigger.ref_name,
            packages = setup.packages.len(),
            "assembling build matrices"
        );

        let refs = setup
            .packages
            .iter()
            .map(|package| select_ref(package, trigger).map(|git_ref| (package, git_ref)))
            .collect::<Result<Vec<_>, _>>()?;

        let fetched: Vec<(&PackageSetup, String, Option<FetchOutcome>)> = stream::iter(refs)
            .map(|(package, git_ref)| async move {
                let outcome = self.fetch(package, &git_ref).await;
                (package, git_ref, outcome)
            })
            .buffered(self.settings.fetch_concurrency.max(1))
            .collect()
            .await;

        let mut assembly = Assembly {
            trigger_repo: trigger.repo.clone(),
            ..Default::default()
        };

        for (package, git_ref, outcome) in fetched {
            let is_trigger = package.owner == trigger.owner && package.repo == trigger.repo;

            let remote_matrix = match outcome {
                None => None,
                Some(FetchOutcome::Found(document)) => document.matrix.filter(has_content),
                Some(FetchOutcome::Missing(failure)) => {
                    if is_trigger {
                        return Err(MatrixError::TriggerConfigMissing {
                            package: package.name.clone(),
                            location: SourceRef::new(&package.owner, &package.repo, &git_ref),
                            failure,
                        });
                    }
                    warn!(
                        package = %package.name,
                        git_ref = %git_ref,
                        path = %package.path,
                        status = ?failure.status,
                        detail = %failure.detail,
                        "config not found, excluding package from this run"
                    );
                    assembly.excluded.push((package.name.clone(), failure));
                    continue;
                }
            };

            let matrix = package_matrix(package, &git_ref, remote_matrix, inputs, &trigger.skip_jobs);
            if matrix.is_empty() {
                info!(package = %package.name, "no matrix rows left, package will not run");
                assembly.empty.push(package.name.clone());
                continue;
            }
            if is_trigger && package.python && assembly.codecov_platform.is_none() {
                assembly.codecov_platform = matrix.include.first().map(|row| row.name.clone());
            }
            debug!(package = %package.name, rows = matrix.include.len(), "matrix assembled");
            assembly.matrices.push((package.name.clone(), matrix));
        }

        Ok(assembly)
    }

    /// Fetch a package's config. `None` when the package has no config path.
    async fn fetch(&self, package: &PackageSetup, git_ref: &str) -> Option<FetchOutcome> {
        let path = package.path.trim();
        if path.is_empty() {
            debug!(package = %package.name, "no config path, using base matrix");
            return None;
        }

        let source = SourceRef::new(&package.owner, &package.repo, git_ref);
        info!(package = %package.name, source = %source, path = %path, "fetching config");

        let outcome = tokio::time::timeout(self.settings.fetch_timeout, self.store.fetch(&source, path))
            .await
            .unwrap_or_else(|_| {
                FetchOutcome::Missing(FetchFailure {
                    status: None,
                    detail: format!("timed out after {:?}", self.settings.fetch_timeout),
                })
            });
        Some(outcome)
    }
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Derive one package's matrix from the base matrix.
fn package_matrix(
    package: &PackageSetup,
    git_ref: &str,
    remote_matrix: Option<Value>,
    inputs: &RunInputs,
    run_skip: &[String],
) -> BuildMatrix {
    let mut matrix = inputs.matrix.clone();
    if let Some(config) = remote_matrix {
        matrix.config = Some(config);
    }

    let skip: HashSet<&str> = run_skip
        .iter()
        .chain(&package.skip_matrix_jobs)
        .map(String::as_str)
        .collect();
    matrix.skip_rows(&skip);

    for entry in &package.optional_matrix {
        match inputs.optional_matrix.get(entry) {
            Some(rows) => matrix.add_optional(entry, rows, &skip),
            None => warn!(package = %package.name, entry = %entry, "unknown optional matrix entry"),
        }
    }

    let owner_repo_ref = format!("{}@{}", package.coordinate(), git_ref);
    for row in &mut matrix.include {
        row.owner_repo_ref = Some(owner_repo_ref.clone());
        row.config_path = Some(package.path.clone());
    }

    if package.python {
        if !inputs.python_versions.is_empty() {
            matrix.python_version = Some(inputs.python_versions.clone());
        }
        if !inputs.python_jobs.is_empty() {
            matrix.retain_rows(|name| inputs.python_jobs.iter().any(|job| job == name));
        }
    }

    matrix
}
