//! Source ref selection.

use crate::MatrixError;
use cascade_core::{PackageSetup, SourceRef, TriggerContext};

/// Pick the ref to build `package` from.
///
/// A run triggered from the package's master branch builds its master
/// branch; every other run builds its develop branch. An explicit
/// `owner/repo@ref` input overrides both.
pub fn select_ref(package: &PackageSetup, trigger: &TriggerContext) -> Result<String, MatrixError> {
    let input = package.input_ref().map_err(|e| MatrixError::InvalidInput {
        package: package.name.clone(),
        message: e.to_string(),
    })?;
    if let Some(SourceRef { git_ref, .. }) = input {
        return Ok(git_ref);
    }

    let use_master = package.master_branch == trigger.ref_name;
    Ok(if use_master {
        package.master_branch.clone()
    } else {
        package.develop_branch.clone()
    })
}
