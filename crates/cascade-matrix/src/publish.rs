//! Publishing assembly results as setup job outputs.

use crate::{Assembly, MatrixError};
use cascade_core::OutputSink;
use cascade_graph::DependencyFragment;
use tracing::info;

/// Write everything downstream jobs read from the setup job.
///
/// Matrices are published as compact JSON under the package name. A matrix
/// without rows is never published, so the package's job does not run.
pub fn publish(
    assembly: &Assembly,
    fragments: &[DependencyFragment],
    sink: &mut dyn OutputSink,
) -> Result<(), MatrixError> {
    let output_error = |key: &str, e: &dyn std::fmt::Display| MatrixError::Output {
        key: key.to_string(),
        message: e.to_string(),
    };

    sink.set("trigger_repo", &assembly.trigger_repo)
        .map_err(|e| output_error("trigger_repo", &e))?;

    if let Some(platform) = &assembly.codecov_platform {
        sink.set("py_codecov_platform", platform)
            .map_err(|e| output_error("py_codecov_platform", &e))?;
    }

    for fragment in fragments {
        let key = fragment.name.dep_tree_output();
        let yaml = fragment.packages_yaml()?;
        sink.set_multiline(key, &yaml)
            .map_err(|e| output_error(key, &e))?;
    }

    for (package, matrix) in assembly.matrices.iter().filter(|(_, m)| !m.is_empty()) {
        let json = serde_json::to_string(matrix).map_err(|e| output_error(package, &e))?;
        sink.set_multiline(package, &json)
            .map_err(|e| output_error(package, &e))?;
    }

    info!(
        matrices = assembly.matrices.len(),
        excluded = assembly.excluded.len(),
        "published setup outputs"
    );
    Ok(())
}
