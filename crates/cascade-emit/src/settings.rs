//! Emitter settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitSettings {
    /// Owner used for packages that do not name one.
    pub default_owner: String,
    /// Command the setup job runs to assemble matrices.
    pub setup_command: String,
    /// Repository checked out by the setup job; holds the fragments file.
    pub ci_repository: String,
    pub ci_repository_ref: String,
    pub fragments_file: String,
}

impl Default for EmitSettings {
    fn default() -> Self {
        Self {
            default_owner: "ecmwf".to_string(),
            setup_command: "cascade setup".to_string(),
            ci_repository: "ecmwf-actions/downstream-ci".to_string(),
            ci_repository_ref: "main".to_string(),
            fragments_file: "dependency-fragments.yml".to_string(),
        }
    }
}
