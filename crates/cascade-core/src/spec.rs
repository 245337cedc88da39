//! Dependency tree types.
//!
//! These types represent the user-authored dependency tree YAML. Each package
//! carries a general set of variables plus optional sub-mappings keyed by
//! workflow name; a variable set in a workflow sub-mapping wins over the
//! general one.

use crate::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_yaml::{Mapping, Value as YamlValue};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

pub const DEFAULT_MASTER_BRANCH: &str = "master";
pub const DEFAULT_DEVELOP_BRANCH: &str = "develop";

/// Build flavour of a package.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum PackageKind {
    /// Compiled package built with CMake.
    #[default]
    #[serde(rename = "cmake", alias = "native")]
    Native,
    /// Python package.
    #[serde(rename = "python", alias = "interpreted")]
    Interpreted,
}

impl PackageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageKind::Native => "cmake",
            PackageKind::Interpreted => "python",
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variables a package may declare, either generally or scoped to a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PackageVars {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<PackageKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deps: Option<Vec<String>>,
    /// Whether the package is exposed as a workflow input.
    #[serde(rename = "input", alias = "visible", skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    /// Path of the package's own CI config. An empty string disables the fetch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub develop_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_matrix_jobs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional_matrix: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_cmd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conda_deps: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mkdir: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toml_opt_dep_sections: Option<String>,
    #[serde(rename = "build-package-python", skip_serializing_if = "Option::is_none")]
    pub build_package_python: Option<String>,
    /// Environment modules loaded before building on HPC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<String>>,
}

impl PackageVars {
    /// Keys recognised as package variables. Any other mapping-valued key in
    /// a package body is a workflow-scoped override.
    pub const KEYS: &'static [&'static str] = &[
        "type",
        "deps",
        "input",
        "visible",
        "private",
        "config_path",
        "master_branch",
        "develop_branch",
        "owner",
        "repo",
        "subdir",
        "skip_matrix_jobs",
        "optional_matrix",
        "env",
        "test_cmd",
        "conda_deps",
        "mkdir",
        "requirements_path",
        "toml_opt_dep_sections",
        "build-package-python",
        "modules",
    ];
}

/// A single package in the dependency tree.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Option<Mapping>")]
pub struct PackageSpec {
    pub general: PackageVars,
    /// Workflow name -> overrides.
    pub scoped: BTreeMap<String, PackageVars>,
}

impl TryFrom<Option<Mapping>> for PackageSpec {
    type Error = serde_yaml::Error;

    fn try_from(body: Option<Mapping>) -> std::result::Result<Self, Self::Error> {
        let mut general = body.unwrap_or_default();
        let workflow_keys: Vec<String> = general
            .iter()
            .filter(|(_, value)| value.is_mapping())
            .filter_map(|(key, _)| key.as_str())
            .filter(|key| !PackageVars::KEYS.contains(key))
            .map(str::to_string)
            .collect();

        let mut scoped = BTreeMap::new();
        for key in workflow_keys {
            if let Some(overrides) = general.remove(key.as_str()) {
                scoped.insert(key, serde_yaml::from_value(overrides)?);
            }
        }

        Ok(Self {
            general: serde_yaml::from_value(YamlValue::Mapping(general))?,
            scoped,
        })
    }
}

impl PackageSpec {
    /// Look up a variable, preferring the value scoped to `workflow`.
    ///
    /// Returns `None` when neither the scoped nor the general mapping sets it;
    /// callers apply their own default.
    pub fn resolve<'a, T: ?Sized>(
        &'a self,
        workflow: &str,
        field: impl Fn(&'a PackageVars) -> Option<&'a T>,
    ) -> Option<&'a T> {
        self.scoped
            .get(workflow)
            .and_then(&field)
            .or_else(|| field(&self.general))
    }

    /// Package kind. Only read from the general mapping.
    pub fn kind(&self) -> PackageKind {
        self.general.kind.unwrap_or_default()
    }

    /// Direct dependencies. A scoped list replaces the general one.
    pub fn dependencies(&self, workflow: &str) -> &[String] {
        self.resolve(workflow, |v| v.deps.as_deref()).unwrap_or(&[])
    }

    pub fn is_visible(&self, workflow: &str) -> bool {
        self.resolve(workflow, |v| v.visible.as_ref())
            .copied()
            .unwrap_or(true)
    }

    pub fn is_private(&self, workflow: &str) -> bool {
        self.resolve(workflow, |v| v.private.as_ref())
            .copied()
            .unwrap_or(false)
    }

    pub fn config_path(&self, workflow: &str) -> Option<&str> {
        self.resolve(workflow, |v| v.config_path.as_deref())
    }

    pub fn master_branch(&self, workflow: &str) -> &str {
        self.resolve(workflow, |v| v.master_branch.as_deref())
            .unwrap_or(DEFAULT_MASTER_BRANCH)
    }

    pub fn develop_branch(&self, workflow: &str) -> &str {
        self.resolve(workflow, |v| v.develop_branch.as_deref())
            .unwrap_or(DEFAULT_DEVELOP_BRANCH)
    }

    pub fn owner(&self, workflow: &str) -> Option<&str> {
        self.resolve(workflow, |v| v.owner.as_deref())
    }

    pub fn repo(&self, workflow: &str) -> Option<&str> {
        self.resolve(workflow, |v| v.repo.as_deref())
    }

    pub fn subdir(&self, workflow: &str) -> Option<&str> {
        self.resolve(workflow, |v| v.subdir.as_deref())
    }

    pub fn skip_matrix_jobs(&self, workflow: &str) -> &[String] {
        self.resolve(workflow, |v| v.skip_matrix_jobs.as_deref())
            .unwrap_or(&[])
    }

    pub fn optional_matrix(&self, workflow: &str) -> &[String] {
        self.resolve(workflow, |v| v.optional_matrix.as_deref())
            .unwrap_or(&[])
    }

    pub fn environment(&self, workflow: &str) -> Option<&BTreeMap<String, Value>> {
        self.resolve(workflow, |v| v.env.as_ref())
    }

    pub fn test_cmd(&self, workflow: &str) -> Option<&str> {
        self.resolve(workflow, |v| v.test_cmd.as_deref())
    }

    pub fn conda_deps(&self, workflow: &str) -> Option<&Value> {
        self.resolve(workflow, |v| v.conda_deps.as_ref())
    }

    pub fn mkdir(&self, workflow: &str) -> &[String] {
        self.resolve(workflow, |v| v.mkdir.as_deref()).unwrap_or(&[])
    }

    pub fn requirements_path(&self, workflow: &str) -> Option<&str> {
        self.resolve(workflow, |v| v.requirements_path.as_deref())
    }

    pub fn toml_opt_dep_sections(&self, workflow: &str) -> Option<&str> {
        self.resolve(workflow, |v| v.toml_opt_dep_sections.as_deref())
    }

    pub fn build_package_python(&self, workflow: &str) -> Option<&str> {
        self.resolve(workflow, |v| v.build_package_python.as_deref())
    }

    pub fn modules(&self, workflow: &str) -> Option<&[String]> {
        self.resolve(workflow, |v| v.modules.as_deref())
    }
}

/// The full dependency tree, in declaration order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "Mapping")]
pub struct DependencyTree {
    packages: Vec<(String, PackageSpec)>,
    index: HashMap<String, usize>,
}

impl TryFrom<Mapping> for DependencyTree {
    type Error = Error;

    fn try_from(mapping: Mapping) -> Result<Self> {
        let mut tree = Self::default();
        for (key, body) in mapping {
            let name = key
                .as_str()
                .ok_or_else(|| {
                    Error::InvalidDependencyTree(format!(
                        "package names must be strings, got {:?}",
                        key
                    ))
                })?
                .to_string();

            let body = match body {
                YamlValue::Null => None,
                YamlValue::Mapping(mapping) => Some(mapping),
                other => {
                    return Err(Error::InvalidPackage {
                        package: name,
                        message: format!("expected a mapping, got {:?}", other),
                    });
                }
            };

            let spec = PackageSpec::try_from(body).map_err(|e| Error::InvalidPackage {
                package: name.clone(),
                message: e.to_string(),
            })?;
            tree.insert(name, spec);
        }
        Ok(tree)
    }
}

impl DependencyTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a dependency tree from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let mapping: Option<Mapping> = serde_yaml::from_str(content)?;
        Self::try_from(mapping.unwrap_or_default())
    }

    /// Load a dependency tree from a YAML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Insert or replace a package, keeping its original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, spec: PackageSpec) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&idx) => self.packages[idx].1 = spec,
            None => {
                self.index.insert(name.clone(), self.packages.len());
                self.packages.push((name, spec));
            }
        }
    }

    pub fn package(&self, name: &str) -> Option<&PackageSpec> {
        self.index.get(name).map(|&idx| &self.packages[idx].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Packages in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackageSpec)> {
        self.packages.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl std::ops::Index<&str> for DependencyTree {
    type Output = PackageSpec;

    /// Panics when `name` is not in the tree; callers validate membership first.
    fn index(&self, name: &str) -> &PackageSpec {
        self.package(name)
            .unwrap_or_else(|| panic!("package '{}' is not in the dependency tree", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TREE: &str = r#"
eckit:
  deps: []
  master_branch: main
metkit:
  deps: [eckit]
  build-package-hpc:
    deps: [eckit, eccodes]
    private: true
pyfdb:
  type: python
  deps: [fdb]
  input: false
  build-package:
    input: true
empty:
"#;

    #[test]
    fn test_declaration_order_is_kept() {
        let tree = DependencyTree::from_yaml_str(TREE).unwrap();
        let names: Vec<&str> = tree.names().collect();
        assert_eq!(names, vec!["eckit", "metkit", "pyfdb", "empty"]);
    }

    #[test]
    fn test_scoped_value_wins_over_general() {
        let tree = DependencyTree::from_yaml_str(TREE).unwrap();
        let metkit = &tree["metkit"];
        assert_eq!(metkit.dependencies("build-package"), ["eckit"]);
        assert_eq!(metkit.dependencies("build-package-hpc"), ["eckit", "eccodes"]);
        assert!(metkit.is_private("build-package-hpc"));
        assert!(!metkit.is_private("build-package"));
    }

    #[test]
    fn test_scoped_bool_false_is_not_skipped() {
        let tree = DependencyTree::from_yaml_str(TREE).unwrap();
        let pyfdb = &tree["pyfdb"];
        assert!(!pyfdb.is_visible("build-package-hpc"));
        assert!(pyfdb.is_visible("build-package"));
        assert_eq!(pyfdb.kind(), PackageKind::Interpreted);
    }

    #[test]
    fn test_defaults_apply() {
        let tree = DependencyTree::from_yaml_str(TREE).unwrap();
        let empty = &tree["empty"];
        assert_eq!(empty.kind(), PackageKind::Native);
        assert!(empty.is_visible("any"));
        assert!(!empty.is_private("any"));
        assert_eq!(empty.master_branch("any"), "master");
        assert_eq!(empty.develop_branch("any"), "develop");
        assert!(empty.dependencies("any").is_empty());
        assert_eq!(tree["eckit"].master_branch("any"), "main");
    }

    #[test]
    fn test_kind_aliases() {
        let tree = DependencyTree::from_yaml_str("a: {type: interpreted}\nb: {type: native}\n")
            .unwrap();
        assert_eq!(tree["a"].kind(), PackageKind::Interpreted);
        assert_eq!(tree["b"].kind(), PackageKind::Native);
    }

    #[test]
    fn test_env_is_not_mistaken_for_workflow() {
        let tree =
            DependencyTree::from_yaml_str("a:\n  env:\n    FOO: bar\n    N: 3\n").unwrap();
        let a = &tree["a"];
        assert!(a.scoped.is_empty());
        let env = a.environment("x").unwrap();
        assert_eq!(env["FOO"], Value::String("bar".into()));
        assert_eq!(env["N"], serde_json::json!(3));
    }

    #[test]
    fn test_keys_cover_every_serialized_field() {
        let vars = PackageVars {
            kind: Some(PackageKind::Native),
            deps: Some(vec![]),
            visible: Some(true),
            private: Some(true),
            config_path: Some(String::new()),
            master_branch: Some(String::new()),
            develop_branch: Some(String::new()),
            owner: Some(String::new()),
            repo: Some(String::new()),
            subdir: Some(String::new()),
            skip_matrix_jobs: Some(vec![]),
            optional_matrix: Some(vec![]),
            env: Some(BTreeMap::new()),
            test_cmd: Some(String::new()),
            conda_deps: Some(Value::Null),
            mkdir: Some(vec![]),
            requirements_path: Some(String::new()),
            toml_opt_dep_sections: Some(String::new()),
            build_package_python: Some(String::new()),
            modules: Some(vec![]),
        };
        let json = serde_json::to_value(&vars).unwrap();
        for key in json.as_object().unwrap().keys() {
            assert!(PackageVars::KEYS.contains(&key.as_str()), "missing key {}", key);
        }
    }

    #[test]
    fn test_non_mapping_package_is_rejected() {
        let err = DependencyTree::from_yaml_str("a: [1, 2]\n").unwrap_err();
        assert!(matches!(err, Error::InvalidPackage { ref package, .. } if package == "a"));
    }
}
