//! Per-variant dependency fragments.
//!
//! A fragment is the dependency tree reduced to what build jobs need at run
//! time: each package's resolved direct dependencies and, where set, its
//! environment modules. One fragment is produced per workflow type, resolved
//! against the context named after that type.

use cascade_core::{DependencyTree, Error, Result, WorkflowType};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_yaml::{Mapping, Value};

/// Key holding the workflow type in a rendered fragment. No package may use it.
pub const FRAGMENT_NAME_KEY: &str = "name";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentEntry {
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<String>>,
}

/// Fragment entries in dependency tree order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentPackages(Vec<(String, FragmentEntry)>);

impl FragmentPackages {
    pub fn get(&self, name: &str) -> Option<&FragmentEntry> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, entry)| entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FragmentEntry)> {
        self.0.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::ops::Index<&str> for FragmentPackages {
    type Output = FragmentEntry;

    fn index(&self, name: &str) -> &FragmentEntry {
        self.get(name)
            .unwrap_or_else(|| panic!("package '{}' is not in the fragment", name))
    }
}

impl Serialize for FragmentPackages {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, entry) in &self.0 {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

/// One workflow type's view of the tree. Rendered as a single mapping: the
/// `name` key followed by one key per package.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Mapping")]
pub struct DependencyFragment {
    pub name: WorkflowType,
    pub packages: FragmentPackages,
}

impl DependencyFragment {
    /// Derive the fragment for `workflow_type` from the full tree.
    ///
    /// Fails when a package is named like the fragment's own `name` key.
    pub fn derive(tree: &DependencyTree, workflow_type: WorkflowType) -> Result<Self> {
        let context = workflow_type.as_str();
        let mut packages = Vec::with_capacity(tree.len());
        for (name, spec) in tree.iter() {
            if name == FRAGMENT_NAME_KEY {
                return Err(reserved_name());
            }
            let entry = FragmentEntry {
                deps: spec.dependencies(context).to_vec(),
                modules: spec.modules(context).map(<[String]>::to_vec),
            };
            packages.push((name.to_string(), entry));
        }
        Ok(Self {
            name: workflow_type,
            packages: FragmentPackages(packages),
        })
    }

    /// The package map alone, as published to build jobs.
    pub fn packages_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.packages)?)
    }
}

fn reserved_name() -> Error {
    Error::InvalidPackage {
        package: FRAGMENT_NAME_KEY.to_string(),
        message: "name is reserved in dependency fragments".to_string(),
    }
}

impl Serialize for DependencyFragment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.packages.len() + 1))?;
        map.serialize_entry(FRAGMENT_NAME_KEY, &self.name)?;
        for (name, entry) in self.packages.iter() {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

impl TryFrom<Mapping> for DependencyFragment {
    type Error = Error;

    fn try_from(mapping: Mapping) -> Result<Self> {
        let mut name = None;
        let mut packages = Vec::with_capacity(mapping.len());
        for (key, body) in mapping {
            let key = match key {
                Value::String(key) => key,
                other => {
                    return Err(Error::Serialization(format!(
                        "fragment keys must be strings, got {:?}",
                        other
                    )));
                }
            };
            if key == FRAGMENT_NAME_KEY {
                name = Some(serde_yaml::from_value(body)?);
                continue;
            }
            let entry: Option<FragmentEntry> = serde_yaml::from_value(body)?;
            packages.push((key, entry.unwrap_or_default()));
        }
        let name = name.ok_or_else(|| Error::Serialization("fragment has no name".to_string()))?;
        Ok(Self {
            name,
            packages: FragmentPackages(packages),
        })
    }
}

/// Fragments for every workflow type.
pub fn derive_all(tree: &DependencyTree) -> Result<Vec<DependencyFragment>> {
    WorkflowType::ALL
        .into_iter()
        .map(|wt| DependencyFragment::derive(tree, wt))
        .collect()
}

/// Write fragments as a multi-document YAML stream.
pub fn render_fragments(fragments: &[DependencyFragment]) -> Result<String> {
    let mut out = String::new();
    for fragment in fragments {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(fragment)?);
    }
    Ok(out)
}

/// Read a multi-document YAML stream of fragments.
pub fn parse_fragments(content: &str) -> Result<Vec<DependencyFragment>> {
    let mut fragments = vec![];
    for document in serde_yaml::Deserializer::from_str(content) {
        fragments.push(DependencyFragment::deserialize(document)?);
    }
    Ok(fragments)
}
