//! GitHub Actions workflow document types.
//!
//! Only serialization is needed; field order follows the order GitHub's own
//! documentation uses so the generated files read naturally.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Map that serializes entries in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Workflow {
    pub name: String,
    pub on: Triggers,
    pub concurrency: Concurrency,
    pub jobs: OrderedMap<Job>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Triggers {
    pub workflow_call: WorkflowCall,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_dispatch: Option<RepositoryDispatch>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowCall {
    pub inputs: OrderedMap<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryDispatch {
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Concurrency {
    pub group: String,
    #[serde(rename = "cancel-in-progress")]
    pub cancel_in_progress: bool,
}

impl Default for Concurrency {
    fn default() -> Self {
        Self {
            group: "${{ github.workflow }}-${{ github.ref }}".to_string(),
            cancel_in_progress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunsOn {
    Label(String),
    Labels(Vec<String>),
}

impl Default for RunsOn {
    fn default() -> Self {
        RunsOn::Label("ubuntu-latest".to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Strategy {
    #[serde(rename = "fail-fast")]
    pub fail_fast: bool,
    pub matrix: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Job {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,
    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(skip_serializing_if = "OrderedMap::is_empty")]
    pub env: OrderedMap<Value>,
    #[serde(rename = "runs-on")]
    pub runs_on: RunsOn,
    #[serde(skip_serializing_if = "OrderedMap::is_empty")]
    pub outputs: OrderedMap<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Step {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[serde(skip_serializing_if = "OrderedMap::is_empty")]
    pub env: OrderedMap<Value>,
    #[serde(skip_serializing_if = "OrderedMap::is_empty")]
    pub with: OrderedMap<Value>,
}

impl Step {
    pub fn run(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            run: Some(script.into()),
            ..Default::default()
        }
    }

    pub fn uses(action: impl Into<String>) -> Self {
        Self {
            uses: Some(action.into()),
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with.insert(key, value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ordered_map_keeps_insertion_order() {
        let mut map = OrderedMap::new();
        map.insert("zeta", 1);
        map.insert("alpha", 2);
        map.insert("zeta", 3);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert_eq!(serde_yaml::to_string(&map).unwrap(), "zeta: 3\nalpha: 2\n");
    }

    #[test]
    fn test_job_renames() {
        let job = Job {
            name: "core".into(),
            needs: vec!["setup".into()],
            condition: Some("${{ true }}".into()),
            runs_on: RunsOn::Labels(vec!["self-hosted".into(), "hpc".into()]),
            steps: vec![Step::uses("actions/checkout@v4")],
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&job).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["if"].as_str(), Some("${{ true }}"));
        assert_eq!(value["runs-on"][1].as_str(), Some("hpc"));
        assert!(value.get("env").is_none());
        assert!(yaml.find("needs:").unwrap() < yaml.find("runs-on:").unwrap());
    }
}
