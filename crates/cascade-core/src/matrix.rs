//! Build matrix types.
//!
//! A build matrix follows the GitHub Actions `strategy.matrix` layout: a
//! `name` axis listing row names and an `include` list carrying each row's
//! runner labels and extra fields.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// One named variant of a package build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MatrixRow {
    pub name: String,
    /// Runner labels, a string or a list of strings.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub labels: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_repo_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MatrixRow {
    pub fn new(name: impl Into<String>, labels: Value) -> Self {
        Self {
            name: name.into(),
            labels,
            owner_repo_ref: None,
            config_path: None,
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BuildMatrix {
    #[serde(default)]
    pub name: Vec<String>,
    #[serde(default)]
    pub include: Vec<MatrixRow>,
    /// Package-specific build configuration taken from the package's own CI config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<Vec<Value>>,
    /// Any other axes, passed through untouched.
    #[serde(flatten)]
    pub axes: BTreeMap<String, Value>,
}

impl BuildMatrix {
    /// Keep only rows whose name satisfies `keep`, on both the `name` axis and `include`.
    pub fn retain_rows(&mut self, keep: impl Fn(&str) -> bool) {
        self.name.retain(|name| keep(name));
        self.include.retain(|row| keep(&row.name));
    }

    /// Remove every row named in `skip`.
    pub fn skip_rows(&mut self, skip: &HashSet<&str>) {
        self.retain_rows(|name| !skip.contains(name));
    }

    /// Append rows from an optional matrix entry, registering the entry name.
    ///
    /// Names and identical rows already present are not added again. A row
    /// sharing only its name with an existing row is still added.
    pub fn add_optional(&mut self, entry: &str, rows: &[MatrixRow], skip: &HashSet<&str>) {
        if skip.contains(entry) {
            return;
        }
        if !self.name.iter().any(|n| n == entry) {
            self.name.push(entry.to_string());
        }
        for row in rows {
            if skip.contains(row.name.as_str()) {
                continue;
            }
            if !self.include.contains(row) {
                self.include.push(row.clone());
            }
        }
    }

    /// Names of the `include` rows, in order.
    pub fn row_names(&self) -> impl Iterator<Item = &str> {
        self.include.iter().map(|row| row.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }
}

/// Named sets of extra rows that packages can opt into.
pub type OptionalMatrixCatalog = BTreeMap<String, Vec<MatrixRow>>;

/// A package's own CI configuration file, as fetched from its repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub matrix: Option<Value>,
    #[serde(flatten)]
    pub rest: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn base() -> BuildMatrix {
        serde_yaml::from_str(
            r#"
name: [gnu, clang, intel]
include:
  - name: gnu
    labels: [self-hosted, platform-builder-gnu]
  - name: clang
    labels: [self-hosted, platform-builder-clang]
    os: rocky-8
  - name: intel
    labels: intel-runner
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_extra_row_fields_are_kept() {
        let matrix = base();
        assert_eq!(matrix.include[1].extra["os"], json!("rocky-8"));
        assert_eq!(matrix.include[2].labels, json!("intel-runner"));
    }

    #[test]
    fn test_skip_rows_touches_both_axes() {
        let mut matrix = base();
        matrix.skip_rows(&HashSet::from(["clang"]));
        assert_eq!(matrix.name, vec!["gnu", "intel"]);
        assert_eq!(matrix.row_names().collect::<Vec<_>>(), vec!["gnu", "intel"]);
    }

    #[test]
    fn test_add_optional_is_idempotent() {
        let mut matrix = base();
        let rows = vec![MatrixRow::new("extra-check", json!(["self-hosted"]))];
        matrix.add_optional("extra-check", &rows, &HashSet::new());
        matrix.add_optional("extra-check", &rows, &HashSet::new());
        assert_eq!(matrix.name, vec!["gnu", "clang", "intel", "extra-check"]);
        assert_eq!(matrix.include.len(), 4);
    }

    #[test]
    fn test_add_optional_respects_skip() {
        let mut matrix = base();
        let rows = vec![MatrixRow::new("extra-check", json!("x"))];
        matrix.add_optional("extra-check", &rows, &HashSet::from(["extra-check"]));
        assert_eq!(matrix.include.len(), 3);
        assert!(!matrix.name.contains(&"extra-check".to_string()));
    }

    #[test]
    fn test_add_optional_keeps_row_with_same_name_and_other_labels() {
        let mut matrix = base();
        let rows = vec![MatrixRow::new("gnu", json!(["self-hosted", "big"]))];
        matrix.add_optional("gnu-big", &rows, &HashSet::new());
        matrix.add_optional("gnu-big", &rows, &HashSet::new());

        let gnu: Vec<&MatrixRow> = matrix.include.iter().filter(|r| r.name == "gnu").collect();
        assert_eq!(gnu.len(), 2);
        assert_eq!(gnu[1].labels, json!(["self-hosted", "big"]));
        assert_eq!(matrix.include.len(), 4);
    }

    #[test]
    fn test_serialization_omits_unset_fields() {
        let matrix = BuildMatrix {
            name: vec!["gnu".into()],
            include: vec![MatrixRow::new("gnu", json!("l"))],
            ..Default::default()
        };
        let value = serde_json::to_value(&matrix).unwrap();
        assert_eq!(
            value,
            json!({"name": ["gnu"], "include": [{"name": "gnu", "labels": "l"}]})
        );
    }
}
