//! Transitive dependency closure.
//!
//! Dependencies are collected depth-first into a shared ordered set. A name
//! that is seen again is moved to the end, so a package ends up after every
//! package that (transitively) references it. The resulting order is not a
//! strict topological order; it is kept as-is because generated `needs`
//! lists depend on it.

use crate::GraphError;
use cascade_core::{DependencyTree, PackageKind};
use std::collections::HashSet;

/// Insertion-ordered set where re-inserting moves an item to the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedSet {
    items: Vec<String>,
    members: HashSet<String>,
}

impl OrderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `name`, removing any earlier occurrence first.
    pub fn bump(&mut self, name: &str) {
        if self.members.contains(name) {
            self.items.retain(|item| item != name);
        } else {
            self.members.insert(name.to_string());
        }
        self.items.push(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.items
    }
}

/// Compute the dependency closure of `package` in `workflow`.
///
/// Names missing from the tree are listed but not expanded. A dependency
/// cycle between known packages is an error.
pub fn closure(
    tree: &DependencyTree,
    package: &str,
    workflow: &str,
) -> Result<Vec<String>, GraphError> {
    let mut acc = OrderedSet::new();
    let mut path = vec![package.to_string()];
    collect(tree, package, workflow, &mut acc, &mut path)?;
    Ok(acc.into_vec())
}

fn collect(
    tree: &DependencyTree,
    package: &str,
    workflow: &str,
    acc: &mut OrderedSet,
    path: &mut Vec<String>,
) -> Result<(), GraphError> {
    let Some(spec) = tree.package(package) else {
        return Ok(());
    };

    for dep in spec.dependencies(workflow) {
        acc.bump(dep);
        if !tree.contains(dep) {
            continue;
        }
        if path.iter().any(|p| p == dep) {
            let mut cycle = path.clone();
            cycle.push(dep.clone());
            return Err(GraphError::DependencyCycle(cycle));
        }
        path.push(dep.clone());
        collect(tree, dep, workflow, acc, path)?;
        path.pop();
    }
    Ok(())
}

/// The part of the closure whose packages are of `kind`. Unknown names are dropped.
pub fn by_kind(
    tree: &DependencyTree,
    package: &str,
    workflow: &str,
    kind: PackageKind,
) -> Result<Vec<String>, GraphError> {
    Ok(closure(tree, package, workflow)?
        .into_iter()
        .filter(|dep| tree.package(dep).is_some_and(|spec| spec.kind() == kind))
        .collect())
}
