//! Which packages take part in a workflow variant.

use cascade_core::{DependencyTree, WorkflowContext};

/// A package is active when it is visible in the workflow and its privacy
/// does not exclude it. Public packages are active in both variants; private
/// ones only in private workflows. Unknown packages are never active.
pub fn is_active(tree: &DependencyTree, package: &str, ctx: &WorkflowContext) -> bool {
    tree.package(package).is_some_and(|spec| {
        let private = spec.is_private(&ctx.name);
        spec.is_visible(&ctx.name) && (!private || private == ctx.private)
    })
}

/// A package gets its own build job only when it is active and its privacy
/// matches the workflow's.
pub fn has_job(tree: &DependencyTree, package: &str, ctx: &WorkflowContext) -> bool {
    is_active(tree, package, ctx)
        && tree
            .package(package)
            .is_some_and(|spec| spec.is_private(&ctx.name) == ctx.private)
}

/// Active packages in declaration order.
pub fn active_packages<'a>(tree: &'a DependencyTree, ctx: &WorkflowContext) -> Vec<&'a str> {
    tree.names().filter(|name| is_active(tree, name, ctx)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::WorkflowType;
    use pretty_assertions::assert_eq;

    const TREE: &str = r#"
public: {}
hidden:
  input: false
secret:
  private: true
hidden_secret:
  input: false
  private: true
scoped:
  build-package:
    input: false
"#;

    fn ctx(private: bool) -> WorkflowContext {
        WorkflowContext::new("build-package", WorkflowType::BuildPackage).with_private(private)
    }

    #[test]
    fn test_public_workflow() {
        let tree = DependencyTree::from_yaml_str(TREE).unwrap();
        assert_eq!(active_packages(&tree, &ctx(false)), vec!["public"]);
        assert!(has_job(&tree, "public", &ctx(false)));
        assert!(!is_active(&tree, "secret", &ctx(false)));
    }

    #[test]
    fn test_private_workflow() {
        let tree = DependencyTree::from_yaml_str(TREE).unwrap();
        assert_eq!(active_packages(&tree, &ctx(true)), vec!["public", "secret"]);
        assert!(has_job(&tree, "secret", &ctx(true)));
        assert!(!has_job(&tree, "public", &ctx(true)));
    }

    #[test]
    fn test_unknown_package_is_inactive() {
        let tree = DependencyTree::from_yaml_str(TREE).unwrap();
        assert!(!is_active(&tree, "ghost", &ctx(false)));
        assert!(!has_job(&tree, "ghost", &ctx(true)));
    }

    #[test]
    fn test_scoped_visibility() {
        let tree = DependencyTree::from_yaml_str(TREE).unwrap();
        assert!(!is_active(&tree, "scoped", &ctx(false)));
        let other = WorkflowContext::new("other", WorkflowType::BuildPackage);
        assert!(is_active(&tree, "scoped", &other));
    }

    #[test]
    fn test_invisible_package_is_inactive_even_when_private_matches() {
        let tree = DependencyTree::from_yaml_str(TREE).unwrap();
        assert!(!is_active(&tree, "hidden_secret", &ctx(true)));
        assert!(!has_job(&tree, "hidden_secret", &ctx(true)));
        assert!(!is_active(&tree, "hidden", &ctx(false)));
        assert!(!active_packages(&tree, &ctx(true)).contains(&"hidden_secret"));
    }
}
