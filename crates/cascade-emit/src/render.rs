//! Rendering a job graph into a workflow document.

use crate::EmitError;
use crate::jobs::{gate_inputs, gate_job, package_job};
use crate::model::{Concurrency, OrderedMap, RepositoryDispatch, Triggers, Workflow, WorkflowCall};
use crate::settings::EmitSettings;
use crate::setup::{SKIP_MATRIX_JOBS_INPUT, setup_job};
use cascade_core::{DependencyTree, WorkflowConfig};
use cascade_graph::{JobGraph, JobRole};
use serde_json::{Value, json};
use tracing::debug;

/// Header written at the top of every generated file.
pub const BANNER: &str =
    "#\n#\n#\n# This is a file generated by cascade - DO NOT EDIT!!\n#\n#\n#\n";

/// Build the workflow document for `graph`.
pub fn render_workflow(
    graph: &JobGraph,
    tree: &DependencyTree,
    config: &WorkflowConfig,
    settings: &EmitSettings,
) -> Result<Workflow, EmitError> {
    let ctx = graph.context();

    let mut inputs: OrderedMap<Value> = config
        .inputs
        .iter()
        .map(|(name, spec)| (name.as_str(), spec.clone()))
        .collect();
    for package in graph.inputs() {
        inputs.insert(package.as_str(), json!({"required": false, "type": "string"}));
    }
    inputs.insert(
        SKIP_MATRIX_JOBS_INPUT,
        json!({
            "description": "List of matrix jobs to be skipped.",
            "required": false,
            "type": "string",
        }),
    );
    for gate in graph.gates() {
        for (name, spec) in gate_inputs(*gate) {
            inputs.insert(name, spec);
        }
    }

    let mut jobs = OrderedMap::new();
    for node in graph.jobs() {
        let job = match &node.role {
            JobRole::Setup => setup_job(graph, tree, config, settings)?,
            JobRole::Gate(gate) => gate_job(node, *gate),
            JobRole::Package(kind) => package_job(node, *kind, graph, tree),
        };
        jobs.insert(node.name.as_str(), job);
    }
    debug!(workflow = %ctx.name, jobs = jobs.len(), "rendered workflow");

    Ok(Workflow {
        name: ctx.name.clone(),
        on: Triggers {
            workflow_call: WorkflowCall { inputs },
            repository_dispatch: ctx.private.then(|| RepositoryDispatch {
                types: vec![ctx.workflow_type.dispatch_type().to_string()],
            }),
        },
        concurrency: Concurrency::default(),
        jobs,
    })
}

impl Workflow {
    /// Serialize with the generated-file banner.
    pub fn to_yaml(&self) -> Result<String, EmitError> {
        Ok(format!("{}{}", BANNER, serde_yaml::to_string(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::{WorkflowContext, WorkflowSet};
    use cascade_graph::JobGraphBuilder;
    use pretty_assertions::assert_eq;

    const TREE: &str = "core: {}\ntool:\n  type: python\n  deps: [core]\n";
    const CONFIG: &str = r#"
build-package:
  type: build-package
  clang_format: true
  inputs:
    codecov_upload:
      type: boolean
      required: false
  python_versions: ["3.11"]
  matrix:
    name: [gnu]
    include: [{name: gnu, labels: gnu}]
private-build-package:
  type: build-package
  private: true
  matrix:
    name: [gnu]
    include: [{name: gnu, labels: gnu}]
"#;

    fn render(name: &str) -> Workflow {
        let tree = DependencyTree::from_yaml_str(TREE).unwrap();
        let set = WorkflowSet::from_yaml_str(CONFIG).unwrap();
        let config = set.get(name).unwrap();
        let ctx = WorkflowContext::from_config(name, config);
        let graph = JobGraphBuilder::new(&tree).build(config, &ctx).unwrap();
        render_workflow(&graph, &tree, config, &EmitSettings::default()).unwrap()
    }

    #[test]
    fn test_inputs_order() {
        let workflow = render("build-package");
        let inputs: Vec<&str> = workflow.on.workflow_call.inputs.keys().collect();
        assert_eq!(
            inputs,
            vec!["codecov_upload", "core", "tool", "skip_matrix_jobs", "clang_format", "clang_format_ignore"]
        );
        assert!(workflow.on.repository_dispatch.is_none());
    }

    #[test]
    fn test_jobs_order() {
        let workflow = render("build-package");
        let jobs: Vec<&str> = workflow.jobs.keys().collect();
        assert_eq!(jobs, vec!["setup", "clang-format", "core", "tool"]);
    }

    #[test]
    fn test_private_workflow_has_dispatch() {
        let workflow = render("private-build-package");
        assert_eq!(
            workflow.on.repository_dispatch.as_ref().unwrap().types,
            vec!["downstream-ci"]
        );
        let yaml = workflow.to_yaml().unwrap();
        assert!(yaml.contains("github.event.client_payload.inputs.core"));
    }

    #[test]
    fn test_yaml_output() {
        let yaml = render("build-package").to_yaml().unwrap();
        assert!(yaml.starts_with(BANNER));
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["name"].as_str(), Some("build-package"));
        assert_eq!(value["concurrency"]["cancel-in-progress"].as_bool(), Some(true));
        assert_eq!(
            value["jobs"]["setup"]["outputs"]["tool_matrix"].as_str(),
            Some("${{ steps.setup.outputs.tool }}")
        );
        assert_eq!(
            value["jobs"]["setup"]["outputs"]["dep_tree"].as_str(),
            Some("${{ steps.setup.outputs.build_package_dep_tree }}")
        );
        assert_eq!(
            value["jobs"]["tool"]["needs"],
            serde_yaml::to_value(vec!["core", "setup"]).unwrap()
        );
        assert_eq!(value["jobs"]["core"]["runs-on"].as_str(), Some("${{ matrix.labels }}"));
        let setup_env = &value["jobs"]["setup"]["steps"][2]["env"];
        assert!(setup_env["CONFIG"].as_str().unwrap().contains("name: tool"));
        assert_eq!(setup_env["SKIP_MATRIX_JOBS"].as_str(), Some("${{ inputs.skip_matrix_jobs }}"));
    }
}
