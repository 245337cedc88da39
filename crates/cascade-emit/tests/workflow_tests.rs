//! Generated workflows are internally consistent.

use cascade_core::{DependencyTree, WorkflowContext, WorkflowSet};
use cascade_emit::{EmitSettings, render_workflow};
use cascade_graph::JobGraphBuilder;
use serde_yaml::Value;

const TREE: &str = r#"
ecbuild:
  input: false
eckit:
  deps: [ecbuild]
  env:
    ECKIT_OPT: "on"
fdb:
  deps: [eckit]
  optional_matrix: [mpi]
pyfdb:
  type: python
  deps: [fdb]
  conda_deps: [numpy]
atlas:
  private: true
  deps: [eckit]
  build-package-hpc:
    modules: [ninja]
"#;

const CONFIG: &str = r#"
build-package:
  type: build-package
  python_qa: true
  clang_format: true
  python_versions: ["3.10", "3.12"]
  python_jobs: [gnu]
  optional_matrix:
    mpi:
      - name: mpi
        labels: [self-hosted, mpi]
  matrix:
    name: [gnu, clang]
    include:
      - name: gnu
        labels: gnu
      - name: clang
        labels: clang
private-build-package:
  type: build-package
  private: true
  matrix:
    name: [gnu]
    include: [{name: gnu, labels: gnu}]
build-package-hpc:
  type: build-package-hpc
  matrix:
    name: [gnu-12]
    include: [{name: gnu-12, labels: hpc}]
private-build-package-hpc:
  type: build-package-hpc
  private: true
  matrix:
    name: [gnu-12]
    include: [{name: gnu-12, labels: hpc}]
"#;

fn render_all() -> Vec<(String, Value)> {
    let tree = DependencyTree::from_yaml_str(TREE).unwrap();
    let set = WorkflowSet::from_yaml_str(CONFIG).unwrap();
    set.iter()
        .map(|(name, config)| {
            let ctx = WorkflowContext::from_config(name, config);
            let graph = JobGraphBuilder::new(&tree).build(config, &ctx).unwrap();
            let yaml = render_workflow(&graph, &tree, config, &EmitSettings::default())
                .unwrap()
                .to_yaml()
                .unwrap();
            (name.to_string(), serde_yaml::from_str(&yaml).unwrap())
        })
        .collect()
}

#[test]
fn test_needs_reference_existing_jobs() {
    for (name, workflow) in render_all() {
        let jobs = workflow["jobs"].as_mapping().unwrap();
        for (job_name, job) in jobs {
            let Some(needs) = job.get("needs").and_then(Value::as_sequence) else {
                continue;
            };
            for need in needs {
                assert!(
                    jobs.contains_key(need),
                    "{}: job {:?} needs unknown {:?}",
                    name,
                    job_name,
                    need
                );
            }
        }
    }
}

#[test]
fn test_every_matrix_output_is_published() {
    for (name, workflow) in render_all() {
        let outputs = workflow["jobs"]["setup"]["outputs"].as_mapping().unwrap();
        for (job_name, job) in workflow["jobs"].as_mapping().unwrap() {
            let Some(matrix) = job.get("strategy").map(|s| &s["matrix"]) else {
                continue;
            };
            let job_name = job_name.as_str().unwrap();
            assert_eq!(
                matrix.as_str().unwrap(),
                format!("${{{{ fromJson(needs.setup.outputs.{}_matrix) }}}}", job_name)
            );
            assert!(
                outputs.contains_key(format!("{}_matrix", job_name).as_str()),
                "{}: no matrix output for {}",
                name,
                job_name
            );
        }
    }
}

#[test]
fn test_private_variants_only_build_private_packages() {
    for (name, workflow) in render_all() {
        let jobs = workflow["jobs"].as_mapping().unwrap();
        let private = workflow["on"].get("repository_dispatch").is_some();
        assert_eq!(private, name.starts_with("private-"));
        assert_eq!(jobs.contains_key("atlas"), private, "{}", name);
        assert_eq!(jobs.contains_key("eckit"), !private, "{}", name);
        assert!(!jobs.contains_key("ecbuild"));
    }
}
