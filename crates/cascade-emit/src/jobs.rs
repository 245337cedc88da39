//! Gate and package jobs.

use crate::model::{Job, OrderedMap, RunsOn, Step, Strategy};
use cascade_core::{DependencyTree, PackageKind, WorkflowType};
use cascade_graph::{Gate, JobGraph, JobNode, SETUP_JOB, SetupOutput};
use serde_json::Value;

const BUILD_PACKAGE_ACTION: &str = "ecmwf-actions/reusable-workflows/build-package-with-config@v2";
const CI_PYTHON_ACTION: &str = "ecmwf-actions/reusable-workflows/ci-python@v2";
const CI_HPC_ACTION: &str = "ecmwf-actions/reusable-workflows/ci-hpc@v2";

const CODECOV_TOKEN: &str = "${{ secrets.CODECOV_UPLOAD_TOKEN }}";
const REPO_READ_TOKEN: &str = "${{ secrets.GH_REPO_READ_TOKEN }}";
const NATIVE_CODECOV_UPLOAD: &str =
    "${{ needs.setup.outputs.trigger_repo == github.job && inputs.codecov_upload }}";
const PYTHON_CODECOV_UPLOAD: &str = "${{ needs.setup.outputs.trigger_repo == github.job && inputs.codecov_upload && needs.setup.outputs.py_codecov_platform == matrix.name }}";

const CLANG_FORMAT_SCRIPT: &str = r#"ignore="./\($(echo "${{ inputs.clang_format_ignore }}" | sed ':a;N;$!ba;s/\n/\\|/g')\)"
echo "Ignore: $ignore"
files=$(find . -not \( -regex $ignore -prune \) -regex ".*\.\(cpp\|hpp\|cc\|cxx\|h\|c\)")
errors=0

if [ ! -e ".clang-format" ]
then
    echo "::error::Missing .clang-format file"
    exit 1
fi

for file in $files; do
    clang-format-16 --dry-run --Werror --style=file --fallback-style=none $file
    if [ $? -ne 0 ]; then
        ((errors++))
    fi
done

if [ $errors -ne 0 ]; then
    echo "::error::clang-format failed for $errors files"
    exit 1
fi"#;

/// Workflow inputs a gate adds, in declaration order.
pub fn gate_inputs(gate: Gate) -> Vec<(&'static str, Value)> {
    match gate {
        Gate::ClangFormat => vec![
            (
                "clang_format",
                serde_json::json!({
                    "description": "Whether to run clang-format QA.",
                    "type": "boolean",
                    "required": false,
                }),
            ),
            (
                "clang_format_ignore",
                serde_json::json!({
                    "description": "A list of paths to be skipped during formatting check.",
                    "type": "string",
                    "required": false,
                }),
            ),
        ],
        Gate::PythonQa => vec![(
            "python_qa",
            serde_json::json!({
                "description": "Whether to run code QA tasks.",
                "type": "boolean",
                "required": false,
            }),
        )],
    }
}

pub(crate) fn gate_job(node: &JobNode, gate: Gate) -> Job {
    let steps = match gate {
        Gate::ClangFormat => vec![
            Step::uses("actions/checkout@v4").named("Checkout repository"),
            Step::run(
                "Install clang-format",
                "wget -O - https://apt.llvm.org/llvm-snapshot.gpg.key | sudo apt-key add -\n\
                 sudo add-apt-repository deb http://apt.llvm.org/jammy/ llvm-toolchain-jammy-16 main\n\
                 sudo apt update\n\
                 sudo apt install -y clang-format-16\n",
            ),
            Step::run("Run clang-format", CLANG_FORMAT_SCRIPT).shell("bash {0}"),
        ],
        Gate::PythonQa => vec![
            Step::uses("actions/checkout@v4")
                .named("Checkout Repository")
                .with("repository", "${{ inputs.repository }}")
                .with("ref", "${{ inputs.ref }}"),
            Step::uses("actions/setup-python@v4")
                .named("Setup Python")
                .with("python-version", "3.x"),
            Step::run(
                "Install Python Dependencies",
                "python -m pip install --upgrade pip\npython -m pip install black flake8 isort\n",
            ),
            Step::run("Check isort", "isort --check . --profile black"),
            Step::run("Check black", "black --check ."),
            Step::run("Check flake8", "flake8 ."),
        ],
    };

    Job {
        name: node.name.clone(),
        needs: node.needs.clone(),
        condition: node.condition.as_ref().map(ToString::to_string),
        steps,
        ..Default::default()
    }
}

fn output_refs(packages: &[String]) -> String {
    packages
        .iter()
        .map(|p| format!("${{{{ {} }}}}", SetupOutput::PackageInput(p.clone()).reference()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Options that come straight from the package's entry in the dependency tree.
struct PackageOptions<'a> {
    test_cmd: Option<&'a str>,
    conda_deps: Option<&'a Value>,
    mkdir: &'a [String],
    requirements_path: Option<&'a str>,
    toml_opt_dep_sections: Option<&'a str>,
    build_package_python: Option<&'a str>,
}

impl PackageOptions<'_> {
    fn apply_python(&self, mut step: Step) -> Step {
        if let Some(path) = self.requirements_path {
            step = step.with("requirements_path", path);
        }
        if let Some(sections) = self.toml_opt_dep_sections {
            step = step.with("toml_opt_dep_sections", sections);
        }
        if let Some(cmd) = self.test_cmd {
            step = step.with("test_cmd", cmd);
        }
        if let Some(deps) = self.conda_deps.filter(|v| !v.is_null()) {
            step = step.with("conda_install", deps.clone());
        }
        step
    }
}

fn with_tokens(step: Step, private: bool, codecov_upload: &str) -> Step {
    if private {
        step.with("github_token", REPO_READ_TOKEN)
    } else {
        step.with("codecov_upload", codecov_upload)
            .with("codecov_token", CODECOV_TOKEN)
    }
}

fn build_package_step(native_deps: &str) -> Step {
    Step::uses(BUILD_PACKAGE_ACTION)
        .with("repository", "${{ matrix.owner_repo_ref }}")
        .with("build_package_inputs", "repository: ${{ matrix.owner_repo_ref }}")
        .with("build_config", "${{ matrix.config_path }}")
        .with("build_dependencies", native_deps)
}

pub(crate) fn package_job(node: &JobNode, kind: PackageKind, graph: &JobGraph, tree: &DependencyTree) -> Job {
    let ctx = graph.context();
    let wf = ctx.name.as_str();
    let spec = &tree[node.name.as_str()];
    let options = PackageOptions {
        test_cmd: spec.test_cmd(wf),
        conda_deps: spec.conda_deps(wf),
        mkdir: spec.mkdir(wf),
        requirements_path: spec.requirements_path(wf),
        toml_opt_dep_sections: spec.toml_opt_dep_sections(wf),
        build_package_python: spec.build_package_python(wf),
    };
    let native_deps = output_refs(&node.native_deps);
    let python_deps = output_refs(&node.interpreted_deps);

    let mut env = OrderedMap::new();
    env.insert(
        "DEP_TREE",
        Value::String(format!("${{{{ {} }}}}", SetupOutput::DepTree.reference())),
    );
    if let Some(package_env) = spec.environment(wf) {
        for (key, value) in package_env {
            env.insert(key.as_str(), value.clone());
        }
    }

    let mut runs_on = RunsOn::Label("${{ matrix.labels }}".to_string());
    let mut steps = vec![];

    match (ctx.workflow_type, kind) {
        (WorkflowType::BuildPackage, PackageKind::Native) => {
            let mut step = with_tokens(
                build_package_step(&native_deps),
                ctx.private,
                NATIVE_CODECOV_UPLOAD,
            );
            if let Some(version) = options.build_package_python {
                step = step.with("python_version", version);
            }
            steps.push(step);
        }
        (WorkflowType::BuildPackage, PackageKind::Interpreted) if !node.native_deps.is_empty() => {
            let mut deps_step = build_package_step(&native_deps)
                .named("Build dependencies")
                .id("build-deps")
                .with("codecov_upload", false);
            if ctx.private {
                deps_step = deps_step.with("github_token", REPO_READ_TOKEN);
            }
            if let Some(version) = options.build_package_python {
                deps_step = deps_step.with("python_version", version);
            }
            steps.push(deps_step);
            for path in options.mkdir {
                steps.push(Step {
                    run: Some(format!("mkdir -p {}", path)),
                    ..Default::default()
                });
            }
            let ci_python = Step::uses(CI_PYTHON_ACTION)
                .with("lib_path", "${{ steps.build-deps.outputs.lib_path }}")
                .with("bin_paths", "${{ steps.build-deps.outputs.bin_paths }}")
                .with("python_dependencies", python_deps.as_str());
            let ci_python = options.apply_python(ci_python);
            steps.push(with_tokens(ci_python, ctx.private, PYTHON_CODECOV_UPLOAD));
        }
        (WorkflowType::BuildPackage, PackageKind::Interpreted) => {
            let ci_python = Step::uses(CI_PYTHON_ACTION)
                .with("repository", "${{ matrix.owner_repo_ref }}")
                .with("checkout", true)
                .with("python_dependencies", python_deps.as_str());
            let ci_python = options.apply_python(ci_python);
            steps.push(with_tokens(ci_python, ctx.private, PYTHON_CODECOV_UPLOAD));
        }
        (WorkflowType::BuildPackageHpc, _) => {
            runs_on = RunsOn::Labels(vec![
                "self-hosted".to_string(),
                "linux".to_string(),
                "hpc".to_string(),
            ]);
            let mut step = Step::uses(CI_HPC_ACTION)
                .with("github_user", "${{ secrets.BUILD_PACKAGE_HPC_GITHUB_USER }}")
                .with("github_token", REPO_READ_TOKEN)
                .with("troika_user", "${{ secrets.HPC_CI_SSH_USER }}")
                .with("repository", "${{ matrix.owner_repo_ref }}")
                .with("build_config", "${{ matrix.config_path }}")
                .with("dependencies", native_deps.as_str())
                .with("python_dependencies", python_deps.as_str());
            if let Some(path) = options.requirements_path {
                step = step.with("python_requirements", path);
            }
            if let Some(sections) = options.toml_opt_dep_sections {
                step = step.with("python_toml_opt_dep_sections", sections);
            }
            if let Some(deps) = options.conda_deps.filter(|v| !v.is_null()) {
                step = step.with("conda_deps", deps.clone());
            }
            steps.push(step);
        }
    }

    let matrix_output = node
        .matrix_output()
        .unwrap_or_else(|| SetupOutput::PackageMatrix(node.name.clone()));

    Job {
        name: node.name.clone(),
        needs: node.needs.clone(),
        condition: node.condition.as_ref().map(ToString::to_string),
        strategy: Some(Strategy {
            fail_fast: false,
            matrix: format!("${{{{ fromJson({}) }}}}", matrix_output.reference()),
        }),
        env,
        runs_on,
        outputs: OrderedMap::new(),
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::{WorkflowContext, WorkflowSet};
    use cascade_graph::JobGraphBuilder;
    use pretty_assertions::assert_eq;

    const TREE: &str = r#"
eckit:
  env:
    ECKIT_DEBUG: "1"
pyeckit:
  type: python
  deps: [eckit]
  test_cmd: pytest -x
  mkdir: [build/lib]
pyonly:
  type: python
  requirements_path: requirements.txt
"#;

    const CONFIG: &str = r#"
build-package:
  type: build-package
  matrix:
    name: [gnu]
    include: [{name: gnu, labels: gnu}]
private-build-package:
  type: build-package
  private: true
  matrix:
    name: [gnu]
    include: [{name: gnu, labels: gnu}]
build-package-hpc:
  type: build-package-hpc
  matrix:
    name: [gnu]
    include: [{name: gnu, labels: gnu}]
"#;

    fn jobs(workflow: &str) -> Vec<Job> {
        let tree = DependencyTree::from_yaml_str(TREE).unwrap();
        let set = WorkflowSet::from_yaml_str(CONFIG).unwrap();
        let config = set.get(workflow).unwrap();
        let ctx = WorkflowContext::from_config(workflow, config);
        let graph = JobGraphBuilder::new(&tree).build(config, &ctx).unwrap();
        graph
            .packages()
            .map(|node| match node.role {
                cascade_graph::JobRole::Package(kind) => package_job(node, kind, &graph, &tree),
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn test_native_job() {
        let jobs = jobs("build-package");
        let eckit = &jobs[0];
        assert_eq!(eckit.name, "eckit");
        assert_eq!(
            eckit.strategy.as_ref().unwrap().matrix,
            "${{ fromJson(needs.setup.outputs.eckit_matrix) }}"
        );
        assert_eq!(eckit.env.keys().collect::<Vec<_>>(), vec!["DEP_TREE", "ECKIT_DEBUG"]);
        let step = &eckit.steps[0];
        assert_eq!(step.uses.as_deref(), Some(BUILD_PACKAGE_ACTION));
        assert_eq!(step.with.get("codecov_token"), Some(&Value::from(CODECOV_TOKEN)));
        assert_eq!(step.with.get("build_dependencies"), Some(&Value::from("")));
    }

    #[test]
    fn test_python_job_with_native_deps() {
        let jobs = jobs("build-package");
        let pyeckit = &jobs[1];
        assert_eq!(pyeckit.steps.len(), 3);
        assert_eq!(pyeckit.steps[0].id.as_deref(), Some("build-deps"));
        assert_eq!(
            pyeckit.steps[0].with.get("build_dependencies"),
            Some(&Value::from("${{ needs.setup.outputs.eckit }}"))
        );
        assert_eq!(pyeckit.steps[1].run.as_deref(), Some("mkdir -p build/lib"));
        let ci_python = &pyeckit.steps[2];
        assert_eq!(ci_python.with.get("test_cmd"), Some(&Value::from("pytest -x")));
        assert_eq!(ci_python.with.get("codecov_upload"), Some(&Value::from(PYTHON_CODECOV_UPLOAD)));
    }

    #[test]
    fn test_pure_python_job() {
        let jobs = jobs("build-package");
        let pyonly = &jobs[2];
        assert_eq!(pyonly.steps.len(), 1);
        let step = &pyonly.steps[0];
        assert_eq!(step.with.get("checkout"), Some(&Value::from(true)));
        assert_eq!(step.with.get("requirements_path"), Some(&Value::from("requirements.txt")));
    }

    #[test]
    fn test_private_jobs_use_read_token() {
        let tree = "eckit:\n  private: true\n";
        let tree = DependencyTree::from_yaml_str(tree).unwrap();
        let set = WorkflowSet::from_yaml_str(CONFIG).unwrap();
        let config = set.get("private-build-package").unwrap();
        let ctx = WorkflowContext::from_config("private-build-package", config);
        let graph = JobGraphBuilder::new(&tree).build(config, &ctx).unwrap();
        let node = graph.job("eckit").unwrap();
        let job = package_job(node, PackageKind::Native, &graph, &tree);
        let step = &job.steps[0];
        assert_eq!(step.with.get("github_token"), Some(&Value::from(REPO_READ_TOKEN)));
        assert!(step.with.get("codecov_token").is_none());
    }

    #[test]
    fn test_hpc_job() {
        let jobs = jobs("build-package-hpc");
        let pyeckit = &jobs[1];
        assert_eq!(
            pyeckit.runs_on,
            RunsOn::Labels(vec!["self-hosted".into(), "linux".into(), "hpc".into()])
        );
        assert_eq!(pyeckit.steps[0].uses.as_deref(), Some(CI_HPC_ACTION));
        assert_eq!(
            pyeckit.steps[0].with.get("dependencies"),
            Some(&Value::from("${{ needs.setup.outputs.eckit }}"))
        );
        assert_eq!(pyeckit.needs, vec!["eckit", SETUP_JOB]);
    }
}
