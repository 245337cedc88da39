//! The setup job and the config it hands to the matrix assembler.

use crate::EmitError;
use crate::model::{Job, OrderedMap, Step};
use crate::settings::EmitSettings;
use cascade_core::{
    DependencyTree, PackageKind, PackageSetup, SetupConfig, WorkflowConfig, WorkflowContext,
};
use cascade_graph::{JobGraph, SETUP_JOB, SetupOutput, active_packages};
use serde_json::Value;

pub const PREPARE_INPUTS_STEP: &str = "prepare-inputs";
pub const SKIP_MATRIX_JOBS_INPUT: &str = "skip_matrix_jobs";

/// `${{ inputs.<name> }}`, falling back to the dispatch payload in private workflows.
pub fn input_expression(name: &str, private: bool) -> String {
    if private {
        format!(
            "${{{{ inputs.{name} || github.event.client_payload.inputs.{name} }}}}"
        )
    } else {
        format!("${{{{ inputs.{name} }}}}")
    }
}

/// Describe every active package for the setup job.
pub fn derive_setup_config(
    tree: &DependencyTree,
    ctx: &WorkflowContext,
    settings: &EmitSettings,
) -> SetupConfig {
    let wf = ctx.name.as_str();
    let packages = active_packages(tree, ctx)
        .into_iter()
        .map(|name| {
            let spec = &tree[name];
            let owner = spec.owner(wf).unwrap_or(&settings.default_owner);
            let repo = spec.repo(wf).unwrap_or(name);
            let mut setup = PackageSetup::new(name, owner, repo);
            setup.subdir = spec.subdir(wf).map(str::to_string);
            setup.path = spec
                .config_path(wf)
                .unwrap_or(ctx.workflow_type.default_config_path())
                .to_string();
            setup.python = spec.kind() == PackageKind::Interpreted;
            setup.master_branch = spec.master_branch(wf).to_string();
            setup.develop_branch = spec.develop_branch(wf).to_string();
            setup.input = format!("${{{{ steps.{}.outputs.{} }}}}", PREPARE_INPUTS_STEP, name);
            setup.optional_matrix = spec.optional_matrix(wf).to_vec();
            setup.skip_matrix_jobs = spec.skip_matrix_jobs(wf).to_vec();
            setup
        })
        .collect();
    SetupConfig { packages }
}

fn output_source(output: &SetupOutput, ctx: &WorkflowContext) -> String {
    let (step, key) = match output {
        SetupOutput::PackageInput(package) => (PREPARE_INPUTS_STEP, package.clone()),
        SetupOutput::PackageMatrix(package) => (SETUP_JOB, package.clone()),
        SetupOutput::DepTree => (SETUP_JOB, ctx.workflow_type.dep_tree_output().to_string()),
        other => (SETUP_JOB, other.name()),
    };
    format!("${{{{ steps.{}.outputs.{} }}}}", step, key)
}

fn prepare_inputs_script(packages: &[String], private: bool) -> String {
    packages
        .iter()
        .map(|package| {
            format!(
                "echo {}=\"{}\" >> $GITHUB_OUTPUT",
                package,
                input_expression(package, private)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn to_yaml<T: serde::Serialize>(value: &T) -> Result<Value, EmitError> {
    Ok(Value::String(serde_yaml::to_string(value)?))
}

pub(crate) fn setup_job(
    graph: &JobGraph,
    tree: &DependencyTree,
    config: &WorkflowConfig,
    settings: &EmitSettings,
) -> Result<Job, EmitError> {
    let ctx = graph.context();

    let outputs: OrderedMap<String> = graph
        .setup_outputs()
        .iter()
        .map(|output| (output.name(), output_source(output, ctx)))
        .collect();

    let mut steps = vec![];
    if ctx.private {
        steps.push(Step {
            name: Some("${{ github.event.client_payload.id }}".to_string()),
            condition: Some("${{ github.event_name == 'repository_dispatch' }}".to_string()),
            run: Some("echo \"Workflow ID ${{ github.event.client_payload.id }}\"".to_string()),
            ..Default::default()
        });
    }
    steps.push(
        Step::run("Prepare inputs", prepare_inputs_script(graph.inputs(), ctx.private))
            .id(PREPARE_INPUTS_STEP),
    );
    steps.push(
        Step::uses("actions/checkout@v4")
            .named("Checkout CI repository")
            .with("repository", settings.ci_repository.as_str())
            .with("ref", settings.ci_repository_ref.as_str()),
    );

    let setup_config = derive_setup_config(tree, ctx, settings);
    let mut env = OrderedMap::new();
    env.insert("TOKEN", Value::from("${{ secrets.GH_REPO_READ_TOKEN }}"));
    env.insert("CONFIG", Value::String(setup_config.to_yaml()?));
    env.insert("PYTHON_VERSIONS", to_yaml(&config.python_versions)?);
    env.insert("PYTHON_JOBS", to_yaml(&config.python_jobs)?);
    env.insert("MATRIX", to_yaml(&config.matrix)?);
    env.insert("OPTIONAL_MATRIX", to_yaml(&config.optional_matrix)?);
    env.insert(
        "SKIP_MATRIX_JOBS",
        Value::String(input_expression(SKIP_MATRIX_JOBS_INPUT, ctx.private)),
    );
    if ctx.private {
        env.insert(
            "TRIGGER_REF_NAME",
            Value::from("${{ github.event.client_payload.ref_name || github.ref_name }}"),
        );
        env.insert(
            "TRIGGER_REPOSITORY",
            Value::from("${{ github.event.client_payload.repository || github.repository }}"),
        );
    }
    steps.push(Step {
        name: Some("Run setup".to_string()),
        id: Some(SETUP_JOB.to_string()),
        env,
        run: Some(format!(
            "{} --fragments {}",
            settings.setup_command, settings.fragments_file
        )),
        ..Default::default()
    });

    Ok(Job {
        name: SETUP_JOB.to_string(),
        outputs,
        steps,
        ..Default::default()
    })
}
