//! Command handlers.

use crate::commands::{SchemaTarget, SetupArgs};
use crate::config::Settings;
use anyhow::{Context, anyhow};
use cascade_core::{
    BuildMatrix, ConfigStore, DependencyTree, OptionalMatrixCatalog, OutputSink, PackageVars,
    SetupConfig, TriggerContext, WorkflowConfig, WorkflowContext, WorkflowSet,
};
use cascade_emit::render_workflow;
use cascade_graph::{JobGraph, JobGraphBuilder, JobRole, derive_all, parse_fragments, render_fragments};
use cascade_matrix::{
    AssemblerSettings, Assembly, GithubOutputFile, GithubRawStore, MatrixAssembler, RunInputs,
    publish,
};
use console::style;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Generate workflow files and the dependency fragments file.
pub fn generate(
    settings: &Settings,
    config: &Path,
    dep_tree: &Path,
    output: &Path,
    fragments: Option<&Path>,
    workflows: &[String],
) -> anyhow::Result<Vec<PathBuf>> {
    let tree = DependencyTree::from_path(dep_tree)
        .with_context(|| format!("loading dependency tree {}", dep_tree.display()))?;
    let set = WorkflowSet::from_path(config)
        .with_context(|| format!("loading workflows {}", config.display()))?;
    let emit = settings.emit();
    let fragments_yaml = render_fragments(&derive_all(&tree)?)?;

    std::fs::create_dir_all(output)?;
    let mut written = vec![];

    for (name, workflow) in set.select(workflows)? {
        let graph = build_graph(&tree, name, workflow)?;
        let document = render_workflow(&graph, &tree, workflow, &emit)?;

        let path = output.join(format!("{}.yml", name));
        std::fs::write(&path, document.to_yaml()?)?;
        info!(workflow = name, path = %path.display(), jobs = graph.jobs().len(), "generated workflow");
        println!("{} Generated {}", style("✓").green(), path.display());
        written.push(path);
    }

    let fragments_path = fragments
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&settings.fragments_file));
    if let Some(parent) = fragments_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&fragments_path, fragments_yaml)?;
    println!("{} Generated {}", style("✓").green(), fragments_path.display());
    written.push(fragments_path);

    Ok(written)
}

fn build_graph(tree: &DependencyTree, name: &str, workflow: &WorkflowConfig) -> anyhow::Result<JobGraph> {
    let ctx = WorkflowContext::from_config(name, workflow);
    JobGraphBuilder::new(tree)
        .build(workflow, &ctx)
        .with_context(|| format!("building job graph for {}", name))
}

/// Assemble and publish the build matrices of the current run.
pub async fn setup(settings: &Settings, args: &SetupArgs) -> anyhow::Result<()> {
    let store = GithubRawStore::new(&settings.raw_content_url, args.token.clone())?;
    let mut sink = GithubOutputFile::new(&args.output);
    run_setup(Arc::new(store), settings.assembler(), args, &mut sink).await?;
    Ok(())
}

/// Setup against any store and sink.
///
/// Packages whose config could not be fetched are reported as workflow
/// warnings and left out; the run still succeeds.
pub async fn run_setup(
    store: Arc<dyn ConfigStore>,
    assembler_settings: AssemblerSettings,
    args: &SetupArgs,
    sink: &mut dyn OutputSink,
) -> anyhow::Result<Assembly> {
    let setup = SetupConfig::from_yaml_str(&args.config).context("parsing CONFIG")?;
    let inputs = RunInputs {
        matrix: parse_yaml::<BuildMatrix>("MATRIX", &args.matrix)?,
        optional_matrix: parse_yaml::<OptionalMatrixCatalog>("OPTIONAL_MATRIX", &args.optional_matrix)?,
        python_versions: parse_yaml::<Vec<Value>>("PYTHON_VERSIONS", &args.python_versions)?,
        python_jobs: parse_yaml::<Vec<String>>("PYTHON_JOBS", &args.python_jobs)?,
    };

    let ref_name = args
        .ref_name()
        .ok_or_else(|| anyhow!("no trigger ref: set TRIGGER_REF_NAME or GITHUB_REF_NAME"))?;
    let repository = args
        .repository()
        .ok_or_else(|| anyhow!("no trigger repository: set TRIGGER_REPOSITORY or GITHUB_REPOSITORY"))?;
    let trigger = TriggerContext::new(ref_name, repository)?.with_skip_jobs(&args.skip_matrix_jobs);

    let fragments = match &args.fragments {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading fragments {}", path.display()))?;
            parse_fragments(&content)?
        }
        None => vec![],
    };

    let assembly = MatrixAssembler::new(store, assembler_settings)
        .assemble(&setup, &inputs, &trigger)
        .await?;

    for (package, failure) in &assembly.excluded {
        println!(
            "::warning::Config for {} could not be fetched ({}), skipping the package",
            package, failure
        );
    }

    for package in &assembly.empty {
        println!("::notice::No matrix rows left for {}, the package will not run", package);
    }

    publish(&assembly, &fragments, sink)?;
    Ok(assembly)
}

fn parse_yaml<T: DeserializeOwned + Default>(name: &str, content: &str) -> anyhow::Result<T> {
    let value: Option<T> =
        serde_yaml::from_str(content).with_context(|| format!("parsing {}", name))?;
    Ok(value.unwrap_or_default())
}

/// Print the job graph of one workflow.
pub fn show_graph(config: &Path, dep_tree: &Path, workflow: &str) -> anyhow::Result<()> {
    let tree = DependencyTree::from_path(dep_tree)?;
    let set = WorkflowSet::from_path(config)?;
    let graph = build_graph(&tree, workflow, set.get(workflow)?)?;

    let ctx = graph.context();
    println!(
        "{} ({}{})",
        style(&ctx.name).bold(),
        ctx.workflow_type,
        if ctx.private { ", private" } else { "" }
    );

    for node in graph.jobs() {
        let role = match &node.role {
            JobRole::Setup => "setup".to_string(),
            JobRole::Gate(_) => "gate".to_string(),
            JobRole::Package(kind) => kind.as_str().to_string(),
        };
        println!("  {} {}", style(&node.name).cyan(), style(role).dim());
        if !node.needs.is_empty() {
            println!("    needs: {}", node.needs.join(", "));
        }
        if node.is_package() {
            println!("    closure: {}", node.closure.join(", "));
        }
        if let Some(condition) = &node.condition {
            println!("    if: {}", condition);
        }
    }

    let order: Vec<&str> = graph
        .topological_order()?
        .into_iter()
        .map(|node| node.name.as_str())
        .collect();
    println!("{} {}", style("order:").bold(), order.join(" -> "));
    Ok(())
}

/// Print the JSON schema of a configuration file.
pub fn schema(target: SchemaTarget) -> anyhow::Result<()> {
    let schema = match target {
        SchemaTarget::Workflows => schemars::schema_for!(BTreeMap<String, WorkflowConfig>),
        SchemaTarget::Package => schemars::schema_for!(PackageVars),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// Show settings.
pub fn show_config(settings: &Settings, path: &Path) -> anyhow::Result<()> {
    println!("{}", style(path.display()).dim());
    print!("{}", serde_yaml::to_string(settings)?);
    Ok(())
}

/// Set a settings value.
pub fn set_config(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let mut settings = if path.exists() {
        Settings::load_from(path)?
    } else {
        Settings::default()
    };
    settings.set(key, value)?;
    settings.save(path)?;
    println!("{} Set {} = {}", style("✓").green(), key, value);
    Ok(())
}
