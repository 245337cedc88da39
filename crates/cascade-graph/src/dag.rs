//! Job graph resolution for one workflow variant.

use crate::activation::{active_packages, has_job, is_active};
use crate::closure::closure;
use cascade_core::{DependencyTree, PackageKind, WorkflowConfig, WorkflowContext, WorkflowType};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Name of the job that computes inputs and matrices for every other job.
pub const SETUP_JOB: &str = "setup";

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
    #[error("Cycle detected in job needs")]
    CycleDetected,
    #[error("Unknown job dependency: {0}")]
    UnknownDependency(String),
    #[error(transparent)]
    Core(#[from] cascade_core::Error),
}

/// Code-quality job that packages of one kind wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    ClangFormat,
    PythonQa,
}

impl Gate {
    pub const ALL: [Gate; 2] = [Gate::ClangFormat, Gate::PythonQa];

    pub fn job_name(&self) -> &'static str {
        match self {
            Gate::ClangFormat => "clang-format",
            Gate::PythonQa => "python-qa",
        }
    }

    /// Boolean workflow input that switches the gate on for a run.
    pub fn input_name(&self) -> &'static str {
        match self {
            Gate::ClangFormat => "clang_format",
            Gate::PythonQa => "python_qa",
        }
    }

    pub fn kind(&self) -> PackageKind {
        match self {
            Gate::ClangFormat => PackageKind::Native,
            Gate::PythonQa => PackageKind::Interpreted,
        }
    }

    pub fn for_kind(kind: PackageKind) -> Gate {
        match kind {
            PackageKind::Native => Gate::ClangFormat,
            PackageKind::Interpreted => Gate::PythonQa,
        }
    }

    fn enabled(&self, config: &WorkflowConfig) -> bool {
        match self {
            Gate::ClangFormat => config.clang_format,
            Gate::PythonQa => config.python_qa,
        }
    }
}

/// Gates that take part in a workflow. Only hosted builds run them.
pub fn enabled_gates(config: &WorkflowConfig, ctx: &WorkflowContext) -> Vec<Gate> {
    if ctx.workflow_type != WorkflowType::BuildPackage {
        return vec![];
    }
    Gate::ALL.into_iter().filter(|g| g.enabled(config)).collect()
}

/// A value published by the setup job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutput {
    /// Resolved `owner/repo@ref` input for a package.
    PackageInput(String),
    /// Compact JSON matrix for a package.
    PackageMatrix(String),
    DepTree,
    TriggerRepo,
    CodecovPlatform,
}

impl SetupOutput {
    pub fn name(&self) -> String {
        match self {
            SetupOutput::PackageInput(package) => package.clone(),
            SetupOutput::PackageMatrix(package) => format!("{}_matrix", package),
            SetupOutput::DepTree => "dep_tree".to_string(),
            SetupOutput::TriggerRepo => "trigger_repo".to_string(),
            SetupOutput::CodecovPlatform => "py_codecov_platform".to_string(),
        }
    }

    /// `needs.setup.outputs.<name>` as used in expressions.
    pub fn reference(&self) -> String {
        format!("needs.{}.outputs.{}", SETUP_JOB, self.name())
    }
}

/// When a job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCondition {
    /// Run when the named boolean workflow input is set.
    Input(String),
    /// Run when at least one need succeeded, none was cancelled, the package
    /// has a matrix, and the package or one of its dependencies was requested.
    Package {
        package: String,
        /// Packages whose inputs activate this job; the package itself last.
        activated_by: Vec<String>,
    },
}

impl fmt::Display for JobCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobCondition::Input(input) => write!(f, "${{{{ inputs.{} }}}}", input),
            JobCondition::Package {
                package,
                activated_by,
            } => {
                let requested = activated_by
                    .iter()
                    .map(|p| SetupOutput::PackageInput(p.clone()).reference())
                    .collect::<Vec<_>>()
                    .join(" || ");
                write!(
                    f,
                    "${{{{ (always() && !cancelled()) && contains(join(needs.*.result, ','), 'success') && {} && ({}) }}}}",
                    SetupOutput::PackageMatrix(package.clone()).reference(),
                    requested
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRole {
    Setup,
    Gate(Gate),
    Package(PackageKind),
}

/// A node in the job graph.
#[derive(Debug, Clone)]
pub struct JobNode {
    pub name: String,
    pub role: JobRole,
    /// Jobs that must finish first, in emission order.
    pub needs: Vec<String>,
    pub condition: Option<JobCondition>,
    /// Full dependency closure, including inactive and unknown names.
    pub closure: Vec<String>,
    /// Active native dependencies, in closure order.
    pub native_deps: Vec<String>,
    /// Active interpreted dependencies, in closure order.
    pub interpreted_deps: Vec<String>,
}

impl JobNode {
    fn setup() -> Self {
        Self {
            name: SETUP_JOB.to_string(),
            role: JobRole::Setup,
            needs: vec![],
            condition: None,
            closure: vec![],
            native_deps: vec![],
            interpreted_deps: vec![],
        }
    }

    fn gate(gate: Gate) -> Self {
        Self {
            name: gate.job_name().to_string(),
            role: JobRole::Gate(gate),
            needs: vec![SETUP_JOB.to_string()],
            condition: Some(JobCondition::Input(gate.input_name().to_string())),
            closure: vec![],
            native_deps: vec![],
            interpreted_deps: vec![],
        }
    }

    pub fn is_package(&self) -> bool {
        matches!(self.role, JobRole::Package(_))
    }

    /// Matrix output this job's strategy reads from.
    pub fn matrix_output(&self) -> Option<SetupOutput> {
        self.is_package()
            .then(|| SetupOutput::PackageMatrix(self.name.clone()))
    }
}

/// Jobs of one workflow variant and their needs edges.
#[derive(Debug)]
pub struct JobGraph {
    context: WorkflowContext,
    inputs: Vec<String>,
    gates: Vec<Gate>,
    graph: DiGraph<JobNode, ()>,
    name_to_index: HashMap<String, NodeIndex>,
}

impl JobGraph {
    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    /// Active packages, each exposed as an optional workflow input.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Everything the setup job publishes for this variant.
    pub fn setup_outputs(&self) -> Vec<SetupOutput> {
        let mut outputs = Vec::with_capacity(self.inputs.len() * 2 + 3);
        for package in &self.inputs {
            outputs.push(SetupOutput::PackageInput(package.clone()));
            outputs.push(SetupOutput::PackageMatrix(package.clone()));
        }
        outputs.push(SetupOutput::DepTree);
        if self.context.workflow_type == WorkflowType::BuildPackage {
            outputs.push(SetupOutput::TriggerRepo);
            outputs.push(SetupOutput::CodecovPlatform);
        }
        outputs
    }

    pub fn job(&self, name: &str) -> Option<&JobNode> {
        self.name_to_index
            .get(name)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// All jobs in emission order: setup, gates, then packages in tree order.
    pub fn jobs(&self) -> Vec<&JobNode> {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx))
            .collect()
    }

    pub fn packages(&self) -> impl Iterator<Item = &JobNode> {
        self.graph.node_weights().filter(|node| node.is_package())
    }

    /// Jobs without needs.
    pub fn roots(&self) -> Vec<&JobNode> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, petgraph::Direction::Incoming)
                    .count()
                    == 0
            })
            .filter_map(|idx| self.graph.node_weight(idx))
            .collect()
    }

    /// Jobs that list `name` in their needs.
    pub fn successors(&self, name: &str) -> Vec<&JobNode> {
        self.name_to_index
            .get(name)
            .map(|&idx| {
                self.graph
                    .neighbors_directed(idx, petgraph::Direction::Outgoing)
                    .filter_map(|n| self.graph.node_weight(n))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Strict build order: every job comes after all of its needs.
    pub fn topological_order(&self) -> Result<Vec<&JobNode>, GraphError> {
        toposort(&self.graph, None)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|&idx| self.graph.node_weight(idx))
                    .collect()
            })
            .map_err(|_| GraphError::CycleDetected)
    }
}

/// Builder for the job graph of one workflow variant.
pub struct JobGraphBuilder<'a> {
    tree: &'a DependencyTree,
}

impl<'a> JobGraphBuilder<'a> {
    pub fn new(tree: &'a DependencyTree) -> Self {
        Self { tree }
    }

    pub fn build(
        &self,
        config: &WorkflowConfig,
        ctx: &WorkflowContext,
    ) -> Result<JobGraph, GraphError> {
        let tree = self.tree;
        let gates = enabled_gates(config, ctx);

        let mut nodes = vec![JobNode::setup()];
        nodes.extend(gates.iter().copied().map(JobNode::gate));

        for package in tree.names().filter(|name| has_job(tree, name, ctx)) {
            let kind = tree[package].kind();
            let closure = closure(tree, package, &ctx.name)?;

            let mut needs: Vec<String> = closure
                .iter()
                .filter(|dep| has_job(tree, dep, ctx))
                .cloned()
                .collect();
            needs.push(SETUP_JOB.to_string());
            let gate = Gate::for_kind(kind);
            if gates.contains(&gate) {
                needs.push(gate.job_name().to_string());
            }

            let active: Vec<&String> = closure
                .iter()
                .filter(|dep| is_active(tree, dep, ctx))
                .collect();
            let deps_of = |kind: PackageKind| -> Vec<String> {
                active
                    .iter()
                    .filter(|dep| tree[dep.as_str()].kind() == kind)
                    .map(|dep| dep.to_string())
                    .collect()
            };
            let native_deps = deps_of(PackageKind::Native);
            let interpreted_deps = deps_of(PackageKind::Interpreted);

            let mut activated_by: Vec<String> = active.iter().map(|d| d.to_string()).collect();
            activated_by.push(package.to_string());

            debug!(package = %package, needs = ?needs, "resolved package job");
            nodes.push(JobNode {
                name: package.to_string(),
                role: JobRole::Package(kind),
                needs,
                condition: Some(JobCondition::Package {
                    package: package.to_string(),
                    activated_by,
                }),
                closure,
                native_deps,
                interpreted_deps,
            });
        }

        let mut graph = DiGraph::new();
        let mut name_to_index = HashMap::new();
        for node in nodes {
            let name = node.name.clone();
            let idx = graph.add_node(node);
            name_to_index.insert(name, idx);
        }

        // Add edges for needs
        for idx in graph.node_indices() {
            let needs = graph[idx].needs.clone();
            for need in &needs {
                let need_idx = name_to_index
                    .get(need)
                    .ok_or_else(|| GraphError::UnknownDependency(need.clone()))?;
                graph.add_edge(*need_idx, idx, ());
            }
        }

        let job_graph = JobGraph {
            context: ctx.clone(),
            inputs: active_packages(tree, ctx)
                .into_iter()
                .map(str::to_string)
                .collect(),
            gates,
            graph,
            name_to_index,
        };

        // Verify no cycles
        job_graph.topological_order()?;

        Ok(job_graph)
    }
}
