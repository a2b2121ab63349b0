//! Workflow Types - files, workflows, jobs, steps, cycles
//!
//! Contains the core source-level types:
//! - `WorkflowFile`: One source file (imports, types, fragments, workflows)
//! - `Workflow`: Trigger, jobs and cycles
//! - `JobDecl`: Plain, agent, matrix or fragment-instantiating job
//! - `Step`: One step with its `StepKind`
//! - `Cycle`: Bounded iteration over a body of jobs

use std::collections::BTreeMap;

use serde_json::Value;

use super::{Condition, JobFragment, OutputSchema, Span, StepsFragment, TypeDeclaration, TypeExpr};

/// One parsed source file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkflowFile {
    pub path: String,
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDeclaration>,
    pub job_fragments: Vec<JobFragment>,
    pub steps_fragments: Vec<StepsFragment>,
    pub workflows: Vec<Workflow>,
}

impl WorkflowFile {
    /// The workflow compiled from this file, if it declares one
    pub fn entry_workflow(&self) -> Option<&Workflow> {
        self.workflows.first()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub from: String,
    pub types: Vec<ImportItem>,
    pub job_fragments: Vec<ImportItem>,
    pub steps_fragments: Vec<ImportItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportItem {
    pub name: String,
    pub alias: Option<String>,
    pub span: Span,
}

impl ImportItem {
    /// Name bound in the importing file
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trigger {
    pub events: Vec<TriggerEvent>,
}

/// A trigger event with optional platform configuration (branches, types, inputs)
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvent {
    pub name: String,
    pub config: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    pub name: String,
    pub trigger: Trigger,
    pub env: BTreeMap<String, String>,
    pub jobs: Vec<JobDecl>,
    pub cycles: Vec<Cycle>,
    pub span: Span,
}

impl Workflow {
    /// Find a top-level or cycle-body job by name
    pub fn find_job(&self, name: &str) -> Option<&JobDecl> {
        self.jobs
            .iter()
            .chain(self.cycles.iter().flat_map(|c| c.body.iter()))
            .find(|j| j.name() == name)
    }

    pub fn find_cycle(&self, name: &str) -> Option<&Cycle> {
        self.cycles.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputDecl {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub name: String,
    pub runs_on: Option<String>,
    pub needs: Vec<String>,
    pub condition: Option<Condition>,
    pub outputs: Vec<OutputDecl>,
    pub env: BTreeMap<String, String>,
    pub steps: Vec<Step>,
    pub timeout_minutes: Option<u32>,
    pub span: Span,
}

/// A job whose work is driven by agent tasks; ordered with `after`
#[derive(Debug, Clone, PartialEq)]
pub struct AgentJob {
    pub name: String,
    pub runs_on: Option<String>,
    pub after: Vec<String>,
    pub condition: Option<Condition>,
    pub outputs: Vec<OutputDecl>,
    pub env: BTreeMap<String, String>,
    pub steps: Vec<Step>,
    pub timeout_minutes: Option<u32>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixAxis {
    pub name: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    pub axes: Vec<MatrixAxis>,
    pub include: Vec<serde_json::Map<String, Value>>,
    pub exclude: Vec<serde_json::Map<String, Value>>,
    pub fail_fast: Option<bool>,
    pub max_parallel: Option<u32>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixJob {
    pub job: Job,
    pub matrix: Matrix,
}

/// Instantiation of a job fragment, replaced during expansion
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentUse {
    pub name: String,
    pub fragment: String,
    pub args: BTreeMap<String, String>,
    pub needs: Vec<String>,
    pub condition: Option<Condition>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobDecl {
    Job(Job),
    Agent(AgentJob),
    Matrix(MatrixJob),
    Fragment(FragmentUse),
}

impl JobDecl {
    pub fn name(&self) -> &str {
        match self {
            JobDecl::Job(j) => &j.name,
            JobDecl::Agent(j) => &j.name,
            JobDecl::Matrix(m) => &m.job.name,
            JobDecl::Fragment(f) => &f.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            JobDecl::Job(j) => j.span,
            JobDecl::Agent(j) => j.span,
            JobDecl::Matrix(m) => m.job.span,
            JobDecl::Fragment(f) => f.span,
        }
    }

    /// Declared ordering edges: `needs` for jobs, `after` for agent jobs
    pub fn dependencies(&self) -> &[String] {
        match self {
            JobDecl::Job(j) => &j.needs,
            JobDecl::Agent(j) => &j.after,
            JobDecl::Matrix(m) => &m.job.needs,
            JobDecl::Fragment(f) => &f.needs,
        }
    }

    pub fn runs_on(&self) -> Option<&str> {
        match self {
            JobDecl::Job(j) => j.runs_on.as_deref(),
            JobDecl::Agent(j) => j.runs_on.as_deref(),
            JobDecl::Matrix(m) => m.job.runs_on.as_deref(),
            JobDecl::Fragment(_) => None,
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        match self {
            JobDecl::Job(j) => j.condition.as_ref(),
            JobDecl::Agent(j) => j.condition.as_ref(),
            JobDecl::Matrix(m) => m.job.condition.as_ref(),
            JobDecl::Fragment(f) => f.condition.as_ref(),
        }
    }

    pub fn outputs(&self) -> &[OutputDecl] {
        match self {
            JobDecl::Job(j) => &j.outputs,
            JobDecl::Agent(j) => &j.outputs,
            JobDecl::Matrix(m) => &m.job.outputs,
            JobDecl::Fragment(_) => &[],
        }
    }

    pub fn steps(&self) -> &[Step] {
        match self {
            JobDecl::Job(j) => &j.steps,
            JobDecl::Agent(j) => &j.steps,
            JobDecl::Matrix(m) => &m.job.steps,
            JobDecl::Fragment(_) => &[],
        }
    }

    pub fn matrix(&self) -> Option<&Matrix> {
        match self {
            JobDecl::Matrix(m) => Some(&m.matrix),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactDecl {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentTask {
    pub prompt: String,
    pub model: Option<String>,
    pub max_turns: Option<u32>,
    pub allowed_tools: Vec<String>,
    pub output_schema: Option<OutputSchema>,
    pub output_artifact: Option<ArtifactDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Run {
        command: String,
        shell: Option<String>,
    },
    Uses {
        action: String,
        with: BTreeMap<String, Value>,
    },
    /// Script run by the platform's script action (opaque text)
    Script {
        code: String,
    },
    AgentTask(AgentTask),
    DownloadArtifact(ArtifactDecl),
    UploadArtifact(ArtifactDecl),
    /// Splice of a steps fragment, replaced during expansion
    Fragment {
        fragment: String,
        args: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: Option<String>,
    pub id: Option<String>,
    pub condition: Option<String>,
    pub env: BTreeMap<String, String>,
    pub kind: StepKind,
    pub span: Span,
}

impl Step {
    pub fn new(kind: StepKind) -> Self {
        Self {
            name: None,
            id: None,
            condition: None,
            env: BTreeMap::new(),
            kind,
            span: Span::default(),
        }
    }

    /// Every free-text field that may reference job outputs
    pub fn texts(&self) -> Vec<&str> {
        let mut texts: Vec<&str> = Vec::new();
        if let Some(ref cond) = self.condition {
            texts.push(cond);
        }
        texts.extend(self.env.values().map(String::as_str));
        match &self.kind {
            StepKind::Run { command, .. } => texts.push(command),
            StepKind::Uses { with, .. } => {
                for value in with.values() {
                    if let Value::String(s) = value {
                        texts.push(s);
                    }
                }
            }
            StepKind::Script { code } => texts.push(code),
            StepKind::AgentTask(task) => texts.push(&task.prompt),
            StepKind::DownloadArtifact(a) | StepKind::UploadArtifact(a) => {
                texts.push(&a.name);
                texts.push(&a.path);
            }
            StepKind::Fragment { args, .. } => texts.extend(args.values().map(String::as_str)),
        }
        texts
    }
}

/// Bounded or guarded iteration over a body of jobs
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    pub name: String,
    pub max_iters: Option<u32>,
    pub key: Option<String>,
    /// Guard script evaluated at run time; opaque to the compiler
    pub until: Option<String>,
    pub body: Vec<JobDecl>,
    pub span: Span,
}
