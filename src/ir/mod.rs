//! IR - the lowered, platform-shaped job graph
//!
//! The IR knows nothing about source syntax: no fragments, no cycles, no
//! agent jobs. Lowering builds it once from a validated workflow; the
//! emitter is its only consumer. Jobs keep insertion order.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::ast::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowIr {
    pub name: String,
    pub on: TriggerIr,
    pub concurrency: Option<ConcurrencyIr>,
    pub env: BTreeMap<String, String>,
    pub jobs: Vec<JobIr>,
}

impl WorkflowIr {
    pub fn job(&self, id: &str) -> Option<&JobIr> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn job_ids(&self) -> impl Iterator<Item = &str> {
        self.jobs.iter().map(|j| j.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriggerIr {
    pub events: Vec<EventIr>,
    pub workflow_dispatch: Option<DispatchIr>,
}

/// A trigger event with its platform filters (branches, types, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct EventIr {
    pub name: String,
    pub config: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DispatchIr {
    pub inputs: Vec<DispatchInput>,
}

impl DispatchIr {
    /// Add an input unless one with the same name exists
    pub fn add_input(&mut self, input: DispatchInput) {
        if !self.inputs.iter().any(|i| i.name == input.name) {
            self.inputs.push(input);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchInput {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub default: Option<String>,
    /// Platform input type (`string`, `choice`, ...)
    pub kind: Option<String>,
    pub options: Vec<String>,
}

impl DispatchInput {
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
            default: None,
            kind: Some("string".into()),
            options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrencyIr {
    pub group: String,
    pub cancel_in_progress: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobIr {
    pub id: String,
    pub runs_on: String,
    pub needs: Vec<String>,
    pub condition: Option<String>,
    pub strategy: Option<StrategyIr>,
    pub outputs: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub permissions: BTreeMap<String, String>,
    pub timeout_minutes: Option<u32>,
    pub steps: Vec<StepIr>,
    /// Source job, or the cycle for generated jobs
    pub span: Span,
}

impl JobIr {
    pub fn new(id: impl Into<String>, runs_on: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            runs_on: runs_on.into(),
            needs: Vec::new(),
            condition: None,
            strategy: None,
            outputs: BTreeMap::new(),
            env: BTreeMap::new(),
            permissions: BTreeMap::new(),
            timeout_minutes: None,
            steps: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn need(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.needs.contains(&id) {
            self.needs.push(id);
        }
    }
}

/// Matrix strategy: axes in declaration order, then include/exclude
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrategyIr {
    pub axes: Vec<(String, Vec<Value>)>,
    pub include: Vec<serde_json::Map<String, Value>>,
    pub exclude: Vec<serde_json::Map<String, Value>>,
    pub fail_fast: Option<bool>,
    pub max_parallel: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepIr {
    pub name: Option<String>,
    pub id: Option<String>,
    pub condition: Option<String>,
    pub env: BTreeMap<String, String>,
    pub continue_on_error: bool,
    pub kind: StepKindIr,
    pub span: Span,
}

impl StepIr {
    pub fn new(kind: StepKindIr) -> Self {
        Self {
            name: None,
            id: None,
            condition: None,
            env: BTreeMap::new(),
            continue_on_error: false,
            kind,
            span: Span::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepKindIr {
    Run {
        command: String,
        shell: Option<String>,
    },
    Uses {
        action: String,
        with: BTreeMap<String, Value>,
    },
    /// Inline JavaScript for the script action
    Script {
        action: String,
        code: String,
    },
    ClaudeCode {
        action: String,
        prompt: String,
        model: Option<String>,
        max_turns: Option<u32>,
        /// Compact JSON array
        allowed_tools: Option<String>,
        output_schema: Option<SchemaIr>,
    },
    DownloadArtifact {
        action: String,
        name: String,
        path: String,
        /// Download from another run instead of the current one
        run_id: Option<String>,
    },
    UploadArtifact {
        action: String,
        name: String,
        path: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaIr {
    /// Rendered JSON schema document
    Json(String),
    /// Path to a schema file in the repository
    File(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn need_dedups() {
        let mut job = JobIr::new("a", "ubuntu-latest");
        job.need("b");
        job.need("b");
        job.need("c");
        assert_eq!(job.needs, vec!["b", "c"]);
    }

    #[test]
    fn dispatch_inputs_keep_first_declaration() {
        let mut dispatch = DispatchIr::default();
        let input = |name: &str, required| DispatchInput {
            required,
            ..DispatchInput::string(name, "")
        };
        dispatch.add_input(input("state_run_id", true));
        dispatch.add_input(input("state_run_id", false));
        assert_eq!(dispatch.inputs.len(), 1);
        assert!(dispatch.inputs[0].required);
    }
}
