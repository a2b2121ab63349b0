//! IR Lowering - validated workflow to platform job graph
//!
//! - `agent`: agent tasks to agent action steps, output schemas to JSON schema
//! - `matrix`: strategy blocks and per-cell artifact fingerprints
//! - `cycle`: a cycle to hydrate / body / decide / dispatch jobs
//! - `guard`: decide-job script with the guard helper preamble
//!
//! Lowering expects an expanded, error-free workflow. Jobs keep their
//! declared order; each cycle's jobs follow the top-level jobs.

mod agent;
mod cycle;
mod guard;
mod matrix;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::ast::{JobDecl, Step, StepKind, TriggerEvent, Workflow};
use crate::config::{ActionRefs, CycleSettings};
use crate::ir::{
    ConcurrencyIr, DispatchInput, DispatchIr, EventIr, JobIr, StepIr, StepKindIr, TriggerIr,
    WorkflowIr,
};
use crate::imports::TypeScope;

pub use agent::{json_schema, lower_agent_task, render_output_schema};
pub use cycle::{
    body_id, decide_id, dispatch_id, hydrate_id, iteration_input, lower_cycle, STATE_RUN_INPUT,
};
pub use guard::{decide_script, guard_body, GUARD_PREAMBLE};
pub use matrix::{artifact_name, fingerprint, strategy};

/// Outputs every cycle exposes to jobs that need it
pub const CYCLE_OUTPUTS: &[&str] = &["termination_reason", "continue", "iteration"];

/// Runner for generated jobs and for jobs that omit `runs_on`
pub const DEFAULT_RUNNER: &str = "ubuntu-latest";

/// Settings and lookups shared by every lowering pass
pub struct LowerContext<'a> {
    pub actions: &'a ActionRefs,
    pub cycles: &'a CycleSettings,
    /// Named types, resolved in their declaring file
    pub types: TypeScope<'a>,
}

/// `needs.<job>.` inside free text
static NEEDS_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bneeds\.([A-Za-z_][A-Za-z0-9_-]*)\.").expect("valid regex")
});

/// Source job names mapped to their lowered ids
///
/// Body jobs become `<cycle>_body_<job>`; a cycle used as a dependency
/// becomes its decide job.
pub struct Renames {
    ids: FxHashMap<String, String>,
    cycles: FxHashMap<String, String>,
}

impl Renames {
    pub fn for_workflow(workflow: &Workflow) -> Self {
        let mut ids = FxHashMap::default();
        let mut cycles = FxHashMap::default();
        for cycle in &workflow.cycles {
            for job in &cycle.body {
                ids.insert(job.name().to_string(), body_id(&cycle.name, job.name()));
            }
            let decide = decide_id(&cycle.name);
            ids.insert(cycle.name.clone(), decide.clone());
            cycles.insert(cycle.name.clone(), decide);
        }
        Self { ids, cycles }
    }

    pub fn id(&self, name: &str) -> String {
        self.ids.get(name).cloned().unwrap_or_else(|| name.to_string())
    }

    /// Decide job of the cycle named `name`, if it is one
    pub fn cycle_exit(&self, name: &str) -> Option<&str> {
        self.cycles.get(name).map(String::as_str)
    }

    /// Rewrite `needs.<job>.` references to lowered ids
    pub fn rewrite(&self, text: &str) -> String {
        if self.ids.is_empty() || !text.contains("needs.") {
            return text.to_string();
        }
        NEEDS_REF
            .replace_all(text, |caps: &Captures<'_>| match self.ids.get(&caps[1]) {
                Some(id) => format!("needs.{}.", id),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    fn rewrite_map(&self, map: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        map.iter()
            .map(|(k, v)| (k.clone(), self.rewrite(v)))
            .collect()
    }
}

/// Lower a workflow to IR
#[instrument(skip_all, fields(workflow = %workflow.name))]
pub fn lower_workflow(workflow: &Workflow, ctx: &LowerContext<'_>) -> WorkflowIr {
    let renames = Renames::for_workflow(workflow);

    let mut jobs: Vec<JobIr> = workflow
        .jobs
        .iter()
        .filter_map(|job| lower_job(job, job.name().to_string(), &renames, ctx))
        .collect();
    for cycle in &workflow.cycles {
        jobs.extend(lower_cycle(cycle, &renames, ctx));
    }

    debug!(jobs = jobs.len(), cycles = workflow.cycles.len(), "lowered workflow");

    WorkflowIr {
        name: workflow.name.clone(),
        on: lower_trigger(workflow),
        concurrency: concurrency(workflow),
        env: workflow.env.clone(),
        jobs,
    }
}

/// Lower one plain, agent or matrix job under the given id
pub fn lower_job(
    job: &JobDecl,
    id: String,
    renames: &Renames,
    ctx: &LowerContext<'_>,
) -> Option<JobIr> {
    let (source, matrix) = match job {
        JobDecl::Job(j) => (
            JobParts {
                runs_on: j.runs_on.as_deref(),
                condition: j.condition.as_ref().map(|c| c.bare()),
                outputs: &j.outputs,
                env: &j.env,
                steps: &j.steps,
                timeout: j.timeout_minutes,
            },
            None,
        ),
        JobDecl::Agent(j) => (
            JobParts {
                runs_on: j.runs_on.as_deref(),
                condition: j.condition.as_ref().map(|c| c.bare()),
                outputs: &j.outputs,
                env: &j.env,
                steps: &j.steps,
                timeout: j.timeout_minutes,
            },
            None,
        ),
        JobDecl::Matrix(m) => (
            JobParts {
                runs_on: m.job.runs_on.as_deref(),
                condition: m.job.condition.as_ref().map(|c| c.bare()),
                outputs: &m.job.outputs,
                env: &m.job.env,
                steps: &m.job.steps,
                timeout: m.job.timeout_minutes,
            },
            Some(&m.matrix),
        ),
        JobDecl::Fragment(usage) => {
            debug!(job = %usage.name, "skipping unexpanded fragment use");
            return None;
        }
    };

    let mut ir = JobIr::new(id, source.runs_on.unwrap_or(DEFAULT_RUNNER));
    ir.span = job.span();
    let mut gates = Vec::new();
    for dep in job.dependencies() {
        if let Some(exit) = renames.cycle_exit(dep) {
            gates.push(format!("needs.{}.outputs.continue != 'true'", exit));
        }
        ir.need(renames.id(dep));
    }

    let condition = source.condition.map(|c| renames.rewrite(c));
    ir.condition = match (condition, gates.is_empty()) {
        (condition, true) => condition,
        (Some(c), false) => Some(format!("({}) && {}", c, gates.join(" && "))),
        (None, false) => Some(gates.join(" && ")),
    };

    let fp = matrix.and_then(fingerprint);
    ir.strategy = matrix.map(strategy);
    ir.outputs = source
        .outputs
        .iter()
        .map(|o| (o.name.clone(), renames.rewrite(&o.value)))
        .collect();
    ir.env = renames.rewrite_map(source.env);
    ir.timeout_minutes = source.timeout;
    ir.steps = source
        .steps
        .iter()
        .flat_map(|step| lower_step(step, fp.as_deref(), renames, ctx))
        .collect();
    Some(ir)
}

struct JobParts<'a> {
    runs_on: Option<&'a str>,
    condition: Option<&'a str>,
    outputs: &'a [crate::ast::OutputDecl],
    env: &'a BTreeMap<String, String>,
    steps: &'a [Step],
    timeout: Option<u32>,
}

/// Lower one step; agent tasks may produce two
pub fn lower_step(
    step: &Step,
    fingerprint: Option<&str>,
    renames: &Renames,
    ctx: &LowerContext<'_>,
) -> Vec<StepIr> {
    let mut lowered = match &step.kind {
        StepKind::Run { command, shell } => vec![StepIr::new(StepKindIr::Run {
            command: renames.rewrite(command),
            shell: shell.clone(),
        })],
        StepKind::Uses { action, with } => vec![StepIr::new(StepKindIr::Uses {
            action: action.clone(),
            with: with
                .iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => Value::String(renames.rewrite(s)),
                        other => other.clone(),
                    };
                    (k.clone(), v)
                })
                .collect(),
        })],
        StepKind::Script { code } => vec![StepIr::new(StepKindIr::Script {
            action: ctx.actions.github_script.clone(),
            code: renames.rewrite(code),
        })],
        StepKind::AgentTask(task) => {
            lower_agent_task(task, renames.rewrite(&task.prompt), fingerprint, ctx)
        }
        // Downloads name an artifact some other job produced, unsuffixed
        StepKind::DownloadArtifact(a) => vec![StepIr::new(StepKindIr::DownloadArtifact {
            action: ctx.actions.download_artifact.clone(),
            name: a.name.clone(),
            path: a.path.clone(),
            run_id: None,
        })],
        StepKind::UploadArtifact(a) => vec![StepIr::new(StepKindIr::UploadArtifact {
            action: ctx.actions.upload_artifact.clone(),
            name: artifact_name(&a.name, fingerprint),
            path: a.path.clone(),
        })],
        StepKind::Fragment { fragment, .. } => {
            debug!(fragment = %fragment, "skipping unexpanded steps fragment");
            return Vec::new();
        }
    };

    for lowered_step in &mut lowered {
        lowered_step.span = step.span;
    }
    if let Some(first) = lowered.first_mut() {
        first.name = step.name.clone();
        first.id = step.id.clone();
        first.condition = step.condition.as_deref().map(|c| renames.rewrite(c));
        first.env = renames.rewrite_map(&step.env);
    }
    lowered
}

// ═══════════════════════════════════════════════════════════════
// TRIGGER AND CONCURRENCY
// ═══════════════════════════════════════════════════════════════

fn lower_trigger(workflow: &Workflow) -> TriggerIr {
    let mut trigger = TriggerIr::default();
    for event in &workflow.trigger.events {
        if event.name == "workflow_dispatch" {
            trigger.workflow_dispatch = Some(dispatch_from_event(event));
        } else {
            trigger.events.push(EventIr {
                name: event.name.clone(),
                config: event.config.clone(),
            });
        }
    }

    if !workflow.cycles.is_empty() {
        let dispatch = trigger.workflow_dispatch.get_or_insert_with(DispatchIr::default);
        for cycle in &workflow.cycles {
            dispatch.add_input(DispatchInput::string(
                iteration_input(&cycle.name),
                format!("Iteration of cycle '{}' (set by re-dispatch)", cycle.name),
            ));
        }
        dispatch.add_input(DispatchInput::string(
            STATE_RUN_INPUT,
            "Run holding the previous iteration's state (set by re-dispatch)",
        ));
    }

    if trigger.events.is_empty() && trigger.workflow_dispatch.is_none() {
        trigger.workflow_dispatch = Some(DispatchIr::default());
    }
    trigger
}

fn dispatch_from_event(event: &TriggerEvent) -> DispatchIr {
    let mut dispatch = DispatchIr::default();
    let Some(Value::Object(inputs)) = event.config.as_ref().and_then(|c| c.get("inputs")) else {
        return dispatch;
    };
    for (name, spec) in inputs {
        let text = |key: &str| spec.get(key).map(json_scalar);
        dispatch.add_input(DispatchInput {
            name: name.clone(),
            description: text("description").unwrap_or_default(),
            required: spec.get("required").and_then(Value::as_bool).unwrap_or(false),
            default: text("default"),
            kind: text("type"),
            options: spec
                .get("options")
                .and_then(Value::as_array)
                .map(|opts| opts.iter().map(json_scalar).collect())
                .unwrap_or_default(),
        });
    }
    dispatch
}

fn json_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Serializes re-dispatched runs of a looping workflow
fn concurrency(workflow: &Workflow) -> Option<ConcurrencyIr> {
    if workflow.cycles.is_empty() {
        return None;
    }
    let group = match workflow.cycles.iter().find_map(|c| c.key.as_deref()) {
        Some(key) => format!("{}-{}", workflow.name, key),
        None => "${{ github.workflow }}-${{ github.event_name == 'workflow_dispatch' && 'cycle' || 'entry' }}"
            .to_string(),
    };
    Some(ConcurrencyIr {
        group,
        cancel_in_progress: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parse_source;
    use crate::registry::TypeRegistryBuilder;

    fn lower(yaml: &str) -> WorkflowIr {
        let file = parse_source("wf.yaml", yaml).file.unwrap();
        let types = TypeRegistryBuilder::for_types().freeze();
        let actions = ActionRefs::default();
        let cycles = CycleSettings::default();
        let ctx = LowerContext {
            actions: &actions,
            cycles: &cycles,
            types: TypeScope::local(&types),
        };
        lower_workflow(&file.workflows[0], &ctx)
    }

    // ═══════════════════════════════════════════════════════════════
    // JOBS
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_agent_job_after_becomes_needs() {
        let ir = lower(
            r#"
workflows:
  - name: wf
    on: push
    jobs:
      - { name: build, runs_on: ubuntu-latest, steps: [{ run: make }] }
      - name: triage
        kind: agent_job
        after: [build]
        runs_on: ubuntu-latest
        steps:
          - agent_task: { prompt: "Triage", model: sonnet, allowed_tools: [Read, "Bash(git:*)"] }
"#,
        );
        let triage = ir.job("triage").unwrap();
        assert_eq!(triage.needs, vec!["build"]);
        let StepKindIr::ClaudeCode {
            model,
            allowed_tools,
            ..
        } = &triage.steps[0].kind
        else {
            panic!("expected agent step");
        };
        assert_eq!(model.as_deref(), Some("sonnet"));
        assert_eq!(allowed_tools.as_deref(), Some(r#"["Read","Bash(git:*)"]"#));
    }

    #[test]
    fn test_matrix_artifacts_get_fingerprint() {
        let ir = lower(
            r#"
workflows:
  - name: wf
    jobs:
      - name: test
        runs_on: ubuntu-latest
        matrix: { axes: { os: [a, b], node: [18, 20] } }
        steps:
          - upload_artifact: { name: coverage, path: cov/ }
      - name: report
        runs_on: ubuntu-latest
        needs: [test]
        steps:
          - upload_artifact: { name: summary }
"#,
        );
        let test = ir.job("test").unwrap();
        assert!(test.strategy.is_some());
        assert!(matches!(
            &test.steps[0].kind,
            StepKindIr::UploadArtifact { name, .. }
                if name == "coverage-${{ matrix.node }}-${{ matrix.os }}"
        ));
        let report = ir.job("report").unwrap();
        assert!(matches!(
            &report.steps[0].kind,
            StepKindIr::UploadArtifact { name, .. } if name == "summary"
        ));
    }

    #[test]
    fn test_matrix_download_keeps_producer_name() {
        let ir = lower(
            r#"
workflows:
  - name: wf
    jobs:
      - name: build
        runs_on: ubuntu-latest
        steps:
          - upload_artifact: { name: dist, path: dist/ }
      - name: test
        runs_on: ubuntu-latest
        needs: [build]
        matrix: { axes: { os: [a, b] } }
        steps:
          - download_artifact: { name: dist, path: dist/ }
          - upload_artifact: { name: results, path: out/ }
"#,
        );
        let test = ir.job("test").unwrap();
        assert!(matches!(
            &test.steps[0].kind,
            StepKindIr::DownloadArtifact { name, .. } if name == "dist"
        ));
        assert!(matches!(
            &test.steps[1].kind,
            StepKindIr::UploadArtifact { name, .. } if name == "results-${{ matrix.os }}"
        ));
    }

    #[test]
    fn test_ir_nodes_carry_source_spans() {
        let yaml = "workflows:\n  - name: wf\n    jobs:\n      - { name: build, runs_on: x, steps: [{ run: make }] }\n    cycles:\n      - { name: c, max_iters: 1, body: [{ name: j, runs_on: x }] }\n";
        let file = parse_source("wf.yaml", yaml).file.unwrap();
        let types = TypeRegistryBuilder::for_types().freeze();
        let actions = ActionRefs::default();
        let cycles = CycleSettings::default();
        let ctx = LowerContext {
            actions: &actions,
            cycles: &cycles,
            types: TypeScope::local(&types),
        };
        let workflow = &file.workflows[0];
        let ir = lower_workflow(workflow, &ctx);

        let build = ir.job("build").unwrap();
        assert_eq!(build.span, workflow.jobs[0].span());
        assert_eq!(build.steps[0].span, workflow.jobs[0].steps()[0].span);
        assert_eq!(ir.job("c_decide").unwrap().span, workflow.cycles[0].span);
    }

    #[test]
    fn test_missing_trigger_defaults_to_dispatch() {
        let ir = lower("workflows:\n  - name: wf\n    jobs:\n      - { name: a, runs_on: x }\n");
        assert!(ir.on.events.is_empty());
        assert_eq!(ir.on.workflow_dispatch, Some(DispatchIr::default()));
        assert!(ir.concurrency.is_none());
    }

    // ═══════════════════════════════════════════════════════════════
    // RENAMES
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_job_after_cycle_waits_for_decision() {
        let ir = lower(
            r#"
workflows:
  - name: wf
    on: push
    jobs:
      - name: publish
        runs_on: ubuntu-latest
        needs: [refine]
        if: "github.ref == 'refs/heads/main'"
        steps:
          - run: "echo ${{ needs.refine.outputs.termination_reason }}"
    cycles:
      - name: refine
        max_iters: 3
        body:
          - { name: review, runs_on: ubuntu-latest, steps: [{ run: review }] }
"#,
        );
        let publish = ir.job("publish").unwrap();
        assert_eq!(publish.needs, vec!["refine_decide"]);
        assert_eq!(
            publish.condition.as_deref(),
            Some("(github.ref == 'refs/heads/main') && needs.refine_decide.outputs.continue != 'true'")
        );
        assert!(matches!(
            &publish.steps[0].kind,
            StepKindIr::Run { command, .. }
                if command == "echo ${{ needs.refine_decide.outputs.termination_reason }}"
        ));
    }

    #[test]
    fn test_rewrite_leaves_unrelated_refs() {
        let workflow = parse_source(
            "wf.yaml",
            "workflows:\n  - name: wf\n    cycles:\n      - { name: c, max_iters: 1, body: [{ name: j, runs_on: x }] }\n",
        )
        .file
        .unwrap()
        .workflows
        .remove(0);
        let renames = Renames::for_workflow(&workflow);
        assert_eq!(
            renames.rewrite("${{ needs.j.outputs.a }} ${{ needs.jj.outputs.b }}"),
            "${{ needs.c_body_j.outputs.a }} ${{ needs.jj.outputs.b }}"
        );
    }

    // ═══════════════════════════════════════════════════════════════
    // TRIGGER
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_cycle_adds_dispatch_inputs_and_keeps_user_inputs() {
        let ir = lower(
            r#"
workflows:
  - name: wf
    on:
      push: { branches: [main] }
      workflow_dispatch:
        inputs:
          target: { description: "Target", required: true, type: choice, options: [a, b] }
    cycles:
      - name: refine
        key: pr
        max_iters: 2
        body: [{ name: review, runs_on: x }]
"#,
        );
        let dispatch = ir.on.workflow_dispatch.as_ref().unwrap();
        let names: Vec<_> = dispatch.inputs.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["target", "refine_iteration", "state_run_id"]);
        assert_eq!(dispatch.inputs[0].options, vec!["a", "b"]);
        assert_eq!(ir.on.events.len(), 1);
        assert_eq!(ir.concurrency.as_ref().unwrap().group, "wf-pr");
    }

    #[test]
    fn test_fallback_concurrency_keyed_by_phase() {
        let ir = lower(
            "workflows:\n  - name: wf\n    on: push\n    cycles:\n      - { name: c, max_iters: 1, body: [{ name: j, runs_on: x }] }\n",
        );
        let group = &ir.concurrency.as_ref().unwrap().group;
        assert!(group.contains("github.event_name == 'workflow_dispatch'"));
        assert!(!ir.concurrency.as_ref().unwrap().cancel_in_progress);
    }
}
