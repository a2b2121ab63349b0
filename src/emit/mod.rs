//! Emitter - IR to platform workflow YAML
//!
//! Builds a `serde_yaml::Mapping` in a fixed key order and serializes it.
//! Platform keys are hyphenated (`runs-on`, `timeout-minutes`, ...). The
//! same IR always produces the same bytes.

use serde_yaml::{Mapping, Value};

use crate::error::Result;
use crate::ir::{
    ConcurrencyIr, DispatchIr, JobIr, SchemaIr, StepIr, StepKindIr, StrategyIr, TriggerIr,
    WorkflowIr,
};

/// Serialize a workflow, ending with exactly one newline
pub fn emit(ir: &WorkflowIr) -> Result<String> {
    let doc = workflow_value(ir)?;
    let text = serde_yaml::to_string(&doc)?;
    let mut out = text.trim_end().to_string();
    out.push('\n');
    Ok(out)
}

fn workflow_value(ir: &WorkflowIr) -> Result<Value> {
    let mut doc = Mapping::new();
    doc.insert("name".into(), ir.name.as_str().into());
    doc.insert("on".into(), trigger_value(&ir.on)?);
    if let Some(concurrency) = &ir.concurrency {
        doc.insert("concurrency".into(), concurrency_value(concurrency));
    }
    if !ir.env.is_empty() {
        doc.insert("env".into(), string_map(ir.env.iter()));
    }

    let mut jobs = Mapping::new();
    for job in &ir.jobs {
        jobs.insert(job.id.as_str().into(), job_value(job)?);
    }
    doc.insert("jobs".into(), Value::Mapping(jobs));
    Ok(Value::Mapping(doc))
}

// ═══════════════════════════════════════════════════════════════
// TRIGGER
// ═══════════════════════════════════════════════════════════════

fn trigger_value(on: &TriggerIr) -> Result<Value> {
    let plain_dispatch = on
        .workflow_dispatch
        .as_ref()
        .map_or(true, |d| d.inputs.is_empty());
    let filterless = on.events.iter().all(|e| e.config.is_none());

    if filterless && plain_dispatch {
        let mut names: Vec<Value> = on.events.iter().map(|e| e.name.as_str().into()).collect();
        if on.workflow_dispatch.is_some() {
            names.push("workflow_dispatch".into());
        }
        return Ok(match names.len() {
            1 => names.remove(0),
            _ => Value::Sequence(names),
        });
    }

    let mut map = Mapping::new();
    for event in &on.events {
        let config = match &event.config {
            Some(config) => serde_yaml::to_value(config)?,
            None => Value::Mapping(Mapping::new()),
        };
        map.insert(event.name.as_str().into(), config);
    }
    if let Some(dispatch) = &on.workflow_dispatch {
        map.insert("workflow_dispatch".into(), dispatch_value(dispatch));
    }
    Ok(Value::Mapping(map))
}

fn dispatch_value(dispatch: &DispatchIr) -> Value {
    let mut map = Mapping::new();
    if dispatch.inputs.is_empty() {
        return Value::Mapping(map);
    }
    let mut inputs = Mapping::new();
    for input in &dispatch.inputs {
        let mut spec = Mapping::new();
        if !input.description.is_empty() {
            spec.insert("description".into(), input.description.as_str().into());
        }
        spec.insert("required".into(), input.required.into());
        if let Some(default) = &input.default {
            spec.insert("default".into(), default.as_str().into());
        }
        if let Some(kind) = &input.kind {
            spec.insert("type".into(), kind.as_str().into());
        }
        if !input.options.is_empty() {
            spec.insert(
                "options".into(),
                Value::Sequence(input.options.iter().map(|o| o.as_str().into()).collect()),
            );
        }
        inputs.insert(input.name.as_str().into(), Value::Mapping(spec));
    }
    map.insert("inputs".into(), Value::Mapping(inputs));
    Value::Mapping(map)
}

fn concurrency_value(concurrency: &ConcurrencyIr) -> Value {
    let mut map = Mapping::new();
    map.insert("group".into(), concurrency.group.as_str().into());
    map.insert(
        "cancel-in-progress".into(),
        concurrency.cancel_in_progress.into(),
    );
    Value::Mapping(map)
}

// ═══════════════════════════════════════════════════════════════
// JOBS
// ═══════════════════════════════════════════════════════════════

fn job_value(job: &JobIr) -> Result<Value> {
    let mut map = Mapping::new();
    map.insert("runs-on".into(), job.runs_on.as_str().into());
    if !job.needs.is_empty() {
        map.insert(
            "needs".into(),
            Value::Sequence(job.needs.iter().map(|n| n.as_str().into()).collect()),
        );
    }
    if let Some(condition) = &job.condition {
        map.insert("if".into(), condition.as_str().into());
    }
    if !job.permissions.is_empty() {
        map.insert("permissions".into(), string_map(job.permissions.iter()));
    }
    if let Some(timeout) = job.timeout_minutes {
        map.insert("timeout-minutes".into(), timeout.into());
    }
    if let Some(strategy) = &job.strategy {
        map.insert("strategy".into(), strategy_value(strategy)?);
    }
    if !job.env.is_empty() {
        map.insert("env".into(), string_map(job.env.iter()));
    }
    if !job.outputs.is_empty() {
        map.insert("outputs".into(), string_map(job.outputs.iter()));
    }
    let steps = job
        .steps
        .iter()
        .map(step_value)
        .collect::<Result<Vec<_>>>()?;
    map.insert("steps".into(), Value::Sequence(steps));
    Ok(Value::Mapping(map))
}

fn strategy_value(strategy: &StrategyIr) -> Result<Value> {
    let mut matrix = Mapping::new();
    for (axis, values) in &strategy.axes {
        matrix.insert(axis.as_str().into(), serde_yaml::to_value(values)?);
    }
    if !strategy.include.is_empty() {
        matrix.insert("include".into(), serde_yaml::to_value(&strategy.include)?);
    }
    if !strategy.exclude.is_empty() {
        matrix.insert("exclude".into(), serde_yaml::to_value(&strategy.exclude)?);
    }

    let mut map = Mapping::new();
    map.insert("matrix".into(), Value::Mapping(matrix));
    if let Some(fail_fast) = strategy.fail_fast {
        map.insert("fail-fast".into(), fail_fast.into());
    }
    if let Some(max_parallel) = strategy.max_parallel {
        map.insert("max-parallel".into(), max_parallel.into());
    }
    Ok(Value::Mapping(map))
}

// ═══════════════════════════════════════════════════════════════
// STEPS
// ═══════════════════════════════════════════════════════════════

fn step_value(step: &StepIr) -> Result<Value> {
    let mut map = Mapping::new();
    if let Some(name) = &step.name {
        map.insert("name".into(), name.as_str().into());
    }
    if let Some(id) = &step.id {
        map.insert("id".into(), id.as_str().into());
    }
    if let Some(condition) = &step.condition {
        map.insert("if".into(), condition.as_str().into());
    }

    let mut with = Mapping::new();
    match &step.kind {
        StepKindIr::Run { command, shell } => {
            map.insert("run".into(), command.as_str().into());
            if let Some(shell) = shell {
                map.insert("shell".into(), shell.as_str().into());
            }
        }
        StepKindIr::Uses { action, with: args } => {
            map.insert("uses".into(), action.as_str().into());
            for (key, value) in args {
                with.insert(key.as_str().into(), serde_yaml::to_value(value)?);
            }
        }
        StepKindIr::Script { action, code } => {
            map.insert("uses".into(), action.as_str().into());
            with.insert("script".into(), code.as_str().into());
        }
        StepKindIr::ClaudeCode {
            action,
            prompt,
            model,
            max_turns,
            allowed_tools,
            output_schema,
        } => {
            map.insert("uses".into(), action.as_str().into());
            with.insert("prompt".into(), prompt.as_str().into());
            if let Some(model) = model {
                with.insert("model".into(), model.as_str().into());
            }
            if let Some(turns) = max_turns {
                with.insert("max_turns".into(), (*turns).into());
            }
            if let Some(tools) = allowed_tools {
                with.insert("allowed_tools".into(), tools.as_str().into());
            }
            match output_schema {
                Some(SchemaIr::Json(schema)) => {
                    with.insert("output_schema".into(), schema.as_str().into());
                }
                Some(SchemaIr::File(path)) => {
                    with.insert("output_schema_file".into(), path.as_str().into());
                }
                None => {}
            }
            with.insert(
                "anthropic_api_key".into(),
                "${{ secrets.ANTHROPIC_API_KEY }}".into(),
            );
        }
        StepKindIr::DownloadArtifact {
            action,
            name,
            path,
            run_id,
        } => {
            map.insert("uses".into(), action.as_str().into());
            with.insert("name".into(), name.as_str().into());
            with.insert("path".into(), path.as_str().into());
            if let Some(run_id) = run_id {
                with.insert("run-id".into(), run_id.as_str().into());
                with.insert("github-token".into(), "${{ github.token }}".into());
            }
        }
        StepKindIr::UploadArtifact { action, name, path } => {
            map.insert("uses".into(), action.as_str().into());
            with.insert("name".into(), name.as_str().into());
            with.insert("path".into(), path.as_str().into());
        }
    }
    if !with.is_empty() {
        map.insert("with".into(), Value::Mapping(with));
    }
    if !step.env.is_empty() {
        map.insert("env".into(), string_map(step.env.iter()));
    }
    if step.continue_on_error {
        map.insert("continue-on-error".into(), true.into());
    }
    Ok(Value::Mapping(map))
}

fn string_map<'a>(entries: impl Iterator<Item = (&'a String, &'a String)>) -> Value {
    Value::Mapping(
        entries
            .map(|(k, v)| (k.as_str().into(), v.as_str().into()))
            .collect(),
    )
}
