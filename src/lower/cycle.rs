//! Cycle lowering
//!
//! The platform's job graph is acyclic, so a cycle `C` runs one iteration
//! per workflow run and re-dispatches the workflow for the next one:
//!
//! ```text
//! C_hydrate ──▶ C_body_<J>... ──▶ C_decide ──▶ C_dispatch ──▶ (next run)
//!      │                              ▲             ▲
//!      └──────────────────────────────┴─────────────┘
//! ```
//!
//! State crosses runs as an artifact uploaded by `C_decide` and fetched by
//! the next run's `C_hydrate` through the `state_run_id` input.

use tracing::debug;

use crate::ast::Cycle;
use crate::ir::{JobIr, StepIr, StepKindIr};

use super::guard::decide_script;
use super::{lower_job, LowerContext, Renames, DEFAULT_RUNNER};

/// Dispatch input carrying the run id that holds the previous state
pub const STATE_RUN_INPUT: &str = "state_run_id";

pub fn hydrate_id(cycle: &str) -> String {
    format!("{}_hydrate", cycle)
}

pub fn body_id(cycle: &str, job: &str) -> String {
    format!("{}_body_{}", cycle, job)
}

pub fn decide_id(cycle: &str) -> String {
    format!("{}_decide", cycle)
}

pub fn dispatch_id(cycle: &str) -> String {
    format!("{}_dispatch", cycle)
}

/// Dispatch input carrying the cycle's iteration counter
pub fn iteration_input(cycle: &str) -> String {
    format!("{}_iteration", cycle)
}

/// Lower one cycle to its hydrate, body, decide and dispatch jobs
pub fn lower_cycle(cycle: &Cycle, renames: &Renames, ctx: &LowerContext<'_>) -> Vec<JobIr> {
    let hydrate = hydrate(cycle, ctx);
    let hydrate_ref = hydrate.id.clone();

    let mut jobs = vec![hydrate];
    for job in &cycle.body {
        let Some(mut body) = lower_job(job, body_id(&cycle.name, job.name()), renames, ctx) else {
            continue;
        };
        body.needs.retain(|n| n != &hydrate_ref);
        body.needs.insert(0, hydrate_ref.clone());
        body.env.insert(
            "CYCLE_ITERATION".into(),
            format!("${{{{ needs.{}.outputs.iteration }}}}", hydrate_ref),
        );
        jobs.push(body);
    }

    let body: Vec<String> = jobs[1..].iter().map(|job| job.id.clone()).collect();
    jobs.push(decide(cycle, &body, ctx));
    jobs.push(dispatch(cycle));
    for job in &mut jobs {
        if job.span.is_empty() {
            job.span = cycle.span;
        }
    }

    debug!(cycle = %cycle.name, body = body.len(), "lowered cycle");
    jobs
}

fn hydrate(cycle: &Cycle, ctx: &LowerContext<'_>) -> JobIr {
    let input = iteration_input(&cycle.name);
    let state_path = ctx.cycles.state_path(&cycle.name);

    let mut job = JobIr::new(hydrate_id(&cycle.name), DEFAULT_RUNNER);
    // Re-dispatched runs of another cycle leave this one idle
    job.condition = Some(format!(
        "inputs.{} == '' || inputs.{} != ''",
        STATE_RUN_INPUT, input
    ));
    job.outputs.insert(
        "iteration".into(),
        "${{ steps.state.outputs.iteration }}".into(),
    );
    job.outputs
        .insert("phase".into(), "${{ steps.state.outputs.phase }}".into());
    job.outputs
        .insert("state".into(), "${{ steps.state.outputs.state }}".into());

    let mut download = StepIr::new(StepKindIr::DownloadArtifact {
        action: ctx.actions.download_artifact.clone(),
        name: ctx.cycles.artifact_name(&cycle.name),
        path: state_path.clone(),
        run_id: Some(format!("${{{{ inputs.{} }}}}", STATE_RUN_INPUT)),
    })
    .named("Download cycle state")
    .when(format!("inputs.{} != ''", STATE_RUN_INPUT));
    download.continue_on_error = true;
    job.steps.push(download);

    let script = format!(
        r#"iteration="${{{{ inputs.{input} }}}}"
if [ -z "$iteration" ]; then
  iteration=0
fi
if [ "$iteration" = "0" ]; then
  phase=initial
else
  phase=continue
fi
state='{{}}'
if [ -f "{path}/state.json" ]; then
  state="$(tr -d '\n' < "{path}/state.json")"
fi
echo "iteration=$iteration" >> "$GITHUB_OUTPUT"
echo "phase=$phase" >> "$GITHUB_OUTPUT"
echo "state=$state" >> "$GITHUB_OUTPUT"
"#,
        input = input,
        path = state_path,
    );
    job.steps.push(
        StepIr::new(StepKindIr::Run {
            command: script,
            shell: Some("bash".into()),
        })
        .named("Read cycle state")
        .with_id("state"),
    );
    job
}

/// The guard reads `ctx.outputs` from `needs`, so decide needs every body
/// job, not only the terminal ones. Body jobs skipped by their own `if`
/// must not skip the decision.
fn decide(cycle: &Cycle, body: &[String], ctx: &LowerContext<'_>) -> JobIr {
    let hydrate = hydrate_id(&cycle.name);
    let state_path = ctx.cycles.state_path(&cycle.name);

    let mut job = JobIr::new(decide_id(&cycle.name), DEFAULT_RUNNER);
    for id in body {
        job.need(id.clone());
    }
    job.need(hydrate.clone());
    job.condition = Some(format!(
        "needs.{}.result == 'success' && !cancelled()",
        hydrate
    ));
    for output in super::CYCLE_OUTPUTS {
        job.outputs.insert(
            (*output).to_string(),
            format!("${{{{ steps.decide.outputs.{} }}}}", output),
        );
    }

    let body_prefix = format!("{}_body_", cycle.name);
    let mut step = StepIr::new(StepKindIr::Script {
        action: ctx.actions.github_script.clone(),
        code: decide_script(cycle, &body_prefix, &state_path),
    })
    .named("Decide whether to continue")
    .with_id("decide");
    step.env
        .insert("GANTRY_NEEDS".into(), "${{ toJSON(needs) }}".into());
    step.env.insert(
        "GANTRY_ITERATION".into(),
        format!("${{{{ needs.{}.outputs.iteration }}}}", hydrate),
    );
    step.env.insert(
        "GANTRY_PREVIOUS".into(),
        format!("${{{{ needs.{}.outputs.state }}}}", hydrate),
    );
    job.steps.push(step);

    job.steps.push(
        StepIr::new(StepKindIr::UploadArtifact {
            action: ctx.actions.upload_artifact.clone(),
            name: ctx.cycles.artifact_name(&cycle.name),
            path: state_path,
        })
        .named("Upload cycle state"),
    );
    job
}

fn dispatch(cycle: &Cycle) -> JobIr {
    let decide = decide_id(&cycle.name);
    let mut job = JobIr::new(dispatch_id(&cycle.name), DEFAULT_RUNNER);
    job.need(decide.clone());
    job.need(hydrate_id(&cycle.name));

    let proceed = format!("needs.{}.outputs.continue == 'true'", decide);
    job.condition = Some(match cycle.max_iters {
        Some(n) => format!(
            "{} && fromJSON(needs.{}.outputs.iteration) < {}",
            proceed, decide, n
        ),
        None => proceed,
    });
    job.permissions.insert("actions".into(), "write".into());

    let mut step = StepIr::new(StepKindIr::Run {
        command: format!(
            "gh workflow run \"${{{{ github.workflow }}}}\" --repo \"${{{{ github.repository }}}}\" --ref \"${{{{ github.ref_name }}}}\" -f {}=${{{{ needs.{}.outputs.iteration }}}} -f {}=${{{{ github.run_id }}}}",
            iteration_input(&cycle.name),
            decide,
            STATE_RUN_INPUT,
        ),
        shell: None,
    })
    .named("Dispatch next iteration");
    step.env
        .insert("GH_TOKEN".into(), "${{ github.token }}".into());
    job.steps.push(step);
    job
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActionRefs, CycleSettings};
    use crate::frontend::parse_source;
    use crate::imports::TypeScope;
    use crate::registry::TypeRegistryBuilder;

    fn lower(cycle_yaml: &str) -> Vec<JobIr> {
        let yaml = format!("workflows:\n  - name: wf\n    cycles:\n      - {}\n", cycle_yaml);
        let workflow = parse_source("wf.yaml", &yaml).file.unwrap().workflows.remove(0);
        let types = TypeRegistryBuilder::for_types().freeze();
        let actions = ActionRefs::default();
        let cycles = CycleSettings::default();
        let ctx = LowerContext {
            actions: &actions,
            cycles: &cycles,
            types: TypeScope::local(&types),
        };
        lower_cycle(&workflow.cycles[0], &Renames::for_workflow(&workflow), &ctx)
    }

    const BODY: &str = r#"body:
          - name: draft
            runs_on: ubuntu-latest
            outputs: [{ name: text, value: "${{ steps.d.outputs.text }}" }]
            steps: [{ run: draft }]
          - name: review
            runs_on: ubuntu-latest
            needs: [draft]
            steps: [{ run: "review ${{ needs.draft.outputs.text }}" }]"#;

    fn ids(jobs: &[JobIr]) -> Vec<&str> {
        jobs.iter().map(|j| j.id.as_str()).collect()
    }

    // ═══════════════════════════════════════════════════════════════
    // SHAPE
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_job_ids_and_order() {
        let jobs = lower(&format!("name: refine\n        max_iters: 3\n        {}", BODY));
        assert_eq!(
            ids(&jobs),
            vec![
                "refine_hydrate",
                "refine_body_draft",
                "refine_body_review",
                "refine_decide",
                "refine_dispatch"
            ]
        );
    }

    #[test]
    fn test_body_keeps_internal_order_and_rewrites_refs() {
        let jobs = lower(&format!("name: refine\n        max_iters: 3\n        {}", BODY));
        let review = &jobs[2];
        assert_eq!(review.needs, vec!["refine_hydrate", "refine_body_draft"]);
        assert!(matches!(
            &review.steps[0].kind,
            StepKindIr::Run { command, .. }
                if command == "review ${{ needs.refine_body_draft.outputs.text }}"
        ));
        assert_eq!(
            review.env.get("CYCLE_ITERATION").map(String::as_str),
            Some("${{ needs.refine_hydrate.outputs.iteration }}")
        );
    }

    #[test]
    fn test_decide_needs_every_body_job() {
        let jobs = lower(&format!("name: refine\n        max_iters: 3\n        {}", BODY));
        let decide = &jobs[3];
        assert_eq!(
            decide.needs,
            vec!["refine_body_draft", "refine_body_review", "refine_hydrate"]
        );
        assert_eq!(
            decide.condition.as_deref(),
            Some("needs.refine_hydrate.result == 'success' && !cancelled()")
        );
        let keys: Vec<_> = decide.outputs.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["continue", "iteration", "termination_reason"]);
    }

    // ═══════════════════════════════════════════════════════════════
    // DISPATCH CONDITION
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_bounded_dispatch_checks_bound() {
        let jobs = lower(&format!("name: refine\n        max_iters: 7\n        {}", BODY));
        let dispatch = jobs.last().unwrap();
        assert_eq!(dispatch.needs, vec!["refine_decide", "refine_hydrate"]);
        let condition = dispatch.condition.as_deref().unwrap();
        assert!(condition.contains("< 7"));
        assert_eq!(dispatch.permissions.get("actions").map(String::as_str), Some("write"));
    }

    #[test]
    fn test_guarded_dispatch_has_no_bound() {
        let jobs = lower(&format!(
            "name: refine\n        until: \"ctx.outputs.review.ok === 'true'\"\n        {}",
            BODY
        ));
        let dispatch = jobs.last().unwrap();
        assert_eq!(
            dispatch.condition.as_deref(),
            Some("needs.refine_decide.outputs.continue == 'true'")
        );
        let StepKindIr::Script { code, .. } = &jobs[3].steps[0].kind else {
            panic!("expected decide script");
        };
        assert!(code.contains("guard_satisfied"));
        assert!(!code.contains("max_iterations"));
    }

    #[test]
    fn test_state_round_trip_names_match() {
        let jobs = lower(&format!("name: refine\n        max_iters: 2\n        {}", BODY));
        let StepKindIr::DownloadArtifact { name: down, run_id, .. } = &jobs[0].steps[0].kind else {
            panic!("expected download");
        };
        let StepKindIr::UploadArtifact { name: up, .. } = &jobs[3].steps[1].kind else {
            panic!("expected upload");
        };
        assert_eq!(down, up);
        assert_eq!(down, "refine-state");
        assert_eq!(run_id.as_deref(), Some("${{ inputs.state_run_id }}"));
        assert!(jobs[0].steps[0].continue_on_error);
    }
}
