//! Cycle lowering properties over the full pipeline

mod common;

use common::{build_ir, REVIEW_PIPELINE};
use gantry::ir::{JobIr, StepKindIr};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn cycle_source(max_iters: Option<u32>, until: Option<&str>) -> String {
    let mut cycle = String::from("      - name: polish\n");
    if let Some(n) = max_iters {
        cycle.push_str(&format!("        max_iters: {}\n", n));
    }
    if let Some(guard) = until {
        cycle.push_str(&format!("        until: \"{}\"\n", guard));
    }
    cycle.push_str(
        "        body:\n          - { name: draft, runs_on: x, steps: [{ run: ./draft.sh }] }\n",
    );
    format!(
        "workflows:\n  - name: docs\n    on: push\n    cycles:\n{}",
        cycle
    )
}

fn decide_script(job: &JobIr) -> &str {
    job.steps
        .iter()
        .find_map(|s| match &s.kind {
            StepKindIr::Script { code, .. } => Some(code.as_str()),
            _ => None,
        })
        .expect("decide job runs a script")
}

// ============================================================================
// Fixed shapes
// ============================================================================

#[test]
fn test_cycle_jobs_are_wired_in_order() {
    let ir = build_ir(REVIEW_PIPELINE);
    let review = ir.job("refine_body_review").unwrap();
    assert_eq!(review.needs, vec!["refine_hydrate".to_string()]);
    let fix = ir.job("refine_body_fix").unwrap();
    assert_eq!(
        fix.needs,
        vec!["refine_hydrate".to_string(), "refine_body_review".to_string()]
    );
    let decide = ir.job("refine_decide").unwrap();
    assert_eq!(
        decide.needs,
        vec![
            "refine_body_review".to_string(),
            "refine_body_fix".to_string(),
            "refine_hydrate".to_string()
        ]
    );
    let dispatch = ir.job("refine_dispatch").unwrap();
    assert_eq!(dispatch.permissions.get("actions").map(String::as_str), Some("write"));
}

#[test]
fn test_downstream_job_waits_for_cycle_exit() {
    let ir = build_ir(REVIEW_PIPELINE);
    let publish = ir.job("publish").unwrap();
    assert_eq!(publish.needs, vec!["refine_decide".to_string()]);
    assert_eq!(
        publish.condition.as_deref(),
        Some("needs.refine_decide.outputs.continue != 'true'")
    );
}

#[test]
fn test_decide_sees_guarded_job_and_survives_skipped_terminal() {
    // `until` reads `review`, which is not terminal; `fix` is skipped
    // exactly when the guard holds
    let ir = build_ir(REVIEW_PIPELINE);
    let fix = ir.job("refine_body_fix").unwrap();
    assert!(fix.condition.is_some());
    let decide = ir.job("refine_decide").unwrap();
    assert!(decide.needs.contains(&"refine_body_review".to_string()));
    let condition = decide.condition.as_deref().unwrap();
    assert!(condition.contains("needs.refine_hydrate.result == 'success'"));
    assert!(condition.contains("!cancelled()"));
    assert!(!condition.contains("refine_body_fix"));
}

#[test]
fn test_guard_outputs_are_unprefixed_in_decide_script() {
    let ir = build_ir(REVIEW_PIPELINE);
    let script = decide_script(ir.job("refine_decide").unwrap());
    assert!(script.contains("ctx.outputs.review.approved === 'true'"));
    assert!(script.contains("guard_satisfied"));
    assert!(script.contains("max_iterations"));
}

#[test]
fn test_dispatch_trigger_gains_cycle_inputs() {
    let ir = build_ir(&cycle_source(Some(2), None));
    let dispatch = ir.on.workflow_dispatch.as_ref().unwrap();
    let names: Vec<&str> = dispatch.inputs.iter().map(|i| i.name.as_str()).collect();
    assert!(names.contains(&"polish_iteration"));
    assert!(names.contains(&"state_run_id"));
    assert_eq!(ir.on.events[0].name, "push");
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_bound_appears_in_dispatch_condition(n in 1u32..500) {
        let ir = build_ir(&cycle_source(Some(n), None));
        let dispatch = ir.job("polish_dispatch").unwrap();
        let condition = dispatch.condition.as_deref().unwrap();
        let bound = format!("< {}", n);
        prop_assert!(condition.ends_with(&bound));
        prop_assert!(decide_script(ir.job("polish_decide").unwrap()).contains("max_iterations"));
    }

    #[test]
    fn prop_unbounded_guard_never_mentions_max_iterations(threshold in 1u32..100) {
        let guard = format!("ctx.iteration >= {}", threshold);
        let ir = build_ir(&cycle_source(None, Some(&guard)));
        let script = decide_script(ir.job("polish_decide").unwrap());
        prop_assert!(!script.contains("max_iterations"));
        prop_assert!(script.contains(&guard));
        let dispatch = ir.job("polish_dispatch").unwrap();
        prop_assert!(!dispatch.condition.as_deref().unwrap().contains("fromJSON"));
    }
}
