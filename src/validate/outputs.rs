//! Outputs: duplicate declarations and `needs.<job>.outputs.<name>` references
//!
//! A reference is valid only when the referenced job is a direct
//! dependency of the referencing job and declares the output. A cycle
//! exposes its loop outputs (`termination_reason`, `continue`, `iteration`).

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;

use crate::ast::{JobDecl, Workflow};
use crate::diagnostic::{codes, Diagnostic};
use crate::lower::CYCLE_OUTPUTS;

use super::all_jobs;

/// `needs.<job>.outputs.<name>` inside free text
static OUTPUT_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"needs\.([A-Za-z_][A-Za-z0-9_-]*)\.outputs\.([A-Za-z_][A-Za-z0-9_-]*)")
        .expect("valid regex")
});

pub fn validate_outputs(workflow: &Workflow) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (job, _) in all_jobs(workflow) {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for output in job.outputs() {
            if !seen.insert(&output.name) {
                diagnostics.push(Diagnostic::error(
                    codes::DUPLICATE_OUTPUT,
                    format!("job '{}' declares output '{}' more than once", job.name(), output.name),
                    output.span,
                ));
            }
        }

        for text in job_texts(job) {
            for caps in OUTPUT_REF.captures_iter(text) {
                let (target, output) = (&caps[1], &caps[2]);
                if let Some(diagnostic) = check_reference(workflow, job, target, output) {
                    diagnostics.push(diagnostic);
                }
            }
        }
    }

    diagnostics
}

fn check_reference(
    workflow: &Workflow,
    job: &JobDecl,
    target: &str,
    output: &str,
) -> Option<Diagnostic> {
    let available: Vec<&str> = if let Some(target_job) = workflow.find_job(target) {
        target_job.outputs().iter().map(|o| o.name.as_str()).collect()
    } else if workflow.find_cycle(target).is_some() {
        CYCLE_OUTPUTS.to_vec()
    } else {
        // Unknown jobs are reported by the job graph pass
        return None;
    };

    if !job.dependencies().iter().any(|d| d == target) {
        return Some(
            Diagnostic::error(
                codes::OUTPUT_NOT_NEEDED,
                format!(
                    "job '{}' reads needs.{}.outputs.{} but does not depend on '{}'",
                    job.name(),
                    target,
                    output,
                    target
                ),
                job.span(),
            )
            .with_hint(format!("add '{}' to the job's `needs`", target)),
        );
    }

    if available.contains(&output) {
        return None;
    }

    let hint = if available.is_empty() {
        format!("job '{}' has no outputs", target)
    } else {
        format!("job '{}' declares outputs: {}", target, available.join(", "))
    };
    Some(
        Diagnostic::error(
            codes::UNKNOWN_OUTPUT,
            format!(
                "job '{}' reads unknown output '{}' of job '{}'",
                job.name(),
                output,
                target
            ),
            job.span(),
        )
        .with_hint(hint),
    )
}

/// Free text of a job that may carry output references
fn job_texts(job: &JobDecl) -> Vec<&str> {
    let mut texts: Vec<&str> = Vec::new();
    if let Some(condition) = job.condition() {
        texts.push(&condition.raw);
    }
    let env = match job {
        JobDecl::Job(j) => Some(&j.env),
        JobDecl::Agent(j) => Some(&j.env),
        JobDecl::Matrix(m) => Some(&m.job.env),
        JobDecl::Fragment(_) => None,
    };
    if let Some(env) = env {
        texts.extend(env.values().map(String::as_str));
    }
    texts.extend(job.outputs().iter().map(|o| o.value.as_str()));
    for step in job.steps() {
        texts.extend(step.texts());
    }
    texts
}
