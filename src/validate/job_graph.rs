//! Job graph: duplicate names, unknown dependencies, dependency cycles

use rustc_hash::FxHashSet;

use crate::ast::{Span, Workflow};
use crate::dag::JobGraph;
use crate::diagnostic::{codes, Diagnostic};
use crate::util::did_you_mean;

use super::all_jobs;

pub fn validate_job_graph(workflow: &Workflow) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    // Jobs, cycles and cycle bodies share one namespace
    let mut names: Vec<(&str, Span)> = Vec::new();
    for job in &workflow.jobs {
        names.push((job.name(), job.span()));
    }
    for cycle in &workflow.cycles {
        names.push((&cycle.name, cycle.span));
        for job in &cycle.body {
            names.push((job.name(), job.span()));
        }
    }

    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for &(name, span) in &names {
        if !seen.insert(name) {
            diagnostics.push(
                Diagnostic::error(
                    codes::DUPLICATE_JOB,
                    format!("duplicate job name '{}'", name),
                    span,
                )
                .with_hint("job, cycle and cycle body names must be unique within a workflow"),
            );
        }
    }

    for (job, _) in all_jobs(workflow) {
        for dep in job.dependencies() {
            if seen.contains(dep.as_str()) {
                continue;
            }
            let mut diagnostic = Diagnostic::error(
                codes::UNKNOWN_DEPENDENCY,
                format!("job '{}' depends on unknown job '{}'", job.name(), dep),
                job.span(),
            );
            if let Some(suggestion) = did_you_mean(dep, names.iter().map(|(n, _)| *n)) {
                diagnostic = diagnostic.with_hint(format!("did you mean '{}'?", suggestion));
            }
            diagnostics.push(diagnostic);
        }
    }

    if let Err(cycle) = JobGraph::from_workflow(workflow).detect_cycles() {
        let span = cycle
            .first()
            .and_then(|first| names.iter().find(|(n, _)| n == first))
            .map(|(_, s)| *s)
            .unwrap_or_default();
        diagnostics.push(
            Diagnostic::error(
                codes::JOB_CYCLE,
                format!("dependency cycle between jobs: {}", cycle.join(" → ")),
                span,
            )
            .with_hint("remove one of the `needs`/`after` edges on this path"),
        );
    }

    diagnostics
}
