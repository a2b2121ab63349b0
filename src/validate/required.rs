//! Required fields: `runs_on` on every job, at least one job or cycle

use crate::ast::{JobDecl, Workflow};
use crate::diagnostic::{codes, Diagnostic};

use super::all_jobs;

pub fn validate_required(workflow: &Workflow) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if workflow.jobs.is_empty() && workflow.cycles.is_empty() {
        diagnostics.push(
            Diagnostic::warning(
                codes::EMPTY_WORKFLOW,
                format!("workflow '{}' has no jobs or cycles", workflow.name),
                workflow.span,
            )
            .with_hint("the compiled workflow will not do anything"),
        );
    }

    for (job, _) in all_jobs(workflow) {
        if job.runs_on().is_some() {
            continue;
        }
        let diagnostic = match job {
            JobDecl::Job(_) | JobDecl::Matrix(_) => Diagnostic::error(
                codes::JOB_MISSING_RUNS_ON,
                format!("job '{}' is missing `runs_on`", job.name()),
                job.span(),
            ),
            JobDecl::Agent(_) => Diagnostic::error(
                codes::AGENT_JOB_MISSING_RUNS_ON,
                format!("agent job '{}' is missing `runs_on`", job.name()),
                job.span(),
            ),
            // Replaced during expansion
            JobDecl::Fragment(_) => continue,
        };
        diagnostics.push(diagnostic.with_hint("add `runs_on: ubuntu-latest` or a runner label"));
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use crate::frontend::parse_source;

    fn check(yaml: &str) -> Vec<Diagnostic> {
        let file = parse_source("wf.yaml", yaml).file.unwrap();
        validate_required(&file.workflows[0])
    }

    #[test]
    fn test_distinct_codes_per_job_kind() {
        let diags = check(
            r#"
workflows:
  - name: wf
    jobs:
      - { name: build }
      - { name: review, kind: agent_job }
      - { name: grid, matrix: { axes: { a: [1] } } }
      - { name: ok, runs_on: ubuntu-latest }
"#,
        );
        let found: Vec<_> = diags.iter().map(|d| d.code).collect();
        assert_eq!(
            found,
            vec![
                codes::JOB_MISSING_RUNS_ON,
                codes::AGENT_JOB_MISSING_RUNS_ON,
                codes::JOB_MISSING_RUNS_ON
            ]
        );
    }

    #[test]
    fn test_empty_workflow_is_warning() {
        let diags = check("workflows:\n  - name: wf\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::EMPTY_WORKFLOW);
        assert_eq!(diags[0].severity, Severity::Warning);
    }
}
