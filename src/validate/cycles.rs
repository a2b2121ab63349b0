//! Cycle termination safety

use crate::ast::Workflow;
use crate::diagnostic::{codes, Diagnostic};

pub fn validate_cycles(workflow: &Workflow) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for cycle in &workflow.cycles {
        match (cycle.max_iters, cycle.until.is_some()) {
            (Some(0), _) => diagnostics.push(
                Diagnostic::error(
                    codes::ZERO_MAX_ITERS,
                    format!("cycle '{}' has max_iters: 0 and would never run", cycle.name),
                    cycle.span,
                )
                .with_hint("use max_iters: 1 or more"),
            ),
            (None, true) => diagnostics.push(
                Diagnostic::warning(
                    codes::UNBOUNDED_CYCLE,
                    format!(
                        "cycle '{}' stops only when its `until` guard holds",
                        cycle.name
                    ),
                    cycle.span,
                )
                .with_hint("add max_iters to bound the number of re-dispatched runs"),
            ),
            (None, false) => diagnostics.push(
                Diagnostic::warning(
                    codes::UNBOUNDED_CYCLE,
                    format!(
                        "cycle '{}' has neither max_iters nor until and never stops on its own",
                        cycle.name
                    ),
                    cycle.span,
                )
                .with_hint("add max_iters or an `until` guard"),
            ),
            _ => {}
        }

        if cycle.body.is_empty() {
            diagnostics.push(Diagnostic::error(
                codes::EMPTY_CYCLE_BODY,
                format!("cycle '{}' has no body jobs", cycle.name),
                cycle.span,
            ));
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use crate::frontend::parse_source;

    fn check(cycle: &str) -> Vec<Diagnostic> {
        let yaml = format!("workflows:\n  - name: wf\n    cycles:\n      - {}\n", cycle);
        let file = parse_source("wf.yaml", &yaml).file.unwrap();
        validate_cycles(&file.workflows[0])
    }

    #[test]
    fn test_until_without_bound_warns() {
        let diags = check(r#"{ name: c, until: "true", body: [{ name: j }] }"#);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::UNBOUNDED_CYCLE);
        assert_eq!(diags[0].severity, Severity::Warning);
    }

    #[test]
    fn test_bounded_cycles_are_silent() {
        assert!(check("{ name: c, max_iters: 3, body: [{ name: j }] }").is_empty());
        assert!(check(r#"{ name: c, max_iters: 3, until: "x", body: [{ name: j }] }"#).is_empty());
    }

    #[test]
    fn test_zero_bound_and_empty_body_are_errors() {
        let diags = check("{ name: c, max_iters: 0, body: [] }");
        let found: Vec<_> = diags.iter().map(|d| d.code).collect();
        assert_eq!(found, vec![codes::ZERO_MAX_ITERS, codes::EMPTY_CYCLE_BODY]);
    }

    #[test]
    fn test_cycle_without_any_stop_warns() {
        let diags = check("{ name: c, body: [{ name: j }] }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert!(diags[0].message.contains("never stops"));
    }
}
