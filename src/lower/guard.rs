//! Decide-job script generation
//!
//! The `until` guard is opaque JavaScript. It runs inside the script
//! action after a small helper preamble, with `ctx` rebuilt from the
//! outputs of the body jobs and the state of the previous run.

use crate::ast::Cycle;

/// Helpers available to guard expressions as `gantry.*`
pub const GUARD_PREAMBLE: &str = r#"const gantry = {
  hasLabel: (name) => ((context.payload.pull_request || context.payload.issue || {}).labels || []).some((l) => l.name === name),
  branch: () => process.env.GITHUB_HEAD_REF || process.env.GITHUB_REF_NAME || '',
  onBranch: (name) => gantry.branch() === name,
  actor: () => context.actor,
  isActor: (name) => context.actor === name,
};
"#;

/// Body of the guard function
///
/// Expressions are wrapped in `return (...)`; snippets that already
/// return are used as written.
pub fn guard_body(until: &str) -> String {
    let trimmed = until.trim().trim_end_matches(';');
    if contains_return(trimmed) {
        until.trim().to_string()
    } else {
        format!("return ({});", trimmed)
    }
}

fn contains_return(code: &str) -> bool {
    code.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
        .any(|word| word == "return")
}

/// Full decide script for one cycle
pub fn decide_script(cycle: &Cycle, body_prefix: &str, state_path: &str) -> String {
    let mut script = String::with_capacity(2048);
    script.push_str(GUARD_PREAMBLE);
    script.push_str("const fs = require('fs');\n");
    script.push_str("const path = require('path');\n");
    script.push_str("const needs = JSON.parse(process.env.GANTRY_NEEDS || '{}');\n");
    script.push_str("const iteration = Number(process.env.GANTRY_ITERATION || '0') + 1;\n");
    script.push_str("const ctx = {\n");
    script.push_str("  iteration,\n");
    match cycle.max_iters {
        Some(n) => script.push_str(&format!("  maxIters: {},\n", n)),
        None => script.push_str("  maxIters: null,\n"),
    }
    script.push_str("  previous: JSON.parse(process.env.GANTRY_PREVIOUS || '{}'),\n");
    script.push_str(&format!(
        "  outputs: Object.fromEntries(Object.entries(needs).map(([id, job]) => [id.replace(/^{}/, ''), job.outputs || {{}}])),\n",
        body_prefix
    ));
    script.push_str("  event: context.payload,\n");
    script.push_str("};\n");

    script.push_str("let reason = 'continue';\n");
    let mut branch = "if";
    if let Some(until) = &cycle.until {
        script.push_str("const guard = (ctx, gantry) => {\n");
        for line in guard_body(until).lines() {
            script.push_str("  ");
            script.push_str(line);
            script.push('\n');
        }
        script.push_str("};\n");
        script.push_str("if (guard(ctx, gantry)) {\n  reason = 'guard_satisfied';\n}");
        branch = " else if";
    }
    if let Some(n) = cycle.max_iters {
        script.push_str(&format!(
            "{} (iteration >= {}) {{\n  reason = 'max_iterations';\n}}",
            branch, n
        ));
    }
    if cycle.until.is_some() || cycle.max_iters.is_some() {
        script.push('\n');
    }

    script.push_str("const proceed = reason === 'continue';\n");
    script.push_str("core.setOutput('termination_reason', reason);\n");
    script.push_str("core.setOutput('continue', String(proceed));\n");
    script.push_str("core.setOutput('iteration', String(iteration));\n");
    script.push_str(&format!("fs.mkdirSync('{}', {{ recursive: true }});\n", state_path));
    script.push_str(&format!(
        "fs.writeFileSync(path.join('{}', 'state.json'), JSON.stringify({{ cycle: '{}', iteration, termination_reason: reason, continue: proceed }}));\n",
        state_path, cycle.name
    ));
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    fn cycle(max_iters: Option<u32>, until: Option<&str>) -> Cycle {
        Cycle {
            name: "refine".into(),
            max_iters,
            key: None,
            until: until.map(str::to_string),
            body: vec![],
            span: Span::default(),
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // GUARD WRAPPING
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_expression_guard_is_wrapped() {
        assert_eq!(
            guard_body("ctx.outputs.review.approved === 'true'"),
            "return (ctx.outputs.review.approved === 'true');"
        );
    }

    #[test]
    fn test_statement_guard_kept() {
        let body = "if (ctx.iteration > 2) { return true; }\nreturn false;";
        assert_eq!(guard_body(body), body);
    }

    #[test]
    fn test_return_inside_identifier_is_not_a_return() {
        assert_eq!(guard_body("ctx.returned"), "return (ctx.returned);");
    }

    // ═══════════════════════════════════════════════════════════════
    // TERMINATION REASONS
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_bounded_without_guard() {
        let script = decide_script(&cycle(Some(3), None), "refine_body_", ".gantry/state/refine");
        assert!(script.contains("if (iteration >= 3)"));
        assert!(script.contains("'max_iterations'"));
        assert!(!script.contains("guard_satisfied"));
    }

    #[test]
    fn test_guard_without_bound_never_hits_max() {
        let script = decide_script(&cycle(None, Some("true")), "refine_body_", ".gantry/state/refine");
        assert!(script.contains("reason = 'guard_satisfied'"));
        assert!(!script.contains("max_iterations"));
    }

    #[test]
    fn test_guard_and_bound_chain() {
        let script = decide_script(&cycle(Some(5), Some("false")), "refine_body_", "s/refine");
        assert!(script.contains("} else if (iteration >= 5) {"));
        assert!(script.contains("fs.mkdirSync('s/refine'"));
        assert!(script.starts_with("const gantry = {"));
    }
}
