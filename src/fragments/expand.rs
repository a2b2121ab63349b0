//! Fragment expansion - replace fragment uses with instantiated AST
//!
//! Job uses (`{ name, fragment, with }`) become the fragment's job under
//! the use's name, keeping the use's `needs` and `if`. Step uses
//! (`{ fragment, with }`) are spliced in place. Steps fragments may use
//! other steps fragments up to `MAX_FRAGMENT_DEPTH` levels. Fragment uses
//! inside an imported fragment resolve in the file that declared it.

use std::collections::BTreeMap;

use tracing::debug;

use crate::ast::{FragmentParam, FragmentUse, JobDecl, Span, Step, StepKind, Workflow};
use crate::diagnostic::{codes, Diagnostic};
use crate::frontend::{job_from_template, steps_from_template};
use crate::imports::FragmentScope;
use crate::util::did_you_mean;

use super::template::{substitute_value, MissingParams};

/// Nesting limit for fragments instantiating fragments
pub const MAX_FRAGMENT_DEPTH: usize = 8;

/// Expand every job and step fragment use in a workflow
pub fn expand_workflow(workflow: &Workflow, fragments: FragmentScope<'_>) -> (Workflow, Vec<Diagnostic>) {
    let mut expander = Expander {
        diagnostics: Vec::new(),
    };

    let mut expanded = workflow.clone();
    expanded.jobs = workflow
        .jobs
        .iter()
        .filter_map(|job| expander.job(job.clone(), fragments))
        .collect();
    for cycle in &mut expanded.cycles {
        cycle.body = std::mem::take(&mut cycle.body)
            .into_iter()
            .filter_map(|job| expander.job(job, fragments))
            .collect();
    }

    (expanded, expander.diagnostics)
}

struct Expander {
    diagnostics: Vec<Diagnostic>,
}

impl Expander {
    fn job(&mut self, job: JobDecl, scope: FragmentScope<'_>) -> Option<JobDecl> {
        let (mut job, declared) = match job {
            JobDecl::Fragment(usage) => self.instantiate_job(&usage, scope, 0)?,
            other => (other, scope),
        };
        if let Some(steps) = steps_mut(&mut job) {
            let taken = std::mem::take(steps);
            *steps = self.steps(taken, declared, 0);
        }
        Some(job)
    }

    /// The job plus the scope its own steps expand in
    fn instantiate_job<'a>(
        &mut self,
        usage: &FragmentUse,
        scope: FragmentScope<'a>,
        depth: usize,
    ) -> Option<(JobDecl, FragmentScope<'a>)> {
        if depth >= MAX_FRAGMENT_DEPTH {
            self.too_deep(&usage.fragment, usage.span);
            return None;
        }

        let fragments = scope.registry();
        let Some((fragment, mut declared)) = scope.job(&usage.fragment) else {
            let mut diagnostic = Diagnostic::error(
                codes::UNKNOWN_FRAGMENT,
                format!("job '{}' uses unknown job fragment '{}'", usage.name, usage.fragment),
                usage.span,
            );
            if fragments.steps.contains(&usage.fragment) {
                diagnostic = diagnostic.with_hint(format!(
                    "'{}' is a steps fragment; use it inside `steps:`",
                    usage.fragment
                ));
            } else if let Some(s) = did_you_mean(&usage.fragment, fragments.jobs.names()) {
                diagnostic = diagnostic.with_hint(format!("did you mean '{}'?", s));
            }
            self.diagnostics.push(diagnostic);
            return None;
        };

        let args = self.bind_args(&fragment.name, &fragment.params, &usage.args, usage.span)?;
        let body = self.substitute(&fragment.name, &fragment.template, &args, usage.span)?;
        let (job, diagnostics) = job_from_template(&usage.name, body);
        self.push_body_diagnostics(diagnostics, usage.span);
        let mut job = job?;

        debug!(job = %usage.name, fragment = %fragment.name, "instantiated job fragment");

        if let JobDecl::Fragment(nested) = job {
            (job, declared) = self.instantiate_job(&nested, declared, depth + 1)?;
        }
        merge_needs(&mut job, &usage.needs);
        if let Some(condition) = &usage.condition {
            set_condition(&mut job, condition.clone());
        }
        Some((job, declared))
    }

    fn steps(&mut self, steps: Vec<Step>, scope: FragmentScope<'_>, depth: usize) -> Vec<Step> {
        let mut out = Vec::with_capacity(steps.len());
        for step in steps {
            let StepKind::Fragment { fragment, args } = &step.kind else {
                out.push(step);
                continue;
            };
            if depth >= MAX_FRAGMENT_DEPTH {
                self.too_deep(fragment, step.span);
                continue;
            }
            let Some((spliced, declared)) = self.instantiate_steps(fragment, args, step.span, scope)
            else {
                continue;
            };
            for mut inner in self.steps(spliced, declared, depth + 1) {
                if inner.condition.is_none() {
                    inner.condition = step.condition.clone();
                }
                out.push(inner);
            }
        }
        out
    }

    fn instantiate_steps<'a>(
        &mut self,
        name: &str,
        args: &BTreeMap<String, String>,
        span: Span,
        scope: FragmentScope<'a>,
    ) -> Option<(Vec<Step>, FragmentScope<'a>)> {
        let fragments = scope.registry();
        let Some((fragment, declared)) = scope.steps(name) else {
            let mut diagnostic = Diagnostic::error(
                codes::UNKNOWN_FRAGMENT,
                format!("step uses unknown steps fragment '{}'", name),
                span,
            );
            if fragments.jobs.contains(name) {
                diagnostic = diagnostic.with_hint(format!(
                    "'{}' is a job fragment; use it as a job with `fragment: {}`",
                    name, name
                ));
            } else if let Some(s) = did_you_mean(name, fragments.steps.names()) {
                diagnostic = diagnostic.with_hint(format!("did you mean '{}'?", s));
            }
            self.diagnostics.push(diagnostic);
            return None;
        };

        let args = self.bind_args(&fragment.name, &fragment.params, args, span)?;
        let body = self.substitute(&fragment.name, &fragment.template, &args, span)?;
        let (steps, diagnostics) = steps_from_template(&fragment.name, body);
        let failed = diagnostics.iter().any(Diagnostic::is_error);
        self.push_body_diagnostics(diagnostics, span);
        if failed {
            return None;
        }
        Some((steps, declared))
    }

    /// Check arguments against parameters and fill in defaults
    fn bind_args(
        &mut self,
        fragment: &str,
        params: &[FragmentParam],
        args: &BTreeMap<String, String>,
        span: Span,
    ) -> Option<BTreeMap<String, String>> {
        let mut ok = true;

        for name in args.keys() {
            if !params.iter().any(|p| &p.name == name) {
                ok = false;
                let mut diagnostic = Diagnostic::error(
                    codes::UNKNOWN_FRAGMENT_ARG,
                    format!("fragment '{}' has no parameter '{}'", fragment, name),
                    span,
                );
                if let Some(s) = did_you_mean(name, params.iter().map(|p| p.name.as_str())) {
                    diagnostic = diagnostic.with_hint(format!("did you mean '{}'?", s));
                }
                self.diagnostics.push(diagnostic);
            }
        }

        let mut bound = BTreeMap::new();
        for param in params {
            match args.get(&param.name).or(param.default.as_ref()) {
                Some(value) => {
                    bound.insert(param.name.clone(), value.clone());
                }
                None => {
                    ok = false;
                    self.diagnostics.push(
                        Diagnostic::error(
                            codes::MISSING_FRAGMENT_ARG,
                            format!(
                                "fragment '{}' requires argument '{}'",
                                fragment, param.name
                            ),
                            span,
                        )
                        .with_hint(format!("pass it with `with: {{ {}: ... }}`", param.name)),
                    );
                }
            }
        }

        ok.then_some(bound)
    }

    fn substitute(
        &mut self,
        fragment: &str,
        template: &serde_yaml::Value,
        args: &BTreeMap<String, String>,
        span: Span,
    ) -> Option<serde_yaml::Value> {
        let mut missing = MissingParams::new();
        let body = substitute_value(template, args, &mut missing);
        if missing.is_empty() {
            return Some(body);
        }
        self.diagnostics.push(
            Diagnostic::error(
                codes::INVALID_FRAGMENT_BODY,
                format!(
                    "fragment '{}' references undeclared parameter(s): {}",
                    fragment,
                    missing.join(", ")
                ),
                span,
            )
            .with_hint("declare them under the fragment's `params:`"),
        );
        None
    }

    fn push_body_diagnostics(&mut self, diagnostics: Vec<Diagnostic>, span: Span) {
        self.diagnostics.extend(diagnostics.into_iter().map(|mut d| {
            if d.span.is_empty() {
                d.span = span;
            }
            d
        }));
    }

    fn too_deep(&mut self, fragment: &str, span: Span) {
        self.diagnostics.push(
            Diagnostic::error(
                codes::FRAGMENT_TOO_DEEP,
                format!(
                    "fragment '{}' nests more than {} levels deep",
                    fragment, MAX_FRAGMENT_DEPTH
                ),
                span,
            )
            .with_hint("a fragment probably uses itself"),
        );
    }
}

fn steps_mut(job: &mut JobDecl) -> Option<&mut Vec<Step>> {
    match job {
        JobDecl::Job(j) => Some(&mut j.steps),
        JobDecl::Agent(j) => Some(&mut j.steps),
        JobDecl::Matrix(m) => Some(&mut m.job.steps),
        JobDecl::Fragment(_) => None,
    }
}

fn merge_needs(job: &mut JobDecl, extra: &[String]) {
    let deps = match job {
        JobDecl::Job(j) => &mut j.needs,
        JobDecl::Agent(j) => &mut j.after,
        JobDecl::Matrix(m) => &mut m.job.needs,
        JobDecl::Fragment(f) => &mut f.needs,
    };
    for name in extra {
        if !deps.contains(name) {
            deps.push(name.clone());
        }
    }
}

fn set_condition(job: &mut JobDecl, condition: crate::ast::Condition) {
    match job {
        JobDecl::Job(j) => j.condition = Some(condition),
        JobDecl::Agent(j) => j.condition = Some(condition),
        JobDecl::Matrix(m) => m.job.condition = Some(condition),
        JobDecl::Fragment(f) => f.condition = Some(condition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::WorkflowFile;
    use crate::frontend::parse_source;
    use crate::registry::FragmentRegistryBuilder;

    fn expand(yaml: &str) -> (Workflow, Vec<Diagnostic>) {
        let parsed = parse_source("wf.yaml", yaml);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        let file: WorkflowFile = parsed.file.unwrap();
        let mut builder = FragmentRegistryBuilder::new();
        for f in &file.job_fragments {
            builder.register_job(f.clone()).unwrap();
        }
        for f in &file.steps_fragments {
            builder.register_steps(f.clone()).unwrap();
        }
        let registry = builder.freeze();
        expand_workflow(&file.workflows[0], FragmentScope::local(&registry))
    }

    const FRAGMENTS: &str = r#"
job_fragments:
  - name: lint
    params: [{ name: target, default: "." }, { name: timeout }]
    job:
      runs_on: ubuntu-latest
      timeout_minutes: "{{ params.timeout }}"
      steps:
        - fragment: setup
          with: { version: "20" }
        - run: "cargo clippy {{ params.target }}"
steps_fragments:
  - name: setup
    params: [version]
    steps:
      - uses: actions/setup-node@v4
        with: { node-version: "{{ params.version }}" }
      - run: npm ci
  - name: loop
    steps:
      - fragment: loop
"#;

    // ═══════════════════════════════════════════════════════════════
    // JOB FRAGMENTS
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_job_fragment_instantiation() {
        let yaml = format!(
            "{}workflows:\n  - name: wf\n    jobs:\n      - {{ name: build, runs_on: x }}\n      - {{ name: lint_core, fragment: lint, needs: [build], if: \"success()\", with: {{ target: core, timeout: 15 }} }}\n",
            FRAGMENTS
        );
        let (wf, diags) = expand(&yaml);
        assert!(diags.is_empty(), "{:?}", diags);

        let JobDecl::Job(job) = &wf.jobs[1] else {
            panic!("expected plain job");
        };
        assert_eq!(job.name, "lint_core");
        assert_eq!(job.needs, vec!["build"]);
        assert_eq!(job.timeout_minutes, Some(15));
        assert_eq!(job.condition.as_ref().map(|c| c.raw.as_str()), Some("success()"));
        assert_eq!(job.steps.len(), 3);
        assert!(matches!(
            &job.steps[2].kind,
            StepKind::Run { command, .. } if command == "cargo clippy core"
        ));
    }

    #[test]
    fn test_argument_errors() {
        let yaml = format!(
            "{}workflows:\n  - name: wf\n    jobs:\n      - {{ name: a, fragment: lint, with: {{ targte: x }} }}\n",
            FRAGMENTS
        );
        let (wf, diags) = expand(&yaml);
        assert!(wf.jobs.is_empty());
        let found: Vec<_> = diags.iter().map(|d| d.code).collect();
        assert_eq!(found, vec![codes::UNKNOWN_FRAGMENT_ARG, codes::MISSING_FRAGMENT_ARG]);
        assert_eq!(diags[0].hint.as_deref(), Some("did you mean 'target'?"));
    }

    #[test]
    fn test_unknown_fragment_points_at_other_namespace() {
        let yaml = format!(
            "{}workflows:\n  - name: wf\n    jobs:\n      - {{ name: a, fragment: setup }}\n",
            FRAGMENTS
        );
        let (_, diags) = expand(&yaml);
        assert_eq!(diags[0].code, codes::UNKNOWN_FRAGMENT);
        assert!(diags[0].hint.as_deref().unwrap().contains("steps fragment"));
    }

    // ═══════════════════════════════════════════════════════════════
    // STEPS FRAGMENTS
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_steps_spliced_with_condition() {
        let yaml = format!(
            "{}workflows:\n  - name: wf\n    jobs:\n      - name: build\n        runs_on: x\n        steps:\n          - {{ fragment: setup, if: \"github.event_name == 'push'\", with: {{ version: 18 }} }}\n          - run: make\n",
            FRAGMENTS
        );
        let (wf, diags) = expand(&yaml);
        assert!(diags.is_empty(), "{:?}", diags);
        let steps = wf.jobs[0].steps();
        assert_eq!(steps.len(), 3);
        assert!(steps[0].condition.is_some());
        assert!(steps[2].condition.is_none());
    }

    #[test]
    fn test_recursive_fragment_stops() {
        let yaml = format!(
            "{}workflows:\n  - name: wf\n    jobs:\n      - name: build\n        runs_on: x\n        steps:\n          - fragment: loop\n",
            FRAGMENTS
        );
        let (wf, diags) = expand(&yaml);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::FRAGMENT_TOO_DEEP);
        assert!(wf.jobs[0].steps().is_empty());
    }

    #[test]
    fn test_cycle_bodies_expanded() {
        let yaml = format!(
            "{}workflows:\n  - name: wf\n    cycles:\n      - name: c\n        max_iters: 2\n        body:\n          - {{ name: lint_all, fragment: lint, with: {{ timeout: 5 }} }}\n",
            FRAGMENTS
        );
        let (wf, diags) = expand(&yaml);
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(wf.cycles[0].body[0].name(), "lint_all");
        assert!(matches!(wf.cycles[0].body[0], JobDecl::Job(_)));
    }
}
