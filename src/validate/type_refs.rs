//! Type references resolve in the file's registry

use crate::ast::{OutputSchema, StepKind, Workflow, WorkflowFile};
use crate::diagnostic::{codes, Diagnostic};
use crate::registry::TypeRegistry;
use crate::util::did_you_mean;

use super::all_jobs;

/// References inside the file's own type declarations
pub fn validate_declaration_refs(file: &WorkflowFile, types: &TypeRegistry) -> Vec<Diagnostic> {
    file.types
        .iter()
        .flat_map(|decl| decl.fields.iter())
        .flat_map(|field| types.resolve(&field.ty))
        .map(|d| d.in_file(&file.path))
        .collect()
}

/// Typed outputs and agent output schemas of a workflow
pub fn validate_workflow_refs(workflow: &Workflow, types: &TypeRegistry) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (job, _) in all_jobs(workflow) {
        for output in job.outputs() {
            if let Some(ty) = &output.ty {
                diagnostics.extend(types.resolve(ty));
            }
        }
        for step in job.steps() {
            let StepKind::AgentTask(task) = &step.kind else {
                continue;
            };
            match &task.output_schema {
                Some(OutputSchema::TypeName { name, span }) if !types.contains(name) => {
                    let mut diagnostic = Diagnostic::error(
                        codes::UNRESOLVED_TYPE,
                        format!("agent output schema names unknown type '{}'", name),
                        *span,
                    );
                    if let Some(s) = did_you_mean(name, types.names()) {
                        diagnostic = diagnostic.with_hint(format!("did you mean '{}'?", s));
                    }
                    diagnostics.push(diagnostic);
                }
                Some(OutputSchema::Inline(ty)) => diagnostics.extend(types.resolve(ty)),
                _ => {}
            }
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parse_source;
    use crate::registry::TypeRegistryBuilder;

    #[test]
    fn test_unresolved_references_reported() {
        let yaml = r#"
types:
  - name: Finding
    fields:
      - { name: notes, type: "Note[]" }
workflows:
  - name: wf
    jobs:
      - name: review
        kind: agent_job
        runs_on: x
        steps:
          - agent_task: { prompt: a, output_schema: Findng }
          - agent_task: { prompt: b, output_schema: "{ items: Finding[], extra: Extra }" }
          - agent_task: { prompt: c, output_schema: ./schemas/out.json }
"#;
        let file = parse_source("wf.yaml", yaml).file.unwrap();
        let mut builder = TypeRegistryBuilder::for_types();
        for decl in &file.types {
            builder.register(decl.clone()).unwrap();
        }
        let types = builder.freeze();

        let decl_diags = validate_declaration_refs(&file, &types);
        assert_eq!(decl_diags.len(), 1);
        assert!(decl_diags[0].message.contains("'Note'"));

        let wf_diags = validate_workflow_refs(&file.workflows[0], &types);
        assert_eq!(wf_diags.len(), 2);
        assert_eq!(wf_diags[0].hint.as_deref(), Some("did you mean 'Finding'?"));
        assert!(wf_diags[1].message.contains("'Extra'"));
    }
}
