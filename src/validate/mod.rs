//! Semantic validators
//!
//! Independent, order-insensitive passes over an expanded workflow. Every
//! pass runs to completion and returns its diagnostics; the compiler
//! aggregates them before deciding whether to lower.
//!
//! - `job_graph`: duplicate names, unknown dependencies, dependency cycles
//! - `outputs`: duplicate outputs, `needs.<job>.outputs.<name>` references
//! - `schema`: inline schema shape (empty objects, unions, duplicate fields)
//! - `matrix`: expanded job counts against platform limits
//! - `cycles`: termination safety of `cycle` blocks
//! - `required`: `runs_on` and non-empty workflows
//! - `expr`: type inference over job conditions
//! - `type_refs`: type references resolve in the file's registry

mod cycles;
mod expr;
mod job_graph;
mod matrix;
mod outputs;
mod required;
mod schema;
mod type_refs;

use crate::ast::{Cycle, JobDecl, Workflow, WorkflowFile};
use crate::diagnostic::Diagnostic;
use crate::registry::TypeRegistry;

pub use cycles::validate_cycles;
pub use expr::{infer_type, validate_expressions, ExprType};
pub use job_graph::validate_job_graph;
pub use matrix::{matrix_job_count, validate_matrices, MatrixLimits};
pub use outputs::validate_outputs;
pub use required::validate_required;
pub use schema::{validate_declaration_schemas, validate_schemas, validate_type_expr};
pub use type_refs::{validate_declaration_refs, validate_workflow_refs};

/// Inputs shared by the workflow passes
pub struct ValidationContext<'a> {
    pub types: &'a TypeRegistry,
    pub matrix: MatrixLimits,
}

/// Run every workflow pass and collect the diagnostics
pub fn validate_workflow(workflow: &Workflow, ctx: &ValidationContext<'_>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    diagnostics.extend(validate_job_graph(workflow));
    diagnostics.extend(validate_outputs(workflow));
    diagnostics.extend(validate_schemas(workflow));
    diagnostics.extend(validate_matrices(workflow, &ctx.matrix));
    diagnostics.extend(validate_cycles(workflow));
    diagnostics.extend(validate_required(workflow));
    diagnostics.extend(validate_expressions(workflow));
    diagnostics.extend(validate_workflow_refs(workflow, ctx.types));
    diagnostics
}

/// Passes over a file's own declarations (run for every file in the closure)
pub fn validate_file(file: &WorkflowFile, types: &TypeRegistry) -> Vec<Diagnostic> {
    let mut diagnostics = validate_declaration_refs(file, types);
    diagnostics.extend(validate_declaration_schemas(file));
    diagnostics
}

/// Every job with its owning cycle, top-level jobs first
pub(crate) fn all_jobs(workflow: &Workflow) -> impl Iterator<Item = (&JobDecl, Option<&Cycle>)> {
    workflow.jobs.iter().map(|j| (j, None)).chain(
        workflow
            .cycles
            .iter()
            .flat_map(|c| c.body.iter().map(move |j| (j, Some(c)))),
    )
}
