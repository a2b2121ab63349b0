//! Inline schemas: empty objects, union compatibility, duplicate fields
//!
//! Only inline type expressions are checked. Schema type names and schema
//! files are resolved elsewhere or stay opaque.

use rustc_hash::FxHashSet;

use crate::ast::{OutputSchema, PrimitiveType, Span, StepKind, TypeExpr, Workflow, WorkflowFile};
use crate::diagnostic::{codes, Diagnostic};

use super::all_jobs;

/// Inline agent output schemas and typed job outputs of a workflow
pub fn validate_schemas(workflow: &Workflow) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (job, _) in all_jobs(workflow) {
        for output in job.outputs() {
            if let Some(ty) = &output.ty {
                diagnostics.extend(validate_type_expr(ty, output.span));
            }
        }
        for step in job.steps() {
            if let StepKind::AgentTask(task) = &step.kind {
                if let Some(OutputSchema::Inline(ty)) = &task.output_schema {
                    diagnostics.extend(validate_type_expr(ty, job.span()));
                }
            }
        }
    }
    diagnostics
}

/// Field types and field-name uniqueness of a file's type declarations
pub fn validate_declaration_schemas(file: &WorkflowFile) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for decl in &file.types {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for field in &decl.fields {
            if !seen.insert(&field.name) {
                diagnostics.push(duplicate_field(&field.name, field.span));
            }
            diagnostics.extend(validate_type_expr(&field.ty, field.span));
        }
    }
    diagnostics.into_iter().map(|d| d.in_file(&file.path)).collect()
}

/// Check one inline type expression, recursively
pub fn validate_type_expr(ty: &TypeExpr, span: Span) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    walk(ty, span, &mut diagnostics);
    diagnostics
}

fn walk(ty: &TypeExpr, span: Span, diagnostics: &mut Vec<Diagnostic>) {
    match ty {
        TypeExpr::Object(fields) => {
            if fields.is_empty() {
                diagnostics.push(
                    Diagnostic::error(
                        codes::EMPTY_OBJECT_SCHEMA,
                        "object schema has no fields",
                        span,
                    )
                    .with_hint("declare at least one field, e.g. { ok: bool }"),
                );
            }
            let mut seen: FxHashSet<&str> = FxHashSet::default();
            for field in fields {
                let field_span = if field.span.is_empty() { span } else { field.span };
                if !seen.insert(&field.name) {
                    diagnostics.push(duplicate_field(&field.name, field_span));
                }
                walk(&field.ty, field_span, diagnostics);
            }
        }
        TypeExpr::Union(members) => {
            if let Some((a, b)) = incompatible_pair(members) {
                diagnostics.push(
                    Diagnostic::error(
                        codes::INCOMPATIBLE_UNION,
                        format!("union members '{}' and '{}' are incompatible", a, b),
                        span,
                    )
                    .with_hint(
                        "int and float may mix; string literals mix only with each other and null",
                    ),
                );
            }
            for member in members {
                walk(member, span, diagnostics);
            }
        }
        TypeExpr::Array(inner) => walk(inner, span, diagnostics),
        TypeExpr::Primitive(_)
        | TypeExpr::Reference { .. }
        | TypeExpr::StringLiteral(_)
        | TypeExpr::Null => {}
    }
}

fn duplicate_field(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        codes::DUPLICATE_SCHEMA_FIELD,
        format!("duplicate field '{}' in object schema", name),
        span,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberClass {
    Primitive(PrimitiveType),
    Literal,
    Null,
    /// References, arrays and objects
    Structured,
}

fn classify(ty: &TypeExpr) -> MemberClass {
    match ty {
        TypeExpr::Primitive(p) => MemberClass::Primitive(*p),
        TypeExpr::StringLiteral(_) => MemberClass::Literal,
        TypeExpr::Null => MemberClass::Null,
        _ => MemberClass::Structured,
    }
}

fn compatible(a: MemberClass, b: MemberClass) -> bool {
    use MemberClass::*;
    match (a, b) {
        (Null, _) | (_, Null) => true,
        (Literal, Literal) => true,
        (Literal, _) | (_, Literal) => false,
        (Primitive(x), Primitive(y)) => x == y || (x.is_numeric() && y.is_numeric()),
        (Primitive(_), Structured) | (Structured, Primitive(_)) | (Structured, Structured) => true,
    }
}

/// First incompatible pair in declaration order
fn incompatible_pair(members: &[TypeExpr]) -> Option<(&TypeExpr, &TypeExpr)> {
    for (i, a) in members.iter().enumerate() {
        for b in &members[i + 1..] {
            if !compatible(classify(a), classify(b)) {
                return Some((a, b));
            }
        }
    }
    None
}
