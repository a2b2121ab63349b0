//! Expression typing for job conditions
//!
//! Types form a closed set plus `Unknown`. `Unknown` is absorbing: any
//! comparison or arithmetic involving it is accepted, so conditions over
//! unannotated outputs and platform contexts never fail.

use std::fmt;

use crate::ast::{
    BinaryOp, Expression, Literal, PrimitiveType, Span, TypeExpr, UnaryOp, Workflow,
};
use crate::diagnostic::{codes, Diagnostic};

use super::all_jobs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprType {
    String,
    Int,
    Float,
    Bool,
    Null,
    Unknown,
}

impl ExprType {
    fn is_numeric(self) -> bool {
        matches!(self, ExprType::Int | ExprType::Float)
    }

    fn is_known(self) -> bool {
        self != ExprType::Unknown
    }

    fn from_type_expr(ty: &TypeExpr) -> Self {
        match ty {
            TypeExpr::Primitive(PrimitiveType::String) | TypeExpr::StringLiteral(_) => {
                ExprType::String
            }
            TypeExpr::Primitive(PrimitiveType::Int) => ExprType::Int,
            TypeExpr::Primitive(PrimitiveType::Float) => ExprType::Float,
            TypeExpr::Primitive(PrimitiveType::Bool) => ExprType::Bool,
            TypeExpr::Null => ExprType::Null,
            TypeExpr::Union(members) => {
                let mut types = members.iter().map(Self::from_type_expr);
                match types.next() {
                    Some(first) if types.all(|t| t == first) => first,
                    _ => ExprType::Unknown,
                }
            }
            TypeExpr::Reference { .. } | TypeExpr::Array(_) | TypeExpr::Object(_) => {
                ExprType::Unknown
            }
        }
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExprType::String => "string",
            ExprType::Int => "int",
            ExprType::Float => "float",
            ExprType::Bool => "bool",
            ExprType::Null => "null",
            ExprType::Unknown => "unknown",
        })
    }
}

/// Infer the type of an expression, pushing mismatch diagnostics
pub fn infer_type(
    expr: &Expression,
    workflow: &Workflow,
    span: Span,
    diagnostics: &mut Vec<Diagnostic>,
) -> ExprType {
    match expr {
        Expression::Literal(lit) => match lit {
            Literal::String(_) => ExprType::String,
            Literal::Int(_) => ExprType::Int,
            Literal::Float(_) => ExprType::Float,
            Literal::Bool(_) => ExprType::Bool,
            Literal::Null => ExprType::Null,
        },
        Expression::OutputRef { job, output } => workflow
            .find_job(job)
            .and_then(|j| j.outputs().iter().find(|o| &o.name == output))
            .and_then(|o| o.ty.as_ref())
            .map_or(ExprType::Unknown, ExprType::from_type_expr),
        Expression::Context(_) => ExprType::Unknown,
        Expression::Call { name, args } => {
            for arg in args {
                infer_type(arg, workflow, span, diagnostics);
            }
            match name.as_str() {
                "contains" | "startsWith" | "endsWith" | "success" | "failure" | "always"
                | "cancelled" => ExprType::Bool,
                "format" | "join" | "toJSON" | "hashFiles" => ExprType::String,
                _ => ExprType::Unknown,
            }
        }
        Expression::Unary { op, operand } => {
            let inner = infer_type(operand, workflow, span, diagnostics);
            match op {
                UnaryOp::Not => ExprType::Bool,
                UnaryOp::Neg => {
                    if inner.is_known() && !inner.is_numeric() {
                        diagnostics.push(non_numeric(inner, "unary -", span));
                        ExprType::Unknown
                    } else {
                        inner
                    }
                }
            }
        }
        Expression::Binary { op, lhs, rhs } => {
            let left = infer_type(lhs, workflow, span, diagnostics);
            let right = infer_type(rhs, workflow, span, diagnostics);

            if op.is_comparison() {
                let comparable = !left.is_known()
                    || !right.is_known()
                    || left == right
                    || (left.is_numeric() && right.is_numeric());
                if !comparable {
                    diagnostics.push(
                        Diagnostic::error(
                            codes::TYPE_MISMATCH,
                            format!("cannot compare {} with {} using '{}'", left, right, op),
                            span,
                        )
                        .with_hint("compare values of the same type, or convert with fromJSON()"),
                    );
                }
                return ExprType::Bool;
            }

            if op.is_arithmetic() {
                let offending = [left, right]
                    .into_iter()
                    .find(|t| t.is_known() && !t.is_numeric());
                if let Some(bad) = offending {
                    diagnostics.push(non_numeric(bad, op.as_str(), span));
                    return ExprType::Unknown;
                }
                return match (left, right) {
                    (ExprType::Int, ExprType::Int) => ExprType::Int,
                    (l, r) if l.is_known() && r.is_known() => ExprType::Float,
                    _ => ExprType::Unknown,
                };
            }

            // && and || yield one of their operands
            if left == right {
                left
            } else {
                ExprType::Unknown
            }
        }
    }
}

fn non_numeric(ty: ExprType, op: &str, span: Span) -> Diagnostic {
    Diagnostic::warning(
        codes::NON_NUMERIC_ARITHMETIC,
        format!("arithmetic '{}' on a {} operand", op, ty),
        span,
    )
}

/// Type-check every parsed job condition
pub fn validate_expressions(workflow: &Workflow) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (job, _) in all_jobs(workflow) {
        if let Some(condition) = job.condition() {
            if let Some(expr) = &condition.expr {
                infer_type(expr, workflow, condition.span, &mut diagnostics);
            }
        }
    }
    diagnostics
}
