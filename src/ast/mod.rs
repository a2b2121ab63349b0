//! AST Module - Abstract Syntax Tree for gantry source files
//!
//! Contains the typed tree produced once per file by the front-end:
//! - `workflow`: WorkflowFile, Workflow, JobDecl, Step, Cycle, Trigger
//! - `types`: TypeDeclaration, TypeExpr, OutputSchema
//! - `expr`: Expression, Condition (job `if:` conditions)
//! - `fragment`: JobFragment, StepsFragment (parameterized templates)
//!
//! These types represent the "what" - static structure of the source.
//! The tree owns its children exclusively and is never mutated after
//! construction; fragment expansion builds a new tree.

mod expr;
mod fragment;
mod types;
mod workflow;

use std::fmt;

use serde::Serialize;

pub use expr::{BinaryOp, Condition, Expression, Literal, UnaryOp};
pub use fragment::{FragmentParam, JobFragment, StepsFragment};
pub use types::{FieldDecl, OutputSchema, PrimitiveType, TypeDeclaration, TypeExpr};
pub use workflow::{
    AgentJob, AgentTask, ArtifactDecl, Cycle, FragmentUse, ImportDecl, ImportItem, Job, JobDecl,
    Matrix, MatrixAxis, MatrixJob, OutputDecl, Step, StepKind, Trigger, TriggerEvent, Workflow,
    WorkflowFile,
};

/// Byte offsets into source text, for diagnostics and for tracing IR
/// nodes back to their source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn point(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
