//! Diagnostics - the data channel for every compile problem
//!
//! Compile problems are values, not errors: every pass returns a list of
//! [`Diagnostic`]s and the compiler aggregates them before deciding whether
//! output is produced. Infrastructure failures (I/O, config) use
//! [`crate::error::GantryError`] instead.
//!
//! Code ranges:
//! - WP0xxx: Parse / front-end
//! - WP1xxx: Type declarations and references
//! - WP2xxx: Job graph and outputs
//! - WP3xxx: Inline schemas
//! - WP4xxx: Matrix sizing
//! - WP5xxx: Cycle safety
//! - WP6xxx: Required fields
//! - WP7xxx: Fragments
//! - WP8xxx: Imports
//! - WP9xxx: Expressions

use std::fmt;

use serde::Serialize;

use crate::ast::Span;

/// Stable diagnostic codes, grouped by concern
pub mod codes {
    // ═══════════════════════════════════════════
    // PARSE (0xxx)
    // ═══════════════════════════════════════════
    pub const PARSE_ERROR: &str = "WP0001";
    pub const NO_WORKFLOW: &str = "WP0002";
    pub const INVALID_TYPE_EXPR: &str = "WP0003";
    pub const INVALID_NODE: &str = "WP0004";

    // ═══════════════════════════════════════════
    // TYPES (1xxx)
    // ═══════════════════════════════════════════
    pub const DUPLICATE_TYPE: &str = "WP1001";
    pub const UNRESOLVED_TYPE: &str = "WP1002";

    // ═══════════════════════════════════════════
    // JOB GRAPH / OUTPUTS (2xxx)
    // ═══════════════════════════════════════════
    pub const DUPLICATE_JOB: &str = "WP2001";
    pub const UNKNOWN_DEPENDENCY: &str = "WP2002";
    pub const JOB_CYCLE: &str = "WP2003";
    pub const DUPLICATE_OUTPUT: &str = "WP2010";
    pub const UNKNOWN_OUTPUT: &str = "WP2011";
    pub const OUTPUT_NOT_NEEDED: &str = "WP2012";

    // ═══════════════════════════════════════════
    // SCHEMAS (3xxx)
    // ═══════════════════════════════════════════
    pub const EMPTY_OBJECT_SCHEMA: &str = "WP3001";
    pub const INCOMPATIBLE_UNION: &str = "WP3002";
    pub const DUPLICATE_SCHEMA_FIELD: &str = "WP3003";

    // ═══════════════════════════════════════════
    // MATRIX (4xxx)
    // ═══════════════════════════════════════════
    pub const MATRIX_TOO_LARGE: &str = "WP4001";
    pub const MATRIX_NEAR_LIMIT: &str = "WP4002";

    // ═══════════════════════════════════════════
    // CYCLES (5xxx)
    // ═══════════════════════════════════════════
    pub const UNBOUNDED_CYCLE: &str = "WP5001";
    pub const ZERO_MAX_ITERS: &str = "WP5002";
    pub const EMPTY_CYCLE_BODY: &str = "WP5003";

    // ═══════════════════════════════════════════
    // REQUIRED FIELDS (6xxx)
    // ═══════════════════════════════════════════
    pub const JOB_MISSING_RUNS_ON: &str = "WP6001";
    pub const AGENT_JOB_MISSING_RUNS_ON: &str = "WP6002";
    pub const EMPTY_WORKFLOW: &str = "WP6003";

    // ═══════════════════════════════════════════
    // FRAGMENTS (7xxx)
    // ═══════════════════════════════════════════
    pub const DUPLICATE_FRAGMENT: &str = "WP7001";
    pub const FRAGMENT_NAMESPACE_COLLISION: &str = "WP7002";
    pub const UNKNOWN_FRAGMENT: &str = "WP7003";
    pub const MISSING_FRAGMENT_ARG: &str = "WP7004";
    pub const UNKNOWN_FRAGMENT_ARG: &str = "WP7005";
    pub const INVALID_FRAGMENT_BODY: &str = "WP7006";
    pub const FRAGMENT_TOO_DEEP: &str = "WP7007";

    // ═══════════════════════════════════════════
    // IMPORTS (8xxx)
    // ═══════════════════════════════════════════
    pub const IMPORT_NOT_FOUND: &str = "WP8001";
    pub const IMPORT_CYCLE: &str = "WP8002";
    pub const INVALID_IMPORT_PATH: &str = "WP8003";
    pub const IMPORT_OUTSIDE_ROOT: &str = "WP8004";
    pub const IMPORTED_NAME_NOT_FOUND: &str = "WP8005";
    pub const NOT_EXPORTABLE: &str = "WP8006";
    pub const IMPORT_COLLISION: &str = "WP8007";

    // ═══════════════════════════════════════════
    // EXPRESSIONS (9xxx)
    // ═══════════════════════════════════════════
    pub const TYPE_MISMATCH: &str = "WP9001";
    pub const NON_NUMERIC_ARITHMETIC: &str = "WP9002";
    pub const INVALID_EXPRESSION: &str = "WP9003";
}

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A single compile problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// File the span points into, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Diagnostic {
    pub fn error(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self::new(code, Severity::Error, message, span)
    }

    pub fn warning(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self::new(code, Severity::Warning, message, span)
    }

    pub fn info(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self::new(code, Severity::Info, message, span)
    }

    fn new(code: &'static str, severity: Severity, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            span,
            hint: None,
            file: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach the file only if none was set by the producing pass
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        if self.file.is_none() {
            self.file = Some(file.into());
        }
        self
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(ref file) = self.file {
            write!(f, " ({}:{})", file, self.span)?;
        }
        if let Some(ref hint) = self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

/// Returns true if any diagnostic is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Outcome of a compile step
///
/// The value is only present on success. Diagnostics may be non-empty on
/// success (warnings, info).
#[derive(Debug, Clone, PartialEq)]
pub enum CompileResult<T> {
    Success { value: T, diagnostics: Vec<Diagnostic> },
    Failure { diagnostics: Vec<Diagnostic> },
}

impl<T> CompileResult<T> {
    /// Success if no diagnostic is an error, failure otherwise
    pub fn from_parts(value: Option<T>, diagnostics: Vec<Diagnostic>) -> Self {
        match value {
            Some(value) if !has_errors(&diagnostics) => CompileResult::Success { value, diagnostics },
            _ => CompileResult::Failure { diagnostics },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CompileResult::Success { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            CompileResult::Success { value, .. } => Some(value),
            CompileResult::Failure { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            CompileResult::Success { value, .. } => Some(value),
            CompileResult::Failure { .. } => None,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileResult::Success { diagnostics, .. } | CompileResult::Failure { diagnostics } => {
                diagnostics
            }
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CompileResult<U> {
        match self {
            CompileResult::Success { value, diagnostics } => CompileResult::Success {
                value: f(value),
                diagnostics,
            },
            CompileResult::Failure { diagnostics } => CompileResult::Failure { diagnostics },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_do_not_fail_a_result() {
        let diags = vec![Diagnostic::warning(codes::EMPTY_WORKFLOW, "empty", Span::default())];
        let result = CompileResult::from_parts(Some(1), diags);
        assert!(result.is_success());
        assert_eq!(result.diagnostics().len(), 1);
    }

    #[test]
    fn errors_drop_the_value() {
        let diags = vec![Diagnostic::error(codes::PARSE_ERROR, "bad", Span::default())];
        let result = CompileResult::from_parts(Some(1), diags);
        assert!(!result.is_success());
        assert!(result.value().is_none());
    }

    #[test]
    fn missing_value_is_failure_even_without_errors() {
        let result: CompileResult<u8> = CompileResult::from_parts(None, vec![]);
        assert!(!result.is_success());
    }

    #[test]
    fn display_includes_code_and_hint() {
        let diag = Diagnostic::error(codes::UNKNOWN_OUTPUT, "no such output", Span::new(3, 9))
            .with_hint("available outputs: a, b")
            .in_file("main.gantry.yaml");
        let text = diag.to_string();
        assert!(text.starts_with("error[WP2011]: no such output"));
        assert!(text.contains("main.gantry.yaml:3..9"));
        assert!(text.contains("hint: available outputs: a, b"));
    }

    #[test]
    fn in_file_keeps_existing_file() {
        let diag = Diagnostic::info("WP0000", "x", Span::default())
            .in_file("a.yaml")
            .in_file("b.yaml");
        assert_eq!(diag.file.as_deref(), Some("a.yaml"));
    }
}
