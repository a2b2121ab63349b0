// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Gantry Error Types with Error Codes
//!
//! These cover infrastructure failures only. Problems in the compiled
//! source are reported as [`crate::diagnostic::Diagnostic`] values.
//!
//! Error code ranges:
//! - GANTRY-000-009: Input errors
//! - GANTRY-010-019: Configuration errors
//! - GANTRY-020-029: Compilation outcome
//! - GANTRY-030-039: Output errors

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GantryError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug, Diagnostic)]
pub enum GantryError {
    // ═══════════════════════════════════════════
    // INPUT ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[GANTRY-001] Source file not found: {path}")]
    #[diagnostic(code(gantry::source_not_found), help("Check the file path exists"))]
    SourceNotFound { path: String },

    #[error("[GANTRY-002] Failed to read '{path}': {source}")]
    #[diagnostic(code(gantry::read_failed))]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════
    // CONFIGURATION ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[GANTRY-010] Configuration error: {reason}")]
    #[diagnostic(
        code(gantry::config_error),
        help("Check gantry.toml syntax and field names")
    )]
    ConfigError { reason: String },

    #[error("[GANTRY-011] Invalid matrix thresholds: warn at {warn}, fail above {max}")]
    #[diagnostic(
        code(gantry::invalid_thresholds),
        help("warn_threshold must be lower than max_jobs")
    )]
    InvalidThresholds { warn: usize, max: usize },

    // ═══════════════════════════════════════════
    // COMPILATION OUTCOME (020-029)
    // ═══════════════════════════════════════════
    #[error("[GANTRY-020] Compilation failed with {errors} error(s)")]
    #[diagnostic(code(gantry::compile_failed))]
    CompileFailed { errors: usize },

    #[error("[GANTRY-021] Failed to start the compiler runtime: {0}")]
    #[diagnostic(code(gantry::runtime))]
    Runtime(#[source] std::io::Error),

    // ═══════════════════════════════════════════
    // OUTPUT ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[GANTRY-030] Failed to write '{path}': {source}")]
    #[diagnostic(code(gantry::write_failed))]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[GANTRY-031] Failed to serialize output: {0}")]
    #[diagnostic(code(gantry::serialize_failed))]
    Serialize(#[from] serde_yaml::Error),
}

impl FixSuggestion for GantryError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            GantryError::SourceNotFound { .. } => Some("Check the workflow file path"),
            GantryError::Read { .. } => Some("Check file permissions"),
            GantryError::ConfigError { .. } => {
                Some("Fix gantry.toml or remove it to fall back to defaults")
            }
            GantryError::InvalidThresholds { .. } => {
                Some("Set [matrix] warn_threshold below max_jobs")
            }
            GantryError::CompileFailed { .. } => Some("Fix the reported diagnostics and retry"),
            GantryError::Runtime(_) => Some("Call the async compile API from inside a runtime"),
            GantryError::Write { .. } => Some("Check the output directory exists and is writable"),
            GantryError::Serialize(_) => None,
        }
    }
}
