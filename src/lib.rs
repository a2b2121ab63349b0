//! Gantry - a workflow language compiled to GitHub Actions
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        FRONT-END                             │
//! │  frontend/  YAML → AST (types, conditions, fragments)        │
//! │  ast/       Source-level tree (Workflow, JobDecl, Cycle)     │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     SEMANTIC ANALYSIS                        │
//! │  imports/   Import closure, path rules, import graph         │
//! │  registry/  Type and fragment registries (builder → frozen)  │
//! │  fragments/ Fragment expansion                               │
//! │  validate/  Semantic passes producing diagnostics            │
//! │  dag/       Job dependency graph                             │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        BACK-END                              │
//! │  lower/     AST → IR (agent tasks, matrices, cycles)         │
//! │  ir/        Platform-shaped job graph                        │
//! │  emit/      IR → workflow YAML                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`frontend`] | Source parsing, never panics on malformed input |
//! | [`imports`] | Async loading of the import closure, cycle detection |
//! | [`registry`] | Name binding with import/re-export rules |
//! | [`validate`] | Job graph, outputs, schemas, matrices, cycles, expressions |
//! | [`lower`] | Cycle lowering to hydrate/body/decide/dispatch jobs |
//! | [`emit`] | Deterministic YAML output |
//! | [`diagnostic`] | `WPxxxx` diagnostics and `CompileResult` |
//! | [`error`] | Infrastructure errors with fix suggestions |

// ═══════════════════════════════════════════════════════════════
// FRONT-END - source text → AST
// ═══════════════════════════════════════════════════════════════
pub mod ast;
pub mod frontend;

// ═══════════════════════════════════════════════════════════════
// SEMANTIC ANALYSIS - names, imports, checks
// ═══════════════════════════════════════════════════════════════
pub mod dag;
pub mod fragments;
pub mod imports;
pub mod registry;
pub mod validate;

// ═══════════════════════════════════════════════════════════════
// BACK-END - lowering and emission
// ═══════════════════════════════════════════════════════════════
pub mod emit;
pub mod ir;
pub mod lower;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - diagnostics, errors, configuration
// ═══════════════════════════════════════════════════════════════
pub mod compiler;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod util;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

// Pipeline
pub use compiler::Compiler;
pub use config::{ActionRefs, CompilerConfig, CycleSettings};

// Diagnostics and errors
pub use diagnostic::{codes, has_errors, CompileResult, Diagnostic, Severity};
pub use error::{FixSuggestion, GantryError, Result};

// Front-end
pub use ast::{JobDecl, Workflow, WorkflowFile};
pub use frontend::{parse_source, ParsedFile};

// Semantic analysis
pub use dag::JobGraph;
pub use fragments::expand_workflow;
pub use imports::{FsLoader, ImportGraph, ImportResolver, MemoryLoader, Resolution, SourceLoader};
pub use registry::{FragmentRegistry, TypeRegistry};
pub use validate::MatrixLimits;

// Back-end
pub use emit::emit;
pub use ir::WorkflowIr;
pub use lower::{lower_workflow, LowerContext};
