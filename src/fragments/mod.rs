//! Fragments - parameterized job and step templates
//!
//! - `template`: `{{ params.x }}` substitution over YAML trees
//! - `expand`: replaces fragment uses in a workflow with their bodies
//!
//! Expansion runs before validation, so every later stage sees only plain,
//! agent and matrix jobs.

mod expand;
mod template;

pub use expand::{expand_workflow, MAX_FRAGMENT_DEPTH};
pub use template::{substitute, substitute_value, MissingParams};
