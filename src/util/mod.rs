//! Utilities Module - shared helpers
//!
//! - `suggest`: "did you mean" suggestions for misspelled names

pub mod suggest;

pub use suggest::{did_you_mean, levenshtein};
