//! Front-end - YAML source text to AST
//!
//! - `raw`: serde shapes of the source format and their conversion
//! - `type_expr`: type expression parser (`{ id: int, tags: string[] } | null`)
//! - `expr`: job condition parser (`needs.build.outputs.ok == 'true'`)
//!
//! `parse_source` never panics: malformed text yields a WP0001 diagnostic
//! with the offending location, malformed nodes yield node-level diagnostics.

mod expr;
mod raw;
mod type_expr;

use rustc_hash::FxHashMap;

use crate::ast::{JobDecl, Span, Step, WorkflowFile};
use crate::diagnostic::{codes, Diagnostic};

pub use expr::{parse_expression, ExprParseError};
pub(crate) use raw::scalar_to_string;
pub use type_expr::{parse_type_expr, TypeParseError};

use raw::{Converter, FileRaw, JobRaw, StepRaw};

/// Result of parsing one source file
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Absent only when the text could not be read as a gantry document
    pub file: Option<WorkflowFile>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a source file into its AST
pub fn parse_source(path: &str, text: &str) -> ParsedFile {
    // Empty or comment-only documents are valid library files
    match serde_yaml::from_str::<serde_yaml::Value>(text) {
        Ok(serde_yaml::Value::Null) => {
            return ParsedFile {
                file: Some(WorkflowFile {
                    path: path.to_string(),
                    ..WorkflowFile::default()
                }),
                diagnostics: Vec::new(),
            };
        }
        Ok(_) => {}
        Err(err) => return ParsedFile::failed(path, &err),
    }

    let raw: FileRaw = match serde_yaml::from_str(text) {
        Ok(raw) => raw,
        Err(err) => return ParsedFile::failed(path, &err),
    };

    let mut converter = Converter::new(text);
    let file = converter.file(path, raw);
    let diagnostics = converter
        .diagnostics
        .into_iter()
        .map(|d| d.in_file(path))
        .collect();
    ParsedFile {
        file: Some(file),
        diagnostics,
    }
}

impl ParsedFile {
    fn failed(path: &str, err: &serde_yaml::Error) -> Self {
        let span = err
            .location()
            .map(|loc| Span::point(loc.index()))
            .unwrap_or_default();
        let mut diagnostic = Diagnostic::error(
            codes::PARSE_ERROR,
            format!("failed to parse source: {}", err),
            span,
        )
        .in_file(path);
        if let Some(loc) = err.location() {
            diagnostic = diagnostic.with_hint(format!(
                "check line {}, column {}",
                loc.line(),
                loc.column()
            ));
        }
        ParsedFile {
            file: None,
            diagnostics: vec![diagnostic],
        }
    }
}

/// Build a job from an instantiated job-fragment body
pub(crate) fn job_from_template(
    name: &str,
    mut template: serde_yaml::Value,
) -> (Option<JobDecl>, Vec<Diagnostic>) {
    if let serde_yaml::Value::Mapping(ref mut map) = template {
        map.insert("name".into(), name.into());
    }
    let raw: JobRaw = match serde_yaml::from_value(template) {
        Ok(raw) => raw,
        Err(err) => {
            return (
                None,
                vec![Diagnostic::error(
                    codes::INVALID_FRAGMENT_BODY,
                    format!("job fragment body for '{}' is not a valid job: {}", name, err),
                    Span::default(),
                )],
            );
        }
    };
    let mut converter = Converter::new("");
    let job = converter.job(raw);
    (job, converter.diagnostics)
}

/// Build steps from an instantiated steps-fragment body
pub(crate) fn steps_from_template(
    fragment: &str,
    template: serde_yaml::Value,
) -> (Vec<Step>, Vec<Diagnostic>) {
    let raw: Vec<StepRaw> = match serde_yaml::from_value(template) {
        Ok(raw) => raw,
        Err(err) => {
            return (
                Vec::new(),
                vec![Diagnostic::error(
                    codes::INVALID_FRAGMENT_BODY,
                    format!("steps fragment '{}' body is not a list of steps: {}", fragment, err),
                    Span::default(),
                )],
            );
        }
    };
    let mut converter = Converter::new("");
    let steps = raw.into_iter().filter_map(|s| converter.step(s)).collect();
    (steps, converter.diagnostics)
}

// ═══════════════════════════════════════════════════════════════
// SPAN LOCATOR
// ═══════════════════════════════════════════════════════════════

/// Assigns spans to named nodes by scanning the source text
///
/// serde does not expose node positions, so each name is matched against
/// its next whole-word occurrence. Repeated names resolve to successive
/// occurrences, which keeps duplicate-declaration spans distinct.
pub(crate) struct Locator<'a> {
    text: &'a str,
    cursors: FxHashMap<String, usize>,
}

impl<'a> Locator<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            text,
            cursors: FxHashMap::default(),
        }
    }

    pub(crate) fn locate(&mut self, needle: &str) -> Span {
        if needle.is_empty() || self.text.is_empty() {
            return Span::default();
        }
        let from = self.cursors.get(needle).copied().unwrap_or(0);
        let found = find_word(self.text, needle, from).or_else(|| find_word(self.text, needle, 0));
        match found {
            Some(start) => {
                let end = start + needle.len();
                self.cursors.insert(needle.to_string(), end);
                Span::new(start, end)
            }
            None => Span::default(),
        }
    }
}

fn find_word(text: &str, needle: &str, from: usize) -> Option<usize> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '-';
    let mut offset = from;
    while offset <= text.len() {
        let idx = offset + text.get(offset..)?.find(needle)?;
        let before_ok = text[..idx].chars().next_back().map_or(true, |c| !is_word(c));
        let after_ok = text[idx + needle.len()..]
            .chars()
            .next()
            .map_or(true, |c| !is_word(c));
        if before_ok && after_ok {
            return Some(idx);
        }
        offset = idx + needle.len().max(1);
    }
    None
}
