//! Fragment declarations - parameterized job and step templates
//!
//! Fragment bodies stay untyped (`serde_yaml::Value`) until instantiation:
//! parameters may appear in any field, including numeric ones, so the body
//! only becomes AST after `{{ params.x }}` substitution.

use super::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentParam {
    pub name: String,
    /// Absent means the argument is required
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobFragment {
    pub name: String,
    pub params: Vec<FragmentParam>,
    pub template: serde_yaml::Value,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepsFragment {
    pub name: String,
    pub params: Vec<FragmentParam>,
    pub template: serde_yaml::Value,
    pub span: Span,
}
