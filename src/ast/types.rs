//! Type declarations and type expressions

use std::fmt;

use super::Span;

/// Closed set of primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Int,
    Float,
    Bool,
}

impl PrimitiveType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(PrimitiveType::String),
            "int" => Some(PrimitiveType::Int),
            "float" => Some(PrimitiveType::Float),
            "bool" => Some(PrimitiveType::Bool),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Int => "int",
            PrimitiveType::Float => "float",
            PrimitiveType::Bool => "bool",
        }
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, PrimitiveType::Int | PrimitiveType::Float)
    }
}

/// A named field in a declaration or inline object
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Type expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Primitive(PrimitiveType),
    Reference { name: String, span: Span },
    Array(Box<TypeExpr>),
    Object(Vec<FieldDecl>),
    Union(Vec<TypeExpr>),
    StringLiteral(String),
    Null,
}

impl TypeExpr {
    /// Visit every `Reference` node in the tree
    pub fn references(&self) -> Vec<(&str, Span)> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<(&'a str, Span)>) {
        match self {
            TypeExpr::Reference { name, span } => out.push((name.as_str(), *span)),
            TypeExpr::Array(inner) => inner.collect_references(out),
            TypeExpr::Object(fields) => {
                for field in fields {
                    field.ty.collect_references(out);
                }
            }
            TypeExpr::Union(members) => {
                for member in members {
                    member.collect_references(out);
                }
            }
            TypeExpr::Primitive(_) | TypeExpr::StringLiteral(_) | TypeExpr::Null => {}
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Primitive(p) => f.write_str(p.as_str()),
            TypeExpr::Reference { name, .. } => f.write_str(name),
            TypeExpr::Array(inner) => match inner.as_ref() {
                TypeExpr::Union(_) => write!(f, "({})[]", inner),
                _ => write!(f, "{}[]", inner),
            },
            TypeExpr::Object(fields) if fields.is_empty() => f.write_str("{}"),
            TypeExpr::Object(fields) => {
                f.write_str("{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                f.write_str(" }")
            }
            TypeExpr::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
            TypeExpr::StringLiteral(s) => write!(f, "\"{}\"", s),
            TypeExpr::Null => f.write_str("null"),
        }
    }
}

/// User-declared record type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDeclaration {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

/// Agent task output schema
#[derive(Debug, Clone, PartialEq)]
pub enum OutputSchema {
    /// A declared or imported type name
    TypeName { name: String, span: Span },
    /// A JSON schema file, opaque to the compiler
    FilePath(String),
    Inline(TypeExpr),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_readable_form() {
        let ty = TypeExpr::Union(vec![
            TypeExpr::StringLiteral("a".into()),
            TypeExpr::Null,
            TypeExpr::Array(Box::new(TypeExpr::Primitive(PrimitiveType::Int))),
        ]);
        assert_eq!(ty.to_string(), "\"a\" | null | int[]");
    }

    #[test]
    fn references_walks_nested_nodes() {
        let ty = TypeExpr::Object(vec![FieldDecl {
            name: "items".into(),
            ty: TypeExpr::Array(Box::new(TypeExpr::Union(vec![
                TypeExpr::Reference {
                    name: "Finding".into(),
                    span: Span::default(),
                },
                TypeExpr::Reference {
                    name: "Note".into(),
                    span: Span::default(),
                },
            ]))),
            span: Span::default(),
        }]);
        let names: Vec<&str> = ty.references().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Finding", "Note"]);
    }

    #[test]
    fn numeric_primitives() {
        assert!(PrimitiveType::Int.is_numeric());
        assert!(PrimitiveType::Float.is_numeric());
        assert!(!PrimitiveType::Bool.is_numeric());
        assert_eq!(PrimitiveType::parse("float"), Some(PrimitiveType::Float));
        assert_eq!(PrimitiveType::parse("Float"), None);
    }
}
