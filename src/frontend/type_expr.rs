//! Type expression parser
//!
//! Grammar:
//!
//! ```text
//! union   := postfix ('|' postfix)*
//! postfix := primary ('[' ']')*
//! primary := 'null' | NAME | "literal" | '{' fields? '}' | '(' union ')'
//! fields  := field (',' field)* ','?
//! field   := NAME ':' union
//! ```
//!
//! Primitive names (`string`, `int`, `float`, `bool`) become
//! `TypeExpr::Primitive`; any other name is a `Reference`.

use crate::ast::{FieldDecl, PrimitiveType, Span, TypeExpr};

/// Parse error with a byte offset relative to the expression text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParseError {
    pub offset: usize,
    pub message: String,
}

pub fn parse_type_expr(text: &str) -> Result<TypeExpr, TypeParseError> {
    let mut parser = Parser {
        src: text,
        bytes: text.as_bytes(),
        pos: 0,
    };
    let expr = parser.union()?;
    parser.skip_ws();
    if parser.pos < parser.bytes.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: &str) -> TypeParseError {
        TypeParseError {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn union(&mut self) -> Result<TypeExpr, TypeParseError> {
        let first = self.postfix()?;
        let mut members = vec![first];
        while self.eat(b'|') {
            members.push(self.postfix()?);
        }
        if members.len() == 1 {
            Ok(members.remove(0))
        } else {
            Ok(TypeExpr::Union(members))
        }
    }

    fn postfix(&mut self) -> Result<TypeExpr, TypeParseError> {
        let mut ty = self.primary()?;
        while self.peek() == Some(b'[') {
            self.pos += 1;
            if !self.eat(b']') {
                return Err(self.error("expected ']'"));
            }
            ty = TypeExpr::Array(Box::new(ty));
        }
        Ok(ty)
    }

    fn primary(&mut self) -> Result<TypeExpr, TypeParseError> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let inner = self.union()?;
                if !self.eat(b')') {
                    return Err(self.error("expected ')'"));
                }
                Ok(inner)
            }
            Some(b'{') => {
                self.pos += 1;
                self.object()
            }
            Some(b'"') => self.string_literal(),
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                let (name, span) = self.name();
                Ok(match name {
                    "null" => TypeExpr::Null,
                    other => match PrimitiveType::parse(other) {
                        Some(p) => TypeExpr::Primitive(p),
                        None => TypeExpr::Reference {
                            name: other.to_string(),
                            span,
                        },
                    },
                })
            }
            Some(_) => Err(self.error("expected a type")),
            None => Err(self.error("unexpected end of type expression")),
        }
    }

    fn name(&mut self) -> (&'a str, Span) {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        (&self.src[start..self.pos], Span::new(start, self.pos))
    }

    fn string_literal(&mut self) -> Result<TypeExpr, TypeParseError> {
        // opening quote already peeked
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'"' {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Err(self.error("unterminated string literal"));
        }
        let value = self.src[start..self.pos].to_string();
        self.pos += 1;
        Ok(TypeExpr::StringLiteral(value))
    }

    fn object(&mut self) -> Result<TypeExpr, TypeParseError> {
        let mut fields = Vec::new();
        loop {
            if self.eat(b'}') {
                break;
            }
            match self.peek() {
                Some(c) if c.is_ascii_alphabetic() || c == b'_' => {}
                _ => return Err(self.error("expected field name")),
            }
            let (name, span) = self.name();
            if !self.eat(b':') {
                return Err(self.error("expected ':' after field name"));
            }
            let ty = self.union()?;
            fields.push(FieldDecl {
                name: name.to_string(),
                ty,
                span,
            });
            if self.eat(b',') {
                continue;
            }
            if self.eat(b'}') {
                break;
            }
            return Err(self.error("expected ',' or '}'"));
        }
        Ok(TypeExpr::Object(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primitives_and_references() {
        assert_eq!(
            parse_type_expr("int").unwrap(),
            TypeExpr::Primitive(PrimitiveType::Int)
        );
        match parse_type_expr("Finding").unwrap() {
            TypeExpr::Reference { name, span } => {
                assert_eq!(name, "Finding");
                assert_eq!(span, Span::new(0, 7));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_union_of_literals_and_null() {
        let ty = parse_type_expr(r#""approve" | "reject" | null"#).unwrap();
        assert_eq!(
            ty,
            TypeExpr::Union(vec![
                TypeExpr::StringLiteral("approve".into()),
                TypeExpr::StringLiteral("reject".into()),
                TypeExpr::Null,
            ])
        );
    }

    #[test]
    fn parses_nested_arrays_and_objects() {
        let ty = parse_type_expr("{ items: { id: int, tags: string[] }[], ok: bool }").unwrap();
        let TypeExpr::Object(fields) = ty else {
            panic!("expected object");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "items");
        assert!(matches!(fields[0].ty, TypeExpr::Array(_)));
    }

    #[test]
    fn parenthesized_union_array() {
        let ty = parse_type_expr("(int | float)[]").unwrap();
        assert_eq!(ty.to_string(), "(int | float)[]");
    }

    #[test]
    fn keeps_duplicate_fields() {
        let TypeExpr::Object(fields) = parse_type_expr("{ a: int, a: string }").unwrap() else {
            panic!("expected object");
        };
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn empty_object_parses() {
        assert_eq!(parse_type_expr("{}").unwrap(), TypeExpr::Object(vec![]));
    }

    #[test]
    fn reports_errors_with_offsets() {
        let err = parse_type_expr("int[").unwrap_err();
        assert_eq!(err.offset, 4);
        assert!(parse_type_expr("{ a int }").is_err());
        assert!(parse_type_expr("\"open").is_err());
        assert!(parse_type_expr("").is_err());
        assert!(parse_type_expr("int string").is_err());
    }
}
