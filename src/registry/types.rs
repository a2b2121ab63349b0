//! Type registry - user-defined record types

use crate::ast::{TypeDeclaration, TypeExpr};
use crate::diagnostic::{codes, Diagnostic};
use crate::util::did_you_mean;

use super::{Registry, RegistryBuilder, RegistryKind};

pub type TypeRegistryBuilder = RegistryBuilder<TypeDeclaration>;
pub type TypeRegistry = Registry<TypeDeclaration>;

impl TypeRegistryBuilder {
    pub fn for_types() -> Self {
        RegistryBuilder::new(RegistryKind::Type)
    }
}

impl TypeRegistry {
    /// One diagnostic per reference node that names no registered type
    pub fn resolve(&self, ty: &TypeExpr) -> Vec<Diagnostic> {
        ty.references()
            .into_iter()
            .filter(|(name, _)| !self.contains(name))
            .map(|(name, span)| {
                let diagnostic = Diagnostic::error(
                    codes::UNRESOLVED_TYPE,
                    format!("unknown type '{}'", name),
                    span,
                );
                match did_you_mean(name, self.names()) {
                    Some(s) => diagnostic.with_hint(format!("did you mean '{}'?", s)),
                    None => diagnostic.with_hint(format!(
                        "declare '{}' under `types:` or import it from another file",
                        name
                    )),
                }
            })
            .collect()
    }
}
