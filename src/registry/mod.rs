//! Registries - named declarations visible in one file
//!
//! Two-phase lifecycle:
//! - `RegistryBuilder<T>`: owns its map; only `register` and `import_from`
//! - `Registry<T>`: frozen, read-only view handed to validators and importers
//!
//! Entries are shared by `Arc` across files. Only locally declared entries
//! are exportable, so imports are non-transitive.

mod fragments;
mod types;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ast::{ImportItem, JobFragment, Span, StepsFragment, TypeDeclaration};
use crate::diagnostic::{codes, Diagnostic};
use crate::util::did_you_mean;

pub use fragments::{FragmentRegistry, FragmentRegistryBuilder};
pub use types::{TypeRegistry, TypeRegistryBuilder};

/// A declaration that can live in a registry
pub trait Named {
    fn name(&self) -> &str;
    fn span(&self) -> Span;
}

impl Named for TypeDeclaration {
    fn name(&self) -> &str {
        &self.name
    }
    fn span(&self) -> Span {
        self.span
    }
}

impl Named for JobFragment {
    fn name(&self) -> &str {
        &self.name
    }
    fn span(&self) -> Span {
        self.span
    }
}

impl Named for StepsFragment {
    fn name(&self) -> &str {
        &self.name
    }
    fn span(&self) -> Span {
        self.span
    }
}

/// What a registry holds; drives wording and diagnostic codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    Type,
    JobFragment,
    StepsFragment,
}

impl RegistryKind {
    pub fn label(&self) -> &'static str {
        match self {
            RegistryKind::Type => "type",
            RegistryKind::JobFragment => "job fragment",
            RegistryKind::StepsFragment => "steps fragment",
        }
    }

    fn duplicate_code(&self) -> &'static str {
        match self {
            RegistryKind::Type => codes::DUPLICATE_TYPE,
            RegistryKind::JobFragment | RegistryKind::StepsFragment => codes::DUPLICATE_FRAGMENT,
        }
    }
}

#[derive(Debug)]
pub struct Entry<T> {
    pub value: Arc<T>,
    /// True only for declarations made in the owning file
    pub exportable: bool,
    /// File the entry was imported from; `None` for local declarations
    pub provenance: Option<String>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            exportable: self.exportable,
            provenance: self.provenance.clone(),
        }
    }
}

impl<T> Entry<T> {
    /// Human-readable origin for diagnostics
    pub fn origin(&self) -> String {
        match &self.provenance {
            Some(path) => format!("imported from '{}'", path),
            None => "declared locally".to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct RegistryBuilder<T> {
    kind: RegistryKind,
    entries: BTreeMap<String, Entry<T>>,
}

impl<T: Named> RegistryBuilder<T> {
    pub fn new(kind: RegistryKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn entry(&self, name: &str) -> Option<&Entry<T>> {
        self.entries.get(name)
    }

    /// Register a local declaration; rejects a name that is already bound
    pub fn register(&mut self, decl: T) -> Result<(), Diagnostic> {
        if let Some(existing) = self.entries.get(decl.name()) {
            return Err(Diagnostic::error(
                self.kind.duplicate_code(),
                format!(
                    "duplicate {} '{}' ({})",
                    self.kind.label(),
                    decl.name(),
                    existing.origin()
                ),
                decl.span(),
            )
            .with_hint(format!("rename one of the '{}' declarations", decl.name())));
        }
        self.entries.insert(
            decl.name().to_string(),
            Entry {
                value: Arc::new(decl),
                exportable: true,
                provenance: None,
            },
        );
        Ok(())
    }

    /// Import named entries from another file's frozen registry
    pub fn import_from(
        &mut self,
        source: &Registry<T>,
        items: &[ImportItem],
        from_path: &str,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for item in items {
            if let Some(diagnostic) = self.import_one(source, item, from_path) {
                diagnostics.push(diagnostic);
            }
        }
        diagnostics
    }

    fn import_one(
        &mut self,
        source: &Registry<T>,
        item: &ImportItem,
        from_path: &str,
    ) -> Option<Diagnostic> {
        let label = self.kind.label();

        let Some(found) = source.entry(&item.name) else {
            let mut diagnostic = Diagnostic::error(
                codes::IMPORTED_NAME_NOT_FOUND,
                format!("{} '{}' is not declared in '{}'", label, item.name, from_path),
                item.span,
            );
            if let Some(suggestion) = did_you_mean(&item.name, source.exportable_names()) {
                diagnostic = diagnostic.with_hint(format!("did you mean '{}'?", suggestion));
            }
            return Some(diagnostic);
        };

        if !found.exportable {
            let origin = found.provenance.as_deref().unwrap_or("another file");
            return Some(
                Diagnostic::error(
                    codes::NOT_EXPORTABLE,
                    format!(
                        "{} '{}' is not exportable from '{}': it is imported there from '{}'",
                        label, item.name, from_path, origin
                    ),
                    item.span,
                )
                .with_hint(format!("import '{}' directly from '{}'", item.name, origin)),
            );
        }

        let local = item.local_name();
        if let Some(existing) = self.entries.get(local) {
            return Some(
                Diagnostic::error(
                    codes::IMPORT_COLLISION,
                    format!(
                        "imported {} '{}' collides with '{}' ({})",
                        label,
                        local,
                        local,
                        existing.origin()
                    ),
                    item.span,
                )
                .with_hint(format!(
                    "import it under another name: {{ name: {}, as: <alias> }}",
                    item.name
                )),
            );
        }

        self.entries.insert(
            local.to_string(),
            Entry {
                value: Arc::clone(&found.value),
                exportable: false,
                provenance: Some(from_path.to_string()),
            },
        );
        None
    }

    pub fn freeze(self) -> Registry<T> {
        Registry {
            kind: self.kind,
            entries: self.entries,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// FROZEN VIEW
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct Registry<T> {
    kind: RegistryKind,
    entries: BTreeMap<String, Entry<T>>,
}

impl<T> Registry<T> {
    pub fn kind(&self) -> RegistryKind {
        self.kind
    }

    pub fn get(&self, name: &str) -> Option<&Arc<T>> {
        self.entries.get(name).map(|e| &e.value)
    }

    pub fn entry(&self, name: &str) -> Option<&Entry<T>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All bound names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Names another file may import
    pub fn exportable_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.exportable)
            .map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry<T>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            entries: self.entries.clone(),
        }
    }
}
