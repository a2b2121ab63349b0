//! Declaring-file scopes
//!
//! An imported entry shares the declaration of the file it came from, and
//! names used inside that declaration resolve in that file's registries,
//! never in the importer's.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ast::{JobFragment, StepsFragment, TypeDeclaration};
use crate::registry::{Entry, FragmentRegistry, TypeRegistry};

use super::path::path_key;
use super::resolver::ResolvedFile;

/// Resolved files of one import closure, keyed by `path_key`
pub type ResolvedFiles = BTreeMap<String, ResolvedFile>;

fn declaring<'a, T>(files: Option<&'a ResolvedFiles>, entry: &Entry<T>) -> Option<&'a ResolvedFile> {
    files?.get(&path_key(entry.provenance.as_deref()?))
}

/// Type lookups that follow imported entries back to their declaring file
#[derive(Debug, Clone, Copy)]
pub struct TypeScope<'a> {
    types: &'a TypeRegistry,
    files: Option<&'a ResolvedFiles>,
}

impl<'a> TypeScope<'a> {
    /// A lone registry; imported entries resolve in it too
    pub fn local(types: &'a TypeRegistry) -> Self {
        Self { types, files: None }
    }

    pub fn new(types: &'a TypeRegistry, files: &'a ResolvedFiles) -> Self {
        Self {
            types,
            files: Some(files),
        }
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.types
    }

    /// Declaration bound to `name`, with the scope its fields resolve in
    pub fn lookup(&self, name: &str) -> Option<(&'a Arc<TypeDeclaration>, TypeScope<'a>)> {
        let entry = self.types.entry(name)?;
        let scope = match declaring(self.files, entry) {
            Some(file) => Self {
                types: &file.types,
                files: self.files,
            },
            None => *self,
        };
        Some((&entry.value, scope))
    }
}

/// Fragment lookups that follow imported entries back to their declaring file
#[derive(Debug, Clone, Copy)]
pub struct FragmentScope<'a> {
    fragments: &'a FragmentRegistry,
    files: Option<&'a ResolvedFiles>,
}

impl<'a> FragmentScope<'a> {
    pub fn local(fragments: &'a FragmentRegistry) -> Self {
        Self {
            fragments,
            files: None,
        }
    }

    pub fn new(fragments: &'a FragmentRegistry, files: &'a ResolvedFiles) -> Self {
        Self {
            fragments,
            files: Some(files),
        }
    }

    pub fn registry(&self) -> &'a FragmentRegistry {
        self.fragments
    }

    /// Job fragment bound to `name`, with the scope its body expands in
    pub fn job(&self, name: &str) -> Option<(&'a Arc<JobFragment>, FragmentScope<'a>)> {
        let entry = self.fragments.jobs.entry(name)?;
        Some((&entry.value, self.declared_by(entry)))
    }

    /// Steps fragment bound to `name`, with the scope its body expands in
    pub fn steps(&self, name: &str) -> Option<(&'a Arc<StepsFragment>, FragmentScope<'a>)> {
        let entry = self.fragments.steps.entry(name)?;
        Some((&entry.value, self.declared_by(entry)))
    }

    fn declared_by<T>(&self, entry: &Entry<T>) -> FragmentScope<'a> {
        match declaring(self.files, entry) {
            Some(file) => Self {
                fragments: &file.fragments,
                files: self.files,
            },
            None => *self,
        }
    }
}
