//! Fragment registry - job fragments and steps fragments
//!
//! Two namespaces with the same import/provenance model as types. A name
//! bound in one namespace may not be bound in the other.

use crate::ast::{ImportItem, JobFragment, StepsFragment};
use crate::diagnostic::{codes, Diagnostic};

use super::{Entry, Registry, RegistryBuilder, RegistryKind};

pub struct FragmentRegistryBuilder {
    jobs: RegistryBuilder<JobFragment>,
    steps: RegistryBuilder<StepsFragment>,
}

impl Default for FragmentRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentRegistryBuilder {
    pub fn new() -> Self {
        Self {
            jobs: RegistryBuilder::new(RegistryKind::JobFragment),
            steps: RegistryBuilder::new(RegistryKind::StepsFragment),
        }
    }

    pub fn register_job(&mut self, fragment: JobFragment) -> Result<(), Diagnostic> {
        if let Some(existing) = self.steps.entry(&fragment.name) {
            return Err(cross_collision(
                &fragment.name,
                RegistryKind::JobFragment,
                existing,
                RegistryKind::StepsFragment,
                fragment.span,
            ));
        }
        self.jobs.register(fragment)
    }

    pub fn register_steps(&mut self, fragment: StepsFragment) -> Result<(), Diagnostic> {
        if let Some(existing) = self.jobs.entry(&fragment.name) {
            return Err(cross_collision(
                &fragment.name,
                RegistryKind::StepsFragment,
                existing,
                RegistryKind::JobFragment,
                fragment.span,
            ));
        }
        self.steps.register(fragment)
    }

    pub fn import_jobs(
        &mut self,
        source: &FragmentRegistry,
        items: &[ImportItem],
        from_path: &str,
    ) -> Vec<Diagnostic> {
        let (clashing, clean): (Vec<&ImportItem>, Vec<&ImportItem>) = items
            .iter()
            .partition(|i| self.steps.contains(i.local_name()));
        let mut diagnostics: Vec<Diagnostic> = clashing
            .into_iter()
            .filter_map(|item| {
                let existing = self.steps.entry(item.local_name())?;
                Some(cross_collision(
                    item.local_name(),
                    RegistryKind::JobFragment,
                    existing,
                    RegistryKind::StepsFragment,
                    item.span,
                ))
            })
            .collect();
        let clean: Vec<ImportItem> = clean.into_iter().cloned().collect();
        diagnostics.extend(self.jobs.import_from(&source.jobs, &clean, from_path));
        diagnostics
    }

    pub fn import_steps(
        &mut self,
        source: &FragmentRegistry,
        items: &[ImportItem],
        from_path: &str,
    ) -> Vec<Diagnostic> {
        let (clashing, clean): (Vec<&ImportItem>, Vec<&ImportItem>) = items
            .iter()
            .partition(|i| self.jobs.contains(i.local_name()));
        let mut diagnostics: Vec<Diagnostic> = clashing
            .into_iter()
            .filter_map(|item| {
                let existing = self.jobs.entry(item.local_name())?;
                Some(cross_collision(
                    item.local_name(),
                    RegistryKind::StepsFragment,
                    existing,
                    RegistryKind::JobFragment,
                    item.span,
                ))
            })
            .collect();
        let clean: Vec<ImportItem> = clean.into_iter().cloned().collect();
        diagnostics.extend(self.steps.import_from(&source.steps, &clean, from_path));
        diagnostics
    }

    pub fn freeze(self) -> FragmentRegistry {
        FragmentRegistry {
            jobs: self.jobs.freeze(),
            steps: self.steps.freeze(),
        }
    }
}

fn cross_collision<T>(
    name: &str,
    kind: RegistryKind,
    existing: &Entry<T>,
    existing_kind: RegistryKind,
    span: crate::ast::Span,
) -> Diagnostic {
    Diagnostic::error(
        codes::FRAGMENT_NAMESPACE_COLLISION,
        format!(
            "{} '{}' collides with {} '{}' ({})",
            kind.label(),
            name,
            existing_kind.label(),
            name,
            existing.origin()
        ),
        span,
    )
    .with_hint("job fragments and steps fragments share one set of names")
}

/// Frozen fragment namespaces of one file
#[derive(Debug, Clone)]
pub struct FragmentRegistry {
    pub jobs: Registry<JobFragment>,
    pub steps: Registry<StepsFragment>,
}

impl Default for FragmentRegistry {
    fn default() -> Self {
        FragmentRegistryBuilder::new().freeze()
    }
}
