//! Compiler - the pipeline from source files to platform YAML
//!
//! ```text
//! resolve imports ─▶ validate declarations (every file)
//!        │
//!        ▼
//! expand fragments ─▶ validate workflow ─▶ lower ─▶ emit
//! ```
//!
//! Problems in the source come back as diagnostics inside a
//! [`CompileResult`]; only infrastructure failures are `Err`.

use std::path::Path;

use tracing::{info, instrument};

use crate::config::CompilerConfig;
use crate::diagnostic::{codes, has_errors, CompileResult, Diagnostic};
use crate::emit::emit;
use crate::error::{GantryError, Result};
use crate::fragments::expand_workflow;
use crate::imports::{
    FragmentScope, FsLoader, ImportResolver, MemoryLoader, Resolution, SourceLoader, TypeScope,
};
use crate::ir::WorkflowIr;
use crate::lower::{lower_workflow, LowerContext};
use crate::validate::{validate_file, validate_workflow, ValidationContext};

#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile an entry file and its imports from disk
    pub async fn compile_file(&self, path: impl AsRef<Path>) -> Result<CompileResult<String>> {
        let entry = path.as_ref().to_string_lossy().into_owned();
        self.compile_with(FsLoader, &entry).await
    }

    /// Compile an entry file read through any loader
    pub async fn compile_with<L: SourceLoader>(
        &self,
        loader: L,
        entry: &str,
    ) -> Result<CompileResult<String>> {
        let resolution = self.resolver(loader).resolve(entry).await?;
        self.compile_resolution(&resolution)
    }

    /// Compile a single in-memory source
    ///
    /// Imports resolve against `files`. Blocks on a private runtime, so this
    /// must not be called from async code; use [`Compiler::compile_with`]
    /// there.
    pub fn compile_source(
        &self,
        path: &str,
        text: &str,
        files: &[(&str, &str)],
    ) -> Result<CompileResult<String>> {
        let mut loader = MemoryLoader::new();
        for (file, content) in files {
            loader.insert(file, content);
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(GantryError::Runtime)?;
        let resolution = runtime.block_on(self.resolver(loader).resolve_source(path, text));
        self.compile_resolution(&resolution)
    }

    /// Check, lower and emit a resolved import closure
    pub fn compile_resolution(&self, resolution: &Resolution) -> Result<CompileResult<String>> {
        match self.build_ir(resolution) {
            CompileResult::Success { value, diagnostics } => Ok(CompileResult::Success {
                value: emit(&value)?,
                diagnostics,
            }),
            CompileResult::Failure { diagnostics } => Ok(CompileResult::Failure { diagnostics }),
        }
    }

    /// Check and lower a resolved import closure
    #[instrument(skip_all, fields(entry = %resolution.entry))]
    pub fn build_ir(&self, resolution: &Resolution) -> CompileResult<WorkflowIr> {
        let mut diagnostics = resolution.diagnostics.clone();

        for file in resolution.files.values() {
            if let Some(ast) = &file.ast {
                diagnostics.extend(
                    validate_file(ast, &file.types)
                        .into_iter()
                        .map(|d| d.in_file(&file.path)),
                );
            }
        }

        let Some(entry) = resolution.entry_file() else {
            return CompileResult::Failure { diagnostics };
        };
        let Some(ast) = &entry.ast else {
            return CompileResult::Failure { diagnostics };
        };
        let Some(workflow) = ast.entry_workflow() else {
            diagnostics.push(
                Diagnostic::error(
                    codes::NO_WORKFLOW,
                    format!("'{}' declares no workflow", entry.path),
                    Default::default(),
                )
                .with_hint("add a `workflows:` list, or import this file from one that has it")
                .in_file(&entry.path),
            );
            return CompileResult::Failure { diagnostics };
        };

        let fragments = FragmentScope::new(&entry.fragments, &resolution.files);
        let (expanded, expansion) = expand_workflow(workflow, fragments);
        diagnostics.extend(expansion.into_iter().map(|d| d.in_file(&entry.path)));

        let ctx = ValidationContext {
            types: &entry.types,
            matrix: self.config.matrix,
        };
        diagnostics.extend(
            validate_workflow(&expanded, &ctx)
                .into_iter()
                .map(|d| d.in_file(&entry.path)),
        );

        if has_errors(&diagnostics) {
            let errors = diagnostics.iter().filter(|d| d.is_error()).count();
            info!(errors, "compilation failed");
            return CompileResult::Failure { diagnostics };
        }

        let lower_ctx = LowerContext {
            actions: &self.config.actions,
            cycles: &self.config.cycles,
            types: TypeScope::new(&entry.types, &resolution.files),
        };
        let ir = lower_workflow(&expanded, &lower_ctx);
        info!(workflow = %ir.name, jobs = ir.jobs.len(), "compiled");
        CompileResult::Success {
            value: ir,
            diagnostics,
        }
    }

    fn resolver<L: SourceLoader>(&self, loader: L) -> ImportResolver<L> {
        let resolver = ImportResolver::new(loader);
        match &self.config.project_root {
            Some(root) => resolver.with_root(root.to_string_lossy()),
            None => resolver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;

    fn compile(text: &str) -> CompileResult<String> {
        Compiler::default()
            .compile_source("ci.yaml", text, &[])
            .unwrap()
    }

    #[test]
    fn test_minimal_workflow_compiles_cleanly() {
        let result = compile(
            "workflows:\n  - name: ci\n    on: push\n    jobs:\n      - { name: build, runs_on: ubuntu-latest, steps: [{ run: make }] }\n",
        );
        let CompileResult::Success { value, diagnostics } = result else {
            panic!("expected success");
        };
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert!(value.contains("on: push"));
        assert!(value.contains("build:"));
        assert!(value.contains("make"));
    }

    #[test]
    fn test_library_file_is_not_an_entry() {
        let result = compile("types:\n  - { name: T, fields: [{ name: a, type: int }] }\n");
        assert!(!result.is_success());
        assert_eq!(result.diagnostics()[0].code, codes::NO_WORKFLOW);
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let result = compile(
            "workflows:\n  - name: ci\n    on: push\n    cycles:\n      - { name: c, until: \"true\", body: [{ name: j, runs_on: x, steps: [{ run: a }] }] }\n",
        );
        assert!(result.is_success());
        assert!(result
            .diagnostics()
            .iter()
            .all(|d| d.severity == Severity::Warning));
    }

    #[test]
    fn test_errors_block_lowering() {
        let result = compile(
            "workflows:\n  - name: ci\n    jobs:\n      - { name: a, runs_on: x, needs: [ghost] }\n",
        );
        assert!(result.value().is_none());
        assert_eq!(result.diagnostics()[0].code, codes::UNKNOWN_DEPENDENCY);
        assert_eq!(result.diagnostics()[0].file.as_deref(), Some("ci.yaml"));
    }

    #[test]
    fn test_imports_resolve_from_supplied_files() {
        let lib = "steps_fragments:\n  - name: setup\n    steps: [{ run: make setup }]\n";
        let main = "imports:\n  - from: ./lib.yaml\n    steps_fragments: [setup]\nworkflows:\n  - name: ci\n    on: push\n    jobs:\n      - { name: build, runs_on: x, steps: [{ fragment: setup }] }\n";
        let result = Compiler::default()
            .compile_source("ci.yaml", main, &[("lib.yaml", lib)])
            .unwrap();
        let value = result.value().expect("compiles");
        assert!(value.contains("make setup"));
    }
}
