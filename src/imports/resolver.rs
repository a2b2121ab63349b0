//! Import resolution - load the import closure of an entry file
//!
//! Walk:
//! 1. Load and parse each reachable file exactly once (cached by `path_key`)
//! 2. Record one graph edge per successful import
//! 3. Report an import cycle, if any, at the import that closes it
//! 4. Build and freeze each file's registries, dependencies first

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;

use tracing::{debug, info, instrument};

use crate::ast::{ImportDecl, WorkflowFile};
use crate::diagnostic::{codes, Diagnostic};
use crate::error::{GantryError, Result};
use crate::frontend::parse_source;
use crate::registry::{
    FragmentRegistry, FragmentRegistryBuilder, TypeRegistry, TypeRegistryBuilder,
};
use crate::util::did_you_mean;

use super::graph::ImportGraph;
use super::loader::SourceLoader;
use super::path::{
    file_name, normalize_path, parent_dir, path_key, resolve_import_path, ImportPathError,
};

/// One file of the import closure with its frozen registries
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    /// Normalized path
    pub path: String,
    /// `None` when the file failed to parse
    pub ast: Option<WorkflowFile>,
    pub types: TypeRegistry,
    pub fragments: FragmentRegistry,
}

/// Outcome of resolving an entry file
#[derive(Debug, Clone)]
pub struct Resolution {
    pub entry: String,
    /// Keyed by `path_key`
    pub files: BTreeMap<String, ResolvedFile>,
    pub graph: ImportGraph,
    /// Dependencies-first order of normalized paths
    pub order: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    pub fn entry_file(&self) -> Option<&ResolvedFile> {
        self.files.get(&path_key(&self.entry))
    }
}

struct LoadedFile {
    path: String,
    ast: Option<WorkflowFile>,
    /// Resolved key per import declaration, `None` when it failed
    targets: Vec<Option<String>>,
}

pub struct ImportResolver<L> {
    loader: L,
    root: Option<String>,
}

impl<L: SourceLoader> ImportResolver<L> {
    pub fn new(loader: L) -> Self {
        Self { loader, root: None }
    }

    /// Reject imports that resolve outside `root`
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(normalize_path(&root.into()));
        self
    }

    /// Load the entry file through the loader, then resolve its imports
    pub async fn resolve(&self, entry: &str) -> Result<Resolution> {
        let path = normalize_path(entry);
        let text = self.loader.load(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => GantryError::SourceNotFound { path: path.clone() },
            _ => GantryError::Read {
                path: path.clone(),
                source: e,
            },
        })?;
        Ok(self.resolve_source(&path, &text).await)
    }

    /// Resolve imports starting from already-read entry text
    #[instrument(skip(self, text))]
    pub async fn resolve_source(&self, entry: &str, text: &str) -> Resolution {
        let entry = normalize_path(entry);
        let base = self.loader.base_dir();
        let mut graph = ImportGraph::new();
        let mut diagnostics = Vec::new();
        let mut loaded: BTreeMap<String, LoadedFile> = BTreeMap::new();
        let mut missing: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        let entry_key = graph.add_file(&entry);
        loaded.insert(entry_key.clone(), parse(&entry, text, &mut diagnostics));
        queue.push_back(entry_key);

        while let Some(key) = queue.pop_front() {
            let Some(file) = loaded.get(&key) else {
                continue;
            };
            let importer = file.path.clone();
            let decls: Vec<ImportDecl> = file
                .ast
                .as_ref()
                .map(|ast| ast.imports.clone())
                .unwrap_or_default();

            let mut targets = Vec::with_capacity(decls.len());
            for decl in &decls {
                let resolved = match resolve_import_path(
                    &importer,
                    &decl.from,
                    self.root.as_deref(),
                    base.as_deref(),
                ) {
                    Ok(resolved) => resolved,
                    Err(err) => {
                        diagnostics.push(path_diagnostic(&err, decl).in_file(&importer));
                        targets.push(None);
                        continue;
                    }
                };
                let target_key = path_key(&resolved);

                if loaded.contains_key(&target_key) {
                    graph.add_edge(&importer, &resolved);
                    targets.push(Some(target_key));
                    continue;
                }

                let failure = if missing.contains(&target_key) {
                    Some(io::Error::from(io::ErrorKind::NotFound))
                } else {
                    match self.loader.load(&resolved).await {
                        Ok(text) => {
                            debug!(file = %resolved, imported_by = %importer, "loaded import");
                            graph.add_edge(&importer, &resolved);
                            loaded.insert(target_key.clone(), parse(&resolved, &text, &mut diagnostics));
                            queue.push_back(target_key.clone());
                            None
                        }
                        Err(err) => Some(err),
                    }
                };

                match failure {
                    None => targets.push(Some(target_key)),
                    Some(err) => {
                        missing.insert(target_key);
                        let diagnostic = self.not_found(decl, &resolved, &err).await;
                        diagnostics.push(diagnostic.in_file(&importer));
                        targets.push(None);
                    }
                }
            }

            if let Some(file) = loaded.get_mut(&key) {
                file.targets = targets;
            }
        }

        let order = match graph.get_topological_order() {
            Ok(order) => order,
            Err(cycle) => {
                if let Some(diagnostic) = cycle_diagnostic(&cycle, &loaded) {
                    diagnostics.push(diagnostic);
                }
                graph.dependency_postorder()
            }
        };

        let mut files: BTreeMap<String, ResolvedFile> = BTreeMap::new();
        for path in &order {
            let key = path_key(path);
            if let Some(file) = loaded.remove(&key) {
                let resolved = build_registries(file, &files, &mut diagnostics);
                files.insert(key, resolved);
            }
        }

        info!(
            files = files.len(),
            diagnostics = diagnostics.len(),
            "resolved import closure"
        );

        Resolution {
            entry,
            files,
            graph,
            order,
            diagnostics,
        }
    }

    async fn not_found(&self, decl: &ImportDecl, resolved: &str, err: &io::Error) -> Diagnostic {
        let message = if err.kind() == io::ErrorKind::NotFound {
            format!("cannot find imported file '{}' (resolved to '{}')", decl.from, resolved)
        } else {
            format!("cannot read imported file '{}': {}", resolved, err)
        };
        let diagnostic = Diagnostic::error(codes::IMPORT_NOT_FOUND, message, decl.span);

        let siblings = self.loader.list_dir(&parent_dir(resolved)).await;
        let wanted = file_name(resolved);
        match did_you_mean(wanted, siblings.iter().map(String::as_str)) {
            Some(suggestion) => {
                let prefix = &decl.from[..decl.from.len() - file_name(&decl.from).len()];
                diagnostic.with_hint(format!("did you mean '{}{}'?", prefix, suggestion))
            }
            None => diagnostic.with_hint("import paths are relative to the importing file"),
        }
    }
}

fn parse(path: &str, text: &str, diagnostics: &mut Vec<Diagnostic>) -> LoadedFile {
    let parsed = parse_source(path, text);
    diagnostics.extend(parsed.diagnostics);
    LoadedFile {
        path: path.to_string(),
        ast: parsed.file,
        targets: Vec::new(),
    }
}

fn path_diagnostic(err: &ImportPathError, decl: &ImportDecl) -> Diagnostic {
    match err {
        ImportPathError::OutsideRoot { .. } => {
            Diagnostic::error(codes::IMPORT_OUTSIDE_ROOT, err.to_string(), decl.span)
                .with_hint("move the shared file inside the project root")
        }
        ImportPathError::Absolute(_) | ImportPathError::Bare(_) => {
            Diagnostic::error(codes::INVALID_IMPORT_PATH, err.to_string(), decl.span)
                .with_hint(format!("write it relative to this file, e.g. './{}'", file_name(&decl.from)))
        }
    }
}

/// Report a cycle at the import that closes it
fn cycle_diagnostic(cycle: &[String], loaded: &BTreeMap<String, LoadedFile>) -> Option<Diagnostic> {
    let [.., closer, target] = cycle else {
        return None;
    };
    let file = loaded.get(&path_key(closer))?;
    let target_key = path_key(target);
    let decl_index = file
        .targets
        .iter()
        .position(|t| t.as_deref() == Some(target_key.as_str()))?;
    let decl = file.ast.as_ref()?.imports.get(decl_index)?;

    Some(
        Diagnostic::error(
            codes::IMPORT_CYCLE,
            format!("import cycle: '{}' imports '{}'", closer, target),
            decl.span,
        )
        .with_hint(format!(
            "cycle: {}; move the shared declarations into a file neither imports",
            cycle.join(" -> ")
        ))
        .in_file(&file.path),
    )
}

fn build_registries(
    file: LoadedFile,
    built: &BTreeMap<String, ResolvedFile>,
    diagnostics: &mut Vec<Diagnostic>,
) -> ResolvedFile {
    let mut types = TypeRegistryBuilder::for_types();
    let mut fragments = FragmentRegistryBuilder::new();
    let path = file.path;
    let mut local: Vec<Diagnostic> = Vec::new();

    if let Some(ast) = &file.ast {
        for decl in &ast.types {
            if let Err(d) = types.register(decl.clone()) {
                local.push(d);
            }
        }
        for fragment in &ast.job_fragments {
            if let Err(d) = fragments.register_job(fragment.clone()) {
                local.push(d);
            }
        }
        for fragment in &ast.steps_fragments {
            if let Err(d) = fragments.register_steps(fragment.clone()) {
                local.push(d);
            }
        }

        for (decl, target) in ast.imports.iter().zip(&file.targets) {
            // Unbuilt targets sit on an import cycle, already reported
            let Some(source) = target.as_ref().and_then(|t| built.get(t)) else {
                continue;
            };
            if source.ast.is_none() {
                continue;
            }
            local.extend(types.import_from(&source.types, &decl.types, &source.path));
            local.extend(fragments.import_jobs(&source.fragments, &decl.job_fragments, &source.path));
            local.extend(fragments.import_steps(
                &source.fragments,
                &decl.steps_fragments,
                &source.path,
            ));
        }
    }

    diagnostics.extend(local.into_iter().map(|d| d.in_file(&path)));
    ResolvedFile {
        path,
        ast: file.ast,
        types: types.freeze(),
        fragments: fragments.freeze(),
    }
}
