//! Imports - cross-file resolution
//!
//! - `path`: specifier checks and normalization (pure)
//! - `graph`: import graph with cycle, order and closure queries
//! - `loader`: `SourceLoader` trait with filesystem and in-memory loaders
//! - `resolver`: walks the import closure and builds per-file registries
//! - `scope`: lookups that resolve imported entries in their declaring file

pub mod graph;
pub mod loader;
pub mod path;
mod resolver;
pub mod scope;

pub use graph::ImportGraph;
pub use loader::{FsLoader, MemoryLoader, SourceLoader};
pub use path::{
    escapes_root, is_absolute, is_bare, normalize_path, path_key, resolve_import_path,
    ImportPathError,
};
pub use resolver::{ImportResolver, Resolution, ResolvedFile};
pub use scope::{FragmentScope, ResolvedFiles, TypeScope};
