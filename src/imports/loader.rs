//! Source loaders - where import resolution reads file text from
//!
//! The resolver is written against the `SourceLoader` trait so the same
//! walk runs over the filesystem (`FsLoader`) or an in-memory file set
//! (`MemoryLoader`, used by tests and embedders).

use std::collections::BTreeMap;
use std::io;

use async_trait::async_trait;

use super::path::{normalize_path, parent_dir, path_key};

#[async_trait]
pub trait SourceLoader: Send + Sync {
    /// Read a file; `io::ErrorKind::NotFound` when it does not exist
    async fn load(&self, path: &str) -> io::Result<String>;

    /// File names in a directory, used for "did you mean" on missing imports
    async fn list_dir(&self, dir: &str) -> Vec<String>;

    /// Absolute directory that relative paths are read from, when known
    fn base_dir(&self) -> Option<String> {
        None
    }
}

/// Reads sources through `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

#[async_trait]
impl SourceLoader for FsLoader {
    async fn load(&self, path: &str) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn list_dir(&self, dir: &str) -> Vec<String> {
        let mut names = Vec::new();
        let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
            return names;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        names
    }

    fn base_dir(&self) -> Option<String> {
        let cwd = std::env::current_dir().ok()?;
        Some(normalize_path(&cwd.to_string_lossy()))
    }
}

/// In-memory file set keyed by `path_key`
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: BTreeMap<String, (String, String)>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, text: &str) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: &str, text: &str) {
        self.files
            .insert(path_key(path), (normalize_path(path), text.to_string()));
    }
}

#[async_trait]
impl SourceLoader for MemoryLoader {
    async fn load(&self, path: &str) -> io::Result<String> {
        self.files
            .get(&path_key(path))
            .map(|(_, text)| text.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path)))
    }

    async fn list_dir(&self, dir: &str) -> Vec<String> {
        let dir = path_key(dir);
        self.files
            .values()
            .filter(|(path, _)| path_key(&parent_dir(path)) == dir)
            .filter_map(|(path, _)| path.rsplit('/').next().map(str::to_string))
            .collect()
    }
}
