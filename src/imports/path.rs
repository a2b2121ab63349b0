//! Import path arithmetic - pure string functions, no I/O
//!
//! Paths use `/` after normalization. Keys (`path_key`) are additionally
//! lowercased so that `Lib/Types.yaml` and `lib/types.yaml` are one file.

use std::fmt;

/// Why an import specifier could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportPathError {
    Absolute(String),
    Bare(String),
    OutsideRoot { resolved: String, root: String },
}

impl fmt::Display for ImportPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportPathError::Absolute(spec) => {
                write!(f, "absolute import path '{}' is not allowed", spec)
            }
            ImportPathError::Bare(spec) => write!(
                f,
                "bare import specifier '{}' is not allowed; use a relative path",
                spec
            ),
            ImportPathError::OutsideRoot { resolved, root } => write!(
                f,
                "import resolves to '{}', outside the project root '{}'",
                resolved, root
            ),
        }
    }
}

/// Unify separators, drop `.` segments and fold `..` where possible
///
/// Idempotent: `normalize_path(normalize_path(p)) == normalize_path(p)`.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." && !is_drive(last) => {
                    segments.pop();
                }
                _ if absolute => {}
                Some(&last) if is_drive(last) => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Case-insensitive identity of a path
pub fn path_key(path: &str) -> String {
    normalize_path(path).to_lowercase()
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

pub fn is_absolute(spec: &str) -> bool {
    let unified = spec.replace('\\', "/");
    if unified.starts_with('/') {
        return true;
    }
    let bytes = unified.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// A specifier that is neither absolute nor explicitly relative (`./`, `../`)
pub fn is_bare(spec: &str) -> bool {
    let unified = spec.replace('\\', "/");
    !is_absolute(&unified)
        && !(unified == "."
            || unified == ".."
            || unified.starts_with("./")
            || unified.starts_with("../"))
}

/// True when `path` does not lie inside `root`
///
/// Relative paths on either side are anchored at `base` first. Without a
/// base, relative paths are taken to sit under an absolute `root`.
/// Comparison is by segment, case-insensitive.
pub fn escapes_root(path: &str, root: &str, base: Option<&str>) -> bool {
    let base = base.or_else(|| is_absolute(root).then_some(root));
    let root = path_key(&anchor(root, base));
    let path = path_key(&anchor(path, base));
    let root = segments(&root);
    let path = segments(&path);
    match path.strip_prefix(root.as_slice()) {
        Some(rest) => rest.contains(&".."),
        None => true,
    }
}

fn anchor(path: &str, base: Option<&str>) -> String {
    match base {
        Some(base) if !is_absolute(path) => normalize_path(&format!("{}/{}", base, path)),
        _ => normalize_path(path),
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".").collect()
}

/// Directory part of a normalized path (`.` for a bare file name)
pub fn parent_dir(path: &str) -> String {
    let normalized = normalize_path(path);
    match normalized.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => normalized[..idx].to_string(),
        None => ".".to_string(),
    }
}

/// Final path segment
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Resolve `spec` as written in `importer` to a normalized path
///
/// With a `root`, the result must lie inside it; `base` anchors relative
/// paths for that check (see [`escapes_root`]).
pub fn resolve_import_path(
    importer: &str,
    spec: &str,
    root: Option<&str>,
    base: Option<&str>,
) -> Result<String, ImportPathError> {
    if is_absolute(spec) {
        return Err(ImportPathError::Absolute(spec.to_string()));
    }
    if is_bare(spec) {
        return Err(ImportPathError::Bare(spec.to_string()));
    }

    let resolved = normalize_path(&format!("{}/{}", parent_dir(importer), spec));

    if let Some(root) = root {
        if escapes_root(&resolved, root, base) {
            return Err(ImportPathError::OutsideRoot {
                resolved,
                root: normalize_path(root),
            });
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a/./b/../c.yaml"), "a/c.yaml");
        assert_eq!(normalize_path("a\\b\\c.yaml"), "a/b/c.yaml");
        assert_eq!(normalize_path("../x/../../y"), "../../y");
        assert_eq!(normalize_path("/a/../../b"), "/b");
        assert_eq!(normalize_path("./"), ".");
        assert_eq!(normalize_path("a//b/"), "a/b");
    }

    #[test]
    fn test_path_key_is_case_insensitive() {
        assert_eq!(path_key("Lib/Types.YAML"), path_key("./lib/types.yaml"));
    }

    #[test]
    fn test_absolute_and_bare() {
        assert!(is_absolute("/etc/x.yaml"));
        assert!(is_absolute("C:\\x.yaml"));
        assert!(!is_absolute("./x.yaml"));
        assert!(is_bare("shared.yaml"));
        assert!(is_bare("pkg/shared.yaml"));
        assert!(!is_bare("./shared.yaml"));
        assert!(!is_bare("../shared.yaml"));
        assert!(!is_bare("/shared.yaml"));
    }

    #[test]
    fn test_escapes_root() {
        assert!(!escapes_root("proj/a/b.yaml", "proj", None));
        assert!(escapes_root("project2/b.yaml", "proj", None));
        assert!(escapes_root("../b.yaml", ".", None));
        assert!(!escapes_root("a/b.yaml", ".", None));
    }

    #[test]
    fn test_escapes_root_by_segment() {
        assert!(!escapes_root("..foo/b.yaml", ".", None));
        assert!(!escapes_root("../shared/b.yaml", "../shared", None));
        assert!(escapes_root("../other/b.yaml", "../shared", None));
        assert!(!escapes_root("Proj/B.yaml", "proj/", None));
    }

    #[test]
    fn test_escapes_root_mixes_absolute_and_relative() {
        // Relative entry, absolute root from config
        assert!(!escapes_root("lib.yaml", "/home/user/proj", Some("/home/user/proj")));
        assert!(!escapes_root("sub/lib.yaml", "/home/user/proj", Some("/home/user/proj/sub/..")));
        assert!(escapes_root("../lib.yaml", "/home/user/proj", Some("/home/user/proj")));
        assert!(!escapes_root("proj/lib.yaml", "/home/user/proj", Some("/home/user")));
        // No base known: relative paths sit under the root
        assert!(!escapes_root("lib.yaml", "/home/user/proj", None));
        assert!(escapes_root("../lib.yaml", "/home/user/proj", None));
        // Absolute paths against a relative root
        assert!(!escapes_root("/work/proj/a.yaml", "proj", Some("/work")));
        assert!(escapes_root("/work/a.yaml", "proj", Some("/work")));
    }

    #[test]
    fn test_resolve_import_path() {
        assert_eq!(
            resolve_import_path("wf/main.yaml", "./lib/t.yaml", None, None).unwrap(),
            "wf/lib/t.yaml"
        );
        assert_eq!(
            resolve_import_path("wf/main.yaml", "../shared.yaml", None, None).unwrap(),
            "shared.yaml"
        );
        assert!(matches!(
            resolve_import_path("main.yaml", "/abs.yaml", None, None),
            Err(ImportPathError::Absolute(_))
        ));
        assert!(matches!(
            resolve_import_path("main.yaml", "lib.yaml", None, None),
            Err(ImportPathError::Bare(_))
        ));
        assert!(matches!(
            resolve_import_path("proj/main.yaml", "../../x.yaml", Some("proj"), None),
            Err(ImportPathError::OutsideRoot { .. })
        ));
        assert!(resolve_import_path("proj/main.yaml", "../x.yaml", None, None).is_ok());
    }

    #[test]
    fn test_parent_and_file_name() {
        assert_eq!(parent_dir("a/b/c.yaml"), "a/b");
        assert_eq!(parent_dir("c.yaml"), ".");
        assert_eq!(parent_dir("/c.yaml"), "/");
        assert_eq!(file_name("a/b/c.yaml"), "c.yaml");
    }
}
