//! Path and file helpers shared by the composer and the native target service.
//!
//! Paths written into `project.pbxproj` are relative to the native project
//! root and always use `/` separators, whatever the host platform. The helpers
//! here work lexically and never touch the filesystem unless stated otherwise,
//! so they behave the same for paths that do not exist yet.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::trace;
use walkdir::WalkDir;

use crate::types::ComposeError;

/// Resolves `path` against `base` and normalizes `.` and `..` components.
///
/// Absolute `path`s are returned normalized, ignoring `base`.
pub fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let joined = base.join(path);
    normalize(&joined)
}

/// Lexically normalizes a path (`a/./b/../c` becomes `a/c`).
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if popped {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Path of `target` relative to `root`, with `/` separators.
///
/// # Arguments
/// * `root` - The native project root (the directory holding `*.xcodeproj`)
/// * `target` - Any path; when only one of `root` and `target` is relative, it is
///   taken relative to the current directory
///
/// # Returns
/// A project-relative path such as `../app/watchapp/Watch/ContentView.swift`.
/// Returns `.` when both paths are the same.
pub fn relative_path(root: &Path, target: &Path) -> String {
    let (root, target) = if root.is_absolute() == target.is_absolute() {
        (normalize(root), normalize(target))
    } else {
        // Mixed inputs: anchor the relative one at the current directory.
        (normalize(&absolute_or_self(root)), normalize(&absolute_or_self(target)))
    };
    let root_parts: Vec<Component> = root.components().collect();
    let target_parts: Vec<Component> = target.components().collect();

    let common = root_parts
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..root_parts.len() {
        parts.push("..".to_string());
    }
    for component in &target_parts[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    if parts.is_empty() {
        return ".".to_string();
    }
    parts.join("/")
}

fn absolute_or_self(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// True for dotfiles and dot-directories.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// File name of a path as UTF-8, or an empty string.
pub fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

/// Copies `src` over `dst` unless they are the same file.
///
/// Returns `true` when a copy happened. An existing, different `dst` is overwritten.
pub fn copy_if_different(src: &Path, dst: &Path) -> Result<bool, ComposeError> {
    if normalize(src) == normalize(dst) {
        return Ok(false);
    }
    if let (Ok(a), Ok(b)) = (fs::canonicalize(src), fs::canonicalize(dst)) {
        if a == b {
            return Ok(false);
        }
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    trace!("Copied {} to {}", src.display(), dst.display());
    Ok(true)
}

/// Child entries of a directory sorted by name, so scans are deterministic.
pub fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, ComposeError> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| Ok(entry?.into_path()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_removes_dot_segments() {
        assert_eq!(normalize(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(normalize(Path::new("/a/../../b")), PathBuf::from("/b"));
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/work/app/platforms/ios");
        assert_eq!(
            relative_path(root, Path::new("/work/app/platforms/ios/watchapp/W/A.swift")),
            "watchapp/W/A.swift"
        );
        assert_eq!(
            relative_path(root, Path::new("/work/app/App_Resources/iOS/watchapp/W")),
            "../../App_Resources/iOS/watchapp/W"
        );
        assert_eq!(relative_path(root, root), ".");
    }

    #[test]
    fn test_relative_path_with_mixed_roots() {
        let cwd = std::env::current_dir().unwrap();
        let target = cwd.join("app/App_Resources/iOS/watchapp/W/A.swift");
        assert_eq!(
            relative_path(Path::new("platforms/ios"), &target),
            "../../app/App_Resources/iOS/watchapp/W/A.swift"
        );
        assert_eq!(
            relative_path(&cwd.join("platforms/ios"), Path::new("app/W")),
            "../../app/W"
        );
    }

    #[test]
    fn test_resolve_path_against_base() {
        assert_eq!(
            resolve_path(Path::new("/p/watchapp/W"), "../../shared/Data.xcframework"),
            PathBuf::from("/p/shared/Data.xcframework")
        );
        assert_eq!(resolve_path(Path::new("/p"), "/abs/x"), PathBuf::from("/abs/x"));
    }

    #[test]
    fn test_copy_if_different() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("custom.plist");
        let dst = temp.path().join("target/Info.plist");
        fs::write(&src, "new").unwrap();

        assert!(copy_if_different(&src, &dst).unwrap());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "new");
        assert!(!copy_if_different(&dst, &dst).unwrap());
    }

    #[test]
    fn test_sorted_entries() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.swift"), "").unwrap();
        fs::write(temp.path().join("a.swift"), "").unwrap();
        let names: Vec<_> = sorted_entries(temp.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p).to_string())
            .collect();
        assert_eq!(names, vec!["a.swift", "b.swift"]);
    }
}
