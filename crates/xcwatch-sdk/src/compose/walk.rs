//! File classification and the recursive directory walk.

use std::path::Path;

use tracing::trace;
use walkdir::{DirEntry, WalkDir};

use super::exclude::is_excluded;
use crate::common::{file_name, is_hidden, relative_path, sorted_entries};
use crate::types::{ComposeError, EXTENSION_CONFIG_FILE, WATCHAPP_CONFIG_FILE};

pub const SOURCE_EXTENSIONS: &[&str] = &["swift", "m", "mm", "c", "cpp", "cc", "cxx", "h", "hpp"];

pub const RESOURCE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "pdf", "ttf", "otf", "woff", "woff2", "xcassets",
    "storyboard", "xib", "strings", "stringsdict", "json", "xml", "plist", "m4a", "mp3", "wav",
    "caf", "mp4", "mov", "bundle",
];

/// Directories added as one opaque resource.
pub const BUNDLE_SUFFIXES: &[&str] = &[".xcassets", ".bundle"];

const IGNORED_NAMES: &[&str] = &["node_modules", WATCHAPP_CONFIG_FILE, EXTENSION_CONFIG_FILE];

/// Consumed through `INFOPLIST_FILE`; Xcode refuses it as a bundle resource.
const INFO_PLIST: &str = "Info.plist";

/// What a filesystem entry contributes to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Source,
    Resource,
    /// `.xcassets` / `.bundle` directory.
    ResourceBundle,
    /// A plain directory to descend into.
    Directory,
    Ignored,
}

/// Classifies an entry by name.
pub fn classify(name: &str, is_dir: bool) -> FileClass {
    if is_hidden(name) || IGNORED_NAMES.contains(&name) {
        return FileClass::Ignored;
    }
    if is_dir {
        if BUNDLE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            return FileClass::ResourceBundle;
        }
        return FileClass::Directory;
    }
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if SOURCE_EXTENSIONS.contains(&extension.as_str()) {
        FileClass::Source
    } else if RESOURCE_EXTENSIONS.contains(&extension.as_str()) {
        FileClass::Resource
    } else {
        FileClass::Ignored
    }
}

/// Which entries a walk collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Source-extension files.
    Sources,
    /// Resource-extension files and bundles.
    Resources,
    /// Every non-hidden file and bundle, regardless of extension.
    AllFiles,
}

/// Walks a directory tree and returns project-relative paths to add.
///
/// Bundles are returned as one entry and never entered. Every candidate
/// (directories included) is checked against `excludes` first, and an
/// excluded directory is pruned with everything below it.
pub fn walk(
    dir: &Path,
    mode: WalkMode,
    project_root: &Path,
    excludes: &[String],
) -> Result<Vec<String>, ComposeError> {
    let mut found = Vec::new();
    let mut entries = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| keep_entry(entry, mode, project_root, excludes));

    while let Some(entry) = entries.next() {
        let entry = entry?;
        let name = entry.file_name().to_str().unwrap_or_default();
        let is_dir = entry.file_type().is_dir();
        let class = match mode {
            WalkMode::AllFiles => match classify(name, is_dir) {
                FileClass::ResourceBundle => FileClass::ResourceBundle,
                _ if is_dir => FileClass::Directory,
                _ => FileClass::Resource,
            },
            _ => classify(name, is_dir),
        };

        match (mode, class) {
            (_, FileClass::ResourceBundle) => {
                if mode != WalkMode::Sources {
                    found.push(relative_path(project_root, entry.path()));
                }
                entries.skip_current_dir();
            }
            (WalkMode::Sources, FileClass::Source) => found.push(relative_path(project_root, entry.path())),
            // Info.plist is wired through INFOPLIST_FILE, never as a bundle resource.
            (WalkMode::Resources, FileClass::Resource) if name == INFO_PLIST => {
                trace!("Skipping {} as a resource", entry.path().display());
            }
            (WalkMode::Resources | WalkMode::AllFiles, FileClass::Resource) => {
                found.push(relative_path(project_root, entry.path()))
            }
            _ => {}
        }
    }
    Ok(found)
}

/// Prunes hidden entries, ignored names and excluded paths before they are visited.
fn keep_entry(entry: &DirEntry, mode: WalkMode, project_root: &Path, excludes: &[String]) -> bool {
    let name = entry.file_name().to_str().unwrap_or_default();
    if is_hidden(name) {
        return false;
    }
    if mode != WalkMode::AllFiles && IGNORED_NAMES.contains(&name) {
        return false;
    }
    let relative = relative_path(project_root, entry.path());
    if is_excluded(&relative, excludes) {
        trace!("Excluded {}", relative);
        return false;
    }
    true
}

/// Source files directly inside `dir` (no recursion).
pub fn source_files_in(dir: &Path, project_root: &Path) -> Result<Vec<String>, ComposeError> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|entry| entry.is_file() && classify(file_name(entry), false) == FileClass::Source)
        .map(|entry| relative_path(project_root, &entry))
        .collect())
}
