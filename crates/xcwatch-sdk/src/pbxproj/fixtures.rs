use std::fs;
use std::path::{Path, PathBuf};

/// Single-target iOS app project with automatic signing (team `ABCDE12345`).
pub(crate) const MINIMAL_PROJECT: &str = include_str!("../../tests/fixtures/HostApp.pbxproj");

/// Writes the fixture to `<root>/HostApp.xcodeproj/project.pbxproj`.
pub(crate) fn write_fixture_project(root: &Path) -> PathBuf {
    let dir = root.join("HostApp.xcodeproj");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("project.pbxproj");
    fs::write(&path, MINIMAL_PROJECT).unwrap();
    path
}
