//! Module dependencies declared in a sidecar's `modules` array.

use std::path::Path;

use tracing::{trace, warn};

use super::walk::{WalkMode, walk};
use crate::common::{file_name, is_hidden, relative_path, resolve_path, sorted_entries};
use crate::descriptor::{FrameworkOptions, GroupOptions, ProjectDescriptor};
use crate::pbxproj::PlistValue;
use crate::sidecar::{ModuleDefinition, TargetConfig};
use crate::types::{ComposeError, NativeTarget, ProjectContext};

const INHERITED: &str = "$(inherited)";

/// Shape of a module path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// `.framework` or `.xcframework`.
    Framework,
    /// Directory with `Package.swift` and `Sources/`.
    SwiftPackage,
    /// Any other directory.
    Folder,
    Unknown,
}

/// Classifies an existing module path.
pub fn module_kind(path: &Path) -> ModuleKind {
    let name = file_name(path);
    if name.ends_with(".framework") || name.ends_with(".xcframework") {
        ModuleKind::Framework
    } else if path.is_dir() && path.join("Package.swift").is_file() && path.join("Sources").is_dir() {
        ModuleKind::SwiftPackage
    } else if path.is_dir() {
        ModuleKind::Folder
    } else {
        ModuleKind::Unknown
    }
}

/// Attaches one module to a target.
///
/// A module whose path is missing is skipped entirely, including its
/// `frameworks`, `headerSearchPaths` and `linkerFlags`.
pub fn add_module_dependency<D: ProjectDescriptor>(
    descriptor: &mut D,
    module: &ModuleDefinition,
    target: &NativeTarget,
    config: &TargetConfig,
    context: &ProjectContext,
) -> Result<(), ComposeError> {
    let Some(module_path) = module.path.as_deref().map(|path| config.resolve(path)) else {
        warn!("Module {} has no path, skipping", module.name.as_deref().unwrap_or("<unnamed>"));
        return Ok(());
    };
    if !module_path.exists() {
        warn!("Module path not found, skipping module: {}", module_path.display());
        return Ok(());
    }

    let project_root = &context.platform_root;
    let relative = relative_path(project_root, &module_path);
    let name = module
        .name
        .clone()
        .unwrap_or_else(|| file_name(&module_path).to_string());

    match module_kind(&module_path) {
        ModuleKind::Framework => {
            let embed = module.embed != Some(false);
            descriptor.add_framework(
                &relative,
                FrameworkOptions {
                    target_uuid: &target.uuid,
                    custom: true,
                    embed,
                },
            )?;
            add_framework_search_path(descriptor, parent_dir(&relative), &target.name);
            trace!("Added compiled framework {} at {} (embed: {})", name, relative, embed);
        }
        ModuleKind::SwiftPackage => {
            let sources = module_path.join("Sources");
            for file in walk(&sources, WalkMode::Sources, project_root, &[])? {
                descriptor.add_source_file(&file, &target.uuid)?;
            }
            descriptor.add_header_search_path(&relative, &target.name);
            descriptor.add_header_search_path(&relative_path(project_root, &sources), &target.name);
            trace!("Added Swift package module {} at {}", name, relative);
        }
        ModuleKind::Folder => {
            if !module_path.join("Info.plist").exists() {
                warn!("No Info.plist found in module folder: {}", module_path.display());
            }
            let files: Vec<String> = sorted_entries(&module_path)?
                .iter()
                .filter(|entry| !is_hidden(file_name(entry)))
                .map(|entry| relative_path(project_root, entry))
                .collect();
            if !files.is_empty() {
                descriptor.add_group(
                    &files,
                    &name,
                    &relative,
                    GroupOptions {
                        is_main: false,
                        target_uuid: &target.uuid,
                    },
                )?;
            }
            descriptor.add_header_search_path(&relative, &target.name);
            if let Some(module_map) = &module.module_map {
                let module_map = relative_path(project_root, &resolve_path(&context.project_dir, module_map));
                descriptor.add_build_property("MODULEMAP_FILE", module_map.into(), None, &target.name);
            }
            descriptor.add_build_property("CLANG_ENABLE_MODULES", "YES".into(), None, &target.name);
            trace!("Added folder module {} at {}", name, relative);
        }
        ModuleKind::Unknown => {
            warn!("Unknown module type for: {}", module_path.display());
        }
    }

    for framework in &module.frameworks {
        descriptor.add_framework(
            framework,
            FrameworkOptions {
                target_uuid: &target.uuid,
                custom: false,
                embed: false,
            },
        )?;
        trace!("Added framework dependency {} for module {}", framework, name);
    }
    for header_path in &module.header_search_paths {
        let header_path = relative_path(project_root, &config.resolve(header_path));
        descriptor.add_header_search_path(&header_path, &target.name);
    }
    add_linker_flags(descriptor, &module.linker_flags, &target.name);
    Ok(())
}

/// Appends flags to `OTHER_LDFLAGS`, keeping each flag once.
///
/// A target without linker flags starts from `$(inherited)`.
pub fn add_linker_flags<D: ProjectDescriptor>(descriptor: &mut D, flags: &[String], target_name: &str) {
    if flags.is_empty() {
        return;
    }
    let mut current = descriptor
        .build_property("OTHER_LDFLAGS", target_name)
        .map(|value| value.string_list())
        .unwrap_or_else(|| vec![INHERITED.to_string()]);
    for flag in flags {
        if !current.contains(flag) {
            current.push(flag.clone());
            trace!("Added linker flag {}", flag);
        }
    }
    descriptor.add_build_property("OTHER_LDFLAGS", PlistValue::strings(current), None, target_name);
}

fn add_framework_search_path<D: ProjectDescriptor>(descriptor: &mut D, dir: &str, target_name: &str) {
    let mut paths = descriptor
        .build_property("FRAMEWORK_SEARCH_PATHS", target_name)
        .map(|value| value.string_list())
        .unwrap_or_else(|| vec![INHERITED.to_string()]);
    if !paths.iter().any(|path| path == dir) {
        paths.push(dir.to_string());
    }
    descriptor.add_build_property("FRAMEWORK_SEARCH_PATHS", PlistValue::strings(paths), None, target_name);
}

fn parent_dir(relative: &str) -> &str {
    match relative.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => parent,
        _ => ".",
    }
}
