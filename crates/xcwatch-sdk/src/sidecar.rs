//! Per-target sidecar configuration (`watchapp.json` / `extension.json`).
//!
//! The JSON document is deserialized into [`SidecarFile`], whose fields are all
//! optional, and then normalized once into a [`TargetConfig`] with every
//! default applied and every path resolved. Nothing downstream re-derives
//! defaults from the raw JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::common::resolve_path;
use crate::types::{BuildProperty, ComposeError};

/// A Swift Package Manager dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpmPackage {
    /// Package name; also the default library product.
    pub name: String,
    /// Remote repository URL.
    #[serde(rename = "repositoryURL", default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    /// Local package directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Minimum version (up to next major).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Library products to link. Defaults to `[name]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub libs: Option<Vec<String>>,
}

impl SpmPackage {
    /// Library products linked into the target.
    pub fn libraries(&self) -> Vec<String> {
        match &self.libs {
            Some(libs) if !libs.is_empty() => libs.clone(),
            _ => vec![self.name.clone()],
        }
    }
}

/// An entry of the sidecar `modules` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    /// Only meaningful for compiled frameworks; absent means embed.
    #[serde(default)]
    pub embed: Option<bool>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub header_search_paths: Vec<String>,
    #[serde(default)]
    pub linker_flags: Vec<String>,
    #[serde(default)]
    pub module_map: Option<String>,
}

/// Raw sidecar document as written by users.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarFile {
    pub info_plist_path: Option<String>,
    pub xcprivacy_path: Option<String>,
    pub basedir: Option<String>,
    pub import_sources_from_watch_folder: Option<bool>,
    pub import_resources_from_watch_folder: Option<bool>,
    pub src_exclude: Option<Vec<String>>,
    pub resources_exclude: Option<Vec<String>>,
    pub modules: Option<Vec<ModuleDefinition>>,
    pub resources: Option<Vec<String>>,
    pub src: Option<Vec<String>>,
    #[serde(rename = "SPMPackages")]
    pub spm_packages: Option<Vec<SpmPackage>>,
    pub frameworks: Option<Vec<String>>,
    pub assetcatalog_compiler_appicon_appiconset_name: Option<String>,
    pub target_build_configuration_properties: Option<BTreeMap<String, serde_json::Value>>,
}

/// Normalized configuration of one watch target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetConfig {
    /// Whether a sidecar file was present at all.
    pub present: bool,
    /// Directory the sidecar lives in (the target directory).
    pub config_dir: PathBuf,
    /// Root for module, resource, src and local package paths.
    pub basedir: PathBuf,
    pub info_plist: Option<PathBuf>,
    pub xcprivacy: Option<PathBuf>,
    pub import_sources: bool,
    pub import_resources: bool,
    pub src_exclude: Vec<String>,
    pub resources_exclude: Vec<String>,
    pub modules: Vec<ModuleDefinition>,
    pub resources: Vec<String>,
    pub src: Vec<String>,
    pub spm_packages: Vec<SpmPackage>,
    pub frameworks: Vec<String>,
    pub app_icon_set: Option<String>,
    pub build_properties: Vec<BuildProperty>,
}

impl TargetConfig {
    /// Configuration used when a target has no sidecar.
    pub fn defaults(config_dir: &Path) -> Self {
        Self {
            present: false,
            config_dir: config_dir.to_path_buf(),
            basedir: config_dir.to_path_buf(),
            info_plist: None,
            xcprivacy: None,
            import_sources: true,
            import_resources: true,
            src_exclude: Vec::new(),
            resources_exclude: Vec::new(),
            modules: Vec::new(),
            resources: Vec::new(),
            src: Vec::new(),
            spm_packages: Vec::new(),
            frameworks: Vec::new(),
            app_icon_set: None,
            build_properties: Vec::new(),
        }
    }

    /// Loads `<target_dir>/<file_name>`.
    ///
    /// A missing file yields [`TargetConfig::defaults`]. A file that is not
    /// valid JSON is reported and also treated as absent.
    pub fn load(target_dir: &Path, file_name: &str) -> Result<Self, ComposeError> {
        let path = target_dir.join(file_name);
        if !path.is_file() {
            trace!("No sidecar at {}, using defaults", path.display());
            return Ok(Self::defaults(target_dir));
        }
        let text = fs::read_to_string(&path)?;
        match serde_json::from_str::<SidecarFile>(&text) {
            Ok(raw) => Ok(Self::normalize(raw, target_dir)),
            Err(err) => {
                warn!("Ignoring malformed sidecar {}: {}", path.display(), err);
                Ok(Self::defaults(target_dir))
            }
        }
    }

    /// Applies defaults and resolves paths of a raw sidecar document.
    pub fn normalize(raw: SidecarFile, config_dir: &Path) -> Self {
        let basedir = match &raw.basedir {
            Some(basedir) => {
                let resolved = resolve_path(config_dir, basedir);
                if resolved.exists() {
                    resolved
                } else {
                    warn!(
                        "Basedir {} not found, using the config directory",
                        resolved.display()
                    );
                    config_dir.to_path_buf()
                }
            }
            None => config_dir.to_path_buf(),
        };

        let build_properties = raw
            .target_build_configuration_properties
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| BuildProperty::new(name, json_setting(&value)))
            .collect();

        Self {
            present: true,
            info_plist: raw.info_plist_path.map(|p| resolve_path(config_dir, &p)),
            xcprivacy: raw.xcprivacy_path.map(|p| resolve_path(config_dir, &p)),
            config_dir: config_dir.to_path_buf(),
            basedir,
            import_sources: raw.import_sources_from_watch_folder.unwrap_or(true),
            import_resources: raw.import_resources_from_watch_folder.unwrap_or(true),
            src_exclude: raw.src_exclude.unwrap_or_default(),
            resources_exclude: raw.resources_exclude.unwrap_or_default(),
            modules: raw.modules.unwrap_or_default(),
            resources: raw.resources.unwrap_or_default(),
            src: raw.src.unwrap_or_default(),
            spm_packages: raw.spm_packages.unwrap_or_default(),
            frameworks: raw.frameworks.unwrap_or_default(),
            app_icon_set: raw.assetcatalog_compiler_appicon_appiconset_name,
            build_properties,
        }
    }

    /// Resolves a sidecar-relative path against the basedir.
    pub fn resolve(&self, path: &str) -> PathBuf {
        resolve_path(&self.basedir, path)
    }
}

/// Build-setting text for a JSON value.
fn json_setting(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(json_setting)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}
