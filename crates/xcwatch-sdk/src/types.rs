//! Core types for xcwatch-sdk.
//!
//! This module defines the fundamental types used throughout the SDK:
//!
//! - [`ComposeError`] - Error type for project-file and composition operations
//! - [`ProductType`] - Xcode product types the composer creates and removes
//! - [`NativeTarget`] - Handle to a target inside a project descriptor
//! - [`BuildProperty`] - A build setting applied to a target's configurations
//! - [`ProjectContext`] - Caller-supplied facts about the host project

use std::path::PathBuf;

use crate::sidecar::SpmPackage;

/// Folder (inside the watch-app folder) holding the mandatory watch app target.
pub const WATCHAPP_DIR: &str = "watchapp";

/// Folder (inside the watch-app folder) holding the optional extension target.
pub const WATCHAPP_EXTENSION_DIR: &str = "watchextension";

/// Sidecar file name for the watch app target.
pub const WATCHAPP_CONFIG_FILE: &str = "watchapp.json";

/// Sidecar file name for the watch extension target.
pub const EXTENSION_CONFIG_FILE: &str = "extension.json";

/// Bundle identifier segment appended for the watch app.
pub const WATCH_APP_IDENTIFIER: &str = "watchkitapp";

/// Bundle identifier segment appended for the watch extension.
pub const WATCH_EXTENSION_IDENTIFIER: &str = "watchkitextension";

/// `TARGETED_DEVICE_FAMILY` value for watchOS.
pub const WATCHOS_DEVICE_FAMILY: &str = "4";

/// Minimum watchOS deployment target written into new targets.
pub const WATCHOS_DEPLOYMENT_TARGET: &str = "5.2";

/// Build configurations a property is applied to when none are named.
pub const DEFAULT_BUILD_NAMES: [&str; 2] = ["Debug", "Release"];

/// Error types for xcwatch-sdk operations.
///
/// Only descriptor parse/write failures are meant to escape a composition
/// pass; everything optional is logged and skipped by the composer instead.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// An I/O error occurred.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),

    /// A directory scan failed part-way.
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// JSON (sidecar or package declaration) could not be read.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The project file is not a valid OpenStep property list.
    #[error("project file parse error at line {line}: {message}")]
    Parse {
        /// 1-based line of the offending token.
        line: usize,
        /// What the parser expected.
        message: String,
    },

    /// The project graph is missing an object it needs, or holds one of the wrong shape.
    #[error("project descriptor error: {0}")]
    Descriptor(String),

    /// Applying Swift packages to the workspace failed.
    #[error("workspace error: {0}")]
    Workspace(String),

    /// A scaffolding template could not be rendered.
    #[error("template error: {0}")]
    Template(String),

    /// Invalid caller configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Xcode product type of a native target.
///
/// # Example
///
/// ```
/// use xcwatch_sdk::ProductType;
///
/// let app = ProductType::WatchApp;
/// assert_eq!(app.as_str(), "com.apple.product-type.application.watchapp2");
/// assert_eq!(ProductType::from_identifier(app.as_str()), app);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProductType {
    /// A regular iOS application (the host app).
    Application,
    /// A watchOS app bundle.
    WatchApp,
    /// A WatchKit extension.
    WatchExtension,
    /// Any other product type, kept verbatim.
    Other(String),
}

impl ProductType {
    /// Returns the Xcode product-type identifier.
    pub fn as_str(&self) -> &str {
        match self {
            ProductType::Application => "com.apple.product-type.application",
            ProductType::WatchApp => "com.apple.product-type.application.watchapp2",
            ProductType::WatchExtension => "com.apple.product-type.watchkit2-extension",
            ProductType::Other(other) => other,
        }
    }

    /// Parses an Xcode product-type identifier.
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier {
            "com.apple.product-type.application" => ProductType::Application,
            "com.apple.product-type.application.watchapp2" => ProductType::WatchApp,
            "com.apple.product-type.watchkit2-extension" => ProductType::WatchExtension,
            other => ProductType::Other(other.to_string()),
        }
    }

    /// Whether this is one of the two watch product types.
    pub fn is_watch(&self) -> bool {
        matches!(self, ProductType::WatchApp | ProductType::WatchExtension)
    }

    /// Wrapper extension and explicit file type of the built product.
    pub(crate) fn product_file(&self) -> (&'static str, &'static str) {
        match self {
            ProductType::WatchExtension => ("appex", "wrapper.app-extension"),
            _ => ("app", "wrapper.application"),
        }
    }
}

/// Handle to a native target in a project descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTarget {
    /// Object id of the `PBXNativeTarget`.
    pub uuid: String,
    /// Target name.
    pub name: String,
    /// Product name, used to scope build settings.
    pub product_name: String,
    /// Product type.
    pub product_type: ProductType,
}

/// Build-phase kinds every new target receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhaseKind {
    /// `PBXSourcesBuildPhase`
    Sources,
    /// `PBXResourcesBuildPhase`
    Resources,
    /// `PBXFrameworksBuildPhase`
    Frameworks,
}

impl BuildPhaseKind {
    /// The `isa` of the phase object.
    pub fn isa(&self) -> &'static str {
        match self {
            BuildPhaseKind::Sources => "PBXSourcesBuildPhase",
            BuildPhaseKind::Resources => "PBXResourcesBuildPhase",
            BuildPhaseKind::Frameworks => "PBXFrameworksBuildPhase",
        }
    }

    /// Display name of the phase.
    pub fn name(&self) -> &'static str {
        match self {
            BuildPhaseKind::Sources => "Sources",
            BuildPhaseKind::Resources => "Resources",
            BuildPhaseKind::Frameworks => "Frameworks",
        }
    }
}

/// A build setting to apply to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildProperty {
    /// Setting name, e.g. `SDKROOT`.
    pub name: String,
    /// Setting value.
    pub value: String,
    /// Configurations to apply it to; [`DEFAULT_BUILD_NAMES`] when `None`.
    pub build_names: Option<Vec<String>>,
}

impl BuildProperty {
    /// A property applied to the default Debug and Release configurations.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            build_names: None,
        }
    }
}

/// Facts about the host project the composer needs.
///
/// # Example
///
/// ```
/// use xcwatch_sdk::ProjectContext;
///
/// let context = ProjectContext::new("MyApp", "org.example.myapp", "/work/my-app/platforms/ios");
/// assert_eq!(context.project_dir, std::path::PathBuf::from("/work/my-app/platforms/ios"));
/// assert!(context.spm_packages.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ProjectContext {
    /// Name of the host project (and of its primary target).
    pub project_name: String,
    /// Bundle identifier of the host app.
    pub bundle_identifier: String,
    /// Directory holding the `.xcodeproj`; relative paths in the project file start here.
    pub platform_root: PathBuf,
    /// Project directory used as a fallback base for relative sidecar paths.
    pub project_dir: PathBuf,
    /// Project-level Swift packages applied to every new watch target.
    pub spm_packages: Vec<SpmPackage>,
}

impl ProjectContext {
    /// Creates a context whose project dir equals the platform root.
    pub fn new(
        project_name: impl Into<String>,
        bundle_identifier: impl Into<String>,
        platform_root: impl Into<PathBuf>,
    ) -> Self {
        let platform_root = platform_root.into();
        Self {
            project_name: project_name.into(),
            bundle_identifier: bundle_identifier.into(),
            project_dir: platform_root.clone(),
            platform_root,
            spm_packages: Vec::new(),
        }
    }

    /// Overrides the project directory.
    pub fn project_dir(mut self, project_dir: impl Into<PathBuf>) -> Self {
        self.project_dir = project_dir.into();
        self
    }

    /// Sets the project-level Swift packages.
    pub fn spm_packages(mut self, packages: Vec<SpmPackage>) -> Self {
        self.spm_packages = packages;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_type_round_trip_for_watch_types() {
        for kind in [ProductType::WatchApp, ProductType::WatchExtension] {
            assert_eq!(ProductType::from_identifier(kind.as_str()), kind);
            assert!(kind.is_watch());
        }
        assert!(!ProductType::Application.is_watch());
    }

    #[test]
    fn test_unknown_product_type_is_kept() {
        let kind = ProductType::from_identifier("com.apple.product-type.framework");
        assert_eq!(kind.as_str(), "com.apple.product-type.framework");
        assert!(!kind.is_watch());
    }

    #[test]
    fn test_extension_product_is_appex() {
        assert_eq!(ProductType::WatchExtension.product_file().0, "appex");
        assert_eq!(ProductType::WatchApp.product_file().0, "app");
    }
}
