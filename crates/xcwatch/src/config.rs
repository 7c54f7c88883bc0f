//! Configuration file support for xcwatch.
//!
//! `xcwatch.toml` keeps the facts about the host project that would otherwise
//! be passed on every invocation.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. Current working directory (`./xcwatch.toml`)
//! 2. Parent directories (up to the repository root or filesystem root)
//!
//! Relative paths in the file are resolved against the directory holding it.
//!
//! ## Example Configuration
//!
//! ```toml
//! [project]
//! name = "MyApp"
//! bundle_id = "org.example.myapp"
//! app_resources = "app/App_Resources"
//!
//! [ios]
//! platform_dir = "platforms/ios"
//!
//! [[ios.watch_app.spm_packages]]
//! name = "Charts"
//! repositoryURL = "https://github.com/example/Charts.git"
//! version = "5.0.0"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use xcwatch_sdk::SpmPackage;
use xcwatch_sdk::codegen::sanitize_bundle_id_component;

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "xcwatch.toml";

/// Root configuration structure for `xcwatch.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XcwatchConfig {
    /// Project-level configuration.
    pub project: ProjectConfig,

    /// iOS-specific configuration.
    pub ios: IosConfig,
}

/// Project-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Host project name; also the name of its primary target.
    ///
    /// Derived from the `.xcodeproj` name when not set.
    pub name: Option<String>,

    /// Bundle identifier of the host app.
    pub bundle_id: Option<String>,

    /// Base directory for relative sidecar paths. Defaults to the config directory.
    pub project_dir: Option<PathBuf>,

    /// Directory holding the per-platform resource folders.
    ///
    /// Defaults to `app/App_Resources`.
    pub app_resources: Option<PathBuf>,
}

/// iOS-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IosConfig {
    /// Directory holding the `.xcodeproj`.
    ///
    /// Defaults to `platforms/ios`.
    pub platform_dir: PathBuf,

    /// Explicit path to `project.pbxproj`.
    ///
    /// When unset, the single `*.xcodeproj` in `platform_dir` is used.
    pub pbxproj: Option<PathBuf>,

    /// Name of the platform folder under `app_resources`.
    ///
    /// Defaults to `iOS`.
    pub platform_name: String,

    /// Watch folder override; defaults to `<app_resources>/<platform_name>`.
    pub watch_folder: Option<PathBuf>,

    /// Watch app settings.
    pub watch_app: WatchAppConfig,
}

impl Default for IosConfig {
    fn default() -> Self {
        Self {
            platform_dir: PathBuf::from("platforms/ios"),
            pbxproj: None,
            platform_name: "iOS".to_string(),
            watch_folder: None,
            watch_app: WatchAppConfig::default(),
        }
    }
}

/// Watch app settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchAppConfig {
    /// Swift packages linked into every watch target.
    pub spm_packages: Vec<SpmPackage>,
}

impl XcwatchConfig {
    /// Loads configuration from the specified file path.
    ///
    /// # Returns
    ///
    /// * `Ok(XcwatchConfig)` - Successfully loaded configuration
    /// * `Err` - If the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: XcwatchConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration from the current directory
    /// or any parent directory.
    pub fn discover() -> Result<Option<(Self, PathBuf)>> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&cwd)
    }

    /// Attempts to find and load configuration starting from the specified directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Swift packages applied to every watch target.
    pub fn watch_spm_packages(&self) -> &[SpmPackage] {
        &self.ios.watch_app.spm_packages
    }

    /// Generates a starter configuration file as a formatted TOML string.
    ///
    /// # Arguments
    ///
    /// * `project_name` - Name of the host Xcode project
    pub fn generate_starter_toml(project_name: &str) -> String {
        let bundle_id = format!("org.example.{}", sanitize_bundle_id_component(project_name));

        format!(
            r#"# xcwatch configuration file
# CLI flags override these settings when provided.

[project]
# Host project name (defaults to the .xcodeproj name)
name = "{project_name}"

# Bundle identifier of the host app; watch targets derive theirs from it
bundle_id = "{bundle_id}"

# Base directory for relative sidecar paths (default: this directory)
# project_dir = "."

# Directory holding the per-platform resource folders
app_resources = "app/App_Resources"

[ios]
# Directory holding the .xcodeproj
platform_dir = "platforms/ios"

# Explicit project file (optional, defaults to the single .xcodeproj in platform_dir)
# pbxproj = "platforms/ios/{project_name}.xcodeproj/project.pbxproj"

# Platform folder under app_resources; its watchapp/ folder is the input
platform_name = "iOS"

# Swift packages linked into every watch target
# [[ios.watch_app.spm_packages]]
# name = "Charts"
# repositoryURL = "https://github.com/example/Charts.git"
# version = "5.0.0"
"#,
            project_name = project_name,
            bundle_id = bundle_id,
        )
    }
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<XcwatchConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Creates a new resolver by discovering and loading configuration.
    pub fn new() -> Result<Self> {
        match XcwatchConfig::discover()? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Directory relative config paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default()
    }

    /// Resolves a config path against [`ConfigResolver::base_dir`].
    pub fn config_relative(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    /// Returns the iOS configuration.
    pub fn ios(&self) -> IosConfig {
        self.config
            .as_ref()
            .map(|c| c.ios.clone())
            .unwrap_or_default()
    }

    /// Returns the project configuration.
    pub fn project(&self) -> ProjectConfig {
        self.config
            .as_ref()
            .map(|c| c.project.clone())
            .unwrap_or_default()
    }

    /// Project-level Swift packages, empty without a config file.
    pub fn watch_spm_packages(&self) -> Vec<SpmPackage> {
        self.config
            .as_ref()
            .map(|c| c.watch_spm_packages().to_vec())
            .unwrap_or_default()
    }

    /// The configured app resources directory.
    pub fn app_resources(&self) -> PathBuf {
        let configured = self
            .project()
            .app_resources
            .unwrap_or_else(|| PathBuf::from("app/App_Resources"));
        self.config_relative(&configured)
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// # Returns
    ///
    /// The resolved value, preferring CLI over config over default.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&XcwatchConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }
}
