//! What a composition pass is going to create.

use std::path::{Path, PathBuf};

use tracing::{trace, warn};

use super::native_target::NativeTargetService;
use crate::types::{
    ComposeError, EXTENSION_CONFIG_FILE, ProductType, WATCH_APP_IDENTIFIER, WATCH_EXTENSION_IDENTIFIER,
    WATCHAPP_CONFIG_FILE, WATCHAPP_DIR, WATCHAPP_EXTENSION_DIR,
};

/// One target to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    /// Target name, taken from the folder name.
    pub name: String,
    /// `<watch folder>/watchapp` or `<watch folder>/watchextension`.
    pub root_dir: PathBuf,
    /// `<root_dir>/<name>`; holds the sources and the sidecar.
    pub dir: PathBuf,
    pub product_type: ProductType,
    pub bundle_identifier: String,
    /// Sidecar file name inside `dir`.
    pub sidecar_file: &'static str,
}

/// The app target, and the extension target when the watch folder has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPlan {
    pub app: TargetSpec,
    pub extension: Option<TargetSpec>,
}

impl TargetPlan {
    /// Inspects a watch folder.
    ///
    /// Returns `None` when `watchapp/` is missing or holds no target folder.
    /// A missing `watchextension/` selects single-target mode.
    pub fn discover(
        watch_folder: &Path,
        bundle_identifier: &str,
        targets: &NativeTargetService,
    ) -> Result<Option<Self>, ComposeError> {
        let app_root = watch_folder.join(WATCHAPP_DIR);
        if !app_root.is_dir() {
            trace!("No {} folder in {}", WATCHAPP_DIR, watch_folder.display());
            return Ok(None);
        }
        let Some(app_name) = first_target_directory(&app_root, targets)? else {
            warn!("{} contains no target folder", app_root.display());
            return Ok(None);
        };
        let app_identifier = format!("{}.{}", bundle_identifier, WATCH_APP_IDENTIFIER);
        let app = TargetSpec {
            dir: app_root.join(&app_name),
            name: app_name,
            root_dir: app_root,
            product_type: ProductType::WatchApp,
            bundle_identifier: app_identifier.clone(),
            sidecar_file: WATCHAPP_CONFIG_FILE,
        };

        let extension_root = watch_folder.join(WATCHAPP_EXTENSION_DIR);
        let extension = if extension_root.is_dir() {
            match first_target_directory(&extension_root, targets)? {
                Some(name) => Some(TargetSpec {
                    dir: extension_root.join(&name),
                    name,
                    root_dir: extension_root,
                    product_type: ProductType::WatchExtension,
                    bundle_identifier: format!("{}.{}", app_identifier, WATCH_EXTENSION_IDENTIFIER),
                    sidecar_file: EXTENSION_CONFIG_FILE,
                }),
                None => {
                    warn!("{} contains no target folder, ignoring it", extension_root.display());
                    None
                }
            }
        } else {
            trace!("No watch extension found, using single target mode");
            None
        };

        Ok(Some(Self { app, extension }))
    }

    /// Targets in creation order.
    pub fn specs(&self) -> impl Iterator<Item = &TargetSpec> {
        std::iter::once(&self.app).chain(self.extension.as_ref())
    }
}

fn first_target_directory(root: &Path, targets: &NativeTargetService) -> Result<Option<String>, ComposeError> {
    let mut names = targets.list_target_directories(root)?;
    if names.len() > 1 {
        warn!(
            "{} holds {} target folders, using {}",
            root.display(),
            names.len(),
            names[0]
        );
    }
    Ok(if names.is_empty() { None } else { Some(names.remove(0)) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_app_folder_yields_no_plan() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("watchextension/Ext")).unwrap();
        let plan = TargetPlan::discover(temp.path(), "org.demo", &NativeTargetService).unwrap();
        assert!(plan.is_none());
    }

    #[test]
    fn test_single_target_plan() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("watchapp/Watch")).unwrap();
        let plan = TargetPlan::discover(temp.path(), "org.demo", &NativeTargetService)
            .unwrap()
            .unwrap();
        assert_eq!(plan.app.name, "Watch");
        assert_eq!(plan.app.bundle_identifier, "org.demo.watchkitapp");
        assert!(plan.extension.is_none());
        assert_eq!(plan.specs().count(), 1);
    }

    #[test]
    fn test_plan_with_extension() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("watchapp/Watch")).unwrap();
        fs::create_dir_all(temp.path().join("watchextension/WatchExt")).unwrap();
        let plan = TargetPlan::discover(temp.path(), "org.demo", &NativeTargetService)
            .unwrap()
            .unwrap();
        let extension = plan.extension.unwrap();
        assert_eq!(extension.name, "WatchExt");
        assert_eq!(extension.product_type, ProductType::WatchExtension);
        assert_eq!(extension.bundle_identifier, "org.demo.watchkitapp.watchkitextension");
        assert_eq!(extension.sidecar_file, "extension.json");
    }
}
