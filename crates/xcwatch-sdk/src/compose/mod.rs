//! Watch target composition.
//!
//! [`WatchTargetComposer`] turns a watch folder laid out as
//!
//! ```text
//! <watch folder>/
//!   watchapp/<AppName>/            mandatory, optional watchapp.json
//!   watchextension/<ExtName>/      optional, optional extension.json
//! ```
//!
//! into one or two native targets of an existing Xcode project.
//!
//! ## Flow
//!
//! 1. Build a [`TargetPlan`] from the folder (no plan, no work).
//! 2. Load the project descriptor.
//! 3. Create the app target under the primary target and configure it.
//! 4. Create and configure the extension target under the app target.
//! 5. Save, copy signing from the primary target, then apply Swift packages
//!    to the saved project.

pub mod exclude;
pub mod modules;
pub mod native_target;
pub mod plan;
pub mod walk;

#[cfg(test)]
pub(crate) mod testing;

use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

pub use exclude::is_excluded;
pub use native_target::NativeTargetService;
pub use plan::{TargetPlan, TargetSpec};

use crate::common::{copy_if_different, file_name, relative_path, resolve_path};
use crate::descriptor::{DescriptorStore, PbxprojStore, ProjectDescriptor};
use crate::sidecar::{SpmPackage, TargetConfig};
use crate::types::{
    BuildProperty, ComposeError, NativeTarget, ProductType, ProjectContext, WATCHAPP_DIR, WATCHOS_DEPLOYMENT_TARGET,
    WATCHOS_DEVICE_FAMILY,
};
use crate::workspace::{PbxWorkspaceStore, WorkspaceProject, WorkspaceStore};
use walk::{WalkMode, source_files_in, walk};

const PRIVACY_MANIFEST: &str = "PrivacyInfo.xcprivacy";

/// Swift packages waiting for the saved project.
struct PendingPackages {
    target_names: Vec<String>,
    packages: Vec<SpmPackage>,
    basedir: PathBuf,
}

/// Adds and removes watch app targets.
#[derive(Debug, Clone)]
pub struct WatchTargetComposer<S = PbxprojStore, W = PbxWorkspaceStore> {
    store: S,
    workspace: W,
    targets: NativeTargetService,
}

impl WatchTargetComposer {
    /// Composer working on `project.pbxproj` files on disk.
    pub fn new() -> Self {
        Self::with_stores(PbxprojStore::new(), PbxWorkspaceStore::new())
    }

    /// Composer that only logs its writes when `dry_run` is set.
    pub fn dry_run(dry_run: bool) -> Self {
        Self::with_stores(
            PbxprojStore::new().dry_run(dry_run),
            PbxWorkspaceStore::new().dry_run(dry_run),
        )
    }

    /// True when `<app_resources>/<platform>/watchapp` exists.
    pub fn has_watch_app(app_resources_dir: &Path, platform_name: &str) -> bool {
        app_resources_dir.join(platform_name).join(WATCHAPP_DIR).exists()
    }
}

impl Default for WatchTargetComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DescriptorStore, W: WorkspaceStore> WatchTargetComposer<S, W> {
    pub fn with_stores(store: S, workspace: W) -> Self {
        Self {
            store,
            workspace,
            targets: NativeTargetService,
        }
    }

    /// Adds the watch targets found in `watch_folder` to the project at `descriptor_path`.
    ///
    /// # Returns
    /// * `Ok(false)` - `watch_folder/watchapp` is missing; the descriptor was not touched
    /// * `Ok(true)` - targets were created and saved
    /// * `Err(ComposeError)` - the descriptor could not be read or written
    ///
    /// Swift package failures are logged and never fail the composition.
    pub fn add_from_path(
        &self,
        watch_folder: &Path,
        context: &ProjectContext,
        descriptor_path: &Path,
    ) -> Result<bool, ComposeError> {
        let Some(plan) = TargetPlan::discover(watch_folder, &context.bundle_identifier, &self.targets)? else {
            return Ok(false);
        };

        let mut descriptor = self.store.load(descriptor_path)?;
        let host = descriptor
            .find_target(&context.project_name)
            .or_else(|| descriptor.first_target())
            .ok_or_else(|| ComposeError::Descriptor("project has no targets".to_string()))?;

        let mut created: Vec<NativeTarget> = Vec::new();
        let mut pending: Vec<PendingPackages> = Vec::new();
        let mut parent = host.uuid.clone();
        for spec in plan.specs() {
            let target = self
                .targets
                .create_target(&mut descriptor, spec, &context.platform_root, Some(&parent))?;
            let config = self.configure_target(spec, &target, &mut descriptor, context, descriptor_path)?;
            if !config.spm_packages.is_empty() {
                pending.push(PendingPackages {
                    target_names: vec![target.name.clone()],
                    packages: config.spm_packages.clone(),
                    basedir: config.basedir.clone(),
                });
            }
            parent = target.uuid.clone();
            created.push(target);
        }

        self.store.save(descriptor_path, &descriptor)?;

        let uuids: Vec<String> = created.iter().map(|target| target.uuid.clone()).collect();
        self.targets
            .apply_signing_defaults(&self.store, descriptor_path, &uuids, &context.project_name)?;

        if !context.spm_packages.is_empty() {
            pending.push(PendingPackages {
                target_names: created.iter().map(|target| target.name.clone()).collect(),
                packages: context.spm_packages.clone(),
                basedir: context.project_dir.clone(),
            });
        }
        for batch in &pending {
            self.apply_spm_packages(descriptor_path, batch);
        }

        info!(
            "Added {} watch target(s): {}",
            created.len(),
            created
                .iter()
                .map(|target| target.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(true)
    }

    /// Applies build settings, sidecar settings and files to a new target, then saves.
    ///
    /// Returns the normalized sidecar so the caller can apply its Swift packages.
    pub fn configure_target(
        &self,
        spec: &TargetSpec,
        target: &NativeTarget,
        descriptor: &mut S::Descriptor,
        context: &ProjectContext,
        descriptor_path: &Path,
    ) -> Result<TargetConfig, ComposeError> {
        let project_root = &context.platform_root;
        let companion = companion_bundle_identifier(&spec.bundle_identifier);
        let mut properties = vec![
            BuildProperty::new("PRODUCT_BUNDLE_IDENTIFIER", spec.bundle_identifier.as_str()),
            BuildProperty::new("SDKROOT", "watchos"),
            BuildProperty::new("TARGETED_DEVICE_FAMILY", WATCHOS_DEVICE_FAMILY),
            BuildProperty::new("WATCHOS_DEPLOYMENT_TARGET", WATCHOS_DEPLOYMENT_TARGET),
            BuildProperty::new("WK_APP_BUNDLE_IDENTIFIER", companion),
        ];

        let config = TargetConfig::load(&spec.dir, spec.sidecar_file)?;

        if let Some(info_plist) = &config.info_plist {
            if info_plist.exists() {
                let destination = spec.dir.join("Info.plist");
                copy_if_different(info_plist, &destination)?;
                properties.push(BuildProperty::new(
                    "INFOPLIST_FILE",
                    relative_path(project_root, &destination),
                ));
            } else {
                warn!("Custom Info.plist not found at: {}", info_plist.display());
            }
        }
        if let Some(privacy) = &config.xcprivacy {
            if privacy.exists() {
                let destination = spec.dir.join(PRIVACY_MANIFEST);
                copy_if_different(privacy, &destination)?;
                descriptor.add_resource_file(&relative_path(project_root, &destination), &target.uuid)?;
            } else {
                warn!("Custom xcprivacy file not found at: {}", privacy.display());
            }
        }

        self.targets.set_build_properties(&properties, &target.name, descriptor);
        self.targets.apply_sidecar_config_file(&config, target, descriptor)?;

        if config.import_sources {
            for file in walk(&spec.dir, WalkMode::Sources, project_root, &config.src_exclude)? {
                trace!("Adding source file: {}", file);
                descriptor.add_source_file(&file, &target.uuid)?;
            }
        }
        if config.import_resources {
            // The walk leaves Info.plist out; it is referenced via INFOPLIST_FILE above.
            for file in walk(&spec.dir, WalkMode::Resources, project_root, &config.resources_exclude)? {
                trace!("Adding resource: {}", file);
                descriptor.add_resource_file(&file, &target.uuid)?;
            }
        }

        if !config.modules.is_empty() {
            trace!("Processing {} module(s) for {}", config.modules.len(), target.name);
        }
        for module in &config.modules {
            modules::add_module_dependency(descriptor, module, target, &config, context)?;
        }
        for resource in &config.resources {
            self.add_custom_resource(descriptor, resource, target, &config, project_root)?;
        }
        for src in &config.src {
            self.add_custom_source(descriptor, src, target, &config, project_root)?;
        }

        self.store.save(descriptor_path, descriptor)?;
        debug!("Configured target {}", target.name);
        Ok(config)
    }

    /// Removes every watch app and watch extension target. Returns how many were removed.
    pub fn remove_watch_app(&self, descriptor_path: &Path) -> Result<usize, ComposeError> {
        let mut descriptor = self.store.load(descriptor_path)?;
        let removed = descriptor.remove_targets_by_product_type(&ProductType::WatchApp)
            + descriptor.remove_targets_by_product_type(&ProductType::WatchExtension);
        self.store.save(descriptor_path, &descriptor)?;
        info!("Removed {} watch target(s)", removed);
        Ok(removed)
    }

    /// Watch targets currently in the project.
    pub fn watch_targets(&self, descriptor_path: &Path) -> Result<Vec<NativeTarget>, ComposeError> {
        let descriptor = self.store.load(descriptor_path)?;
        let mut targets = descriptor.targets_by_product_type(&ProductType::WatchApp);
        targets.extend(descriptor.targets_by_product_type(&ProductType::WatchExtension));
        Ok(targets)
    }

    fn add_custom_resource(
        &self,
        descriptor: &mut S::Descriptor,
        resource: &str,
        target: &NativeTarget,
        config: &TargetConfig,
        project_root: &Path,
    ) -> Result<(), ComposeError> {
        let path = config.resolve(resource);
        if !path.exists() {
            warn!("Custom resource not found, skipping: {}", resource);
            return Ok(());
        }
        let is_bundle = walk::BUNDLE_SUFFIXES
            .iter()
            .any(|suffix| file_name(&path).ends_with(suffix));
        if path.is_dir() && !is_bundle {
            trace!("Recursively adding files from resource directory: {}", resource);
            for file in walk(&path, WalkMode::AllFiles, project_root, &[])? {
                descriptor.add_resource_file(&file, &target.uuid)?;
            }
        } else {
            descriptor.add_resource_file(&relative_path(project_root, &path), &target.uuid)?;
        }
        Ok(())
    }

    fn add_custom_source(
        &self,
        descriptor: &mut S::Descriptor,
        src: &str,
        target: &NativeTarget,
        config: &TargetConfig,
        project_root: &Path,
    ) -> Result<(), ComposeError> {
        let path = config.resolve(src);
        if !path.exists() {
            warn!("Custom source file/folder not found, skipping: {}", src);
            return Ok(());
        }
        if path.is_dir() {
            for file in source_files_in(&path, project_root)? {
                descriptor.add_source_file(&file, &target.uuid)?;
            }
        } else {
            descriptor.add_source_file(&relative_path(project_root, &path), &target.uuid)?;
        }
        Ok(())
    }

    fn apply_spm_packages(&self, descriptor_path: &Path, batch: &PendingPackages) {
        if let Err(err) = self.try_apply_spm_packages(descriptor_path, batch) {
            warn!("Failed to apply Swift packages to {}: {}", batch.target_names.join(", "), err);
        }
    }

    fn try_apply_spm_packages(&self, descriptor_path: &Path, batch: &PendingPackages) -> Result<(), ComposeError> {
        let mut project = self.workspace.load(descriptor_path)?;
        for package in &batch.packages {
            let mut package = package.clone();
            if let Some(path) = &package.path {
                package.path = Some(resolve_path(&batch.basedir, path).to_string_lossy().into_owned());
            }
            for target_name in &batch.target_names {
                trace!("Adding Swift package {} to {}", package.name, target_name);
                project.add_spm_package(target_name, &package)?;
            }
        }
        project.commit()?;
        debug!("Applied {} Swift package(s)", batch.packages.len());
        Ok(())
    }
}

/// Bundle identifier without its last dot segment.
fn companion_bundle_identifier(identifier: &str) -> String {
    match identifier.rsplit_once('.') {
        Some((companion, _)) => companion.to_string(),
        None => String::new(),
    }
}
