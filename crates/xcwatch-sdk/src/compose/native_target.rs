//! Target-level helpers shared by every composition step.

use std::path::Path;

use tracing::{debug, trace};

use super::plan::TargetSpec;
use crate::common::{file_name, is_hidden, relative_path, sorted_entries};
use crate::descriptor::{DescriptorStore, FrameworkOptions, GroupOptions, ProjectDescriptor};
use crate::pbxproj::PlistValue;
use crate::sidecar::TargetConfig;
use crate::types::{BuildPhaseKind, BuildProperty, ComposeError, DEFAULT_BUILD_NAMES, NativeTarget};

/// Creates targets and applies build settings, sidecar settings and signing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeTargetService;

impl NativeTargetService {
    /// Names of the non-hidden directories directly under `path`, sorted.
    pub fn list_target_directories(&self, path: &Path) -> Result<Vec<String>, ComposeError> {
        Ok(sorted_entries(path)?
            .into_iter()
            .filter(|entry| entry.is_dir())
            .map(|entry| file_name(&entry).to_string())
            .filter(|name| !is_hidden(name))
            .collect())
    }

    /// Adds a target with its three build phases, its group and its header search path.
    ///
    /// # Arguments
    /// * `spec` - Target to create
    /// * `project_root` - Directory project-relative paths are computed from
    /// * `parent` - Target that depends on and embeds the new one
    pub fn create_target<D: ProjectDescriptor>(
        &self,
        descriptor: &mut D,
        spec: &TargetSpec,
        project_root: &Path,
        parent: Option<&str>,
    ) -> Result<NativeTarget, ComposeError> {
        let target_path = relative_path(project_root, &spec.dir);
        let target = descriptor.add_target(&spec.name, spec.product_type.clone(), &target_path, parent)?;

        for kind in [BuildPhaseKind::Sources, BuildPhaseKind::Resources, BuildPhaseKind::Frameworks] {
            descriptor.add_build_phase(kind, &target.uuid)?;
        }
        descriptor.add_group(
            &[],
            &spec.name,
            &target_path,
            GroupOptions {
                is_main: true,
                target_uuid: &target.uuid,
            },
        )?;
        descriptor.add_header_search_path(&target_path, &target.product_name);

        debug!("Created target {} at {}", target.name, target_path);
        Ok(target)
    }

    /// Applies each property to its build configurations (Debug and Release by default).
    pub fn set_build_properties<D: ProjectDescriptor>(
        &self,
        properties: &[BuildProperty],
        target_name: &str,
        descriptor: &mut D,
    ) {
        for property in properties {
            let build_names: Vec<&str> = match &property.build_names {
                Some(names) => names.iter().map(String::as_str).collect(),
                None => DEFAULT_BUILD_NAMES.to_vec(),
            };
            for build_name in build_names {
                descriptor.add_build_property(
                    &property.name,
                    PlistValue::from(property.value.as_str()),
                    Some(build_name),
                    target_name,
                );
            }
        }
    }

    /// Applies the sidecar keys that map straight onto the target:
    /// `frameworks`, `assetcatalogCompilerAppiconAppiconsetName` and
    /// `targetBuildConfigurationProperties`.
    pub fn apply_sidecar_config_file<D: ProjectDescriptor>(
        &self,
        config: &TargetConfig,
        target: &NativeTarget,
        descriptor: &mut D,
    ) -> Result<(), ComposeError> {
        for framework in &config.frameworks {
            trace!("Linking {} into {}", framework, target.name);
            descriptor.add_framework(
                framework,
                FrameworkOptions {
                    target_uuid: &target.uuid,
                    custom: false,
                    embed: false,
                },
            )?;
        }

        let mut properties = Vec::new();
        if let Some(icon) = &config.app_icon_set {
            properties.push(BuildProperty::new("ASSETCATALOG_COMPILER_APPICON_NAME", icon.as_str()));
        }
        properties.extend(config.build_properties.iter().cloned());
        self.set_build_properties(&properties, &target.name, descriptor);
        Ok(())
    }

    /// Copies the primary target's signing onto freshly created targets.
    ///
    /// Works on the persisted descriptor: it is reloaded, updated and saved.
    pub fn apply_signing_defaults<S: DescriptorStore>(
        &self,
        store: &S,
        descriptor_path: &Path,
        target_uuids: &[String],
        project_name: &str,
    ) -> Result<(), ComposeError> {
        if target_uuids.is_empty() {
            return Ok(());
        }
        let mut descriptor = store.load(descriptor_path)?;
        let host = descriptor
            .find_target(project_name)
            .or_else(|| descriptor.first_target());
        let Some(signing) = host.and_then(|host| descriptor.signing(&host.name)) else {
            trace!("Host target has no signing configuration to copy");
            return Ok(());
        };
        for uuid in target_uuids {
            descriptor.set_signing(uuid, &signing);
        }
        store.save(descriptor_path, &descriptor)?;
        debug!("Applied signing defaults to {} target(s)", target_uuids.len());
        Ok(())
    }
}
