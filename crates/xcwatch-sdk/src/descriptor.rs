//! The project-descriptor port.
//!
//! The composer never touches `project.pbxproj` text directly. It mutates a
//! [`ProjectDescriptor`] obtained from a [`DescriptorStore`], which makes every
//! composition step testable against an in-memory fake. [`PbxprojStore`] is the
//! production store, backed by [`PbxProject`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::pbxproj::{PbxProject, PlistValue};
use crate::types::{BuildPhaseKind, ComposeError, NativeTarget, ProductType};

/// Options for [`ProjectDescriptor::add_group`].
#[derive(Debug, Clone, Copy)]
pub struct GroupOptions<'a> {
    /// Attach the group to the project's main group (a target root) rather than
    /// to the target's own group.
    pub is_main: bool,
    /// Target the group belongs to.
    pub target_uuid: &'a str,
}

/// Options for [`ProjectDescriptor::add_framework`].
#[derive(Debug, Clone, Copy)]
pub struct FrameworkOptions<'a> {
    /// Target whose Frameworks phase receives the framework.
    pub target_uuid: &'a str,
    /// A framework shipped with the project rather than with the SDK.
    pub custom: bool,
    /// Also copy the framework into the product (Embed Frameworks phase).
    pub embed: bool,
}

/// Per-configuration manual signing identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualSigning {
    /// `DEVELOPMENT_TEAM`
    pub team: Option<String>,
    /// `CODE_SIGN_IDENTITY`
    pub identity: Option<String>,
    /// `PROVISIONING_PROFILE`
    pub profile_uuid: Option<String>,
    /// `PROVISIONING_PROFILE_SPECIFIER`
    pub profile_name: Option<String>,
}

/// Code-signing style of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signing {
    /// Xcode-managed signing with an optional development team.
    Automatic {
        /// `DevelopmentTeam`
        team: Option<String>,
    },
    /// Manual signing, keyed by build configuration name.
    Manual {
        /// Signing identity per configuration.
        configurations: BTreeMap<String, ManualSigning>,
    },
}

/// Mutable view of a native project's build graph.
///
/// Target-scoped build settings are addressed by target name, objects by uuid,
/// mirroring how Xcode itself keys them.
pub trait ProjectDescriptor {
    /// The project's primary target.
    fn first_target(&self) -> Option<NativeTarget>;

    /// Finds a target by name.
    fn find_target(&self, name: &str) -> Option<NativeTarget>;

    /// All targets of a product type.
    fn targets_by_product_type(&self, product_type: &ProductType) -> Vec<NativeTarget>;

    /// Creates a target without build phases. With a `parent`, the parent
    /// depends on and embeds the new target.
    fn add_target(
        &mut self,
        name: &str,
        product_type: ProductType,
        path: &str,
        parent: Option<&str>,
    ) -> Result<NativeTarget, ComposeError>;

    /// Adds an (empty) build phase to a target and returns its id.
    fn add_build_phase(&mut self, kind: BuildPhaseKind, target_uuid: &str) -> Result<String, ComposeError>;

    /// Adds a group holding `files` (project-root-relative paths).
    fn add_group(
        &mut self,
        files: &[String],
        name: &str,
        path: &str,
        options: GroupOptions<'_>,
    ) -> Result<String, ComposeError>;

    /// Adds a file to a target's Sources phase.
    fn add_source_file(&mut self, path: &str, target_uuid: &str) -> Result<(), ComposeError>;

    /// Adds a file or bundle to a target's Resources phase.
    fn add_resource_file(&mut self, path: &str, target_uuid: &str) -> Result<(), ComposeError>;

    /// Links a framework (system name or project-relative path).
    fn add_framework(&mut self, path: &str, options: FrameworkOptions<'_>) -> Result<(), ComposeError>;

    /// Sets a build setting on the named target's configurations
    /// (only `build_name` when given).
    fn add_build_property(
        &mut self,
        name: &str,
        value: PlistValue,
        build_name: Option<&str>,
        target_name: &str,
    );

    /// Reads a build setting from the named target's first configuration.
    fn build_property(&self, name: &str, target_name: &str) -> Option<PlistValue>;

    /// Appends an entry to `HEADER_SEARCH_PATHS`, seeding it with `$(inherited)`.
    fn add_header_search_path(&mut self, path: &str, target_name: &str);

    /// Makes `target_uuid` depend on each of `dependencies`.
    fn add_target_dependency(&mut self, target_uuid: &str, dependencies: &[String]) -> Result<(), ComposeError>;

    /// Removes all targets of a product type; returns how many were removed.
    fn remove_targets_by_product_type(&mut self, product_type: &ProductType) -> usize;

    /// Signing configuration of the named target, if it has one.
    fn signing(&self, target_name: &str) -> Option<Signing>;

    /// Applies a signing configuration to a target.
    fn set_signing(&mut self, target_uuid: &str, signing: &Signing);
}

/// Loads and persists descriptors.
pub trait DescriptorStore {
    /// Descriptor type produced by this store.
    type Descriptor: ProjectDescriptor;

    /// Reads and parses the descriptor at `path`.
    fn load(&self, path: &Path) -> Result<Self::Descriptor, ComposeError>;

    /// Serializes the descriptor back to `path`.
    fn save(&self, path: &Path, descriptor: &Self::Descriptor) -> Result<(), ComposeError>;
}

/// Store for on-disk `project.pbxproj` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PbxprojStore {
    dry_run: bool,
}

impl PbxprojStore {
    /// Creates a store that writes to disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips writes, logging what would have been saved.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl DescriptorStore for PbxprojStore {
    type Descriptor = PbxProject;

    fn load(&self, path: &Path) -> Result<PbxProject, ComposeError> {
        PbxProject::open(path)
    }

    fn save(&self, path: &Path, descriptor: &PbxProject) -> Result<(), ComposeError> {
        let text = descriptor.to_pbxproj_string();
        if self.dry_run {
            tracing::info!("[dry-run] would write {} bytes to {}", text.len(), path.display());
            return Ok(());
        }
        fs::write(path, text)?;
        tracing::debug!("Wrote project descriptor {}", path.display());
        Ok(())
    }
}
