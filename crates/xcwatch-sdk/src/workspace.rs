//! Swift Package Manager application.
//!
//! Packages are applied through a higher-level project model than the
//! descriptor used for target composition: a [`WorkspaceProject`] is loaded
//! from the persisted project file, mutated, and committed back to disk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};

use crate::common::{normalize, relative_path};
use crate::descriptor::ProjectDescriptor;
use crate::pbxproj::PbxProject;
use crate::sidecar::SpmPackage;
use crate::types::ComposeError;

/// A project model that can take Swift packages.
pub trait WorkspaceProject {
    /// Links `package` into the named target.
    ///
    /// A `path` on the package must already be absolute or relative to the
    /// current directory; it is stored relative to the project root.
    fn add_spm_package(&mut self, target_name: &str, package: &SpmPackage) -> Result<(), ComposeError>;

    /// Writes all pending changes.
    fn commit(&mut self) -> Result<(), ComposeError>;
}

/// Opens [`WorkspaceProject`]s.
pub trait WorkspaceStore {
    type Project: WorkspaceProject;

    /// Loads the project whose descriptor lives at `descriptor_path`.
    fn load(&self, descriptor_path: &Path) -> Result<Self::Project, ComposeError>;
}

/// Workspace project backed directly by `project.pbxproj`.
#[derive(Debug)]
pub struct PbxWorkspace {
    descriptor_path: PathBuf,
    project_root: PathBuf,
    project: PbxProject,
    dry_run: bool,
    dirty: bool,
}

impl WorkspaceProject for PbxWorkspace {
    fn add_spm_package(&mut self, target_name: &str, package: &SpmPackage) -> Result<(), ComposeError> {
        let target = self
            .project
            .find_target(target_name)
            .ok_or_else(|| ComposeError::Workspace(format!("no target named {}", target_name)))?;

        let local_path = package
            .path
            .as_deref()
            .map(|path| relative_path(&self.project_root, &normalize(Path::new(path))));
        let reference = self.project.add_package_reference(package, local_path.as_deref())?;
        for library in package.libraries() {
            self.project.add_package_product(&target.uuid, &reference, &library)?;
            trace!("Linked {} from {} into {}", library, package.name, target_name);
        }
        self.dirty = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ComposeError> {
        if !self.dirty {
            return Ok(());
        }
        let text = self.project.to_pbxproj_string();
        if self.dry_run {
            info!("[dry-run] would commit Swift packages to {}", self.descriptor_path.display());
        } else {
            fs::write(&self.descriptor_path, text)?;
            debug!("Committed Swift packages to {}", self.descriptor_path.display());
        }
        self.dirty = false;
        Ok(())
    }
}

/// Store producing [`PbxWorkspace`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PbxWorkspaceStore {
    dry_run: bool,
}

impl PbxWorkspaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips the commit write.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl WorkspaceStore for PbxWorkspaceStore {
    type Project = PbxWorkspace;

    fn load(&self, descriptor_path: &Path) -> Result<PbxWorkspace, ComposeError> {
        let project = PbxProject::open(descriptor_path)?;
        Ok(PbxWorkspace {
            project_root: project_root_of(descriptor_path),
            descriptor_path: descriptor_path.to_path_buf(),
            project,
            dry_run: self.dry_run,
            dirty: false,
        })
    }
}

/// Directory holding `<Name>.xcodeproj` for a `.../<Name>.xcodeproj/project.pbxproj` path.
pub fn project_root_of(descriptor_path: &Path) -> PathBuf {
    descriptor_path
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default()
}
