//! In-memory descriptor and stores for composer tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use crate::descriptor::{DescriptorStore, FrameworkOptions, GroupOptions, ProjectDescriptor, Signing};
use crate::pbxproj::{PlistDict, PlistValue};
use crate::sidecar::SpmPackage;
use crate::types::{BuildPhaseKind, ComposeError, NativeTarget, ProductType};
use crate::workspace::{WorkspaceProject, WorkspaceStore};

#[derive(Debug, Clone)]
pub struct TargetRecord {
    pub target: NativeTarget,
    pub path: String,
    pub parent: Option<String>,
    pub phases: Vec<BuildPhaseKind>,
    pub sources: Vec<String>,
    pub resources: Vec<String>,
    /// `(path, custom, embed)`
    pub frameworks: Vec<(String, bool, bool)>,
    pub settings: BTreeMap<String, PlistDict>,
    pub header_search_paths: Vec<String>,
    pub dependencies: Vec<String>,
    pub signing: Option<Signing>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeDescriptor {
    pub targets: Vec<TargetRecord>,
    /// `(name, path, files, is_main)`
    pub groups: Vec<(String, String, Vec<String>, bool)>,
    pub host_signing: Option<Signing>,
    next_id: usize,
}

impl FakeDescriptor {
    /// A descriptor holding one application target with uuid `HOST`.
    pub fn with_host(name: &str) -> Self {
        let mut descriptor = Self::default();
        descriptor.insert("HOST".to_string(), name, ProductType::Application, "", None);
        descriptor
    }

    /// Adds a watch app target without phases.
    pub fn push_target(&mut self, name: &str) -> NativeTarget {
        let uuid = self.next_uuid();
        self.insert(uuid, name, ProductType::WatchApp, name, None)
    }

    pub fn target_record(&self, uuid: &str) -> &TargetRecord {
        self.targets
            .iter()
            .find(|record| record.target.uuid == uuid)
            .unwrap_or_else(|| panic!("no target {uuid}"))
    }

    fn record_mut(&mut self, uuid: &str) -> Result<&mut TargetRecord, ComposeError> {
        self.targets
            .iter_mut()
            .find(|record| record.target.uuid == uuid)
            .ok_or_else(|| ComposeError::Descriptor(format!("unknown target {uuid}")))
    }

    fn record_by_name_mut(&mut self, name: &str) -> Option<&mut TargetRecord> {
        self.targets.iter_mut().find(|record| record.target.name == name)
    }

    fn next_uuid(&mut self) -> String {
        self.next_id += 1;
        format!("{:024X}", self.next_id)
    }

    fn insert(
        &mut self,
        uuid: String,
        name: &str,
        product_type: ProductType,
        path: &str,
        parent: Option<&str>,
    ) -> NativeTarget {
        let target = NativeTarget {
            uuid,
            name: name.to_string(),
            product_name: name.to_string(),
            product_type,
        };
        let settings = ["Debug", "Release"]
            .iter()
            .map(|config| (config.to_string(), PlistDict::new()))
            .collect();
        self.targets.push(TargetRecord {
            target: target.clone(),
            path: path.to_string(),
            parent: parent.map(str::to_string),
            phases: Vec::new(),
            sources: Vec::new(),
            resources: Vec::new(),
            frameworks: Vec::new(),
            settings,
            header_search_paths: Vec::new(),
            dependencies: Vec::new(),
            signing: None,
        });
        target
    }
}

impl ProjectDescriptor for FakeDescriptor {
    fn first_target(&self) -> Option<NativeTarget> {
        self.targets.first().map(|record| record.target.clone())
    }

    fn find_target(&self, name: &str) -> Option<NativeTarget> {
        self.targets
            .iter()
            .find(|record| record.target.name == name)
            .map(|record| record.target.clone())
    }

    fn targets_by_product_type(&self, product_type: &ProductType) -> Vec<NativeTarget> {
        self.targets
            .iter()
            .filter(|record| &record.target.product_type == product_type)
            .map(|record| record.target.clone())
            .collect()
    }

    fn add_target(
        &mut self,
        name: &str,
        product_type: ProductType,
        path: &str,
        parent: Option<&str>,
    ) -> Result<NativeTarget, ComposeError> {
        let uuid = self.next_uuid();
        let target = self.insert(uuid, name, product_type, path, parent);
        if let Some(parent) = parent {
            self.record_mut(parent)?.dependencies.push(target.uuid.clone());
        }
        Ok(target)
    }

    fn add_build_phase(&mut self, kind: BuildPhaseKind, target_uuid: &str) -> Result<String, ComposeError> {
        let record = self.record_mut(target_uuid)?;
        if !record.phases.contains(&kind) {
            record.phases.push(kind);
        }
        Ok(format!("{}-{}", target_uuid, kind.name()))
    }

    fn add_group(
        &mut self,
        files: &[String],
        name: &str,
        path: &str,
        options: GroupOptions<'_>,
    ) -> Result<String, ComposeError> {
        self.groups
            .push((name.to_string(), path.to_string(), files.to_vec(), options.is_main));
        Ok(format!("group-{}", self.groups.len()))
    }

    fn add_source_file(&mut self, path: &str, target_uuid: &str) -> Result<(), ComposeError> {
        let record = self.record_mut(target_uuid)?;
        if !record.sources.iter().any(|source| source == path) {
            record.sources.push(path.to_string());
        }
        Ok(())
    }

    fn add_resource_file(&mut self, path: &str, target_uuid: &str) -> Result<(), ComposeError> {
        let record = self.record_mut(target_uuid)?;
        if !record.resources.iter().any(|resource| resource == path) {
            record.resources.push(path.to_string());
        }
        Ok(())
    }

    fn add_framework(&mut self, path: &str, options: FrameworkOptions<'_>) -> Result<(), ComposeError> {
        self.record_mut(options.target_uuid)?
            .frameworks
            .push((path.to_string(), options.custom, options.embed));
        Ok(())
    }

    fn add_build_property(&mut self, name: &str, value: PlistValue, build_name: Option<&str>, target_name: &str) {
        if let Some(record) = self.record_by_name_mut(target_name) {
            for (config, settings) in record.settings.iter_mut() {
                if build_name.is_none_or(|wanted| wanted == config.as_str()) {
                    settings.insert(name.to_string(), value.clone());
                }
            }
        }
    }

    fn build_property(&self, name: &str, target_name: &str) -> Option<PlistValue> {
        self.targets
            .iter()
            .find(|record| record.target.name == target_name)?
            .settings
            .values()
            .find_map(|settings| settings.get(name).cloned())
    }

    fn add_header_search_path(&mut self, path: &str, target_name: &str) {
        if let Some(record) = self.record_by_name_mut(target_name) {
            record.header_search_paths.push(path.to_string());
        }
    }

    fn add_target_dependency(&mut self, target_uuid: &str, dependencies: &[String]) -> Result<(), ComposeError> {
        self.record_mut(target_uuid)?
            .dependencies
            .extend(dependencies.iter().cloned());
        Ok(())
    }

    fn remove_targets_by_product_type(&mut self, product_type: &ProductType) -> usize {
        let before = self.targets.len();
        self.targets
            .retain(|record| &record.target.product_type != product_type);
        before - self.targets.len()
    }

    fn signing(&self, target_name: &str) -> Option<Signing> {
        let record = self
            .targets
            .iter()
            .find(|record| record.target.name == target_name)?;
        if record.target.uuid == "HOST" {
            self.host_signing.clone()
        } else {
            record.signing.clone()
        }
    }

    fn set_signing(&mut self, target_uuid: &str, signing: &Signing) {
        if let Ok(record) = self.record_mut(target_uuid) {
            record.signing = Some(signing.clone());
        }
    }
}

/// Store that keeps one descriptor in memory and counts accesses.
#[derive(Debug)]
pub struct FakeStore {
    current: RefCell<FakeDescriptor>,
    pub loads: Cell<usize>,
    pub saves: Cell<usize>,
}

impl FakeStore {
    pub fn new(descriptor: FakeDescriptor) -> Self {
        Self {
            current: RefCell::new(descriptor),
            loads: Cell::new(0),
            saves: Cell::new(0),
        }
    }

    /// The last saved descriptor, if anything was saved.
    pub fn saved(&self) -> Option<FakeDescriptor> {
        (self.saves.get() > 0).then(|| self.current.borrow().clone())
    }
}

impl DescriptorStore for FakeStore {
    type Descriptor = FakeDescriptor;

    fn load(&self, _path: &Path) -> Result<FakeDescriptor, ComposeError> {
        self.loads.set(self.loads.get() + 1);
        Ok(self.current.borrow().clone())
    }

    fn save(&self, _path: &Path, descriptor: &FakeDescriptor) -> Result<(), ComposeError> {
        self.saves.set(self.saves.get() + 1);
        *self.current.borrow_mut() = descriptor.clone();
        Ok(())
    }
}

/// Workspace store recording committed `(target, package)` pairs.
#[derive(Debug, Clone, Default)]
pub struct FakeWorkspaceStore {
    pub committed: Rc<RefCell<Vec<(String, SpmPackage)>>>,
    pub fail: bool,
}

#[derive(Debug)]
pub struct FakeWorkspace {
    pending: Vec<(String, SpmPackage)>,
    committed: Rc<RefCell<Vec<(String, SpmPackage)>>>,
    fail: bool,
}

impl WorkspaceStore for FakeWorkspaceStore {
    type Project = FakeWorkspace;

    fn load(&self, _descriptor_path: &Path) -> Result<FakeWorkspace, ComposeError> {
        Ok(FakeWorkspace {
            pending: Vec::new(),
            committed: Rc::clone(&self.committed),
            fail: self.fail,
        })
    }
}

impl WorkspaceProject for FakeWorkspace {
    fn add_spm_package(&mut self, target_name: &str, package: &SpmPackage) -> Result<(), ComposeError> {
        if self.fail {
            return Err(ComposeError::Workspace("package resolution failed".to_string()));
        }
        self.pending.push((target_name.to_string(), package.clone()));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ComposeError> {
        self.committed.borrow_mut().append(&mut self.pending);
        Ok(())
    }
}
