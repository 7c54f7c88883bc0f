//! In-memory `project.pbxproj` model.
//!
//! [`PbxProject`] keeps the raw object graph and implements
//! [`ProjectDescriptor`] on top of it. Objects are addressed by their 24-digit
//! hexadecimal ids; cross references are plain string values holding an id.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use tracing::{debug, trace};
use uuid::Uuid;

use super::parser;
use super::value::{PlistDict, PlistValue, plist_dict};
use super::writer::{self, WriteOptions};
use crate::descriptor::{FrameworkOptions, GroupOptions, ManualSigning, ProjectDescriptor, Signing};
use crate::sidecar::SpmPackage;
use crate::types::{BuildPhaseKind, ComposeError, NativeTarget, ProductType};

const BUILD_ACTION_MASK: &str = "2147483647";
const EMBED_FRAMEWORKS: &str = "Embed Frameworks";
const EMBED_WATCH_CONTENT: &str = "Embed Watch Content";
const EMBED_APP_EXTENSIONS: &str = "Embed App Extensions";
const FRAMEWORKS_GROUP: &str = "Frameworks";
const INHERITED: &str = "$(inherited)";

/// A parsed Xcode project file.
#[derive(Debug, Clone)]
pub struct PbxProject {
    /// Top-level entries other than `objects`.
    header: PlistDict,
    objects: PlistDict,
}

impl PbxProject {
    /// Parses project-file text.
    pub fn parse(text: &str) -> Result<Self, ComposeError> {
        let mut header = match parser::parse(text)? {
            PlistValue::Dict(dict) => dict,
            _ => {
                return Err(ComposeError::Descriptor(
                    "project file root is not a dictionary".to_string(),
                ));
            }
        };
        let objects = match header.remove("objects") {
            Some(PlistValue::Dict(objects)) => objects,
            _ => {
                return Err(ComposeError::Descriptor(
                    "project file has no objects dictionary".to_string(),
                ));
            }
        };
        let project = Self { header, objects };
        project.root_object_id()?;
        Ok(project)
    }

    /// Reads and parses a project file.
    pub fn open(path: &Path) -> Result<Self, ComposeError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Serializes the project the way Xcode lays it out, omitting empty values.
    pub fn to_pbxproj_string(&self) -> String {
        let mut root = self.header.clone();
        root.insert("objects".to_string(), PlistValue::Dict(self.objects.clone()));
        writer::write(
            &root,
            WriteOptions {
                omit_empty_values: true,
            },
        )
    }

    /// Raw object lookup.
    pub fn object(&self, id: &str) -> Option<&PlistDict> {
        self.objects.get(id).and_then(PlistValue::as_dict)
    }

    fn object_mut(&mut self, id: &str) -> Option<&mut PlistDict> {
        self.objects.get_mut(id).and_then(PlistValue::as_dict_mut)
    }

    /// Ids of all objects with the given `isa`.
    pub fn objects_of_isa(&self, isa: &str) -> Vec<String> {
        self.objects
            .iter()
            .filter(|(_, object)| {
                object
                    .as_dict()
                    .is_some_and(|dict| str_field(dict, "isa") == Some(isa))
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn root_object_id(&self) -> Result<String, ComposeError> {
        let id = self
            .header
            .get("rootObject")
            .and_then(PlistValue::as_str)
            .ok_or_else(|| ComposeError::Descriptor("project file has no rootObject".to_string()))?;
        if self.object(id).is_none() {
            return Err(ComposeError::Descriptor(format!(
                "rootObject {} is not defined",
                id
            )));
        }
        Ok(id.to_string())
    }

    fn project_field(&self, key: &str) -> Option<String> {
        let root = self.root_object_id().ok()?;
        self.object(&root)
            .and_then(|project| str_field(project, key))
            .map(str::to_string)
    }

    /// A fresh object id, unique within this file.
    fn generate_id(&self) -> String {
        loop {
            let id: String = Uuid::new_v4()
                .simple()
                .to_string()
                .to_uppercase()
                .chars()
                .take(24)
                .collect();
            if !self.objects.contains_key(&id) {
                return id;
            }
        }
    }

    fn insert_object(&mut self, object: PlistDict) -> String {
        let id = self.generate_id();
        self.objects.insert(id.clone(), PlistValue::Dict(object));
        id
    }

    /// All native targets in `PBXProject.targets` order.
    pub fn targets(&self) -> Vec<NativeTarget> {
        let Some(root) = self.root_object_id().ok() else {
            return Vec::new();
        };
        self.object(&root)
            .and_then(|project| project.get("targets"))
            .map(PlistValue::string_list)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.native_target(id))
            .collect()
    }

    fn native_target(&self, id: &str) -> Option<NativeTarget> {
        let target = self.object(id)?;
        if str_field(target, "isa") != Some("PBXNativeTarget") {
            return None;
        }
        let name = str_field(target, "name").unwrap_or_default().to_string();
        Some(NativeTarget {
            uuid: id.to_string(),
            product_name: str_field(target, "productName").unwrap_or(&name).to_string(),
            product_type: ProductType::from_identifier(str_field(target, "productType").unwrap_or_default()),
            name,
        })
    }

    /// Target matched by name or product name.
    fn target_by_name(&self, name: &str) -> Option<NativeTarget> {
        self.targets()
            .into_iter()
            .find(|target| target.name == name || target.product_name == name)
    }

    fn configuration_ids(&self, target_uuid: &str) -> Vec<String> {
        self.object(target_uuid)
            .and_then(|target| str_field(target, "buildConfigurationList"))
            .and_then(|list| self.object(list))
            .and_then(|list| list.get("buildConfigurations"))
            .map(PlistValue::string_list)
            .unwrap_or_default()
    }

    fn build_settings_mut(&mut self, configuration: &str) -> Option<&mut PlistDict> {
        let config = self.object_mut(configuration)?;
        config
            .entry("buildSettings".to_string())
            .or_insert_with(|| PlistValue::Dict(PlistDict::new()))
            .as_dict_mut()
    }

    fn phase_of(&self, target_uuid: &str, isa: &str, name: Option<&str>) -> Option<String> {
        self.object(target_uuid)?
            .get("buildPhases")
            .map(PlistValue::string_list)
            .unwrap_or_default()
            .into_iter()
            .find(|phase| {
                self.object(phase).is_some_and(|dict| {
                    str_field(dict, "isa") == Some(isa)
                        && name.is_none_or(|name| str_field(dict, "name") == Some(name))
                })
            })
    }

    fn main_group_id(&self) -> Result<String, ComposeError> {
        self.project_field("mainGroup")
            .ok_or_else(|| ComposeError::Descriptor("project has no mainGroup".to_string()))
    }

    fn child_group_named(&self, parent: &str, name: &str) -> Option<String> {
        self.object(parent)?
            .get("children")
            .map(PlistValue::string_list)
            .unwrap_or_default()
            .into_iter()
            .find(|child| {
                self.object(child).is_some_and(|dict| {
                    str_field(dict, "isa") == Some("PBXGroup")
                        && (str_field(dict, "name") == Some(name)
                            || (str_field(dict, "name").is_none() && str_field(dict, "path") == Some(name)))
                })
            })
    }

    fn is_grouped(&self, id: &str) -> bool {
        self.objects.values().filter_map(PlistValue::as_dict).any(|dict| {
            str_field(dict, "isa") == Some("PBXGroup")
                && dict
                    .get("children")
                    .is_some_and(|children| children.string_list().iter().any(|child| child == id))
        })
    }

    fn add_child(&mut self, group: &str, child: &str) {
        if let Some(group) = self.object_mut(group) {
            update_array(group, "children", |children| push_unique(children, child));
        }
    }

    /// Group that collects a target's files: the main-group child named after
    /// the target, or the main group itself.
    fn target_group(&self, target_uuid: &str) -> Result<String, ComposeError> {
        let main = self.main_group_id()?;
        let name = self
            .native_target(target_uuid)
            .map(|target| target.name)
            .unwrap_or_default();
        Ok(self.child_group_named(&main, &name).unwrap_or(main))
    }

    fn frameworks_group(&mut self) -> Result<String, ComposeError> {
        let main = self.main_group_id()?;
        if let Some(group) = self.child_group_named(&main, FRAMEWORKS_GROUP) {
            return Ok(group);
        }
        let group = self.insert_object(plist_dict! {
            "isa" => "PBXGroup",
            "children" => Vec::<PlistValue>::new(),
            "name" => FRAMEWORKS_GROUP,
            "sourceTree" => "<group>",
        });
        self.add_child(&main, &group);
        Ok(group)
    }

    /// Existing file reference for `path`, or a new one.
    fn file_reference(&mut self, path: &str, source_tree: &str) -> String {
        let existing = self.objects_of_isa("PBXFileReference").into_iter().find(|id| {
            self.object(id).is_some_and(|dict| {
                str_field(dict, "path") == Some(path) && str_field(dict, "sourceTree") == Some(source_tree)
            })
        });
        if let Some(id) = existing {
            return id;
        }
        let name = path.rsplit('/').next().unwrap_or(path);
        let mut reference = plist_dict! {
            "isa" => "PBXFileReference",
            "lastKnownFileType" => file_type(path),
            "path" => path,
            "sourceTree" => source_tree,
        };
        if name != path {
            reference.insert("name".to_string(), name.into());
        }
        self.insert_object(reference)
    }

    /// Adds `file_ref` to a phase unless the phase already builds it.
    fn add_to_phase(&mut self, phase: &str, file_ref: &str, settings: Option<PlistDict>) -> bool {
        let already = self
            .object(phase)
            .and_then(|dict| dict.get("files"))
            .map(PlistValue::string_list)
            .unwrap_or_default()
            .iter()
            .any(|build_file| {
                self.object(build_file)
                    .is_some_and(|dict| str_field(dict, "fileRef") == Some(file_ref))
            });
        if already {
            return false;
        }
        let mut build_file = plist_dict! { "isa" => "PBXBuildFile", "fileRef" => file_ref };
        if let Some(settings) = settings {
            build_file.insert("settings".to_string(), PlistValue::Dict(settings));
        }
        let build_file = self.insert_object(build_file);
        if let Some(phase) = self.object_mut(phase) {
            update_array(phase, "files", |files| push_unique(files, &build_file));
        }
        true
    }

    fn require_phase(&mut self, kind: BuildPhaseKind, target_uuid: &str) -> Result<String, ComposeError> {
        match self.phase_of(target_uuid, kind.isa(), None) {
            Some(phase) => Ok(phase),
            None => self.add_build_phase(kind, target_uuid),
        }
    }

    /// Copy-files phase on a target, created on first use.
    fn copy_files_phase(
        &mut self,
        target_uuid: &str,
        name: &str,
        dst_path: &str,
        dst_subfolder_spec: &str,
    ) -> Result<String, ComposeError> {
        if let Some(phase) = self.phase_of(target_uuid, "PBXCopyFilesBuildPhase", Some(name)) {
            return Ok(phase);
        }
        let phase = self.insert_object(plist_dict! {
            "isa" => "PBXCopyFilesBuildPhase",
            "buildActionMask" => BUILD_ACTION_MASK,
            "dstPath" => dst_path,
            "dstSubfolderSpec" => dst_subfolder_spec,
            "files" => Vec::<PlistValue>::new(),
            "name" => name,
            "runOnlyForDeploymentPostprocessing" => "0",
        });
        self.append_phase(target_uuid, &phase)?;
        Ok(phase)
    }

    fn append_phase(&mut self, target_uuid: &str, phase: &str) -> Result<(), ComposeError> {
        let target = self
            .object_mut(target_uuid)
            .ok_or_else(|| ComposeError::Descriptor(format!("unknown target {}", target_uuid)))?;
        update_array(target, "buildPhases", |phases| push_unique(phases, phase));
        Ok(())
    }

    fn target_attributes(&self, target_uuid: &str) -> Option<PlistDict> {
        let root = self.root_object_id().ok()?;
        self.object(&root)?
            .get("attributes")?
            .as_dict()?
            .get("TargetAttributes")?
            .as_dict()?
            .get(target_uuid)?
            .as_dict()
            .cloned()
    }

    fn target_attributes_mut(&mut self) -> Option<&mut PlistDict> {
        let root = self.root_object_id().ok()?;
        let project = self.object_mut(&root)?;
        project
            .entry("attributes".to_string())
            .or_insert_with(|| PlistValue::Dict(PlistDict::new()))
            .as_dict_mut()?
            .entry("TargetAttributes".to_string())
            .or_insert_with(|| PlistValue::Dict(PlistDict::new()))
            .as_dict_mut()
    }

    /// Registers a Swift package in `PBXProject.packageReferences` and returns its id.
    ///
    /// A package is identified by its repository URL, or by its local path
    /// (`local_path`, already relative to the project root).
    pub fn add_package_reference(
        &mut self,
        package: &SpmPackage,
        local_path: Option<&str>,
    ) -> Result<String, ComposeError> {
        let (isa, key, value) = match (local_path, package.repository_url.as_deref()) {
            (Some(path), _) => ("XCLocalSwiftPackageReference", "relativePath", path.to_string()),
            (None, Some(url)) => ("XCRemoteSwiftPackageReference", "repositoryURL", url.to_string()),
            (None, None) => {
                return Err(ComposeError::Workspace(format!(
                    "package {} has neither a path nor a repositoryURL",
                    package.name
                )));
            }
        };

        let existing = self.objects_of_isa(isa).into_iter().find(|id| {
            self.object(id)
                .is_some_and(|dict| str_field(dict, key) == Some(value.as_str()))
        });
        let reference = match existing {
            Some(id) => id,
            None => {
                let mut reference = plist_dict! { "isa" => isa, key => value.as_str() };
                if isa == "XCRemoteSwiftPackageReference" {
                    let requirement = match package.version.as_deref() {
                        Some(version) => plist_dict! {
                            "kind" => "upToNextMajorVersion",
                            "minimumVersion" => version,
                        },
                        None => plist_dict! { "branch" => "main", "kind" => "branch" },
                    };
                    reference.insert("requirement".to_string(), PlistValue::Dict(requirement));
                }
                self.insert_object(reference)
            }
        };

        let root = self.root_object_id()?;
        if let Some(project) = self.object_mut(&root) {
            update_array(project, "packageReferences", |refs| push_unique(refs, &reference));
        }
        Ok(reference)
    }

    /// Links a product of a registered package into a target.
    pub fn add_package_product(
        &mut self,
        target_uuid: &str,
        package_reference: &str,
        product_name: &str,
    ) -> Result<(), ComposeError> {
        let existing = self
            .object(target_uuid)
            .and_then(|target| target.get("packageProductDependencies"))
            .map(PlistValue::string_list)
            .unwrap_or_default()
            .into_iter()
            .any(|id| {
                self.object(&id).is_some_and(|dict| {
                    str_field(dict, "productName") == Some(product_name)
                        && str_field(dict, "package") == Some(package_reference)
                })
            });
        if existing {
            trace!("Package product {} already linked", product_name);
            return Ok(());
        }

        let dependency = self.insert_object(plist_dict! {
            "isa" => "XCSwiftPackageProductDependency",
            "package" => package_reference,
            "productName" => product_name,
        });
        let target = self
            .object_mut(target_uuid)
            .ok_or_else(|| ComposeError::Workspace(format!("unknown target {}", target_uuid)))?;
        update_array(target, "packageProductDependencies", |deps| push_unique(deps, &dependency));

        let phase = self.require_phase(BuildPhaseKind::Frameworks, target_uuid)?;
        let build_file = self.insert_object(plist_dict! {
            "isa" => "PBXBuildFile",
            "productRef" => dependency.as_str(),
        });
        if let Some(phase) = self.object_mut(&phase) {
            update_array(phase, "files", |files| push_unique(files, &build_file));
        }
        Ok(())
    }

    /// Deletes an object and every build file, dependency and list entry that points at it.
    fn remove_target(&mut self, target_uuid: &str) {
        let Some(target) = self.object(target_uuid).cloned() else {
            return;
        };
        let name = str_field(&target, "name").unwrap_or_default().to_string();
        let mut doomed: BTreeSet<String> = BTreeSet::new();
        doomed.insert(target_uuid.to_string());

        for phase in target.get("buildPhases").map(PlistValue::string_list).unwrap_or_default() {
            if let Some(files) = self.object(&phase).and_then(|p| p.get("files")) {
                doomed.extend(files.string_list());
            }
            doomed.insert(phase);
        }
        if let Some(list) = str_field(&target, "buildConfigurationList") {
            doomed.extend(self.configuration_ids(target_uuid));
            doomed.insert(list.to_string());
        }
        for dependency in target.get("dependencies").map(PlistValue::string_list).unwrap_or_default() {
            if let Some(proxy) = self.object(&dependency).and_then(|d| str_field(d, "targetProxy")) {
                doomed.insert(proxy.to_string());
            }
            doomed.insert(dependency);
        }
        doomed.extend(
            target
                .get("packageProductDependencies")
                .map(PlistValue::string_list)
                .unwrap_or_default(),
        );
        let product = str_field(&target, "productReference").map(str::to_string);
        if let Some(product) = &product {
            doomed.insert(product.clone());
        }

        // Other targets' dependencies on the removed one, and build files embedding its product.
        for (id, object) in &self.objects {
            let Some(dict) = object.as_dict() else {
                continue;
            };
            match str_field(dict, "isa") {
                Some("PBXTargetDependency") if str_field(dict, "target") == Some(target_uuid) => {
                    doomed.insert(id.clone());
                    if let Some(proxy) = str_field(dict, "targetProxy") {
                        doomed.insert(proxy.to_string());
                    }
                }
                Some("PBXContainerItemProxy") if str_field(dict, "remoteGlobalIDString") == Some(target_uuid) => {
                    doomed.insert(id.clone());
                }
                Some("PBXBuildFile") if product.is_some() && str_field(dict, "fileRef") == product.as_deref() => {
                    doomed.insert(id.clone());
                }
                _ => {}
            }
        }

        // The target's own group, when nothing else builds its files.
        let group = self
            .main_group_id()
            .ok()
            .and_then(|main| self.child_group_named(&main, &name));
        if let Some(group) = group {
            let mut subtree = Vec::new();
            self.collect_group_subtree(&group, &mut subtree);
            let still_built: BTreeSet<String> = self
                .objects
                .iter()
                .filter(|(id, _)| !doomed.contains(id.as_str()))
                .filter_map(|(_, object)| object.as_dict())
                .filter_map(|dict| str_field(dict, "fileRef").map(str::to_string))
                .collect();
            if subtree.iter().all(|id| !still_built.contains(id)) {
                doomed.extend(subtree);
                doomed.insert(group);
            }
        }

        // Copy-files phases left with nothing to embed (the host's "Embed Watch Content").
        let emptied: Vec<String> = self
            .objects
            .iter()
            .filter(|(id, _)| !doomed.contains(id.as_str()))
            .filter_map(|(id, object)| Some((id, object.as_dict()?)))
            .filter(|(_, dict)| str_field(dict, "isa") == Some("PBXCopyFilesBuildPhase"))
            .filter(|(_, dict)| {
                let files = dict.get("files").map(PlistValue::string_list).unwrap_or_default();
                !files.is_empty() && files.iter().all(|file| doomed.contains(file))
            })
            .map(|(id, _)| id.clone())
            .collect();
        doomed.extend(emptied);

        for id in &doomed {
            self.objects.remove(id);
        }
        let doomed_refs: Vec<&str> = doomed.iter().map(String::as_str).collect();
        for object in self.objects.values_mut().filter_map(PlistValue::as_dict_mut) {
            for key in ["targets", "children", "files", "dependencies", "buildPhases"] {
                if let Some(PlistValue::Array(items)) = object.get_mut(key) {
                    items.retain(|item| item.as_str().is_none_or(|id| !doomed_refs.contains(&id)));
                }
            }
        }
        if let Some(attributes) = self.target_attributes_mut() {
            attributes.remove(target_uuid);
        }
        debug!("Removed target {} ({} objects)", name, doomed.len());
    }

    fn collect_group_subtree(&self, group: &str, out: &mut Vec<String>) {
        for child in self
            .object(group)
            .and_then(|dict| dict.get("children"))
            .map(PlistValue::string_list)
            .unwrap_or_default()
        {
            if self
                .object(&child)
                .is_some_and(|dict| str_field(dict, "isa") == Some("PBXGroup"))
            {
                self.collect_group_subtree(&child, out);
            }
            out.push(child);
        }
    }

    fn set_setting(&mut self, target_uuid: &str, name: &str, value: Option<&str>, only: Option<&str>) {
        for configuration in self.configuration_ids(target_uuid) {
            let config_name = self
                .object(&configuration)
                .and_then(|dict| str_field(dict, "name"))
                .map(str::to_string);
            if only.is_some_and(|only| config_name.as_deref() != Some(only)) {
                continue;
            }
            if let Some(settings) = self.build_settings_mut(&configuration) {
                match value {
                    Some(value) => {
                        settings.insert(name.to_string(), value.into());
                    }
                    None => {
                        settings.remove(name);
                    }
                }
            }
        }
    }

    fn first_setting(&self, target_uuid: &str, name: &str) -> Option<String> {
        self.configuration_ids(target_uuid).iter().find_map(|configuration| {
            self.object(configuration)
                .and_then(|dict| dict.get("buildSettings"))
                .and_then(PlistValue::as_dict)
                .and_then(|settings| str_field(settings, name))
                .map(str::to_string)
        })
    }
}

impl ProjectDescriptor for PbxProject {
    fn first_target(&self) -> Option<NativeTarget> {
        self.targets().into_iter().next()
    }

    fn find_target(&self, name: &str) -> Option<NativeTarget> {
        self.target_by_name(name)
    }

    fn targets_by_product_type(&self, product_type: &ProductType) -> Vec<NativeTarget> {
        self.targets()
            .into_iter()
            .filter(|target| &target.product_type == product_type)
            .collect()
    }

    fn add_target(
        &mut self,
        name: &str,
        product_type: ProductType,
        path: &str,
        parent: Option<&str>,
    ) -> Result<NativeTarget, ComposeError> {
        let root = self.root_object_id()?;
        let configurations: Vec<PlistValue> = ["Debug", "Release"]
            .iter()
            .map(|config| {
                let settings = plist_dict! {
                    "INFOPLIST_FILE" => format!("{}/Info.plist", path),
                    "LD_RUNPATH_SEARCH_PATHS" => PlistValue::strings([INHERITED, "@executable_path/Frameworks"]),
                    "PRODUCT_NAME" => name,
                    "SKIP_INSTALL" => "YES",
                    "SWIFT_VERSION" => "5.0",
                };
                PlistValue::String(self.insert_object(plist_dict! {
                    "isa" => "XCBuildConfiguration",
                    "buildSettings" => settings,
                    "name" => *config,
                }))
            })
            .collect();
        let configuration_list = self.insert_object(plist_dict! {
            "isa" => "XCConfigurationList",
            "buildConfigurations" => configurations,
            "defaultConfigurationIsVisible" => "0",
            "defaultConfigurationName" => "Release",
        });

        let (wrapper, file_type) = product_type.product_file();
        let product = self.insert_object(plist_dict! {
            "isa" => "PBXFileReference",
            "explicitFileType" => file_type,
            "includeInIndex" => "0",
            "path" => format!("{}.{}", name, wrapper),
            "sourceTree" => "BUILT_PRODUCTS_DIR",
        });
        if let Some(products) = self.project_field("productRefGroup") {
            self.add_child(&products, &product);
        }

        let uuid = self.insert_object(plist_dict! {
            "isa" => "PBXNativeTarget",
            "buildConfigurationList" => configuration_list,
            "buildPhases" => Vec::<PlistValue>::new(),
            "buildRules" => Vec::<PlistValue>::new(),
            "dependencies" => Vec::<PlistValue>::new(),
            "name" => name,
            "productName" => name,
            "productReference" => product.as_str(),
            "productType" => product_type.as_str(),
        });
        if let Some(project) = self.object_mut(&root) {
            update_array(project, "targets", |targets| push_unique(targets, &uuid));
        }

        if let Some(parent) = parent {
            let (phase_name, dst_path, spec) = match product_type {
                ProductType::WatchExtension => (EMBED_APP_EXTENSIONS, "", "13"),
                _ => (EMBED_WATCH_CONTENT, "$(CONTENTS_FOLDER_PATH)/Watch", "16"),
            };
            let phase = self.copy_files_phase(parent, phase_name, dst_path, spec)?;
            self.add_to_phase(
                &phase,
                &product,
                Some(plist_dict! { "ATTRIBUTES" => PlistValue::strings(["RemoveHeadersOnCopy"]) }),
            );
            self.add_target_dependency(parent, &[uuid.clone()])?;
        }

        debug!("Added target {} ({})", name, product_type.as_str());
        Ok(NativeTarget {
            uuid,
            name: name.to_string(),
            product_name: name.to_string(),
            product_type,
        })
    }

    fn add_build_phase(&mut self, kind: BuildPhaseKind, target_uuid: &str) -> Result<String, ComposeError> {
        if let Some(existing) = self.phase_of(target_uuid, kind.isa(), None) {
            return Ok(existing);
        }
        let phase = self.insert_object(plist_dict! {
            "isa" => kind.isa(),
            "buildActionMask" => BUILD_ACTION_MASK,
            "files" => Vec::<PlistValue>::new(),
            "runOnlyForDeploymentPostprocessing" => "0",
        });
        self.append_phase(target_uuid, &phase)?;
        trace!("Added {} phase to {}", kind.name(), target_uuid);
        Ok(phase)
    }

    fn add_group(
        &mut self,
        files: &[String],
        name: &str,
        path: &str,
        options: GroupOptions<'_>,
    ) -> Result<String, ComposeError> {
        let children: Vec<PlistValue> = files
            .iter()
            .map(|file| PlistValue::String(self.file_reference(file, "SOURCE_ROOT")))
            .collect();
        let group = self.insert_object(plist_dict! {
            "isa" => "PBXGroup",
            "children" => children,
            "name" => name,
            "path" => path,
            "sourceTree" => "SOURCE_ROOT",
        });
        let parent = if options.is_main {
            self.main_group_id()?
        } else {
            self.target_group(options.target_uuid)?
        };
        self.add_child(&parent, &group);
        Ok(group)
    }

    fn add_source_file(&mut self, path: &str, target_uuid: &str) -> Result<(), ComposeError> {
        let phase = self.require_phase(BuildPhaseKind::Sources, target_uuid)?;
        let file_ref = self.file_reference(path, "SOURCE_ROOT");
        if self.add_to_phase(&phase, &file_ref, None) && !self.is_grouped(&file_ref) {
            let group = self.target_group(target_uuid)?;
            self.add_child(&group, &file_ref);
        }
        Ok(())
    }

    fn add_resource_file(&mut self, path: &str, target_uuid: &str) -> Result<(), ComposeError> {
        let phase = self.require_phase(BuildPhaseKind::Resources, target_uuid)?;
        let file_ref = self.file_reference(path, "SOURCE_ROOT");
        if self.add_to_phase(&phase, &file_ref, None) && !self.is_grouped(&file_ref) {
            let group = self.target_group(target_uuid)?;
            self.add_child(&group, &file_ref);
        }
        Ok(())
    }

    fn add_framework(&mut self, path: &str, options: FrameworkOptions<'_>) -> Result<(), ComposeError> {
        let file_ref = if options.custom {
            self.file_reference(path, "SOURCE_ROOT")
        } else {
            let system_path = system_framework_path(path);
            self.file_reference(&system_path, "SDKROOT")
        };
        let group = self.frameworks_group()?;
        self.add_child(&group, &file_ref);

        let phase = self.require_phase(BuildPhaseKind::Frameworks, options.target_uuid)?;
        self.add_to_phase(&phase, &file_ref, None);

        if options.embed {
            let embed = self.copy_files_phase(options.target_uuid, EMBED_FRAMEWORKS, "", "10")?;
            self.add_to_phase(
                &embed,
                &file_ref,
                Some(plist_dict! {
                    "ATTRIBUTES" => PlistValue::strings(["CodeSignOnCopy", "RemoveHeadersOnCopy"]),
                }),
            );
        }
        Ok(())
    }

    fn add_build_property(
        &mut self,
        name: &str,
        value: PlistValue,
        build_name: Option<&str>,
        target_name: &str,
    ) {
        let Some(target) = self.target_by_name(target_name) else {
            trace!("No target named {} for build property {}", target_name, name);
            return;
        };
        for configuration in self.configuration_ids(&target.uuid) {
            let config_name = self
                .object(&configuration)
                .and_then(|dict| str_field(dict, "name"))
                .map(str::to_string);
            if build_name.is_some_and(|wanted| config_name.as_deref() != Some(wanted)) {
                continue;
            }
            if let Some(settings) = self.build_settings_mut(&configuration) {
                settings.insert(name.to_string(), value.clone());
            }
        }
    }

    fn build_property(&self, name: &str, target_name: &str) -> Option<PlistValue> {
        let target = self.target_by_name(target_name)?;
        self.configuration_ids(&target.uuid).iter().find_map(|configuration| {
            self.object(configuration)
                .and_then(|dict| dict.get("buildSettings"))
                .and_then(PlistValue::as_dict)
                .and_then(|settings| settings.get(name))
                .cloned()
        })
    }

    fn add_header_search_path(&mut self, path: &str, target_name: &str) {
        let Some(target) = self.target_by_name(target_name) else {
            trace!("No target named {} for header search path {}", target_name, path);
            return;
        };
        let entry = if path.starts_with('/') || path.starts_with("$(") {
            path.to_string()
        } else {
            format!("$(SRCROOT)/{}", path)
        };
        for configuration in self.configuration_ids(&target.uuid) {
            if let Some(settings) = self.build_settings_mut(&configuration) {
                if !settings.contains_key("HEADER_SEARCH_PATHS") {
                    settings.insert("HEADER_SEARCH_PATHS".to_string(), PlistValue::strings([INHERITED]));
                }
                update_array(settings, "HEADER_SEARCH_PATHS", |paths| push_unique(paths, &entry));
            }
        }
    }

    fn add_target_dependency(&mut self, target_uuid: &str, dependencies: &[String]) -> Result<(), ComposeError> {
        let root = self.root_object_id()?;
        let existing: Vec<String> = self
            .object(target_uuid)
            .ok_or_else(|| ComposeError::Descriptor(format!("unknown target {}", target_uuid)))?
            .get("dependencies")
            .map(PlistValue::string_list)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.object(id).and_then(|d| str_field(d, "target")).map(str::to_string))
            .collect();

        for dependency in dependencies {
            if existing.contains(dependency) {
                continue;
            }
            let remote_info = self
                .native_target(dependency)
                .map(|target| target.name)
                .ok_or_else(|| ComposeError::Descriptor(format!("unknown dependency target {}", dependency)))?;
            let proxy = self.insert_object(plist_dict! {
                "isa" => "PBXContainerItemProxy",
                "containerPortal" => root.as_str(),
                "proxyType" => "1",
                "remoteGlobalIDString" => dependency.as_str(),
                "remoteInfo" => remote_info,
            });
            let target_dependency = self.insert_object(plist_dict! {
                "isa" => "PBXTargetDependency",
                "target" => dependency.as_str(),
                "targetProxy" => proxy,
            });
            if let Some(target) = self.object_mut(target_uuid) {
                update_array(target, "dependencies", |deps| push_unique(deps, &target_dependency));
            }
        }
        Ok(())
    }

    fn remove_targets_by_product_type(&mut self, product_type: &ProductType) -> usize {
        let doomed = self.targets_by_product_type(product_type);
        for target in &doomed {
            self.remove_target(&target.uuid);
        }
        doomed.len()
    }

    fn signing(&self, target_name: &str) -> Option<Signing> {
        let target = self.target_by_name(target_name)?;
        let attributes = self.target_attributes(&target.uuid);
        let style = attributes
            .as_ref()
            .and_then(|attrs| str_field(attrs, "ProvisioningStyle"))
            .map(str::to_string)
            .or_else(|| self.first_setting(&target.uuid, "CODE_SIGN_STYLE"));
        let team = attributes
            .as_ref()
            .and_then(|attrs| str_field(attrs, "DevelopmentTeam"))
            .map(str::to_string)
            .or_else(|| self.first_setting(&target.uuid, "DEVELOPMENT_TEAM"));

        match style.as_deref() {
            Some("Automatic") => Some(Signing::Automatic { team }),
            Some("Manual") => {
                let mut configurations = BTreeMap::new();
                for configuration in self.configuration_ids(&target.uuid) {
                    let Some(dict) = self.object(&configuration) else {
                        continue;
                    };
                    let name = str_field(dict, "name").unwrap_or_default().to_string();
                    let settings = dict.get("buildSettings").and_then(PlistValue::as_dict);
                    let setting = |key: &str| settings.and_then(|s| str_field(s, key)).map(str::to_string);
                    configurations.insert(
                        name,
                        ManualSigning {
                            team: setting("DEVELOPMENT_TEAM"),
                            identity: setting("CODE_SIGN_IDENTITY[sdk=iphoneos*]")
                                .or_else(|| setting("CODE_SIGN_IDENTITY")),
                            profile_uuid: setting("PROVISIONING_PROFILE"),
                            profile_name: setting("PROVISIONING_PROFILE_SPECIFIER"),
                        },
                    );
                }
                Some(Signing::Manual { configurations })
            }
            _ => team.map(|team| Signing::Automatic { team: Some(team) }),
        }
    }

    fn set_signing(&mut self, target_uuid: &str, signing: &Signing) {
        if self.native_target(target_uuid).is_none() {
            trace!("No target {} to sign", target_uuid);
            return;
        }
        match signing {
            Signing::Automatic { team } => {
                if let Some(attributes) = self.target_attributes_mut() {
                    let mut entry = plist_dict! { "ProvisioningStyle" => "Automatic" };
                    if let Some(team) = team {
                        entry.insert("DevelopmentTeam".to_string(), team.as_str().into());
                    }
                    attributes.insert(target_uuid.to_string(), PlistValue::Dict(entry));
                }
                self.set_setting(target_uuid, "CODE_SIGN_STYLE", Some("Automatic"), None);
                self.set_setting(target_uuid, "DEVELOPMENT_TEAM", team.as_deref(), None);
                self.set_setting(target_uuid, "PROVISIONING_PROFILE", None, None);
                self.set_setting(target_uuid, "PROVISIONING_PROFILE_SPECIFIER", None, None);
            }
            Signing::Manual { configurations } => {
                let team = configurations.values().find_map(|c| c.team.clone());
                if let Some(attributes) = self.target_attributes_mut() {
                    let mut entry = plist_dict! { "ProvisioningStyle" => "Manual" };
                    if let Some(team) = &team {
                        entry.insert("DevelopmentTeam".to_string(), team.as_str().into());
                    }
                    attributes.insert(target_uuid.to_string(), PlistValue::Dict(entry));
                }
                self.set_setting(target_uuid, "CODE_SIGN_STYLE", Some("Manual"), None);
                for (name, manual) in configurations {
                    let only = Some(name.as_str());
                    self.set_setting(target_uuid, "DEVELOPMENT_TEAM", manual.team.as_deref(), only);
                    self.set_setting(target_uuid, "CODE_SIGN_IDENTITY", manual.identity.as_deref(), only);
                    self.set_setting(target_uuid, "PROVISIONING_PROFILE", manual.profile_uuid.as_deref(), only);
                    self.set_setting(
                        target_uuid,
                        "PROVISIONING_PROFILE_SPECIFIER",
                        manual.profile_name.as_deref(),
                        only,
                    );
                }
            }
        }
    }
}

fn str_field<'a>(dict: &'a PlistDict, key: &str) -> Option<&'a str> {
    dict.get(key).and_then(PlistValue::as_str)
}

/// Runs `f` on the array stored under `key`, creating or normalizing it first.
fn update_array<R>(dict: &mut PlistDict, key: &str, f: impl FnOnce(&mut Vec<PlistValue>) -> R) -> R {
    let mut items = match dict.remove(key) {
        Some(PlistValue::Array(items)) => items,
        Some(PlistValue::String(single)) => vec![PlistValue::String(single)],
        _ => Vec::new(),
    };
    let result = f(&mut items);
    dict.insert(key.to_string(), PlistValue::Array(items));
    result
}

fn push_unique(items: &mut Vec<PlistValue>, value: &str) -> bool {
    if items.iter().any(|item| item.as_str() == Some(value)) {
        return false;
    }
    items.push(PlistValue::String(value.to_string()));
    true
}

/// SDK-relative path of a system framework or library name.
fn system_framework_path(name: &str) -> String {
    if name.contains('/') {
        return name.to_string();
    }
    if name.ends_with(".tbd") || name.ends_with(".dylib") {
        return format!("usr/lib/{}", name);
    }
    let framework = if name.ends_with(".framework") {
        name.to_string()
    } else {
        format!("{}.framework", name)
    };
    format!("System/Library/Frameworks/{}", framework)
}

/// `lastKnownFileType` for a path, by extension.
pub(crate) fn file_type(path: &str) -> &'static str {
    let extension = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "swift" => "sourcecode.swift",
        "m" => "sourcecode.c.objc",
        "mm" => "sourcecode.cpp.objcpp",
        "c" => "sourcecode.c.c",
        "cpp" | "cc" | "cxx" => "sourcecode.cpp.cpp",
        "h" => "sourcecode.c.h",
        "hpp" => "sourcecode.cpp.h",
        "png" => "image.png",
        "jpg" | "jpeg" => "image.jpeg",
        "gif" => "image.gif",
        "pdf" => "image.pdf",
        "xcassets" => "folder.assetcatalog",
        "storyboard" => "file.storyboard",
        "xib" => "file.xib",
        "strings" => "text.plist.strings",
        "stringsdict" => "text.plist.stringsdict",
        "json" => "text.json",
        "xml" | "xcprivacy" => "text.xml",
        "plist" => "text.plist.xml",
        "bundle" => "wrapper.plug-in",
        "framework" => "wrapper.framework",
        "xcframework" => "wrapper.xcframework",
        "tbd" => "sourcecode.text-based-dylib-definition",
        "dylib" => "compiled.mach-o.dylib",
        "a" => "archive.ar",
        "m4a" | "mp3" | "wav" | "caf" => "audio",
        "mp4" | "mov" => "video",
        _ => "file",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pbxproj::fixtures::MINIMAL_PROJECT;

    fn project() -> PbxProject {
        PbxProject::parse(MINIMAL_PROJECT).unwrap()
    }

    fn new_watch_target(project: &mut PbxProject) -> NativeTarget {
        let host = project.first_target().unwrap();
        let target = project
            .add_target("Watch", ProductType::WatchApp, "watchapp/Watch", Some(&host.uuid))
            .unwrap();
        for kind in [BuildPhaseKind::Sources, BuildPhaseKind::Resources, BuildPhaseKind::Frameworks] {
            project.add_build_phase(kind, &target.uuid).unwrap();
        }
        target
    }

    #[test]
    fn test_parse_fixture_finds_host_target() {
        let host = project().first_target().unwrap();
        assert_eq!(host.name, "HostApp");
        assert_eq!(host.product_type, ProductType::Application);
    }

    #[test]
    fn test_rejects_missing_root_object() {
        let err = PbxProject::parse("{ objects = { }; rootObject = ABC; }").unwrap_err();
        assert!(matches!(err, ComposeError::Descriptor(_)));
    }

    #[test]
    fn test_add_target_links_parent() {
        let mut project = project();
        let target = new_watch_target(&mut project);
        let host = project.find_target("HostApp").unwrap();

        let dependencies = project.object(&host.uuid).unwrap()["dependencies"].string_list();
        assert_eq!(dependencies.len(), 1);
        let dependency = project.object(&dependencies[0]).unwrap();
        assert_eq!(str_field(dependency, "target"), Some(target.uuid.as_str()));
        assert!(project.phase_of(&host.uuid, "PBXCopyFilesBuildPhase", Some(EMBED_WATCH_CONTENT)).is_some());
        assert_eq!(project.object(&target.uuid).unwrap()["buildPhases"].string_list().len(), 3);
    }

    #[test]
    fn test_add_source_file_is_deduplicated() {
        let mut project = project();
        let target = new_watch_target(&mut project);
        project.add_source_file("watchapp/Watch/App.swift", &target.uuid).unwrap();
        project.add_source_file("watchapp/Watch/App.swift", &target.uuid).unwrap();

        let phase = project.phase_of(&target.uuid, "PBXSourcesBuildPhase", None).unwrap();
        assert_eq!(project.object(&phase).unwrap()["files"].string_list().len(), 1);
    }

    #[test]
    fn test_build_property_and_header_search_path() {
        let mut project = project();
        new_watch_target(&mut project);
        project.add_build_property("SDKROOT", "watchos".into(), None, "Watch");
        project.add_header_search_path("watchapp/Watch", "Watch");
        project.add_header_search_path("watchapp/Watch", "Watch");

        assert_eq!(project.build_property("SDKROOT", "Watch"), Some("watchos".into()));
        assert_eq!(
            project.build_property("HEADER_SEARCH_PATHS", "Watch").unwrap().string_list(),
            vec!["$(inherited)", "$(SRCROOT)/watchapp/Watch"]
        );
    }

    #[test]
    fn test_embedded_framework_gets_copy_phase() {
        let mut project = project();
        let target = new_watch_target(&mut project);
        project
            .add_framework(
                "Frameworks/Data.xcframework",
                FrameworkOptions {
                    target_uuid: &target.uuid,
                    custom: true,
                    embed: true,
                },
            )
            .unwrap();
        assert!(project.phase_of(&target.uuid, "PBXCopyFilesBuildPhase", Some(EMBED_FRAMEWORKS)).is_some());
    }

    #[test]
    fn test_remove_targets_by_product_type_cleans_references() {
        let mut project = project();
        let target = new_watch_target(&mut project);
        project.add_source_file("watchapp/Watch/App.swift", &target.uuid).unwrap();

        assert_eq!(project.remove_targets_by_product_type(&ProductType::WatchApp), 1);
        assert!(project.targets_by_product_type(&ProductType::WatchApp).is_empty());
        let host = project.find_target("HostApp").unwrap();
        assert!(project.object(&host.uuid).unwrap()["dependencies"].string_list().is_empty());
        assert_eq!(project.remove_targets_by_product_type(&ProductType::WatchApp), 0);

        let text = project.to_pbxproj_string();
        assert!(!text.contains(&target.uuid));
        assert!(PbxProject::parse(&text).is_ok());
    }

    #[test]
    fn test_remove_drops_emptied_embed_phase_only() {
        let mut project = project();
        let host = project.find_target("HostApp").unwrap();
        let phases_before = project.object(&host.uuid).unwrap()["buildPhases"].string_list();
        new_watch_target(&mut project);
        assert!(project.phase_of(&host.uuid, "PBXCopyFilesBuildPhase", Some(EMBED_WATCH_CONTENT)).is_some());

        project.remove_targets_by_product_type(&ProductType::WatchApp);
        assert!(project.phase_of(&host.uuid, "PBXCopyFilesBuildPhase", Some(EMBED_WATCH_CONTENT)).is_none());
        assert_eq!(project.object(&host.uuid).unwrap()["buildPhases"].string_list(), phases_before);
        assert!(!project.to_pbxproj_string().contains(EMBED_WATCH_CONTENT));
    }

    #[test]
    fn test_signing_copied_from_host() {
        let mut project = project();
        let target = new_watch_target(&mut project);
        let signing = project.signing("HostApp").unwrap();
        assert_eq!(signing, Signing::Automatic { team: Some("ABCDE12345".to_string()) });

        project.set_signing(&target.uuid, &signing);
        assert_eq!(project.signing("Watch"), Some(signing));
    }

    #[test]
    fn test_package_reference_is_registered_once() {
        let mut project = project();
        let target = new_watch_target(&mut project);
        let package = SpmPackage {
            name: "Charts".to_string(),
            repository_url: Some("https://github.com/example/Charts.git".to_string()),
            path: None,
            version: Some("1.2.0".to_string()),
            libs: None,
        };
        let first = project.add_package_reference(&package, None).unwrap();
        let second = project.add_package_reference(&package, None).unwrap();
        assert_eq!(first, second);
        project.add_package_product(&target.uuid, &first, "Charts").unwrap();
        project.add_package_product(&target.uuid, &first, "Charts").unwrap();
        assert_eq!(
            project.object(&target.uuid).unwrap()["packageProductDependencies"].string_list().len(),
            1
        );
    }

    #[test]
    fn test_system_framework_paths() {
        assert_eq!(system_framework_path("WatchKit"), "System/Library/Frameworks/WatchKit.framework");
        assert_eq!(
            system_framework_path("HealthKit.framework"),
            "System/Library/Frameworks/HealthKit.framework"
        );
        assert_eq!(system_framework_path("libz.tbd"), "usr/lib/libz.tbd");
    }
}
