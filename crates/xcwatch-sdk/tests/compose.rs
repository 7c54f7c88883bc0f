//! End-to-end composition against a real project file.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use xcwatch_sdk::pbxproj::PlistValue;
use xcwatch_sdk::{
    PbxProject, ProductType, ProjectContext, ProjectDescriptor, Signing, SpmPackage, WatchTargetComposer,
};

const HOST_PROJECT: &str = include_str!("fixtures/HostApp.pbxproj");

struct Workspace {
    _temp: TempDir,
    root: PathBuf,
    descriptor: PathBuf,
    watch_folder: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        let platform = root.join("platforms/ios");
        fs::create_dir_all(platform.join("HostApp.xcodeproj")).unwrap();
        let descriptor = platform.join("HostApp.xcodeproj/project.pbxproj");
        fs::write(&descriptor, HOST_PROJECT).unwrap();
        Self {
            watch_folder: root.join("app/App_Resources/iOS"),
            _temp: temp,
            root,
            descriptor,
        }
    }

    fn write(&self, relative: &str, contents: &str) {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn context(&self) -> ProjectContext {
        ProjectContext::new("HostApp", "org.demo.host", self.root.join("platforms/ios")).project_dir(&self.root)
    }

    fn project(&self) -> PbxProject {
        PbxProject::open(&self.descriptor).unwrap()
    }

    fn add(&self, context: &ProjectContext) -> bool {
        WatchTargetComposer::new()
            .add_from_path(&self.watch_folder, context, &self.descriptor)
            .unwrap()
    }
}

fn field<'a>(project: &'a PbxProject, id: &str, key: &str) -> Option<&'a str> {
    project.object(id)?.get(key)?.as_str()
}

fn list(project: &PbxProject, id: &str, key: &str) -> Vec<String> {
    project
        .object(id)
        .and_then(|object| object.get(key))
        .map(PlistValue::string_list)
        .unwrap_or_default()
}

/// Ids of the targets `target_uuid` depends on.
fn dependency_targets(project: &PbxProject, target_uuid: &str) -> Vec<String> {
    list(project, target_uuid, "dependencies")
        .iter()
        .filter_map(|dependency| field(project, dependency, "target").map(str::to_string))
        .collect()
}

/// `(name, dstSubfolderSpec)` of each copy-files phase of a target.
fn copy_phases(project: &PbxProject, target_uuid: &str) -> Vec<(String, String)> {
    list(project, target_uuid, "buildPhases")
        .iter()
        .filter(|phase| field(project, phase, "isa") == Some("PBXCopyFilesBuildPhase"))
        .map(|phase| {
            (
                field(project, phase, "name").unwrap_or_default().to_string(),
                field(project, phase, "dstSubfolderSpec").unwrap_or_default().to_string(),
            )
        })
        .collect()
}

/// Paths of the file references built by a target's phase.
fn phase_files(project: &PbxProject, target_uuid: &str, isa: &str) -> Vec<String> {
    list(project, target_uuid, "buildPhases")
        .iter()
        .filter(|phase| field(project, phase, "isa") == Some(isa))
        .flat_map(|phase| list(project, phase, "files"))
        .filter_map(|build_file| {
            let file_ref = field(project, &build_file, "fileRef")?;
            field(project, file_ref, "path").map(str::to_string)
        })
        .collect()
}

#[test]
fn test_adds_app_and_extension_targets() {
    let ws = Workspace::new();
    ws.write("app/App_Resources/iOS/watchapp/Watch/Assets.xcassets/Contents.json", "{}");
    ws.write("app/App_Resources/iOS/watchapp/Watch/Info.plist", "<plist/>");
    ws.write("app/App_Resources/iOS/watchextension/WatchExt/ExtensionDelegate.swift", "");
    ws.write("app/App_Resources/iOS/watchextension/WatchExt/Views/ContentView.swift", "");
    ws.write("app/App_Resources/iOS/watchextension/WatchExt/Tests/ViewTests.swift", "");
    ws.write(
        "app/App_Resources/iOS/watchextension/WatchExt/extension.json",
        r#"{ "srcExclude": ["**/Tests/**"], "frameworks": ["HealthKit.framework"] }"#,
    );

    assert!(ws.add(&ws.context()));

    let project = ws.project();
    let host = project.find_target("HostApp").unwrap();
    let apps = project.targets_by_product_type(&ProductType::WatchApp);
    let extensions = project.targets_by_product_type(&ProductType::WatchExtension);
    assert_eq!(apps.len(), 1);
    assert_eq!(extensions.len(), 1);
    let (app, extension) = (&apps[0], &extensions[0]);
    assert_eq!(app.name, "Watch");
    assert_eq!(extension.name, "WatchExt");

    assert_eq!(dependency_targets(&project, &host.uuid), vec![app.uuid.clone()]);
    assert_eq!(dependency_targets(&project, &app.uuid), vec![extension.uuid.clone()]);
    assert!(dependency_targets(&project, &extension.uuid).is_empty());
    assert_eq!(
        copy_phases(&project, &host.uuid),
        vec![("Embed Watch Content".to_string(), "16".to_string())]
    );
    assert_eq!(
        copy_phases(&project, &app.uuid),
        vec![("Embed App Extensions".to_string(), "13".to_string())]
    );

    let sources = phase_files(&project, &extension.uuid, "PBXSourcesBuildPhase");
    assert_eq!(
        sources,
        vec![
            "../../app/App_Resources/iOS/watchextension/WatchExt/ExtensionDelegate.swift",
            "../../app/App_Resources/iOS/watchextension/WatchExt/Views/ContentView.swift",
        ]
    );
    assert_eq!(
        phase_files(&project, &app.uuid, "PBXResourcesBuildPhase"),
        vec!["../../app/App_Resources/iOS/watchapp/Watch/Assets.xcassets"]
    );
    assert_eq!(
        phase_files(&project, &extension.uuid, "PBXFrameworksBuildPhase"),
        vec!["System/Library/Frameworks/HealthKit.framework"]
    );
}

#[test]
fn test_build_settings_and_signing() {
    let ws = Workspace::new();
    ws.write("app/App_Resources/iOS/watchapp/Watch/App.swift", "");
    ws.write("app/App_Resources/iOS/watchextension/WatchExt/Ext.swift", "");
    ws.write(
        "app/App_Resources/iOS/watchapp/Watch/watchapp.json",
        r#"{
            "assetcatalogCompilerAppiconAppiconsetName": "WatchIcon",
            "targetBuildConfigurationProperties": { "SWIFT_VERSION": "5.9" }
        }"#,
    );
    assert!(ws.add(&ws.context()));

    let project = ws.project();
    let setting = |target: &str, name: &str| {
        project
            .build_property(name, target)
            .and_then(|value| value.as_str().map(str::to_string))
    };
    assert_eq!(setting("Watch", "PRODUCT_BUNDLE_IDENTIFIER").as_deref(), Some("org.demo.host.watchkitapp"));
    assert_eq!(setting("Watch", "WK_APP_BUNDLE_IDENTIFIER").as_deref(), Some("org.demo.host"));
    assert_eq!(
        setting("WatchExt", "PRODUCT_BUNDLE_IDENTIFIER").as_deref(),
        Some("org.demo.host.watchkitapp.watchkitextension")
    );
    assert_eq!(setting("WatchExt", "WK_APP_BUNDLE_IDENTIFIER").as_deref(), Some("org.demo.host.watchkitapp"));
    for target in ["Watch", "WatchExt"] {
        assert_eq!(setting(target, "SDKROOT").as_deref(), Some("watchos"));
        assert_eq!(setting(target, "TARGETED_DEVICE_FAMILY").as_deref(), Some("4"));
        assert_eq!(setting(target, "WATCHOS_DEPLOYMENT_TARGET").as_deref(), Some("5.2"));
        assert_eq!(
            project.signing(target),
            Some(Signing::Automatic {
                team: Some("ABCDE12345".to_string())
            })
        );
    }
    assert_eq!(setting("Watch", "ASSETCATALOG_COMPILER_APPICON_NAME").as_deref(), Some("WatchIcon"));
    assert_eq!(setting("Watch", "SWIFT_VERSION").as_deref(), Some("5.9"));
}

#[test]
fn test_info_plist_is_not_added_as_resource() {
    let ws = Workspace::new();
    ws.write("app/App_Resources/iOS/watchapp/Watch/App.swift", "");
    ws.write("app/App_Resources/iOS/watchapp/Watch/Support/Watch-Info.plist", "<plist/>");
    ws.write("app/App_Resources/iOS/watchapp/Watch/Support/Info.plist", "<plist/>");
    ws.write("app/App_Resources/iOS/watchapp/Watch/Support/Settings.plist", "<plist/>");
    ws.write(
        "app/App_Resources/iOS/watchapp/Watch/watchapp.json",
        r#"{ "infoPlistPath": "Support/Watch-Info.plist" }"#,
    );
    assert!(ws.add(&ws.context()));

    let project = ws.project();
    let app = &project.targets_by_product_type(&ProductType::WatchApp)[0];
    assert_eq!(
        project
            .build_property("INFOPLIST_FILE", "Watch")
            .and_then(|value| value.as_str().map(str::to_string))
            .as_deref(),
        Some("../../app/App_Resources/iOS/watchapp/Watch/Info.plist")
    );
    assert_eq!(
        phase_files(&project, &app.uuid, "PBXResourcesBuildPhase"),
        vec![
            "../../app/App_Resources/iOS/watchapp/Watch/Support/Settings.plist",
            "../../app/App_Resources/iOS/watchapp/Watch/Support/Watch-Info.plist",
        ]
    );
}

#[test]
fn test_single_target_mode() {
    let ws = Workspace::new();
    ws.write("app/App_Resources/iOS/watchapp/Watch/App.swift", "");

    assert!(ws.add(&ws.context()));
    let project = ws.project();
    let apps = project.targets_by_product_type(&ProductType::WatchApp);
    assert_eq!(apps.len(), 1);
    assert!(project.targets_by_product_type(&ProductType::WatchExtension).is_empty());
    assert!(copy_phases(&project, &apps[0].uuid).is_empty());
    assert_eq!(
        phase_files(&project, &apps[0].uuid, "PBXSourcesBuildPhase"),
        vec!["../../app/App_Resources/iOS/watchapp/Watch/App.swift"]
    );
}

#[test]
fn test_missing_watch_folder_leaves_project_untouched() {
    let ws = Workspace::new();
    assert!(!ws.add(&ws.context()));
    assert_eq!(fs::read_to_string(&ws.descriptor).unwrap(), HOST_PROJECT);
}

#[test]
fn test_dry_run_does_not_write() {
    let ws = Workspace::new();
    ws.write("app/App_Resources/iOS/watchapp/Watch/App.swift", "");
    let added = WatchTargetComposer::dry_run(true)
        .add_from_path(&ws.watch_folder, &ws.context(), &ws.descriptor)
        .unwrap();
    assert!(added);
    assert_eq!(fs::read_to_string(&ws.descriptor).unwrap(), HOST_PROJECT);
}

#[test]
fn test_swift_packages_are_linked() {
    let ws = Workspace::new();
    ws.write("app/App_Resources/iOS/watchapp/Watch/App.swift", "");
    ws.write("packages/WatchKitUI/Package.swift", "// swift-tools-version:5.7");
    ws.write(
        "app/App_Resources/iOS/watchapp/Watch/watchapp.json",
        r#"{ "SPMPackages": [{ "name": "WatchKitUI", "path": "../../../../../packages/WatchKitUI" }] }"#,
    );
    let context = ws.context().spm_packages(vec![SpmPackage {
        name: "Charts".to_string(),
        repository_url: Some("https://github.com/example/Charts.git".to_string()),
        path: None,
        version: Some("5.0.0".to_string()),
        libs: Some(vec!["Charts".to_string(), "ChartsUI".to_string()]),
    }]);

    assert!(ws.add(&context));
    let project = ws.project();
    let local = project.objects_of_isa("XCLocalSwiftPackageReference");
    assert_eq!(local.len(), 1);
    assert_eq!(field(&project, &local[0], "relativePath"), Some("../../packages/WatchKitUI"));

    let remote = project.objects_of_isa("XCRemoteSwiftPackageReference");
    assert_eq!(remote.len(), 1);
    let requirement = project.object(&remote[0]).unwrap()["requirement"].as_dict().unwrap();
    assert_eq!(requirement["kind"].as_str(), Some("upToNextMajorVersion"));
    assert_eq!(requirement["minimumVersion"].as_str(), Some("5.0.0"));

    let app = &project.targets_by_product_type(&ProductType::WatchApp)[0];
    let products: Vec<String> = list(&project, &app.uuid, "packageProductDependencies")
        .iter()
        .filter_map(|id| field(&project, id, "productName").map(str::to_string))
        .collect();
    assert_eq!(products, vec!["WatchKitUI", "Charts", "ChartsUI"]);
}

#[test]
fn test_remove_watch_app_restores_host_only_project() {
    let ws = Workspace::new();
    ws.write("app/App_Resources/iOS/watchapp/Watch/App.swift", "");
    ws.write("app/App_Resources/iOS/watchextension/WatchExt/Ext.swift", "");
    assert!(ws.add(&ws.context()));

    let composer = WatchTargetComposer::new();
    assert_eq!(composer.remove_watch_app(&ws.descriptor).unwrap(), 2);
    let project = ws.project();
    assert_eq!(project.targets().len(), 1);
    let host = project.find_target("HostApp").unwrap();
    assert!(dependency_targets(&project, &host.uuid).is_empty());
    assert!(project.objects_of_isa("PBXTargetDependency").is_empty());
    assert!(project.objects_of_isa("PBXContainerItemProxy").is_empty());
    assert!(copy_phases(&project, &host.uuid).is_empty());
    assert!(!fs::read_to_string(&ws.descriptor).unwrap().contains("Embed Watch Content"));

    let after_first = fs::read_to_string(&ws.descriptor).unwrap();
    assert_eq!(composer.remove_watch_app(&ws.descriptor).unwrap(), 0);
    assert_eq!(fs::read_to_string(&ws.descriptor).unwrap(), after_first);
}

#[test]
fn test_watch_targets_lists_app_then_extension() {
    let ws = Workspace::new();
    let composer = WatchTargetComposer::new();
    assert!(composer.watch_targets(&ws.descriptor).unwrap().is_empty());

    ws.write("app/App_Resources/iOS/watchapp/Watch/App.swift", "");
    ws.write("app/App_Resources/iOS/watchextension/WatchExt/Ext.swift", "");
    assert!(ws.add(&ws.context()));

    let targets = composer.watch_targets(&ws.descriptor).unwrap();
    let names: Vec<_> = targets.iter().map(|target| target.name.as_str()).collect();
    assert_eq!(names, vec!["Watch", "WatchExt"]);
    assert_eq!(targets[0].product_type, ProductType::WatchApp);
    assert_eq!(targets[1].product_type, ProductType::WatchExtension);
}

#[test]
fn test_has_watch_app() {
    let ws = Workspace::new();
    let resources = ws.root.join("app/App_Resources");
    assert!(!WatchTargetComposer::has_watch_app(&resources, "iOS"));
    ws.write("app/App_Resources/iOS/watchapp/Watch/App.swift", "");
    assert!(WatchTargetComposer::has_watch_app(Path::new(&resources), "iOS"));
}
