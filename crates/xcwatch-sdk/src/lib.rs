//! Watch app target composer for Xcode projects
//!
//! `xcwatch-sdk` adds an Apple Watch app (and, optionally, its WatchKit
//! extension) to an existing iOS Xcode project, working directly on the
//! `project.pbxproj` file. Targets are discovered from a folder laid out as
//! `watchapp/<Name>/` and `watchextension/<Name>/`, each optionally carrying a
//! JSON sidecar (`watchapp.json` / `extension.json`) with extra settings.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use xcwatch_sdk::{ProjectContext, WatchTargetComposer};
//!
//! fn main() -> Result<(), xcwatch_sdk::ComposeError> {
//!     let context = ProjectContext::new("MyApp", "org.example.myapp", "platforms/ios");
//!     let added = WatchTargetComposer::new().add_from_path(
//!         Path::new("app/App_Resources/iOS"),
//!         &context,
//!         Path::new("platforms/ios/MyApp.xcodeproj/project.pbxproj"),
//!     )?;
//!     println!("watch targets added: {added}");
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **pbxproj**: OpenStep property list parser/writer and the project graph
//! - **descriptor**: The `ProjectDescriptor` port the composer talks to
//! - **compose**: Target planning, file classification and composition
//! - **sidecar**: JSON sidecar schema and its normalization
//! - **workspace**: Swift package references
//! - **codegen**: Watch folder scaffolding from embedded templates

pub mod codegen;
pub mod common;
pub mod compose;
pub mod descriptor;
pub mod pbxproj;
pub mod sidecar;
pub mod types;
pub mod workspace;

pub use codegen::{ScaffoldConfig, ScaffoldResult, generate_watch_folder};
pub use compose::{NativeTargetService, TargetPlan, TargetSpec, WatchTargetComposer, is_excluded};
pub use descriptor::{DescriptorStore, PbxprojStore, ProjectDescriptor, Signing};
pub use pbxproj::PbxProject;
pub use sidecar::{ModuleDefinition, SpmPackage, TargetConfig};
pub use types::{BuildProperty, ComposeError, NativeTarget, ProductType, ProjectContext};
pub use workspace::{PbxWorkspaceStore, WorkspaceProject, WorkspaceStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
