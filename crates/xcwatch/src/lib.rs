//! xcwatch CLI
//!
//! Command-line front end for `xcwatch-sdk`: adds, removes and lists Apple
//! Watch targets in an Xcode project, and scaffolds new watch folders.
//!
//! ```bash
//! xcwatch init
//! xcwatch scaffold --name "Step Counter" --extension
//! xcwatch add
//! xcwatch list
//! xcwatch remove
//! ```
//!
//! Values missing on the command line come from `xcwatch.toml`
//! (see [`config`]).

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use xcwatch_sdk::codegen::{ScaffoldConfig, generate_watch_folder};
use xcwatch_sdk::workspace::project_root_of;
use xcwatch_sdk::{ProjectContext, WatchTargetComposer};

use config::{CONFIG_FILE_NAME, ConfigResolver, XcwatchConfig};

pub mod config;

/// Adds Apple Watch targets to existing Xcode projects.
#[derive(Parser, Debug)]
#[command(name = "xcwatch", author, version, about = "Apple Watch target composer for Xcode projects", long_about = None)]
struct Cli {
    /// Print what would be done without writing the project file
    #[arg(long, global = true)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add the watch app (and extension) found in the watch folder.
    Add {
        #[arg(long, help = "Folder holding watchapp/ and watchextension/")]
        watch_folder: Option<PathBuf>,
        #[arg(long, help = "Path to project.pbxproj")]
        pbxproj: Option<PathBuf>,
        #[arg(long, help = "Host project (and primary target) name")]
        project_name: Option<String>,
        #[arg(long, help = "Bundle identifier of the host app")]
        bundle_id: Option<String>,
        #[arg(long, help = "Base directory for relative sidecar paths")]
        project_dir: Option<PathBuf>,
    },
    /// Remove every watch app and watch extension target.
    Remove {
        #[arg(long, help = "Path to project.pbxproj")]
        pbxproj: Option<PathBuf>,
    },
    /// Check whether the app resources contain a watch app folder.
    Check {
        #[arg(long, help = "App resources directory")]
        app_resources: Option<PathBuf>,
        #[arg(long, help = "Platform folder name (default: iOS)")]
        platform: Option<String>,
    },
    /// List the watch targets of a project.
    List {
        #[arg(long, help = "Path to project.pbxproj")]
        pbxproj: Option<PathBuf>,
    },
    /// Generate a watch folder from the built-in templates.
    Scaffold {
        #[arg(long, help = "Display name of the watch app")]
        name: String,
        #[arg(long, help = "Also generate a WatchKit extension")]
        extension: bool,
        #[arg(long, help = "Watch folder to create (default: <app_resources>/<platform>)")]
        output: Option<PathBuf>,
        #[arg(long, help = "Replace an existing watchapp/ folder")]
        force: bool,
    },
    /// Write a starter xcwatch.toml.
    Init {
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        output: PathBuf,
        #[arg(long, help = "Host project name (default: current directory name)")]
        project_name: Option<String>,
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);
    let resolver = ConfigResolver::new()?;
    if let Some(path) = &resolver.config_path {
        tracing::debug!("Using config {}", path.display());
    }

    match cli.command {
        Command::Add {
            watch_folder,
            pbxproj,
            project_name,
            bundle_id,
            project_dir,
        } => {
            let descriptor = resolve_pbxproj(&resolver, pbxproj)?;
            let project_name = resolver.resolve(
                project_name,
                |c| c.project.name.clone(),
                project_name_of(&descriptor)?,
            );
            let bundle_id = bundle_id
                .or_else(|| resolver.project().bundle_id)
                .context("A bundle identifier is required: pass --bundle-id or set project.bundle_id")?;
            let project_dir = match project_dir {
                Some(dir) => absolute(&dir)?,
                None => resolver.config_relative(
                    &resolver.project().project_dir.unwrap_or_else(|| PathBuf::from(".")),
                ),
            };
            let watch_folder = match watch_folder {
                Some(folder) => absolute(&folder)?,
                None => default_watch_folder(&resolver),
            };

            let context = ProjectContext::new(project_name, bundle_id, project_root_of(&descriptor))
                .project_dir(project_dir)
                .spm_packages(resolver.watch_spm_packages());
            let added = WatchTargetComposer::dry_run(cli.dry_run)
                .add_from_path(&watch_folder, &context, &descriptor)
                .with_context(|| format!("Failed to add watch targets to {:?}", descriptor))?;
            if added {
                println!("Added watch targets to {}", descriptor.display());
            } else {
                println!("No watch app found in {}", watch_folder.display());
            }
        }
        Command::Remove { pbxproj } => {
            let descriptor = resolve_pbxproj(&resolver, pbxproj)?;
            let removed = WatchTargetComposer::dry_run(cli.dry_run)
                .remove_watch_app(&descriptor)
                .with_context(|| format!("Failed to remove watch targets from {:?}", descriptor))?;
            println!("Removed {} watch target(s)", removed);
        }
        Command::Check {
            app_resources,
            platform,
        } => {
            let app_resources = app_resources.unwrap_or_else(|| resolver.app_resources());
            let platform = resolver.resolve(platform, |c| Some(c.ios.platform_name.clone()), "iOS".to_string());
            if WatchTargetComposer::has_watch_app(&app_resources, &platform) {
                println!("Watch app found in {}", app_resources.join(&platform).display());
            } else {
                println!("No watch app in {}", app_resources.join(&platform).display());
            }
        }
        Command::List { pbxproj } => {
            let descriptor = resolve_pbxproj(&resolver, pbxproj)?;
            let targets = WatchTargetComposer::new()
                .watch_targets(&descriptor)
                .with_context(|| format!("Failed to read {:?}", descriptor))?;
            if targets.is_empty() {
                println!("No watch targets");
            }
            for target in targets {
                println!("{}  {}  {}", target.uuid, target.name, target.product_type.as_str());
            }
        }
        Command::Scaffold {
            name,
            extension,
            output,
            force,
        } => {
            let output_dir = output.unwrap_or_else(|| default_watch_folder(&resolver));
            if cli.dry_run {
                println!("[dry-run] would generate watch folder at {}", output_dir.display());
                return Ok(());
            }
            let result = generate_watch_folder(&ScaffoldConfig {
                output_dir,
                name,
                with_extension: extension,
                force,
            })?;
            println!("Generated watch app at {}", result.app_dir.display());
            if let Some(dir) = result.extension_dir {
                println!("Generated watch extension at {}", dir.display());
            }
        }
        Command::Init {
            output,
            project_name,
            force,
        } => {
            if output.exists() && !force {
                bail!("{:?} already exists (use --force to overwrite)", output);
            }
            let project_name = match project_name {
                Some(name) => name,
                None => current_dir_name()?,
            };
            let contents = XcwatchConfig::generate_starter_toml(&project_name);
            if cli.dry_run {
                println!("[dry-run] would write {:?}", output);
                return Ok(());
            }
            fs::write(&output, contents).with_context(|| format!("Failed to write {:?}", output))?;
            println!("Wrote {}", output.display());
        }
    }

    Ok(())
}

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(level)
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// The CLI value, the configured `ios.pbxproj`, or the single `.xcodeproj` in `ios.platform_dir`.
///
/// Always absolute, so every command computes project-relative paths from the same base.
fn resolve_pbxproj(resolver: &ConfigResolver, cli_value: Option<PathBuf>) -> Result<PathBuf> {
    let path = match cli_value {
        Some(path) => path,
        None => {
            let ios = resolver.ios();
            match ios.pbxproj {
                Some(path) => resolver.config_relative(&path),
                None => find_pbxproj(&resolver.config_relative(&ios.platform_dir))?,
            }
        }
    };
    absolute(&path)
}

fn find_pbxproj(platform_dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(platform_dir)
        .with_context(|| format!("Failed to read platform directory {:?}", platform_dir))?;
    let mut projects: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "xcodeproj"))
        .collect();
    projects.sort();
    match projects.as_slice() {
        [project] => Ok(project.join("project.pbxproj")),
        [] => Err(anyhow!("No .xcodeproj found in {:?}; pass --pbxproj", platform_dir)),
        _ => Err(anyhow!(
            "Several .xcodeproj found in {:?}; pass --pbxproj or set ios.pbxproj",
            platform_dir
        )),
    }
}

/// `MyApp` for `.../MyApp.xcodeproj/project.pbxproj`.
fn project_name_of(descriptor: &Path) -> Result<String> {
    descriptor
        .parent()
        .and_then(Path::file_stem)
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .with_context(|| format!("Cannot derive a project name from {:?}", descriptor))
}

fn default_watch_folder(resolver: &ConfigResolver) -> PathBuf {
    match resolver.ios().watch_folder {
        Some(folder) => resolver.config_relative(&folder),
        None => resolver.app_resources().join(resolver.ios().platform_name),
    }
}

/// Project paths are computed lexically, so every input path is made absolute first.
fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Failed to resolve {:?}", path))
}

fn current_dir_name() -> Result<String> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    cwd.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .context("Current directory has no name; pass --project-name")
}
