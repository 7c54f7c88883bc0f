//! Watch folder scaffolding
//!
//! Renders the embedded templates into a watch folder that
//! [`WatchTargetComposer::add_from_path`](crate::WatchTargetComposer::add_from_path)
//! accepts as-is.

use std::fs;
use std::path::{Path, PathBuf};

use include_dir::{Dir, DirEntry, include_dir};
use tracing::{debug, info};

use crate::types::{ComposeError, WATCHAPP_DIR, WATCHAPP_EXTENSION_DIR};

const WATCHAPP_TEMPLATES: Dir = include_dir!("$CARGO_MANIFEST_DIR/templates/watchapp");
const EXTENSION_TEMPLATES: Dir = include_dir!("$CARGO_MANIFEST_DIR/templates/watchextension");
const SOURCE_TEMPLATES: Dir = include_dir!("$CARGO_MANIFEST_DIR/templates/sources");

/// File extensions that should be processed for template variable substitution
const TEMPLATE_EXTENSIONS: &[&str] = &["swift", "json", "plist", "h", "m", "strings", "md"];

/// Template variable that can be replaced in template files
#[derive(Debug, Clone)]
pub struct TemplateVar {
    pub name: &'static str,
    pub value: String,
}

/// Options for [`generate_watch_folder`].
#[derive(Debug, Clone)]
pub struct ScaffoldConfig {
    /// Watch folder to create (the directory holding `watchapp/`).
    pub output_dir: PathBuf,
    /// Display name; the target folder name is its PascalCase form.
    pub name: String,
    /// Also create `watchextension/<Name>Extension/`.
    pub with_extension: bool,
    /// Replace an existing `watchapp/` folder.
    pub force: bool,
}

/// What [`generate_watch_folder`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldResult {
    pub app_dir: PathBuf,
    pub extension_dir: Option<PathBuf>,
}

/// Generates a watch folder from the embedded templates.
///
/// The SwiftUI sources go into the extension when there is one, otherwise
/// into the app target.
///
/// # Returns
///
/// * `Ok(ScaffoldResult)` - Directories of the generated targets
/// * `Err(ComposeError::Config)` - `watchapp/` already exists and `force` is off
pub fn generate_watch_folder(config: &ScaffoldConfig) -> Result<ScaffoldResult, ComposeError> {
    let type_name = to_pascal_case(&config.name);
    if type_name.is_empty() {
        return Err(ComposeError::Config(format!(
            "'{}' does not contain any letters or digits",
            config.name
        )));
    }
    let app_root = config.output_dir.join(WATCHAPP_DIR);
    let extension_root = config.output_dir.join(WATCHAPP_EXTENSION_DIR);
    if app_root.exists() {
        if !config.force {
            return Err(ComposeError::Config(format!(
                "{} already exists (use --force to replace it)",
                app_root.display()
            )));
        }
        debug!("Replacing existing {}", app_root.display());
        fs::remove_dir_all(&app_root)?;
        if extension_root.exists() {
            fs::remove_dir_all(&extension_root)?;
        }
    }

    let extension_name = format!("{}Extension", type_name);
    let vars = [
        TemplateVar {
            name: "APP_NAME",
            value: type_name.clone(),
        },
        TemplateVar {
            name: "DISPLAY_NAME",
            value: config.name.clone(),
        },
        TemplateVar {
            name: "EXTENSION_NAME",
            value: extension_name.clone(),
        },
    ];

    let app_dir = app_root.join(&type_name);
    render_dir(&WATCHAPP_TEMPLATES, &app_dir, &vars)?;

    let extension_dir = if config.with_extension {
        let dir = extension_root.join(&extension_name);
        render_dir(&EXTENSION_TEMPLATES, &dir, &vars)?;
        render_dir(&SOURCE_TEMPLATES, &dir, &vars)?;
        Some(dir)
    } else {
        render_dir(&SOURCE_TEMPLATES, &app_dir, &vars)?;
        None
    };

    info!("Generated watch folder at {}", config.output_dir.display());
    Ok(ScaffoldResult { app_dir, extension_dir })
}

fn render_dir(dir: &Dir, out_root: &Path, vars: &[TemplateVar]) -> Result<(), ComposeError> {
    for entry in dir.entries() {
        match entry {
            DirEntry::Dir(sub) => render_dir(sub, out_root, vars)?,
            DirEntry::File(file) => {
                let mut relative = file.path().to_path_buf();
                let mut contents = file.contents().to_vec();

                let is_explicit_template = relative.extension().is_some_and(|ext| ext == "template");
                let should_render = is_explicit_template || is_template_file(&relative);
                if is_explicit_template {
                    relative.set_extension("");
                }

                if should_render {
                    if let Ok(text) = std::str::from_utf8(&contents) {
                        let rendered = render_template(text, vars);
                        validate_no_unreplaced_placeholders(&rendered, &relative)?;
                        contents = rendered.into_bytes();
                    }
                }

                let out_path = out_root.join(&relative);
                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&out_path, contents)?;
                debug!("Wrote {}", out_path.display());
            }
        }
    }
    Ok(())
}

/// Checks if a file should be processed for template variable substitution
/// based on its extension
fn is_template_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        if ext == "template" {
            return true;
        }
        if let Some(ext) = ext.to_str() {
            return TEMPLATE_EXTENSIONS.contains(&ext);
        }
    }
    false
}

/// Validates that no unreplaced template placeholders remain in the rendered content
fn validate_no_unreplaced_placeholders(content: &str, file_path: &Path) -> Result<(), ComposeError> {
    let mut pos = 0;
    let mut unreplaced = Vec::new();

    while let Some(start) = content[pos..].find("{{") {
        let abs_start = pos + start;
        let Some(end) = content[abs_start..].find("}}") else {
            break;
        };
        let var_name = &content[abs_start + 2..abs_start + end];
        if !var_name.is_empty() && !var_name.contains(' ') && !var_name.contains('$') {
            unreplaced.push(content[abs_start..abs_start + end + 2].to_string());
        }
        pos = abs_start + end + 2;
    }

    if !unreplaced.is_empty() {
        return Err(ComposeError::Template(format!(
            "unreplaced placeholders in {}: {:?}",
            file_path.display(),
            unreplaced
        )));
    }
    Ok(())
}

fn render_template(input: &str, vars: &[TemplateVar]) -> String {
    let mut output = input.to_string();
    for var in vars {
        output = output.replace(&format!("{{{{{}}}}}", var.name), &var.value);
    }
    output
}

/// Sanitizes a string to be a valid bundle identifier component
///
/// Examples:
/// - "My Watch" -> "mywatch"
/// - "step_counter-2" -> "stepcounter2"
pub fn sanitize_bundle_id_component(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Converts a string to PascalCase
pub fn to_pascal_case(input: &str) -> String {
    input
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => format!("{}{}", first.to_ascii_uppercase(), chars.as_str()),
                None => String::new(),
            }
        })
        .collect()
}
