//! Serializer producing `project.pbxproj` text in the layout Xcode itself writes.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

use super::parser::is_unquoted_char;
use super::value::{PlistDict, PlistValue};

/// Options for [`write`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Drop dictionary entries whose value is an empty string.
    pub omit_empty_values: bool,
}

/// Objects Xcode keeps on a single line.
const INLINE_ISAS: [&str; 2] = ["PBXBuildFile", "PBXFileReference"];

/// Serializes a project document.
///
/// The `objects` dictionary is split into `/* Begin <isa> section */` blocks and
/// every object id is annotated with a readable comment.
pub fn write(root: &PlistDict, options: WriteOptions) -> String {
    let empty = PlistDict::new();
    let objects = root
        .get("objects")
        .and_then(PlistValue::as_dict)
        .unwrap_or(&empty);
    let writer = Writer {
        comments: object_comments(objects),
        options,
    };

    let mut out = String::from("// !$*UTF8*$!\n");
    writer.root(&mut out, root);
    out.push('\n');
    out
}

struct Writer {
    comments: HashMap<String, String>,
    options: WriteOptions,
}

impl Writer {
    fn root(&self, out: &mut String, dict: &PlistDict) {
        out.push_str("{\n");
        for (key, value) in self.entries(dict) {
            out.push('\t');
            out.push_str(&quote(key));
            out.push_str(" = ");
            match (key.as_str(), value) {
                ("objects", PlistValue::Dict(objects)) => self.objects(out, objects),
                _ => self.value(out, value, 1, false),
            }
            out.push_str(";\n");
        }
        out.push('}');
    }

    fn objects(&self, out: &mut String, objects: &PlistDict) {
        let mut sections: BTreeMap<&str, Vec<(&String, &PlistValue)>> = BTreeMap::new();
        for (id, object) in objects {
            let isa = object
                .as_dict()
                .and_then(|dict| dict.get("isa"))
                .and_then(PlistValue::as_str)
                .unwrap_or("Unknown");
            sections.entry(isa).or_default().push((id, object));
        }

        out.push_str("{\n");
        for (isa, members) in sections {
            let _ = write!(out, "\n/* Begin {} section */\n", isa);
            let inline = INLINE_ISAS.contains(&isa);
            for (id, object) in members {
                out.push_str("\t\t");
                self.scalar(out, id);
                out.push_str(" = ");
                self.value(out, object, 2, inline);
                out.push_str(";\n");
            }
            let _ = writeln!(out, "/* End {} section */", isa);
        }
        out.push_str("\t}");
    }

    fn value(&self, out: &mut String, value: &PlistValue, indent: usize, inline: bool) {
        match value {
            PlistValue::String(s) => self.scalar(out, s),
            PlistValue::Array(items) => {
                out.push('(');
                for item in items {
                    if inline {
                        self.value(out, item, indent + 1, true);
                        out.push_str(", ");
                    } else {
                        out.push('\n');
                        tabs(out, indent + 1);
                        self.value(out, item, indent + 1, false);
                        out.push(',');
                    }
                }
                if !inline {
                    out.push('\n');
                    tabs(out, indent);
                }
                out.push(')');
            }
            PlistValue::Dict(dict) => {
                out.push('{');
                for (key, item) in self.entries(dict) {
                    if !inline {
                        out.push('\n');
                        tabs(out, indent + 1);
                    }
                    out.push_str(&quote(key));
                    out.push_str(" = ");
                    self.value(out, item, indent + 1, inline);
                    out.push(';');
                    if inline {
                        out.push(' ');
                    }
                }
                if !inline {
                    out.push('\n');
                    tabs(out, indent);
                }
                out.push('}');
            }
        }
    }

    fn scalar(&self, out: &mut String, s: &str) {
        out.push_str(&quote(s));
        if let Some(comment) = self.comments.get(s) {
            let _ = write!(out, " /* {} */", comment);
        }
    }

    /// Entries in output order: `isa` first, the rest sorted, empties dropped if asked.
    fn entries<'a>(&self, dict: &'a PlistDict) -> Vec<(&'a String, &'a PlistValue)> {
        let keep = |value: &PlistValue| !(self.options.omit_empty_values && value.as_str() == Some(""));
        let isa = dict.get_key_value("isa");
        isa.into_iter()
            .chain(dict.iter().filter(|(key, _)| key.as_str() != "isa"))
            .filter(|(_, value)| keep(*value))
            .collect()
    }
}

fn tabs(out: &mut String, count: usize) {
    for _ in 0..count {
        out.push('\t');
    }
}

/// Quotes a scalar unless it consists only of characters Xcode leaves bare.
pub(crate) fn quote(s: &str) -> String {
    if !s.is_empty() && s.chars().all(|c| is_unquoted_char(c) && c != '-') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn str_field<'a>(dict: &'a PlistDict, key: &str) -> Option<&'a str> {
    dict.get(key).and_then(PlistValue::as_str)
}

/// Readable name of every object, used for the `/* ... */` annotations.
fn object_comments(objects: &PlistDict) -> HashMap<String, String> {
    let mut phase_of_build_file: HashMap<&str, String> = HashMap::new();
    let mut owner_of_list: HashMap<&str, String> = HashMap::new();

    for object in objects.values().filter_map(PlistValue::as_dict) {
        let isa = str_field(object, "isa").unwrap_or_default();
        if isa.ends_with("BuildPhase") {
            let name = phase_name(object);
            for file in object.get("files").map(PlistValue::string_list).unwrap_or_default() {
                if let Some((id, _)) = objects.get_key_value(file.as_str()) {
                    phase_of_build_file.insert(id.as_str(), name.clone());
                }
            }
        }
        if let Some(list) = str_field(object, "buildConfigurationList") {
            let owner = match str_field(object, "name") {
                Some(name) => format!("Build configuration list for {} \"{}\"", isa, name),
                None => format!("Build configuration list for {}", isa),
            };
            owner_of_list.insert(list, owner);
        }
    }

    let mut comments = HashMap::new();
    for (id, object) in objects {
        let Some(dict) = object.as_dict() else {
            continue;
        };
        let isa = str_field(dict, "isa").unwrap_or_default();
        let comment = match isa {
            "PBXBuildFile" => {
                let file = str_field(dict, "fileRef")
                    .and_then(|file_ref| objects.get(file_ref))
                    .and_then(PlistValue::as_dict)
                    .and_then(display_name)
                    .or_else(|| {
                        str_field(dict, "productRef")
                            .and_then(|product| objects.get(product))
                            .and_then(PlistValue::as_dict)
                            .and_then(|product| str_field(product, "productName"))
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| "(null)".to_string());
                match phase_of_build_file.get(id.as_str()) {
                    Some(phase) => Some(format!("{} in {}", file, phase)),
                    None => Some(file),
                }
            }
            "PBXProject" => Some("Project object".to_string()),
            "XCConfigurationList" => owner_of_list.get(id.as_str()).cloned(),
            "XCSwiftPackageProductDependency" => str_field(dict, "productName").map(str::to_string),
            "XCRemoteSwiftPackageReference" => str_field(dict, "repositoryURL").map(|url| {
                let name = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
                format!("XCRemoteSwiftPackageReference \"{}\"", name.trim_end_matches(".git"))
            }),
            "XCLocalSwiftPackageReference" => str_field(dict, "relativePath")
                .map(|path| format!("XCLocalSwiftPackageReference \"{}\"", path)),
            "PBXContainerItemProxy" | "PBXTargetDependency" => Some(isa.to_string()),
            _ if isa.ends_with("BuildPhase") => Some(phase_name(dict)),
            _ => display_name(dict),
        };
        if let Some(comment) = comment {
            comments.insert(id.clone(), comment.replace("*/", "*_/"));
        }
    }
    comments
}

fn display_name(dict: &PlistDict) -> Option<String> {
    str_field(dict, "name")
        .or_else(|| str_field(dict, "path").map(|path| path.rsplit('/').next().unwrap_or(path)))
        .map(str::to_string)
}

fn phase_name(phase: &PlistDict) -> String {
    if let Some(name) = str_field(phase, "name") {
        return name.to_string();
    }
    match str_field(phase, "isa").unwrap_or_default() {
        "PBXSourcesBuildPhase" => "Sources",
        "PBXResourcesBuildPhase" => "Resources",
        "PBXFrameworksBuildPhase" => "Frameworks",
        "PBXHeadersBuildPhase" => "Headers",
        "PBXCopyFilesBuildPhase" => "CopyFiles",
        _ => "ShellScript",
    }
    .to_string()
}
