//! Reading, mutating and writing `project.pbxproj`.

pub mod parser;
mod project;
pub mod value;
pub mod writer;

#[cfg(test)]
pub(crate) mod fixtures;

pub use project::PbxProject;
pub use value::{PlistDict, PlistValue};
pub use writer::WriteOptions;
