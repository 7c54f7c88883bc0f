//! Values of an OpenStep ASCII property list.

use std::collections::BTreeMap;

/// Dictionary of a property list. Keys are kept sorted, which is how Xcode writes them.
pub type PlistDict = BTreeMap<String, PlistValue>;

/// A property-list value as found in `project.pbxproj`.
///
/// Scalars are always strings: the format has no numbers or booleans, and
/// quoting is a writer concern, so `"$(inherited)"` is stored as `$(inherited)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlistValue {
    /// Quoted or unquoted scalar.
    String(String),
    /// `( a, b, )`
    Array(Vec<PlistValue>),
    /// `{ key = value; }`
    Dict(PlistDict),
}

impl PlistValue {
    /// Returns the string payload, if this is a scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PlistValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the items, if this is an array.
    pub fn as_array(&self) -> Option<&Vec<PlistValue>> {
        match self {
            PlistValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Mutable access to the items, if this is an array.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<PlistValue>> {
        match self {
            PlistValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries, if this is a dictionary.
    pub fn as_dict(&self) -> Option<&PlistDict> {
        match self {
            PlistValue::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    /// Mutable access to the entries, if this is a dictionary.
    pub fn as_dict_mut(&mut self) -> Option<&mut PlistDict> {
        match self {
            PlistValue::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    /// Scalar items of an array, or the scalar itself as a one-element list.
    ///
    /// Build settings such as `OTHER_LDFLAGS` may be written either way.
    pub fn string_list(&self) -> Vec<String> {
        match self {
            PlistValue::String(s) => vec![s.clone()],
            PlistValue::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            PlistValue::Dict(_) => Vec::new(),
        }
    }

    /// Builds an array of scalars.
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PlistValue::Array(items.into_iter().map(|s| PlistValue::String(s.into())).collect())
    }
}

impl From<&str> for PlistValue {
    fn from(value: &str) -> Self {
        PlistValue::String(value.to_string())
    }
}

impl From<String> for PlistValue {
    fn from(value: String) -> Self {
        PlistValue::String(value)
    }
}

impl From<Vec<PlistValue>> for PlistValue {
    fn from(value: Vec<PlistValue>) -> Self {
        PlistValue::Array(value)
    }
}

impl From<PlistDict> for PlistValue {
    fn from(value: PlistDict) -> Self {
        PlistValue::Dict(value)
    }
}

/// Builds a [`PlistDict`] from `key => value` pairs.
macro_rules! plist_dict {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut dict = $crate::pbxproj::PlistDict::new();
        $(dict.insert(($key).to_string(), $crate::pbxproj::PlistValue::from($value));)*
        dict
    }};
}

pub(crate) use plist_dict;
