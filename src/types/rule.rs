use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute holding resolved dependency labels.
pub const DEPS_ATTR: &str = "deps";

/// A rule produced by an analyzer for one directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedRule {
    pub kind: String,
    pub name: String,

    #[serde(default)]
    pub attrs: BTreeMap<String, Value>,

    /// Raw references the rule's sources declare. Never rendered into a manifest.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
}

impl GeneratedRule {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            attrs: BTreeMap::new(),
            imports: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_imports(mut self, imports: Vec<String>) -> Self {
        self.imports = imports;
        self
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<Value>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn del_attr(&mut self, key: &str) -> Option<Value> {
        self.attrs.remove(key)
    }

    /// String elements of a list attribute; empty when missing or not a list.
    pub fn attr_strings(&self, key: &str) -> Vec<String> {
        match self.attrs.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn deps(&self) -> Vec<String> {
        self.attr_strings(DEPS_ATTR)
    }
}

/// How the generator may treat the attributes of a rule kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindInfo {
    /// Attributes whose emptiness makes a rule deletable.
    #[serde(default)]
    pub non_empty_attrs: BTreeSet<String>,
    /// Attributes merged into an existing rule instead of replaced.
    #[serde(default)]
    pub mergeable_attrs: BTreeSet<String>,
    /// Attributes written by dependency resolution.
    #[serde(default)]
    pub resolve_attrs: BTreeSet<String>,
}

impl KindInfo {
    pub fn new(non_empty: &[&str], mergeable: &[&str], resolve: &[&str]) -> Self {
        let set = |attrs: &[&str]| attrs.iter().map(|a| a.to_string()).collect();
        Self {
            non_empty_attrs: set(non_empty),
            mergeable_attrs: set(mergeable),
            resolve_attrs: set(resolve),
        }
    }
}

/// Input to rule generation for a single directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateArgs {
    /// Absolute path of the directory.
    pub dir: PathBuf,
    /// Slash-separated path relative to the repository root. Empty at the root.
    pub rel: String,
    #[serde(default)]
    pub regular_files: Vec<String>,
    #[serde(default)]
    pub subdirs: Vec<String>,
    /// Rules already generated for this directory by other analyzers.
    #[serde(default)]
    pub other_rules: Vec<GeneratedRule>,
}
