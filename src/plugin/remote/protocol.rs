//! Messages exchanged with an out-of-process analyzer.
//!
//! Every message is one JSON object wrapped in an [`Envelope`]. Requests and
//! responses are externally tagged by operation name, e.g.
//! `{"version":1,"id":3,"body":{"generate_rules":{"dir":"/src/foo",...}}}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resolve::{Redirect, ResolvedImport};
use crate::types::{GenerateArgs, GeneratedRule, ImportSpec, KindInfo, Label};

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub version: u32,
    /// Echoed back unchanged in the response.
    pub id: u64,
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn new(id: u64, body: T) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    Kinds,
    Redirects,
    GenerateRules(GenerateArgs),
    IndexedReferences {
        rule: GeneratedRule,
        rel: String,
    },
    ExtractReferences {
        rule: GeneratedRule,
    },
    ApplyResolutions {
        rule: GeneratedRule,
        resolved: Vec<ResolvedImport>,
        from: Label,
    },
}

impl Request {
    pub fn op(&self) -> &'static str {
        match self {
            Request::Kinds => "kinds",
            Request::Redirects => "redirects",
            Request::GenerateRules(_) => "generate_rules",
            Request::IndexedReferences { .. } => "indexed_references",
            Request::ExtractReferences { .. } => "extract_references",
            Request::ApplyResolutions { .. } => "apply_resolutions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Kinds(BTreeMap<String, KindInfo>),
    Redirects(Vec<Redirect>),
    GenerateRules(Vec<GeneratedRule>),
    IndexedReferences(Vec<ImportSpec>),
    ExtractReferences(Vec<ImportSpec>),
    ApplyResolutions(GeneratedRule),
    /// The operation failed inside the plugin. The transport stays usable.
    Error { message: String },
}

impl Response {
    pub fn op(&self) -> &'static str {
        match self {
            Response::Kinds(_) => "kinds",
            Response::Redirects(_) => "redirects",
            Response::GenerateRules(_) => "generate_rules",
            Response::IndexedReferences(_) => "indexed_references",
            Response::ExtractReferences(_) => "extract_references",
            Response::ApplyResolutions(_) => "apply_resolutions",
            Response::Error { .. } => "error",
        }
    }
}
