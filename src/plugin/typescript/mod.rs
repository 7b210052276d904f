//! In-process analyzer generating `ts_library` rules.
//!
//! At most one `ts_library` is generated per directory, named after the
//! directory: `foo/bar/baz.ts` lands in `//foo/bar:bar_typescript`
//! (`//:root_typescript` at the repository root).
//!
//! Rules are indexed by their `srcs`: a rule in `foo` with `srcs = ["foo.ts"]`
//! provides the import `foo/foo.ts`. Imports nobody provides are resolved by
//! convention to the rule that would be generated for the import's directory.

mod fileinfo;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::Value;

pub use fileinfo::{extract_imports, is_typescript_file, normalize_import, FileInfo};

use super::Analyzer;
use crate::resolve::{rule_name, Redirect, RedirectTable};
use crate::types::{GenerateArgs, GeneratedRule, ImportSpec, KindInfo};
use crate::Result;

pub const TYPESCRIPT_NAME: &str = "typescript";
pub const TS_LIBRARY: &str = "ts_library";

/// Import prefixes that always resolve outside the repository.
pub const WELL_KNOWN_REDIRECTS: &[(&str, &str, &str)] = &[(
    TYPESCRIPT_NAME,
    "google/protobuf/",
    "@com_google_protobuf//:well_known_types_typescript",
)];

#[derive(Debug, Default, Clone)]
pub struct TypeScriptAnalyzer;

impl TypeScriptAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Analyzer for TypeScriptAnalyzer {
    fn name(&self) -> &str {
        TYPESCRIPT_NAME
    }

    async fn kinds(&self) -> Result<BTreeMap<String, KindInfo>> {
        let mut kinds = BTreeMap::new();
        kinds.insert(
            TS_LIBRARY.to_string(),
            KindInfo::new(&["srcs"], &["srcs"], &["deps"]),
        );
        Ok(kinds)
    }

    async fn redirects(&self) -> Result<Vec<Redirect>> {
        let table = RedirectTable::from_static(WELL_KNOWN_REDIRECTS)?;
        Ok(table.iter().cloned().collect())
    }

    async fn generate_rules(&self, args: &GenerateArgs) -> Result<Vec<GeneratedRule>> {
        let mut srcs: Vec<&String> = args
            .regular_files
            .iter()
            .filter(|f| is_typescript_file(f))
            .collect();
        if srcs.is_empty() {
            return Ok(Vec::new());
        }
        srcs.sort();

        let mut imports = BTreeSet::new();
        for name in &srcs {
            let info = fileinfo::read_file_info(&args.dir, name).await;
            imports.extend(
                info.imports
                    .iter()
                    .map(|imp| normalize_import(&args.rel, imp)),
            );
        }

        let rule = GeneratedRule::new(TS_LIBRARY, rule_name(&args.rel, TYPESCRIPT_NAME))
            .with_attr(
                "srcs",
                Value::Array(srcs.into_iter().map(|s| Value::String(s.clone())).collect()),
            )
            .with_imports(imports.into_iter().collect());

        tracing::debug!(
            rel = %args.rel,
            rule = %rule.name,
            imports = rule.imports.len(),
            "Generated typescript rule"
        );
        Ok(vec![rule])
    }

    async fn indexed_references(
        &self,
        rule: &GeneratedRule,
        rel: &str,
    ) -> Result<Vec<ImportSpec>> {
        Ok(rule
            .attr_strings("srcs")
            .into_iter()
            .map(|src| {
                let imp = if rel.is_empty() {
                    src
                } else {
                    format!("{}/{}", rel, src)
                };
                ImportSpec::new(TYPESCRIPT_NAME, imp)
            })
            .collect())
    }

    async fn extract_references(&self, rule: &GeneratedRule) -> Result<Vec<ImportSpec>> {
        Ok(rule
            .imports
            .iter()
            .map(|imp| ImportSpec::new(TYPESCRIPT_NAME, imp.as_str()))
            .collect())
    }
}
