//! The capability set every language analyzer exposes, in-process or remote.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::resolve::{Redirect, ResolvedImport, Resolver};
use crate::types::{GenerateArgs, GeneratedRule, ImportSpec, KindInfo, Label};
use crate::Result;

#[async_trait]
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &str;

    /// Rule kinds this analyzer emits, keyed by kind name.
    async fn kinds(&self) -> Result<BTreeMap<String, KindInfo>>;

    /// Well-known import prefixes this analyzer maps to external targets.
    async fn redirects(&self) -> Result<Vec<Redirect>> {
        Ok(Vec::new())
    }

    /// Generate rules for one directory. Must not read outside `args.dir`.
    async fn generate_rules(&self, args: &GenerateArgs) -> Result<Vec<GeneratedRule>>;

    /// Imports a rule provides to others, used to build the import index.
    async fn indexed_references(&self, rule: &GeneratedRule, rel: &str)
        -> Result<Vec<ImportSpec>>;

    /// Imports a rule depends on, to be resolved against the index.
    async fn extract_references(&self, rule: &GeneratedRule) -> Result<Vec<ImportSpec>>;

    /// Write resolved imports onto the rule, replacing any prior dependency list.
    async fn apply_resolutions(
        &self,
        rule: GeneratedRule,
        resolved: Vec<ResolvedImport>,
        from: &Label,
    ) -> Result<GeneratedRule> {
        Ok(crate::resolve::apply_resolutions(rule, &resolved, from))
    }

    /// Resolve `references` for the rule labelled `from` and write its dependencies.
    ///
    /// Resolution itself always runs against the caller's index; only the
    /// final write goes through the analyzer.
    async fn resolve_dependencies(
        &self,
        resolver: &Resolver,
        rule: GeneratedRule,
        references: &[ImportSpec],
        from: &Label,
    ) -> Result<GeneratedRule> {
        let resolved = resolver.resolve_all(references, from);
        self.apply_resolutions(rule, resolved, from).await
    }
}
