//! Drives analyzers over a scanned repository: generate, index, resolve.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use super::scanner::PackageDir;
use crate::plugin::Analyzer;
use crate::resolve::{ImportIndexBuilder, RedirectTable, ResolveStats, Resolver};
use crate::types::{BuildgenError, GeneratedRule, KindInfo, Label};

/// A rule together with the analyzer that generated it.
#[derive(Debug, Clone, Serialize)]
pub struct OwnedRule {
    pub analyzer: String,
    /// Position of the analyzer in the pipeline. Names need not be unique.
    #[serde(skip)]
    pub slot: usize,
    #[serde(flatten)]
    pub rule: GeneratedRule,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageRules {
    pub rel: String,
    pub rules: Vec<OwnedRule>,
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub packages: Vec<PackageRules>,
    pub kinds: BTreeMap<String, KindInfo>,
    pub stats: ResolveStats,
    /// Analyzers that stopped partway, with the error that stopped them.
    pub failed: BTreeMap<String, String>,
}

pub struct Pipeline {
    analyzers: Vec<Arc<dyn Analyzer>>,
    redirects: RedirectTable,
    suffixes: Vec<(String, String)>,
    repo_name: String,
}

impl Pipeline {
    /// `redirects` are the configured ones. Redirects the analyzers report
    /// are added at the start of each run; configured entries win ties.
    pub fn new(analyzers: Vec<Arc<dyn Analyzer>>, redirects: RedirectTable) -> Self {
        Self {
            analyzers,
            redirects,
            suffixes: Vec::new(),
            repo_name: String::new(),
        }
    }

    pub fn with_repo_name(mut self, repo_name: impl Into<String>) -> Self {
        self.repo_name = repo_name.into();
        self
    }

    pub fn with_suffix(mut self, lang: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.suffixes.push((lang.into(), suffix.into()));
        self
    }

    pub async fn run(&self, packages: &[PackageDir]) -> RunReport {
        let mut report = RunReport::default();
        let mut failed = Failures::default();
        let mut reported = Vec::new();

        for (slot, analyzer) in self.analyzers.iter().enumerate() {
            match analyzer.kinds().await {
                Ok(kinds) => report.kinds.extend(kinds),
                Err(e) => failed.record(slot, analyzer.name(), &e),
            }
            if failed.contains(slot) {
                continue;
            }
            match analyzer.redirects().await {
                Ok(redirects) => reported.extend(redirects),
                Err(e) => failed.record(slot, analyzer.name(), &e),
            }
        }

        let mut redirects = RedirectTable::new(reported);
        redirects.extend(self.redirects.iter().cloned());

        for pkg in packages {
            let mut rules: Vec<OwnedRule> = Vec::new();
            for (slot, analyzer) in self.analyzers.iter().enumerate() {
                if failed.contains(slot) {
                    continue;
                }
                let others = rules.iter().map(|r| r.rule.clone()).collect();
                match analyzer.generate_rules(&pkg.to_args(others)).await {
                    Ok(generated) => rules.extend(generated.into_iter().map(|rule| OwnedRule {
                        analyzer: analyzer.name().to_string(),
                        slot,
                        rule,
                    })),
                    Err(e) => failed.record(slot, analyzer.name(), &e),
                }
            }
            report.packages.push(PackageRules {
                rel: pkg.rel.clone(),
                rules,
            });
        }

        let mut builder = ImportIndexBuilder::new();
        for pkg in &report.packages {
            for owned in &pkg.rules {
                let Some(analyzer) = self.live(owned.slot, &failed) else {
                    continue;
                };
                let Some(owner) = self.label(&pkg.rel, &owned.rule) else {
                    continue;
                };
                match analyzer.indexed_references(&owned.rule, &pkg.rel).await {
                    Ok(specs) => builder.add_rule(specs, &owner),
                    Err(e) => failed.record(owned.slot, analyzer.name(), &e),
                }
            }
        }

        let mut resolver = Resolver::new(Arc::new(builder.finish()), redirects);
        for (lang, suffix) in &self.suffixes {
            resolver = resolver.with_suffix(lang.as_str(), suffix.as_str());
        }

        for pkg in &mut report.packages {
            for owned in &mut pkg.rules {
                let Some(analyzer) = self.live(owned.slot, &failed) else {
                    continue;
                };
                let Some(from) = self.label(&pkg.rel, &owned.rule) else {
                    continue;
                };

                let references = match analyzer.extract_references(&owned.rule).await {
                    Ok(references) => references,
                    Err(e) => {
                        failed.record(owned.slot, analyzer.name(), &e);
                        continue;
                    }
                };
                for spec in &references {
                    report.stats.record(&resolver.resolve(spec, &from));
                }

                match analyzer
                    .resolve_dependencies(&resolver, owned.rule.clone(), &references, &from)
                    .await
                {
                    Ok(rule) => owned.rule = rule,
                    Err(e) => failed.record(owned.slot, analyzer.name(), &e),
                }
            }
        }

        tracing::info!(
            packages = report.packages.len(),
            rules = report.packages.iter().map(|p| p.rules.len()).sum::<usize>(),
            deps = report.stats.deps(),
            ambiguous = report.stats.ambiguous,
            unresolved = report.stats.unresolved,
            failed = failed.fatal.len(),
            "Run complete"
        );

        report.failed = failed.messages;
        report
    }

    fn live(&self, slot: usize, failed: &Failures) -> Option<&Arc<dyn Analyzer>> {
        if failed.contains(slot) {
            return None;
        }
        self.analyzers.get(slot)
    }

    /// Label of a generated rule. Rules whose label would not parse back are
    /// left out of indexing and resolution.
    fn label(&self, rel: &str, rule: &GeneratedRule) -> Option<Label> {
        let label = Label::new(self.repo_name.as_str(), rel, rule.name.as_str());
        if label.is_well_formed() {
            Some(label)
        } else {
            tracing::warn!(rel, rule = %rule.name, "Rule name is not a valid label, skipping");
            None
        }
    }
}

#[derive(Default)]
struct Failures {
    fatal: BTreeSet<usize>,
    messages: BTreeMap<String, String>,
}

impl Failures {
    /// A closed transport or garbled reply stops the analyzer for the rest of
    /// the run. Other errors only lose the current item.
    fn record(&mut self, slot: usize, analyzer: &str, err: &BuildgenError) {
        match err {
            BuildgenError::TransportClosed(_) | BuildgenError::MalformedMessage(_) => {
                tracing::error!(
                    analyzer,
                    slot,
                    error = %err,
                    "Analyzer failed, skipping its remaining work"
                );
                self.fatal.insert(slot);
                self.messages
                    .entry(analyzer.to_string())
                    .or_insert_with(|| err.to_string());
            }
            _ => tracing::warn!(analyzer, slot, error = %err, "Analyzer operation failed"),
        }
    }

    fn contains(&self, slot: usize) -> bool {
        self.fatal.contains(&slot)
    }
}
