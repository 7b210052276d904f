use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::plugin::remote::serve;
use crate::plugin::{Analyzer, RemoteAnalyzer};
use crate::types::{BuildgenError, CloseReason, GenerateArgs, GeneratedRule, ImportSpec, KindInfo};
use crate::Result;

/// Analyzer with scripted behaviour that records what it was asked.
pub struct FakeAnalyzer {
    name: String,
    generate_error: Option<String>,
    rule: Option<String>,
    other_rules: Mutex<Vec<(String, Vec<String>)>>,
    extracted: Mutex<Vec<String>>,
}

impl FakeAnalyzer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            generate_error: None,
            rule: None,
            other_rules: Mutex::new(Vec::new()),
            extracted: Mutex::new(Vec::new()),
        }
    }

    /// Emit one rule called `rule` in every directory.
    pub fn with_rule(mut self, rule: &str) -> Self {
        self.rule = Some(rule.to_string());
        self
    }

    pub fn failing_generate(mut self, message: &str) -> Self {
        self.generate_error = Some(message.to_string());
        self
    }

    /// `(rel, names of other rules)` for every `generate_rules` call.
    pub fn seen_other_rules(&self) -> Vec<(String, Vec<String>)> {
        self.other_rules.lock().unwrap().clone()
    }

    /// Names of the rules passed to `extract_references`, in call order.
    pub fn extracted(&self) -> Vec<String> {
        self.extracted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn kinds(&self) -> Result<BTreeMap<String, KindInfo>> {
        let mut kinds = BTreeMap::new();
        kinds.insert(
            format!("{}_rule", self.name),
            KindInfo::new(&[], &[], &["deps"]),
        );
        Ok(kinds)
    }

    async fn generate_rules(&self, args: &GenerateArgs) -> Result<Vec<GeneratedRule>> {
        self.other_rules.lock().unwrap().push((
            args.rel.clone(),
            args.other_rules.iter().map(|r| r.name.clone()).collect(),
        ));
        if let Some(message) = &self.generate_error {
            return Err(BuildgenError::Internal(message.clone()));
        }
        Ok(self
            .rule
            .iter()
            .map(|name| GeneratedRule::new(format!("{}_rule", self.name), name.as_str()))
            .collect())
    }

    async fn indexed_references(
        &self,
        _rule: &GeneratedRule,
        _rel: &str,
    ) -> Result<Vec<ImportSpec>> {
        Ok(Vec::new())
    }

    async fn extract_references(&self, rule: &GeneratedRule) -> Result<Vec<ImportSpec>> {
        self.extracted.lock().unwrap().push(rule.name.clone());
        Ok(Vec::new())
    }
}

/// Serve `analyzer` on an in-memory pipe and return a client connected to it.
pub fn connect_in_process(
    analyzer: Arc<dyn Analyzer>,
) -> (RemoteAnalyzer, JoinHandle<Result<CloseReason>>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let name = analyzer.name().to_string();

    let handle = tokio::spawn(async move {
        let (reader, writer) = tokio::io::split(server);
        serve(analyzer.as_ref(), reader, writer).await
    });

    let (reader, writer) = tokio::io::split(client);
    (RemoteAnalyzer::from_streams(name, reader, writer, None), handle)
}
