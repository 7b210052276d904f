//! An [`Analyzer`] living in a child process, reached over its stdin/stdout.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::protocol::{Request, Response};
use super::transport::{RemoteTransport, TransportConfig, TransportState};
use crate::lifecycle::{Component, ComponentHealth, HealthStatus, ShutdownPriority, ShutdownResult};
use crate::plugin::Analyzer;
use crate::resolve::{Redirect, ResolvedImport};
use crate::types::{BuildgenError, GenerateArgs, GeneratedRule, ImportSpec, KindInfo, Label};
use crate::Result;

pub struct RemoteAnalyzer {
    name: String,
    transport: RemoteTransport,
    child: Mutex<Option<Child>>,
}

impl RemoteAnalyzer {
    /// Start `program` and talk to it over its standard streams.
    ///
    /// The child's stderr is inherited so its logs reach the terminal.
    pub fn spawn(program: &Path, args: &[String], call_timeout: Option<Duration>) -> Result<Self> {
        let name = program
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BuildgenError::Plugin {
                plugin: name.clone(),
                message: format!("failed to start {}: {}", program.display(), e),
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BuildgenError::Internal("child stdin not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BuildgenError::Internal("child stdout not piped".into()))?;

        tracing::info!(plugin = %name, pid = child.id(), "Started plugin process");

        let transport = RemoteTransport::new(
            stdout,
            stdin,
            TransportConfig {
                peer: name.clone(),
                call_timeout,
            },
        );
        Ok(Self {
            name,
            transport,
            child: Mutex::new(Some(child)),
        })
    }

    /// Wrap an already connected stream pair. No process is managed.
    pub fn from_streams<R, W>(
        name: impl Into<String>,
        reader: R,
        writer: W,
        call_timeout: Option<Duration>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let name = name.into();
        let transport = RemoteTransport::new(
            reader,
            writer,
            TransportConfig {
                peer: name.clone(),
                call_timeout,
            },
        );
        Self {
            name,
            transport,
            child: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> &RemoteTransport {
        &self.transport
    }

    async fn call(&self, request: Request) -> Result<Response> {
        let op = request.op();
        match self.transport.call(request).await? {
            Response::Error { message } => Err(BuildgenError::Plugin {
                plugin: self.name.clone(),
                message,
            }),
            resp if resp.op() == op => Ok(resp),
            resp => Err(BuildgenError::MalformedMessage(format!(
                "expected {} response from {}, got {}",
                op,
                self.name,
                resp.op()
            ))),
        }
    }
}

fn unexpected(resp: Response) -> BuildgenError {
    BuildgenError::MalformedMessage(format!("unexpected {} response", resp.op()))
}

#[async_trait]
impl Analyzer for RemoteAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn kinds(&self) -> Result<BTreeMap<String, KindInfo>> {
        match self.call(Request::Kinds).await? {
            Response::Kinds(kinds) => Ok(kinds),
            other => Err(unexpected(other)),
        }
    }

    async fn redirects(&self) -> Result<Vec<Redirect>> {
        match self.call(Request::Redirects).await? {
            Response::Redirects(redirects) => Ok(redirects),
            other => Err(unexpected(other)),
        }
    }

    async fn generate_rules(&self, args: &GenerateArgs) -> Result<Vec<GeneratedRule>> {
        match self.call(Request::GenerateRules(args.clone())).await? {
            Response::GenerateRules(rules) => Ok(rules),
            other => Err(unexpected(other)),
        }
    }

    async fn indexed_references(
        &self,
        rule: &GeneratedRule,
        rel: &str,
    ) -> Result<Vec<ImportSpec>> {
        let request = Request::IndexedReferences {
            rule: rule.clone(),
            rel: rel.to_string(),
        };
        match self.call(request).await? {
            Response::IndexedReferences(specs) => Ok(specs),
            other => Err(unexpected(other)),
        }
    }

    async fn extract_references(&self, rule: &GeneratedRule) -> Result<Vec<ImportSpec>> {
        let request = Request::ExtractReferences { rule: rule.clone() };
        match self.call(request).await? {
            Response::ExtractReferences(specs) => Ok(specs),
            other => Err(unexpected(other)),
        }
    }

    async fn apply_resolutions(
        &self,
        rule: GeneratedRule,
        resolved: Vec<ResolvedImport>,
        from: &Label,
    ) -> Result<GeneratedRule> {
        let request = Request::ApplyResolutions {
            rule,
            resolved,
            from: from.clone(),
        };
        match self.call(request).await? {
            Response::ApplyResolutions(rule) => Ok(rule),
            other => Err(unexpected(other)),
        }
    }
}

#[async_trait]
impl Component for RemoteAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown_priority(&self) -> ShutdownPriority {
        ShutdownPriority::Normal
    }

    async fn health(&self) -> ComponentHealth {
        let status = match self.transport.close_reason() {
            None => HealthStatus::Healthy,
            Some(reason) if reason.is_error() => HealthStatus::Unhealthy {
                reason: reason.to_string(),
            },
            Some(reason) => HealthStatus::Degraded {
                reason: reason.to_string(),
            },
        };
        ComponentHealth { status }
    }

    async fn shutdown(&self, timeout: Duration) -> ShutdownResult {
        if self.transport.state() == TransportState::AwaitingResponse {
            tracing::warn!(plugin = %self.name, "Closing transport with a call in flight");
        }
        self.transport.close();

        let mut guard = self.child.lock().await;
        let Some(child) = guard.as_mut() else {
            return ShutdownResult::Exited { code: None };
        };

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(plugin = %self.name, %status, "Plugin exited");
                *guard = None;
                ShutdownResult::Exited {
                    code: status.code(),
                }
            }
            Ok(Err(e)) => ShutdownResult::Error(e.to_string()),
            Err(_) => {
                tracing::warn!(plugin = %self.name, "Plugin did not exit in time");
                ShutdownResult::TimedOut
            }
        }
    }

    async fn force_stop(&self) {
        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            tracing::warn!(plugin = %self.name, "Killing plugin process");
            if let Err(e) = child.kill().await {
                tracing::error!(plugin = %self.name, error = %e, "Failed to kill plugin");
            }
        }
        self.transport.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::TypeScriptAnalyzer;
    use crate::test_utils::{connect_in_process, FakeAnalyzer};
    use crate::types::CloseReason;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_remote_matches_in_process() {
        let local = TypeScriptAnalyzer::new();
        let (remote, server) = connect_in_process(Arc::new(TypeScriptAnalyzer::new()));

        assert_eq!(remote.kinds().await.unwrap(), local.kinds().await.unwrap());
        assert_eq!(
            remote.redirects().await.unwrap(),
            local.redirects().await.unwrap()
        );

        let rule = GeneratedRule::new("ts_library", "foo_typescript")
            .with_attr("srcs", serde_json::json!(["foo.ts"]))
            .with_imports(vec!["bar/bar.ts".into()]);
        assert_eq!(
            remote.indexed_references(&rule, "foo").await.unwrap(),
            local.indexed_references(&rule, "foo").await.unwrap()
        );
        assert_eq!(
            remote.extract_references(&rule).await.unwrap(),
            local.extract_references(&rule).await.unwrap()
        );

        remote.transport().close();
        let reason = server.await.unwrap().unwrap();
        assert_eq!(reason, CloseReason::EndOfStream);
    }

    #[tokio::test]
    async fn test_plugin_error_keeps_transport_open() {
        let fake = FakeAnalyzer::new("fake").failing_generate("no such dir");
        let (remote, _server) = connect_in_process(Arc::new(fake));

        let err = remote
            .generate_rules(&GenerateArgs::default())
            .await
            .unwrap_err();
        match err {
            BuildgenError::Plugin { plugin, message } => {
                assert_eq!(plugin, "fake");
                assert!(message.contains("no such dir"));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(remote.transport().state(), TransportState::Idle);
        assert!(remote.kinds().await.is_ok());
    }

    #[tokio::test]
    async fn test_apply_resolutions_over_the_wire() {
        use crate::resolve::{ImportIndexBuilder, RedirectTable, Resolver};

        let (remote, _server) = connect_in_process(Arc::new(TypeScriptAnalyzer::new()));

        let mut builder = ImportIndexBuilder::new();
        builder.add(
            ImportSpec::new("typescript", "foo/foo.ts"),
            &Label::new("", "foo", "foo_typescript"),
        );
        let resolver = Resolver::new(Arc::new(builder.finish()), RedirectTable::default());

        let rule = GeneratedRule::new("ts_library", "dep_typescript")
            .with_imports(vec!["foo/foo.ts".into()]);
        let refs = remote.extract_references(&rule).await.unwrap();
        let from = Label::new("", "test", "dep_typescript");
        let out = remote
            .resolve_dependencies(&resolver, rule, &refs, &from)
            .await
            .unwrap();
        assert_eq!(out.deps(), vec!["//foo:foo_typescript"]);
    }

    #[tokio::test]
    async fn test_health_follows_close_reason() {
        let (remote, server) = connect_in_process(Arc::new(FakeAnalyzer::new("fake")));
        assert!(matches!(remote.health().await.status, HealthStatus::Healthy));

        let result = Component::shutdown(&remote, Duration::from_secs(1)).await;
        assert!(matches!(result, ShutdownResult::Exited { code: None }));
        assert!(matches!(
            remote.health().await.status,
            HealthStatus::Degraded { .. }
        ));
        server.await.unwrap().unwrap();
    }
}
