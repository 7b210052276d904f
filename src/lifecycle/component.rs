use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ShutdownPriority {
    First = 0,
    #[default]
    Normal = 50,
    Last = 100,
}

#[derive(Debug)]
pub enum HealthStatus {
    Healthy,
    /// Stopped accepting work without an error.
    Degraded { reason: String },
    Unhealthy { reason: String },
}

#[derive(Debug)]
pub struct ComponentHealth {
    pub status: HealthStatus,
}

impl Default for ComponentHealth {
    fn default() -> Self {
        Self {
            status: HealthStatus::Healthy,
        }
    }
}

#[derive(Debug)]
pub enum ShutdownResult {
    /// Stopped on its own. `code` is the process exit code, if there was a process.
    Exited { code: Option<i32> },
    TimedOut,
    Error(String),
}

impl ShutdownResult {
    pub fn is_clean(&self) -> bool {
        matches!(self, ShutdownResult::Exited { code: None | Some(0) })
    }
}

#[async_trait]
pub trait Component: Send + Sync {
    fn name(&self) -> &str;

    fn shutdown_priority(&self) -> ShutdownPriority {
        ShutdownPriority::Normal
    }

    async fn health(&self) -> ComponentHealth {
        ComponentHealth::default()
    }

    async fn shutdown(&self, timeout: Duration) -> ShutdownResult;

    async fn force_stop(&self);
}
