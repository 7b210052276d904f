use super::{ComponentRegistry, ShutdownResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    ClosingTransports,
    ForceStop,
    Complete,
}

pub struct ShutdownCoordinator {
    registry: Arc<ComponentRegistry>,
    phase_tx: watch::Sender<ShutdownPhase>,
    phase_rx: watch::Receiver<ShutdownPhase>,
}

impl ShutdownCoordinator {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        let (phase_tx, phase_rx) = watch::channel(ShutdownPhase::Running);
        Self {
            registry,
            phase_tx,
            phase_rx,
        }
    }

    pub fn phase_receiver(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase_rx.clone()
    }

    /// Ask every component to stop, then force-stop all of them in reverse order.
    pub async fn shutdown(&self, per_component: Duration) -> Vec<(String, ShutdownResult)> {
        let mut results = Vec::new();

        let mut components = self.registry.get_all().await;
        components.sort_by_key(|c| c.shutdown_priority());

        let _ = self.phase_tx.send(ShutdownPhase::ClosingTransports);
        tracing::info!(count = components.len(), "Shutdown phase 1: closing transports");

        for component in &components {
            let name = component.name().to_string();
            tracing::info!(name = %name, "Shutting down component");

            let result =
                tokio::time::timeout(per_component, component.shutdown(per_component)).await;

            let shutdown_result = match result {
                Ok(r) => r,
                Err(_) => ShutdownResult::TimedOut,
            };

            results.push((name, shutdown_result));
        }

        let _ = self.phase_tx.send(ShutdownPhase::ForceStop);
        tracing::info!("Shutdown phase 2: force stopping remaining");

        for component in components.iter().rev() {
            component.force_stop().await;
        }

        let _ = self.phase_tx.send(ShutdownPhase::Complete);
        tracing::info!("Shutdown complete");

        results
    }
}
