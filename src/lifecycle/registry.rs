use super::{Component, HealthStatus};
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct ComponentRegistry {
    components: RwLock<Vec<Arc<dyn Component>>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            components: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, component: Arc<dyn Component>) {
        let mut components = self.components.write().await;
        tracing::info!(name = component.name(), "Registering component");
        components.push(component);
    }

    pub async fn get_all(&self) -> Vec<Arc<dyn Component>> {
        self.components.read().await.clone()
    }

    /// Names of components that reported an unhealthy status.
    pub async fn unhealthy(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for component in self.get_all().await {
            if let HealthStatus::Unhealthy { reason } = component.health().await.status {
                out.push((component.name().to_string(), reason));
            }
        }
        out
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
