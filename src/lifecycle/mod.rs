mod component;
mod registry;
mod shutdown;

pub use component::{Component, ComponentHealth, HealthStatus, ShutdownPriority, ShutdownResult};
pub use registry::ComponentRegistry;
pub use shutdown::{ShutdownCoordinator, ShutdownPhase};
