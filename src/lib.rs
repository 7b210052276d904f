pub mod config;
pub mod lifecycle;
pub mod pipeline;
pub mod plugin;
pub mod resolve;
pub mod types;

#[cfg(test)]
pub mod test_utils;

pub use config::AppConfig;
pub use types::{BuildgenError, Result};
