use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::resolve::Redirect;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub repo_root: PathBuf,
    /// Repository name used when rendering labels. Empty for the main repository.
    pub repo_name: String,
    /// Executables serving the plugin protocol on stdio.
    pub plugins: Vec<PathBuf>,
    /// Redirects added on top of each analyzer's built-in ones.
    pub redirects: Vec<Redirect>,
    /// Rule name suffix for guessed labels, per language. Defaults to the language name.
    pub suffixes: HashMap<String, String>,
    /// 0 disables the per-call timeout.
    pub call_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub log_level: String,
    /// Run the built-in TypeScript analyzer in process.
    pub typescript: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            repo_name: String::new(),
            plugins: Vec::new(),
            redirects: Vec::new(),
            suffixes: HashMap::new(),
            call_timeout_ms: 30000,
            shutdown_timeout_ms: 5000,
            log_level: "info".to_string(),
            typescript: true,
        }
    }
}

impl AppConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_ms > 0).then(|| Duration::from_millis(self.call_timeout_ms))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_disables_call_timeout() {
        let config = AppConfig {
            call_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.call_timeout(), None);
        assert_eq!(
            AppConfig::default().call_timeout(),
            Some(Duration::from_secs(30))
        );
    }
}
