//! Daemon bootstrap configuration: file defaults overridden by explicit
//! env vars, a layered-merge approach scaled down to this crate's small
//! config surface.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub providers: Vec<String>,
    pub warm_pool_target: usize,
    pub cleanup_interval_secs: u64,
    pub alert_threshold: f64,
    pub max_concurrent: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            providers: vec!["firecracker".to_string(), "gvisor".to_string(), "e2b".to_string()],
            warm_pool_target: 2,
            cleanup_interval_secs: 3600,
            alert_threshold: 0.8,
            max_concurrent: 50,
        }
    }
}

impl DaemonConfig {
    /// Loads from `path` if it exists, falling back to defaults, then
    /// applies env-var overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            toml::from_str(&text)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var("SBX_PROVIDERS") {
            self.providers = raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Some(value) = env_parsed("SBX_WARM_POOL_TARGET") {
            self.warm_pool_target = value;
        }
        if let Some(value) = env_parsed("SBX_CLEANUP_INTERVAL_SECS") {
            self.cleanup_interval_secs = value;
        }
        if let Some(value) = env_parsed("SBX_ALERT_THRESHOLD") {
            self.alert_threshold = value;
        }
        if let Some(value) = env_parsed("SBX_MAX_CONCURRENT") {
            self.max_concurrent = value;
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn missing_file_yields_defaults() {
        let config = DaemonConfig::load(Path::new("/nonexistent/sbx-daemon.toml")).unwrap();
        assert_eq!(config, DaemonConfig::default());
    }

    #[test]
    #[serial]
    fn file_values_are_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sbx-daemon.toml");
        std::fs::write(&path, "warm_pool_target = 7\nmax_concurrent = 100\n").unwrap();
        let config = DaemonConfig::load(&path).unwrap();
        assert_eq!(config.warm_pool_target, 7);
        assert_eq!(config.max_concurrent, 100);
    }

    #[test]
    #[serial]
    fn env_vars_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sbx-daemon.toml");
        std::fs::write(&path, "warm_pool_target = 7\n").unwrap();

        unsafe {
            std::env::set_var("SBX_WARM_POOL_TARGET", "3");
        }
        let config = DaemonConfig::load(&path).unwrap();
        unsafe {
            std::env::remove_var("SBX_WARM_POOL_TARGET");
        }
        assert_eq!(config.warm_pool_target, 3);
    }
}
