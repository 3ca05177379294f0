use anyhow::{Context, Result};
use controller::{Backoff, DispatchOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

fn default_system_namespace() -> String {
    "stencil-system".to_string()
}

const fn default_requeue_seconds() -> u64 {
    10
}

const fn default_jobs() -> usize {
    4
}

/// Retry delays after a failed reconcile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "BackoffConfig::default_base")]
    pub base_seconds: u64,
    #[serde(default = "BackoffConfig::default_factor")]
    pub factor: f64,
    #[serde(default = "BackoffConfig::default_max")]
    pub max_seconds: u64,
}

impl BackoffConfig {
    const fn default_base() -> u64 {
        5
    }

    const fn default_factor() -> f64 {
        2.0
    }

    const fn default_max() -> u64 {
        300
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_seconds: Self::default_base(),
            factor: Self::default_factor(),
            max_seconds: Self::default_max(),
        }
    }
}

impl From<&BackoffConfig> for Backoff {
    fn from(config: &BackoffConfig) -> Self {
        Self {
            base_delay: Duration::from_secs(config.base_seconds),
            factor: config.factor,
            max_delay: Duration::from_secs(config.max_seconds),
        }
    }
}

/// Contents of `stencil.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StencilConfig {
    /// Store database; `<state dir>/store.db` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<String>,

    /// Namespace holding shared templates
    #[serde(default = "default_system_namespace")]
    pub system_namespace: String,

    /// Delay before re-checking an unfinished run
    #[serde(default = "default_requeue_seconds")]
    pub requeue_seconds: u64,

    /// Dispatcher worker threads
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for StencilConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            system_namespace: default_system_namespace(),
            requeue_seconds: default_requeue_seconds(),
            jobs: default_jobs(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl StencilConfig {
    /// Load the config file, falling back to defaults when it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.system_namespace.is_empty() {
            anyhow::bail!("system_namespace must not be empty");
        }
        if self.backoff.factor < 1.0 {
            anyhow::bail!("backoff.factor must be at least 1.0");
        }
        Ok(())
    }

    /// Resolved store database path
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(paths::expand(path)),
            None => Ok(paths::state_dir()?.join("store.db")),
        }
    }

    pub fn requeue(&self) -> Duration {
        Duration::from_secs(self.requeue_seconds)
    }

    /// Dispatcher options, with an optional override of the worker count
    pub fn dispatch_options(&self, jobs: Option<usize>) -> DispatchOptions {
        DispatchOptions {
            jobs: jobs.unwrap_or(self.jobs),
            backoff: Backoff::from(&self.backoff),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = StencilConfig::load_from(&tmp.path().join("stencil.toml")).unwrap();
        assert_eq!(config, StencilConfig::default());
        assert_eq!(config.system_namespace, "stencil-system");
        assert_eq!(config.requeue(), Duration::from_secs(10));
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: StencilConfig = toml::from_str("").unwrap();
        assert_eq!(config, StencilConfig::default());
    }

    #[test]
    fn test_load_full() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stencil.toml");
        std::fs::write(
            &path,
            r#"
store_path = "/srv/stencil/store.db"
system_namespace = "platform"
requeue_seconds = 30
jobs = 8

[backoff]
base_seconds = 1
max_seconds = 60
"#,
        )
        .unwrap();

        let config = StencilConfig::load_from(&path).unwrap();
        assert_eq!(config.system_namespace, "platform");
        assert_eq!(
            config.store_path().unwrap(),
            PathBuf::from("/srv/stencil/store.db")
        );
        assert_eq!(config.requeue(), Duration::from_secs(30));

        let options = config.dispatch_options(None);
        assert_eq!(options.jobs, 8);
        assert_eq!(options.backoff.base_delay, Duration::from_secs(1));
        assert!((options.backoff.factor - 2.0).abs() < f64::EPSILON);
        assert_eq!(options.backoff.max_delay, Duration::from_secs(60));
        assert_eq!(config.dispatch_options(Some(2)).jobs, 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stencil.toml");
        std::fs::write(&path, "system_namespace = \"\"\n").unwrap();
        assert!(StencilConfig::load_from(&path).is_err());

        std::fs::write(&path, "jobs = \"many\"\n").unwrap();
        assert!(StencilConfig::load_from(&path).is_err());
    }
}
