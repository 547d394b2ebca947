use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Drop the local entry and emit the termination event even when the
    /// counterpart's termination call fails.
    pub remove_on_remote_failure: bool,
    /// Hand released multi-activity agreements out again instead of
    /// terminating them.
    pub allow_reuse: bool,
    pub shutdown_reason: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            remove_on_remote_failure: true,
            allow_reuse: true,
            shutdown_reason: "Work finished".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = PoolConfig::default();
        Self {
            pool: PoolConfig {
                remove_on_remote_failure: env_flag("AGREEMENT_POOL_REMOVE_ON_REMOTE_FAILURE")
                    .unwrap_or(defaults.remove_on_remote_failure),
                allow_reuse: env_flag("AGREEMENT_POOL_ALLOW_REUSE")
                    .unwrap_or(defaults.allow_reuse),
                shutdown_reason: std::env::var("AGREEMENT_POOL_SHUTDOWN_REASON")
                    .unwrap_or(defaults.shutdown_reason),
            },
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid pool configuration")
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            log::warn!("Ignoring unrecognised value {:?} for {}", value, name);
            None
        }
    }
}
