//! Configuration management for the launchpad
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub launcher: LauncherConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LauncherConfig {
    /// How long to wait for the wallet to sign before giving up
    pub signer_timeout_secs: u64,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    64
}

impl LauncherConfig {
    pub fn signer_timeout(&self) -> Duration {
        Duration::from_secs(self.signer_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the API from a browser; empty allows any
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub tokens: Vec<CatalogTokenConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogTokenConfig {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub address: String,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("LAUNCHPAD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.launcher.signer_timeout_secs == 0 {
            anyhow::bail!("launcher.signer_timeout_secs must be positive");
        }

        if self.metrics.enabled && self.metrics.port == self.api.port {
            anyhow::bail!(
                "Metrics port {} collides with the API port",
                self.metrics.port
            );
        }

        let mut seen = std::collections::HashSet::new();
        for token in &self.catalog.tokens {
            if !seen.insert(token.id.as_str()) {
                anyhow::bail!("Catalog token {} is listed twice", token.id);
            }
            if token.decimals > 18 {
                anyhow::bail!("Catalog token {} has more than 18 decimals", token.id);
            }
        }

        if self.catalog.tokens.is_empty() {
            tracing::warn!("Token catalog is empty - swaps will fail lookups");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
