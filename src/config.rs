//! TOML configuration for netsoak.
//!
//! A layered model with compiled-in defaults, an environment variable
//! override for the config file path, and a standard per-user location.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub test: TestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Extra endpoint presets merged after the built-ins.
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl AppConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path specified by the `NETSOAK_CONFIG` environment variable.
    /// 2. `~/.config/netsoak/config.toml`.
    /// 3. Fall back to compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var("NETSOAK_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "NETSOAK_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                match Self::load(&user_path) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        warn!(
                            path = %user_path.display(),
                            error = %e,
                            "user config file exists but could not be loaded, using defaults"
                        );
                    }
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    fn user_config_path() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".config/netsoak/config.toml"))
    }
}

// ---------------------------------------------------------------------------
// Test defaults
// ---------------------------------------------------------------------------

/// Default test parameters, overridable per-run from the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Endpoint preset id used when no `--endpoint`/`--url` is given.
    pub endpoint: String,
    /// Number of parallel download streams.
    pub threads: u32,
    /// Traffic budget, e.g. "500MB" or "1.5GB".
    pub budget: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            endpoint: "cloudflare".to_string(),
            threads: 4,
            budget: "500MB".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
