//! Configuration loading for drift-mcp.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/tusk/drift-mcp.toml` (system)
//! 2. `~/.config/tusk/drift-mcp.toml` (user)
//! 3. `./drift-mcp.toml`, or the `--config` path when given
//! 4. Environment variables (`TUSK_*`, `DRIFT_MCP_*`)
//!
//! Files are merged key by key, so a local file only needs the keys it
//! changes.
//!
//! # Usage
//!
//! ```rust,no_run
//! use driftconf::DriftConfig;
//!
//! let (config, sources) = DriftConfig::load_with_sources_from(None).unwrap();
//! println!("engine: {}", config.api.url);
//! println!("loaded from {:?}", sources.files);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [api]
//! url = "https://api.usetusk.ai"
//! timeout_ms = 30000
//!
//! [service]
//! workspace_roots = ["~/code/shop"]
//! max_depth = 3
//!
//! [http]
//! port = 3100
//! session_idle_secs = 1800
//!
//! [telemetry]
//! otlp_endpoint = "127.0.0.1:4317"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};
pub use sections::{ApiConfig, HttpConfig, ServiceConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete drift-mcp configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DriftConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl DriftConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load with `config_path` standing in for `./drift-mcp.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and env vars contributed.
    pub fn load_with_sources_from(config_path: Option<&Path>) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        let (mut config, mut sources) = loader::load_files(&files)?;
        loader::apply_env_overrides(&mut config, &mut sources);
        Ok((config, sources))
    }

    /// Serialize to TOML with the API key redacted.
    pub fn to_toml(&self) -> String {
        let mut redacted = self.clone();
        if redacted.api.key.is_some() {
            redacted.api.key = Some("<redacted>".to_string());
        }

        let mut output = String::from("# drift-mcp configuration (effective)\n\n");
        match toml::to_string_pretty(&redacted) {
            Ok(body) => output.push_str(&body),
            Err(e) => output.push_str(&format!("# failed to render: {}\n", e)),
        }
        output
    }
}
