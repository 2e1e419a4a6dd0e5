//! Config sections. Every field has a serde default so partial files load.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Remote query engine connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the engine.
    /// Default: https://api.usetusk.ai
    #[serde(default = "ApiConfig::default_url")]
    pub url: String,

    /// Credential sent as a bearer token. Absent is not a load error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Per-request timeout.
    /// Default: 30000
    #[serde(default = "ApiConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ApiConfig {
    fn default_url() -> String {
        "https://api.usetusk.ai".to_string()
    }

    fn default_timeout_ms() -> u64 {
        30_000
    }

    /// Key with surrounding whitespace removed; blank counts as absent.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            key: None,
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

/// Service discovery and default selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_id: Option<String>,

    /// Directories scanned for `.tusk/config.yaml`. Empty means the
    /// current directory.
    #[serde(default)]
    pub workspace_roots: Vec<PathBuf>,

    /// Default: 3
    #[serde(default = "ServiceConfig::default_max_depth")]
    pub max_depth: usize,

    /// Stop descending below a directory that holds a service config.
    /// Default: true
    #[serde(default = "ServiceConfig::default_stop_at_match")]
    pub stop_at_match: bool,
}

impl ServiceConfig {
    fn default_max_depth() -> usize {
        3
    }

    fn default_stop_at_match() -> bool {
        true
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_id: None,
            workspace_roots: Vec::new(),
            max_depth: Self::default_max_depth(),
            stop_at_match: Self::default_stop_at_match(),
        }
    }
}

/// Streamable HTTP listener and session housekeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Default: 127.0.0.1
    #[serde(default = "HttpConfig::default_bind")]
    pub bind: String,

    /// Default: 3100
    #[serde(default = "HttpConfig::default_port")]
    pub port: u16,

    /// Sessions idle longer than this are closed. 0 disables expiry.
    /// Default: 1800
    #[serde(default = "HttpConfig::default_session_idle_secs")]
    pub session_idle_secs: u64,

    /// Default: 60
    #[serde(default = "HttpConfig::default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

impl HttpConfig {
    fn default_bind() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        3100
    }

    fn default_session_idle_secs() -> u64 {
        1800
    }

    fn default_reap_interval_secs() -> u64 {
        60
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            port: Self::default_port(),
            session_idle_secs: Self::default_session_idle_secs(),
            reap_interval_secs: Self::default_reap_interval_secs(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint. Empty disables export.
    #[serde(default)]
    pub otlp_endpoint: String,

    /// EnvFilter directive.
    /// Default: info,drift_mcp=debug,tether=info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info,drift_mcp=debug,tether=info".to_string()
    }

    pub fn otlp_enabled(&self) -> bool {
        !self.otlp_endpoint.trim().is_empty()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: String::new(),
            log_level: Self::default_log_level(),
        }
    }
}
