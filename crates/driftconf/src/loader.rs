//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, DriftConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/tusk/drift-mcp.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("tusk/drift-mcp.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("drift-mcp.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read and merge `files` in order over the compiled defaults.
pub fn load_files(files: &[PathBuf]) -> Result<(DriftConfig, ConfigSources), ConfigError> {
    let mut sources = ConfigSources::default();
    let mut merged = toml::Table::new();

    for path in files {
        let table = load_table(path)?;
        merge_tables(&mut merged, table);
        sources.files.push(path.clone());
    }

    let last = files.last().cloned().unwrap_or_default();
    let mut config: DriftConfig = toml::Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: last,
            message: e.to_string(),
        })?;
    expand_roots(&mut config);

    Ok((config, sources))
}

/// Load a single file on top of the defaults.
pub fn load_from_file(path: &Path) -> Result<DriftConfig, ConfigError> {
    let (config, _) = load_files(&[path.to_path_buf()])?;
    Ok(config)
}

fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_toml(&contents, path)
}

/// Parse and validate one file. Returns the raw table so absent keys stay
/// absent when merging.
fn parse_toml(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    let parse_error = |e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let table: toml::Table = contents.parse().map_err(parse_error)?;
    // Type-check against the schema so errors name the offending file
    toml::Value::Table(table.clone())
        .try_into::<DriftConfig>()
        .map_err(parse_error)?;
    Ok(table)
}

/// Deep-merge `overlay` into `base`; overlay wins on conflicting leaves.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn expand_roots(config: &mut DriftConfig) {
    config.service.workspace_roots = config
        .service
        .workspace_roots
        .iter()
        .map(|p| expand_path(&p.to_string_lossy()))
        .collect();
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut DriftConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |name| env::var(name).ok());
}

/// Apply overrides read through `lookup`. Values that fail to parse are
/// ignored.
pub fn apply_overrides_from(
    config: &mut DriftConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let mut take = |name: &str| -> Option<String> {
        let value = lookup(name)?;
        sources.env_overrides.push(name.to_string());
        Some(value)
    };

    // Engine
    if let Some(v) = take("TUSK_API_URL") {
        config.api.url = v;
    }
    if let Some(v) = take("TUSK_API_KEY") {
        config.api.key = Some(v);
    }
    if let Some(v) = take("TUSK_API_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()) {
        config.api.timeout_ms = v;
    }

    // Service selection
    if let Some(v) = take("TUSK_DRIFT_SERVICE_ID") {
        config.service.default_id = Some(v);
    }
    if let Some(v) = take("TUSK_WORKSPACE_ROOTS") {
        config.service.workspace_roots = env::split_paths(&v)
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| expand_path(&p.to_string_lossy()))
            .collect();
    }
    if let Some(v) = take("TUSK_DISCOVERY_MAX_DEPTH").and_then(|v| v.trim().parse().ok()) {
        config.service.max_depth = v;
    }

    // HTTP listener
    if let Some(v) = take("DRIFT_MCP_BIND") {
        config.http.bind = v;
    }
    if let Some(v) = take("DRIFT_MCP_PORT").and_then(|v| v.trim().parse().ok()) {
        config.http.port = v;
    }
    if let Some(v) = take("DRIFT_MCP_SESSION_IDLE_SECS").and_then(|v| v.trim().parse().ok()) {
        config.http.session_idle_secs = v;
    }

    // Telemetry
    if let Some(v) = take("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
    }
    if let Some(v) = take("RUST_LOG") {
        config.telemetry.log_level = v;
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        let (var_name, rest) = match stripped.find('/') {
            Some(pos) => (&stripped[..pos], Some(&stripped[pos + 1..])),
            None => (stripped, None),
        };
        if let Ok(value) = env::var(var_name) {
            let base = PathBuf::from(value);
            return match rest {
                Some(rest) => base.join(rest),
                None => base,
            };
        }
    }
    PathBuf::from(path)
}
