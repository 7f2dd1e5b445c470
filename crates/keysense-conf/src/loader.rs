//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, KeysenseConfig};
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

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/keysense/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("keysense/config.toml");
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

    let local = PathBuf::from("keysense.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load a TOML file on top of `base`. Keys the file omits keep their value.
pub fn load_from_file(path: &Path, base: KeysenseConfig) -> Result<KeysenseConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path, base)
}

/// Parse TOML and overlay it onto `base`.
pub fn parse_toml(contents: &str, path: &Path, base: KeysenseConfig) -> Result<KeysenseConfig, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    overlay_table(&table, base).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn overlay_table(table: &toml::Table, mut config: KeysenseConfig) -> Result<KeysenseConfig, String> {
    if let Some(analysis) = section(table, "analysis")? {
        let a = &mut config.analysis;
        if let Some(v) = float(analysis, "frame_seconds")? {
            a.frame_seconds = v;
        }
        if let Some(v) = uint(analysis, "min_frame_size")? {
            a.min_frame_size = v;
        }
        if let Some(v) = uint(analysis, "max_frame_size")? {
            a.max_frame_size = v;
        }
        if let Some(v) = float(analysis, "cadence_window_sec")? {
            a.cadence_window_sec = v;
        }
        if let Some(v) = float(analysis, "cadence_weight")? {
            a.cadence_weight = v;
        }
        if let Some(v) = float(analysis, "silence_threshold")? {
            a.silence_threshold = v;
        }
        if let Some(v) = float(analysis, "min_capture_sec")? {
            a.min_capture_sec = v;
        }
        if let Some(v) = float(analysis, "max_capture_sec")? {
            a.max_capture_sec = v;
        }
        if let Some(v) = uint(analysis, "key_candidate_limit")? {
            a.key_candidate_limit = v;
        }
        if let Some(v) = uint(analysis, "scale_candidate_limit")? {
            a.scale_candidate_limit = Some(v);
        }
        if let Some(v) = string(analysis, "executor")? {
            a.executor = v;
        }
        if let Some(v) = uint(analysis, "workers")? {
            a.workers = v;
        }
    }

    if let Some(bind) = section(table, "bind")? {
        if let Some(v) = string(bind, "host")? {
            config.bind.host = v;
        }
        if let Some(v) = uint(bind, "http_port")? {
            config.bind.http_port =
                u16::try_from(v).map_err(|_| format!("bind.http_port {} out of range", v))?;
        }
    }

    if let Some(telemetry) = section(table, "telemetry")? {
        if let Some(v) = string(telemetry, "otlp_endpoint")? {
            config.telemetry.otlp_endpoint = v;
        }
        if let Some(v) = string(telemetry, "log_level")? {
            config.telemetry.log_level = v;
        }
    }

    Ok(config)
}

fn section<'t>(table: &'t toml::Table, name: &str) -> Result<Option<&'t toml::Table>, String> {
    match table.get(name) {
        None => Ok(None),
        Some(v) => v
            .as_table()
            .map(Some)
            .ok_or_else(|| format!("[{}] must be a table", name)),
    }
}

fn float(table: &toml::Table, key: &str) -> Result<Option<f32>, String> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_float()
            .or_else(|| v.as_integer().map(|i| i as f64))
            .map(|f| Some(f as f32))
            .ok_or_else(|| format!("{} must be a number", key)),
    }
}

fn uint(table: &toml::Table, key: &str) -> Result<Option<usize>, String> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_integer()
            .and_then(|i| usize::try_from(i).ok())
            .map(Some)
            .ok_or_else(|| format!("{} must be a non-negative integer", key)),
    }
}

fn string(table: &toml::Table, key: &str) -> Result<Option<String>, String> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| format!("{} must be a string", key)),
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut KeysenseConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from any variable lookup. Unparseable values are ignored.
pub fn apply_overrides_from<F>(config: &mut KeysenseConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    // Bind address
    if let Some(v) = lookup("KEYSENSE_HTTP_PORT") {
        if let Ok(port) = v.parse() {
            config.bind.http_port = port;
            sources.env_overrides.push("KEYSENSE_HTTP_PORT".to_string());
        }
    }
    if let Some(v) = lookup("KEYSENSE_BIND_HOST") {
        config.bind.host = v;
        sources.env_overrides.push("KEYSENSE_BIND_HOST".to_string());
    }

    // Telemetry
    if let Some(v) = lookup("KEYSENSE_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
        sources.env_overrides.push("KEYSENSE_OTLP_ENDPOINT".to_string());
    }
    // Also support standard OTEL env var
    if let Some(v) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
        sources.env_overrides.push("OTEL_EXPORTER_OTLP_ENDPOINT".to_string());
    }
    if let Some(v) = lookup("KEYSENSE_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("KEYSENSE_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }

    // Analysis
    if let Some(v) = lookup("KEYSENSE_EXECUTOR") {
        config.analysis.executor = v;
        sources.env_overrides.push("KEYSENSE_EXECUTOR".to_string());
    }
    if let Some(v) = lookup("KEYSENSE_WORKERS") {
        if let Ok(workers) = v.parse() {
            config.analysis.workers = workers;
            sources.env_overrides.push("KEYSENSE_WORKERS".to_string());
        }
    }
    if let Some(v) = lookup("KEYSENSE_KEY_LIMIT") {
        if let Ok(limit) = v.parse() {
            config.analysis.key_candidate_limit = limit;
            sources.env_overrides.push("KEYSENSE_KEY_LIMIT".to_string());
        }
    }
}
