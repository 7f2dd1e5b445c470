//! Layered configuration for the keysense service.
//!
//! Kept free of the analysis crate so anything can import it. The binary
//! maps [`AnalysisConfig`] onto the engine's parameters.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/keysense/config.toml` (system)
//! 2. `~/.config/keysense/config.toml` (user)
//! 3. `./keysense.toml` (local override, replaced by `--config`)
//! 4. Environment variables (`KEYSENSE_*`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [analysis]
//! cadence_window_sec = 1.2
//! cadence_weight = 3.2
//! key_candidate_limit = 5
//! executor = "parallel"
//! workers = 0
//!
//! [bind]
//! host = "127.0.0.1"
//! http_port = 8790
//!
//! [telemetry]
//! otlp_endpoint = "127.0.0.1:4317"
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{AnalysisConfig, BindConfig, TelemetryConfig};

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

/// Complete keysense configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct KeysenseConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl KeysenseConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load with an optional CLI config path, then apply env overrides.
    ///
    /// `config_path` takes the place of `./keysense.toml`. System and user
    /// configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and variables contributed.
    pub fn load_with_sources_from(config_path: Option<&Path>) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = KeysenseConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            config = loader::load_from_file(&path, config)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> String {
        let a = &self.analysis;
        let mut output = String::new();

        output.push_str("# keysense configuration\n\n");

        output.push_str("[analysis]\n");
        output.push_str(&format!("frame_seconds = {:?}\n", a.frame_seconds));
        output.push_str(&format!("min_frame_size = {}\n", a.min_frame_size));
        output.push_str(&format!("max_frame_size = {}\n", a.max_frame_size));
        output.push_str(&format!("cadence_window_sec = {:?}\n", a.cadence_window_sec));
        output.push_str(&format!("cadence_weight = {:?}\n", a.cadence_weight));
        output.push_str(&format!("silence_threshold = {:?}\n", a.silence_threshold));
        output.push_str(&format!("min_capture_sec = {:?}\n", a.min_capture_sec));
        output.push_str(&format!("max_capture_sec = {:?}\n", a.max_capture_sec));
        output.push_str(&format!("key_candidate_limit = {}\n", a.key_candidate_limit));
        match a.scale_candidate_limit {
            Some(limit) => output.push_str(&format!("scale_candidate_limit = {}\n", limit)),
            None => output.push_str("# scale_candidate_limit = 4\n"),
        }
        output.push_str(&format!("executor = \"{}\"\n", a.executor));
        output.push_str(&format!("workers = {}\n", a.workers));

        output.push_str("\n[bind]\n");
        output.push_str(&format!("host = \"{}\"\n", self.bind.host));
        output.push_str(&format!("http_port = {}\n", self.bind.http_port));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "otlp_endpoint = \"{}\"\n",
            self.telemetry.otlp_endpoint
        ));
        output.push_str(&format!(
            "log_level = \"{}\"\n",
            self.telemetry.log_level
        ));

        output
    }
}
