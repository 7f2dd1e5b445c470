//! Configuration sections: analysis knobs, bind address, telemetry.

use serde::{Deserialize, Serialize};

/// Analysis parameters. Mirrors the engine's parameter set one to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Target frame length in seconds before clamping.
    /// Default: 0.1
    #[serde(default = "AnalysisConfig::default_frame_seconds")]
    pub frame_seconds: f32,

    /// Default: 1024
    #[serde(default = "AnalysisConfig::default_min_frame_size")]
    pub min_frame_size: usize,

    /// Default: 8192
    #[serde(default = "AnalysisConfig::default_max_frame_size")]
    pub max_frame_size: usize,

    /// Closing window whose frames are weighted up, in seconds.
    /// Default: 1.2
    #[serde(default = "AnalysisConfig::default_cadence_window_sec")]
    pub cadence_window_sec: f32,

    /// Default: 3.2
    #[serde(default = "AnalysisConfig::default_cadence_weight")]
    pub cadence_weight: f32,

    /// Mean-square frame energy below which a frame is skipped.
    /// Default: 1e-6
    #[serde(default = "AnalysisConfig::default_silence_threshold")]
    pub silence_threshold: f32,

    /// Default: 4.0
    #[serde(default = "AnalysisConfig::default_min_capture_sec")]
    pub min_capture_sec: f32,

    /// Default: 30.0
    #[serde(default = "AnalysisConfig::default_max_capture_sec")]
    pub max_capture_sec: f32,

    /// Default: 5
    #[serde(default = "AnalysisConfig::default_key_candidate_limit")]
    pub key_candidate_limit: usize,

    /// Unset returns every candidate.
    #[serde(default)]
    pub scale_candidate_limit: Option<usize>,

    /// Frame executor: "parallel" or "sequential".
    /// Default: parallel
    #[serde(default = "AnalysisConfig::default_executor")]
    pub executor: String,

    /// Parallel executor threads; 0 picks one per core.
    /// Default: 0
    #[serde(default)]
    pub workers: usize,
}

impl AnalysisConfig {
    fn default_frame_seconds() -> f32 {
        0.1
    }

    fn default_min_frame_size() -> usize {
        1024
    }

    fn default_max_frame_size() -> usize {
        8192
    }

    fn default_cadence_window_sec() -> f32 {
        1.2
    }

    fn default_cadence_weight() -> f32 {
        3.2
    }

    fn default_silence_threshold() -> f32 {
        1e-6
    }

    fn default_min_capture_sec() -> f32 {
        4.0
    }

    fn default_max_capture_sec() -> f32 {
        30.0
    }

    fn default_key_candidate_limit() -> usize {
        5
    }

    fn default_executor() -> String {
        "parallel".to_string()
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_seconds: Self::default_frame_seconds(),
            min_frame_size: Self::default_min_frame_size(),
            max_frame_size: Self::default_max_frame_size(),
            cadence_window_sec: Self::default_cadence_window_sec(),
            cadence_weight: Self::default_cadence_weight(),
            silence_threshold: Self::default_silence_threshold(),
            min_capture_sec: Self::default_min_capture_sec(),
            max_capture_sec: Self::default_max_capture_sec(),
            key_candidate_limit: Self::default_key_candidate_limit(),
            scale_candidate_limit: None,
            executor: Self::default_executor(),
            workers: 0,
        }
    }
}

/// Network bind address for the HTTP service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Default: 127.0.0.1
    #[serde(default = "BindConfig::default_host")]
    pub host: String,

    /// HTTP port for analysis and health endpoints.
    /// Default: 8790
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,
}

impl BindConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_http_port() -> u16 {
        8790
    }

    /// `host:port` for binding a listener.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            http_port: Self::default_http_port(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint. Empty disables export.
    /// Default: empty
    #[serde(default)]
    pub otlp_endpoint: String,

    /// Log level or full `EnvFilter` directive.
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
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
