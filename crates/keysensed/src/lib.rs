//! keysensed - HTTP service and CLI for keysense
//!
//! This library provides:
//! - `commands`: CLI subcommands (WAV files, chord progressions, config)
//! - `serve`: HTTP server lifecycle
//! - `telemetry`: tracing subscriber and optional OTLP export
//! - `web`: axum routes for the analysis endpoints

pub mod commands;
pub mod serve;
pub mod telemetry;
pub mod web;

use anyhow::Result;
use keysense::{AnalysisParams, KeyEngine};
use keysense_conf::AnalysisConfig;

/// Map the `[analysis]` config section onto engine parameters.
pub fn analysis_params(config: &AnalysisConfig) -> Result<AnalysisParams> {
    let executor = config
        .executor
        .parse()
        .map_err(|e: String| anyhow::anyhow!("[analysis] executor: {}", e))?;

    Ok(AnalysisParams {
        frame_seconds: config.frame_seconds,
        min_frame_size: config.min_frame_size,
        max_frame_size: config.max_frame_size,
        cadence_window_sec: config.cadence_window_sec,
        cadence_weight: config.cadence_weight,
        silence_threshold: config.silence_threshold,
        min_capture_sec: config.min_capture_sec,
        max_capture_sec: config.max_capture_sec,
        key_candidate_limit: config.key_candidate_limit,
        scale_candidate_limit: config.scale_candidate_limit,
        executor,
        workers: config.workers,
    })
}

/// Build the engine for a loaded config.
pub fn build_engine(config: &AnalysisConfig) -> Result<KeyEngine> {
    let params = analysis_params(config)?;
    Ok(KeyEngine::new(params)?)
}
