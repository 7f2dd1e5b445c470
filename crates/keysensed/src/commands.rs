//! CLI subcommand implementations.

use std::io::Cursor;
use std::path::Path;

use anyhow::{bail, Context, Result};
use keysense::{
    tokenize_progression, AudioAnalysis, KeyCandidate, KeyEngine, ProgressionAnalysis,
    ScaleCandidate,
};
use keysense_conf::{ConfigSources, KeysenseConfig};
use tracing::info;

/// Mono PCM decoded from a WAV file.
#[derive(Debug, Clone)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the source before downmixing
    pub source_channels: u16,
}

impl MonoAudio {
    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f32 / self.sample_rate as f32
        }
    }
}

/// Decode WAV bytes and average all channels down to mono.
pub fn decode_wav(data: &[u8]) -> Result<MonoAudio> {
    let reader = hound::WavReader::new(Cursor::new(data)).context("failed to parse WAV header")?;

    let spec = reader.spec();
    if spec.channels == 0 {
        bail!("WAV file declares zero channels");
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read float samples")?,
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample.max(1);
            let max_val = (1u64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .context("failed to read int samples")?
        }
    };

    let channels = spec.channels as usize;
    let samples = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok(MonoAudio {
        samples,
        sample_rate: spec.sample_rate,
        source_channels: spec.channels,
    })
}

/// Analyse a WAV file, optionally re-ranked by a chord progression.
pub fn wav(engine: &KeyEngine, path: &Path, chords: Option<&str>, json: bool) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let audio = decode_wav(&data).with_context(|| format!("Failed to decode {}", path.display()))?;

    info!(
        file = %path.display(),
        sample_rate = audio.sample_rate,
        channels = audio.source_channels,
        seconds = audio.duration_seconds(),
        "decoded wav"
    );

    let analysis = match chords {
        Some(text) => {
            let tokens = tokenize_progression(text);
            engine.analyze_audio_with_progression(&audio.samples, audio.sample_rate, &tokens[..])?
        }
        None => engine.analyze_audio(&audio.samples, audio.sample_rate)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print!("{}", format_audio(&analysis));
    }
    Ok(())
}

/// Analyse a chord progression given as one or more arguments.
pub fn progression(engine: &KeyEngine, args: &[String], json: bool) -> Result<()> {
    let tokens = tokenize_progression(&args.join(" "));
    let analysis = engine.analyze_progression(&tokens[..]);

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print!("{}", format_progression(&analysis));
    }
    Ok(())
}

/// Print the effective configuration and where it came from.
pub fn config(config: &KeysenseConfig, sources: &ConfigSources) {
    for path in &sources.files {
        println!("# loaded: {}", path.display());
    }
    for var in &sources.env_overrides {
        println!("# env: {}", var);
    }
    print!("{}", config.to_toml());
}

fn push_keys(out: &mut String, keys: &[KeyCandidate]) {
    out.push_str("Keys:\n");
    for (i, key) in keys.iter().enumerate() {
        out.push_str(&format!(
            "  {}. {:<10} {:>3}%  {}\n",
            i + 1,
            key.label,
            key.confidence,
            key.reasons.join(", ")
        ));
    }
}

fn push_scales(out: &mut String, scales: &[ScaleCandidate]) {
    if scales.is_empty() {
        return;
    }
    out.push_str("Scales:\n");
    for scale in scales {
        out.push_str(&format!("  {:<22} {:>3}\n", scale.label, scale.score));
    }
}

pub fn format_audio(analysis: &AudioAnalysis) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Analysed {:.1}s ({} frames, {} silent)\n",
        analysis.length_sec, analysis.frames_analyzed, analysis.frames_skipped
    ));

    if analysis.key_candidates.is_empty() {
        out.push_str("No pitched content found\n");
        return out;
    }

    out.push_str(&format!("Confidence: {:.2}\n", analysis.confidence));
    if let (Some(root), Some(mode)) = (analysis.estimated_root, analysis.estimated_mode) {
        out.push_str(&format!("Frame consensus: {} {}\n", root, mode));
    }
    push_keys(&mut out, &analysis.key_candidates);
    push_scales(&mut out, &analysis.scale_candidates);
    out
}

pub fn format_progression(analysis: &ProgressionAnalysis) -> String {
    let mut out = String::new();

    if !analysis.skipped.is_empty() {
        out.push_str(&format!("Skipped: {}\n", analysis.skipped.join(" ")));
    }
    if analysis.key_candidates.is_empty() {
        out.push_str("No chords to analyse\n");
        return out;
    }

    out.push_str(&format!("Chords:   {}\n", analysis.chords.join(" ")));
    out.push_str(&format!("Numerals: {}\n", analysis.numerals.join(" ")));
    if let Some(cadence) = &analysis.cadence {
        out.push_str(&format!(
            "Cadence:  {:?} ({} -> {})\n",
            cadence.kind, cadence.from, cadence.to
        ));
    }
    push_keys(&mut out, &analysis.key_candidates);
    push_scales(&mut out, &analysis.scale_candidates);
    out
}
