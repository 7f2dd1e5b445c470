//! Key and scale detection from audio chroma and chord progressions.
//!
//! Two entry points share one set of key and scale tables:
//! [`KeyEngine::analyze_audio`] for mono PCM and
//! [`KeyEngine::analyze_progression`] for chord symbols. Both return ranked
//! candidates with human-readable reasons.

pub mod analyzer;
pub mod cadence;
pub mod chord_templates;
pub mod chords;
pub mod chroma;
pub mod consensus;
pub mod error;
pub mod fold;
pub mod key;
pub mod scale;
pub mod types;

pub use analyzer::{build_executor, ExecutorKind, FrameExecutor, ParallelExecutor, SequentialExecutor};
pub use chords::{parse_chord, parse_chords, tokenize_progression, ParsedProgression};
pub use error::{AnalysisError, ChordParseError};
pub use key::{rerank_with_progression, score_key_candidates};
pub use types::{
    AudioAnalysis, Cadence, CadenceKind, ChordQuality, ChordSymbol, Key, KeyCandidate, KeyMode,
    PcpAnalysis, PitchClass, PitchClassProfile, PitchSet, ProgressionAnalysis, ScaleCandidate,
    ScaleType,
};

use std::sync::Arc;

use tracing::info;

use crate::consensus::ConsensusVote;
use crate::error::Result;

/// Tunable analysis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisParams {
    /// Target frame length in seconds before clamping. Default: 0.1.
    pub frame_seconds: f32,
    /// Default: 1024.
    pub min_frame_size: usize,
    /// Default: 8192.
    pub max_frame_size: usize,
    /// Frames ending this close to the end of the capture are weighted up. Default: 1.2.
    pub cadence_window_sec: f32,
    /// Default: 3.2.
    pub cadence_weight: f32,
    /// Mean-square energy below which a frame is skipped. Default: 1e-6.
    pub silence_threshold: f32,
    /// Shorter captures are rejected. Default: 4.0.
    pub min_capture_sec: f32,
    /// Longer captures are cut to their opening. Default: 30.0.
    pub max_capture_sec: f32,
    /// Key candidates returned to callers. Default: 5.
    pub key_candidate_limit: usize,
    /// Scale candidates returned to callers. Default: all.
    pub scale_candidate_limit: Option<usize>,
    pub executor: ExecutorKind,
    /// Worker threads for the parallel executor; 0 lets rayon decide.
    pub workers: usize,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            frame_seconds: 0.1,
            min_frame_size: 1024,
            max_frame_size: 8192,
            cadence_window_sec: 1.2,
            cadence_weight: 3.2,
            silence_threshold: 1e-6,
            min_capture_sec: 4.0,
            max_capture_sec: 30.0,
            key_candidate_limit: 5,
            scale_candidate_limit: None,
            executor: ExecutorKind::default(),
            workers: 0,
        }
    }
}

impl AnalysisParams {
    /// Reject combinations the extractor cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(AnalysisError::InvalidParams(msg));

        if self.min_frame_size == 0 {
            return invalid("min_frame_size must be at least 1".into());
        }
        if self.min_frame_size > self.max_frame_size {
            return invalid(format!(
                "min_frame_size {} exceeds max_frame_size {}",
                self.min_frame_size, self.max_frame_size
            ));
        }
        let positive = [
            ("frame_seconds", self.frame_seconds),
            ("max_capture_sec", self.max_capture_sec),
            ("cadence_weight", self.cadence_weight),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return invalid(format!("{} must be positive, got {}", name, value));
            }
        }
        let non_negative = [
            ("min_capture_sec", self.min_capture_sec),
            ("cadence_window_sec", self.cadence_window_sec),
            ("silence_threshold", self.silence_threshold),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{} must be non-negative, got {}", name, value));
            }
        }
        if self.min_capture_sec > self.max_capture_sec {
            return invalid(format!(
                "min_capture_sec {} exceeds max_capture_sec {}",
                self.min_capture_sec, self.max_capture_sec
            ));
        }
        Ok(())
    }
}

/// Captures shorter than this are trusted proportionally less.
const FULL_TRUST_SEC: f32 = 8.0;

/// Key and scale analysis engine.
///
/// Holds the analysis parameters and the frame executor chosen at startup.
/// Every call is independent; nothing is cached between analyses.
pub struct KeyEngine {
    params: AnalysisParams,
    executor: Arc<dyn FrameExecutor>,
}

/// Intermediate result of the audio pipeline before truncation.
struct AudioPass {
    folded: PitchClassProfile,
    votes: ConsensusVote,
    candidates: Vec<KeyCandidate>,
    length_sec: f32,
    frames_analyzed: usize,
    frames_skipped: usize,
}

impl KeyEngine {
    /// Validate `params` and build the executor they name.
    pub fn new(params: AnalysisParams) -> Result<Self> {
        params.validate()?;
        let executor = build_executor(params.executor, params.workers)?;
        Ok(Self { params, executor })
    }

    /// Use a specific executor (for testing or embedding).
    pub fn with_executor(params: AnalysisParams, executor: Arc<dyn FrameExecutor>) -> Self {
        Self { params, executor }
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    pub fn executor_name(&self) -> &'static str {
        self.executor.name()
    }

    /// Rank keys and scales for a mono PCM capture.
    pub fn analyze_audio(&self, pcm: &[f32], sample_rate: u32) -> Result<AudioAnalysis> {
        let pass = self.audio_pass(pcm, sample_rate)?;
        let scales = self.audio_scales(&pass.folded, pass.candidates.first());
        Ok(self.finish_audio(pass, scales))
    }

    /// Audio analysis with candidates re-ranked by a known progression.
    pub fn analyze_audio_with_progression<S: AsRef<str>>(
        &self,
        pcm: &[f32],
        sample_rate: u32,
        tokens: &[S],
    ) -> Result<AudioAnalysis> {
        let mut pass = self.audio_pass(pcm, sample_rate)?;
        let parsed = parse_chords(tokens);
        if parsed.chords.is_empty() {
            let scales = self.audio_scales(&pass.folded, pass.candidates.first());
            return Ok(self.finish_audio(pass, scales));
        }

        pass.candidates = rerank_with_progression(&pass.candidates, &parsed.chords);
        let scales = match pass.candidates.first() {
            Some(top) => scale::score_scales_for_progression(top.key(), &parsed.chords),
            None => Vec::new(),
        };
        Ok(self.finish_audio(pass, scales))
    }

    /// Rank keys for a precomputed folded profile, as sent over the wire.
    pub fn analyze_pcp(&self, pcp12: [f32; 12], length_sec: f32) -> Result<PcpAnalysis> {
        if let Some(bad) = pcp12.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(AnalysisError::InvalidProfile(format!(
                "bins must be finite and non-negative, got {}",
                bad
            )));
        }
        if !length_sec.is_finite() {
            return Err(AnalysisError::InvalidProfile("lengthSec must be finite".into()));
        }
        self.check_length(length_sec)?;

        let profile = PitchClassProfile(pcp12).normalized();
        let candidates = key::rank_profile(&profile, None);
        let tones = scale::salient_tones(&profile);
        let scales = match candidates.first() {
            Some(top) => scale::score_scales(top.key(), tones, false),
            None => Vec::new(),
        };

        let conf = trust(candidates.first(), length_sec);
        info!(
            conf,
            length_sec,
            top = candidates.first().map(|c| c.label.as_str()).unwrap_or("-"),
            "pcp analysis"
        );

        Ok(PcpAnalysis {
            conf,
            length_sec,
            key_candidates: self.limit_keys(candidates),
            scale_candidates: self.limit_scales(scales),
            salient_tones: tones.iter().collect(),
        })
    }

    /// Rank keys, scales and the closing cadence for a chord progression.
    pub fn analyze_progression<S: AsRef<str>>(&self, tokens: &[S]) -> ProgressionAnalysis {
        let parsed = parse_chords(tokens);
        let ranked = score_key_candidates(&parsed.chords);

        let Some(top) = ranked.first().map(KeyCandidate::key) else {
            return ProgressionAnalysis {
                skipped: parsed.skipped,
                ..Default::default()
            };
        };

        let scales = scale::score_scales_for_progression(top, &parsed.chords);
        let cadence = cadence::detect_cadence(&top, &parsed.chords);
        let numerals = cadence::roman_numerals(&top, &parsed.chords);

        info!(
            chords = parsed.chords.len(),
            skipped = parsed.skipped.len(),
            key = %top,
            cadence = ?cadence.as_ref().map(|c| c.kind),
            "progression analysis"
        );

        ProgressionAnalysis {
            chords: parsed.chords.iter().map(ChordSymbol::symbol).collect(),
            skipped: parsed.skipped,
            key_candidates: self.limit_keys(ranked),
            scale_candidates: self.limit_scales(scales),
            cadence,
            numerals,
        }
    }

    fn check_length(&self, seconds: f32) -> Result<()> {
        if seconds < self.params.min_capture_sec {
            return Err(AnalysisError::InputTooShort {
                seconds,
                minimum: self.params.min_capture_sec,
            });
        }
        Ok(())
    }

    fn audio_pass(&self, pcm: &[f32], sample_rate: u32) -> Result<AudioPass> {
        self.params.validate()?;
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }

        let seconds = pcm.len() as f32 / sample_rate as f32;
        self.check_length(seconds)?;

        let max_samples = (self.params.max_capture_sec * sample_rate as f32) as usize;
        let pcm = &pcm[..pcm.len().min(max_samples)];
        let length_sec = pcm.len() as f32 / sample_rate as f32;

        let chroma = chroma::extract_chroma(pcm, sample_rate, &self.params, self.executor.as_ref());
        let folded = fold::fold_profile(&chroma.aggregate);
        let votes = consensus::vote(&chroma.frames);
        let candidates = key::rank_profile(&folded, Some(&votes));

        Ok(AudioPass {
            folded,
            votes,
            candidates,
            length_sec,
            frames_analyzed: chroma.frames.len(),
            frames_skipped: chroma.skipped,
        })
    }

    fn audio_scales(&self, folded: &PitchClassProfile, top: Option<&KeyCandidate>) -> Vec<ScaleCandidate> {
        match top {
            Some(top) => scale::score_scales(top.key(), scale::salient_tones(folded), false),
            None => Vec::new(),
        }
    }

    fn finish_audio(&self, pass: AudioPass, scales: Vec<ScaleCandidate>) -> AudioAnalysis {
        let confidence = trust(pass.candidates.first(), pass.length_sec);

        info!(
            length_sec = pass.length_sec,
            frames = pass.frames_analyzed,
            skipped = pass.frames_skipped,
            executor = self.executor.name(),
            top = pass.candidates.first().map(|c| c.label.as_str()).unwrap_or("-"),
            confidence,
            "audio analysis"
        );

        AudioAnalysis {
            pcp12: pass.folded.0,
            confidence,
            key_candidates: self.limit_keys(pass.candidates),
            scale_candidates: self.limit_scales(scales),
            root_votes: pass.votes.votes,
            estimated_root: pass.votes.root,
            estimated_mode: pass.votes.mode,
            length_sec: pass.length_sec,
            frames_analyzed: pass.frames_analyzed,
            frames_skipped: pass.frames_skipped,
        }
    }

    fn limit_keys(&self, mut candidates: Vec<KeyCandidate>) -> Vec<KeyCandidate> {
        candidates.truncate(self.params.key_candidate_limit);
        candidates
    }

    fn limit_scales(&self, mut candidates: Vec<ScaleCandidate>) -> Vec<ScaleCandidate> {
        if let Some(limit) = self.params.scale_candidate_limit {
            candidates.truncate(limit);
        }
        candidates
    }
}

/// Top confidence as a fraction, discounted for captures under eight seconds.
fn trust(top: Option<&KeyCandidate>, length_sec: f32) -> f32 {
    let Some(top) = top else {
        return 0.0;
    };
    let raw = top.confidence as f32 / 100.0 * (length_sec / FULL_TRUST_SEC).min(1.0);
    (raw * 10000.0).round() / 10000.0
}

/// Analyze a capture with default parameters on the calling thread.
pub fn analyze_audio(pcm: &[f32], sample_rate: u32) -> Result<AudioAnalysis> {
    KeyEngine::with_executor(AnalysisParams::default(), Arc::new(SequentialExecutor))
        .analyze_audio(pcm, sample_rate)
}

/// Analyze a chord progression with default parameters.
pub fn analyze_progression<S: AsRef<str>>(tokens: &[S]) -> ProgressionAnalysis {
    KeyEngine::with_executor(AnalysisParams::default(), Arc::new(SequentialExecutor))
        .analyze_progression(tokens)
}
