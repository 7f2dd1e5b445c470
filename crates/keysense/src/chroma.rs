//! Spectral chroma extraction with a bank of single-bin Goertzel detectors.
//!
//! Each frame is Hann-windowed, then every MIDI note from low E (40) to
//! E6 (88) is measured at its exact frequency and at ±50 cents. The detector
//! energies accumulate into 12 pitch-class bins. Frames that end inside the
//! closing window of the capture carry extra weight in the aggregate.

use std::f64::consts::PI;

use tracing::{debug, trace};

use crate::analyzer::FrameExecutor;
use crate::types::PitchClassProfile;
use crate::AnalysisParams;

pub const LOWEST_NOTE: u8 = 40;
pub const HIGHEST_NOTE: u8 = 88;

const NEIGHBOR_CENTS: f64 = 50.0;
const CENTER_WEIGHT: f32 = 1.0;
const NEIGHBOR_WEIGHT: f32 = 0.6;

/// Frame length for a sample rate: `round(rate · frame_seconds)` clamped to bounds.
pub fn frame_size_for(sample_rate: u32, params: &AnalysisParams) -> usize {
    let target = (sample_rate as f64 * params.frame_seconds as f64).round() as usize;
    // max wins over min, so inverted bounds never panic
    target.max(params.min_frame_size).min(params.max_frame_size)
}

/// Symmetric Hann window.
pub fn hann_window(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|n| (0.5 - 0.5 * (2.0 * PI * n as f64 / denom).cos()) as f32)
        .collect()
}

/// Frequency in Hz of a (possibly fractional) MIDI note, A4 = 440.
pub fn midi_to_hz(note: f64) -> f64 {
    440.0 * 2f64.powf((note - 69.0) / 12.0)
}

#[derive(Debug, Clone, Copy)]
struct Detector {
    pitch_class: usize,
    weight: f32,
    coeff: f64,
}

/// Precomputed detectors and window for one (sample rate, frame size) pair.
#[derive(Debug, Clone)]
pub struct GoertzelBank {
    detectors: Vec<Detector>,
    window: Vec<f32>,
}

impl GoertzelBank {
    pub fn new(sample_rate: u32, frame_size: usize) -> Self {
        let nyquist = sample_rate as f64 / 2.0;
        let cents = NEIGHBOR_CENTS / 100.0;
        let mut detectors = Vec::with_capacity((HIGHEST_NOTE - LOWEST_NOTE + 1) as usize * 3);

        for note in LOWEST_NOTE..=HIGHEST_NOTE {
            let pitch_class = (note % 12) as usize;
            let offsets = [
                (note as f64, CENTER_WEIGHT),
                (note as f64 - cents, NEIGHBOR_WEIGHT),
                (note as f64 + cents, NEIGHBOR_WEIGHT),
            ];
            for (midi, weight) in offsets {
                let freq = midi_to_hz(midi);
                if freq >= nyquist {
                    continue;
                }
                let omega = 2.0 * PI * freq / sample_rate as f64;
                detectors.push(Detector {
                    pitch_class,
                    weight,
                    coeff: 2.0 * omega.cos(),
                });
            }
        }

        Self {
            detectors,
            window: hann_window(frame_size),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.window.len()
    }

    pub fn detector_count(&self) -> usize {
        self.detectors.len()
    }

    /// Weighted detector energy per pitch class for one frame.
    ///
    /// `samples` must be `frame_size()` long; shorter input is windowed over
    /// its own length.
    pub fn chroma(&self, samples: &[f32]) -> [f32; 12] {
        let windowed: Vec<f64> = if samples.len() == self.window.len() {
            samples
                .iter()
                .zip(&self.window)
                .map(|(x, w)| (*x * *w) as f64)
                .collect()
        } else {
            samples
                .iter()
                .zip(hann_window(samples.len()))
                .map(|(x, w)| (*x * w) as f64)
                .collect()
        };

        let mut bins = [0.0f32; 12];
        for detector in &self.detectors {
            let power = goertzel_power(&windowed, detector.coeff);
            bins[detector.pitch_class] += detector.weight * power as f32;
        }
        bins
    }
}

/// Squared magnitude of one DFT bin via the Goertzel recurrence.
fn goertzel_power(samples: &[f64], coeff: f64) -> f64 {
    let mut s1 = 0.0;
    let mut s2 = 0.0;
    for &x in samples {
        let s0 = x + coeff * s1 - s2;
        s2 = s1;
        s1 = s0;
    }
    (s1 * s1 + s2 * s2 - coeff * s1 * s2).max(0.0)
}

/// One analysis window over the capture.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub index: usize,
    pub samples: &'a [f32],
    pub start_sec: f32,
    /// Mean square of the raw samples
    pub energy: f32,
    /// 1.0, or the cadence weight inside the closing window
    pub weight: f32,
}

/// Slice a capture into half-overlapping frames with energy and cadence weight.
pub fn frames<'a>(
    samples: &'a [f32],
    sample_rate: u32,
    frame_size: usize,
    params: &AnalysisParams,
) -> Vec<Frame<'a>> {
    if frame_size == 0 || samples.len() < frame_size || sample_rate == 0 {
        return Vec::new();
    }

    let hop = (frame_size / 2).max(1);
    let rate = sample_rate as f32;
    let duration = samples.len() as f32 / rate;
    let cadence_start = duration - params.cadence_window_sec;

    let mut out = Vec::with_capacity((samples.len() - frame_size) / hop + 1);
    let mut start = 0;
    while start + frame_size <= samples.len() {
        let window = &samples[start..start + frame_size];
        let energy = window.iter().map(|x| x * x).sum::<f32>() / frame_size as f32;
        let end_sec = (start + frame_size) as f32 / rate;
        let weight = if end_sec >= cadence_start {
            params.cadence_weight
        } else {
            1.0
        };

        out.push(Frame {
            index: out.len(),
            samples: window,
            start_sec: start as f32 / rate,
            energy,
            weight,
        });
        start += hop;
    }
    out
}

/// Chroma for one non-silent frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameChroma {
    pub index: usize,
    pub start_sec: f32,
    pub weight: f32,
    /// Raw weighted detector energy per pitch class
    pub energy: [f32; 12],
    /// `energy` normalized to sum 1
    pub profile: PitchClassProfile,
}

/// Everything the extractor learned about a capture.
#[derive(Debug, Clone)]
pub struct ChromaFrames {
    /// Non-silent frames in time order
    pub frames: Vec<FrameChroma>,
    /// Cadence-weighted sum of frame energies, normalized
    pub aggregate: PitchClassProfile,
    pub frame_size: usize,
    pub hop_size: usize,
    pub skipped: usize,
}

/// Run the extractor over a whole capture.
pub fn extract_chroma(
    samples: &[f32],
    sample_rate: u32,
    params: &AnalysisParams,
    executor: &dyn FrameExecutor,
) -> ChromaFrames {
    let frame_size = frame_size_for(sample_rate, params);
    let bank = GoertzelBank::new(sample_rate, frame_size);
    let all_frames = frames(samples, sample_rate, frame_size, params);
    let threshold = params.silence_threshold;

    debug!(
        frames = all_frames.len(),
        frame_size,
        detectors = bank.detector_count(),
        executor = executor.name(),
        "extracting chroma"
    );

    let results = executor.map_frames(&all_frames, &|frame| {
        if frame.energy < threshold {
            trace!(frame = frame.index, energy = frame.energy, "silent frame skipped");
            return None;
        }
        let energy = bank.chroma(frame.samples);
        Some(FrameChroma {
            index: frame.index,
            start_sec: frame.start_sec,
            weight: frame.weight,
            energy,
            profile: PitchClassProfile(energy).normalized(),
        })
    });

    // Ordered fold so every executor produces identical sums.
    let mut aggregate = [0.0f32; 12];
    let mut kept = Vec::with_capacity(results.len());
    let mut skipped = 0;
    for result in results {
        match result {
            Some(fc) => {
                for (a, e) in aggregate.iter_mut().zip(fc.energy.iter()) {
                    *a += fc.weight * e;
                }
                kept.push(fc);
            }
            None => skipped += 1,
        }
    }

    ChromaFrames {
        frames: kept,
        aggregate: PitchClassProfile(aggregate).normalized(),
        frame_size,
        hop_size: (frame_size / 2).max(1),
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::SequentialExecutor;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn frame_size_is_clamped() {
        let params = AnalysisParams::default();
        assert_eq!(frame_size_for(44_100, &params), 4410);
        assert_eq!(frame_size_for(8_000, &params), 1024);
        assert_eq!(frame_size_for(192_000, &params), 8192);

        let inverted = AnalysisParams {
            min_frame_size: 8192,
            max_frame_size: 1024,
            ..AnalysisParams::default()
        };
        assert_eq!(frame_size_for(44_100, &inverted), 1024);
    }

    #[test]
    fn hann_endpoints_are_zero() {
        let w = hann_window(1024);
        assert!(w[0].abs() < 1e-6);
        assert!(w[1023].abs() < 1e-6);
        assert!(w[511] > 0.99);
    }

    #[test]
    fn goertzel_peaks_at_its_frequency() {
        let rate = 44_100;
        let tone = sine(440.0, rate, 0.1);
        let on = GoertzelBank::new(rate, tone.len()).chroma(&tone);
        // A = 9 dominates every other bin
        let best = PitchClassProfile(on).argmax();
        assert_eq!(best.value(), 9);
    }

    #[test]
    fn detectors_above_nyquist_are_dropped() {
        let full = GoertzelBank::new(44_100, 4410);
        assert_eq!(full.detector_count(), 49 * 3);
        let low = GoertzelBank::new(2_000, 1024);
        assert!(low.detector_count() < 49 * 3);
    }

    #[test]
    fn frames_hop_by_half_and_weight_the_tail() {
        let params = AnalysisParams::default();
        let rate = 10_000;
        let samples = vec![0.1; rate as usize * 5];
        let fs = frame_size_for(rate, &params);
        let frames = frames(&samples, rate, fs, &params);

        assert_eq!(fs, 1024);
        assert_eq!(frames[1].samples.as_ptr(), samples[512..].as_ptr());
        let last = frames.last().unwrap();
        assert_eq!(last.weight, 3.2);
        assert_eq!(frames[0].weight, 1.0);
        assert!((frames[0].energy - 0.01).abs() < 1e-6);
    }

    #[test]
    fn silent_capture_has_no_frames_and_zero_profile() {
        let params = AnalysisParams::default();
        let silence = vec![0.0; 44_100 * 5];
        let out = extract_chroma(&silence, 44_100, &params, &SequentialExecutor);
        assert!(out.frames.is_empty());
        assert!(out.skipped > 0);
        assert_eq!(out.aggregate.sum(), 0.0);
    }

    #[test]
    fn aggregate_is_normalized() {
        let params = AnalysisParams::default();
        let tone = sine(261.63, 22_050, 4.5);
        let out = extract_chroma(&tone, 22_050, &params, &SequentialExecutor);
        assert!(!out.frames.is_empty());
        assert!((out.aggregate.sum() - 1.0).abs() < 1e-6);
        assert_eq!(out.aggregate.argmax().value(), 0);
    }
}
