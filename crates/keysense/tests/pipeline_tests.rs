//! End-to-end tests for the audio and progression pipelines.

use std::sync::Arc;

use keysense::{
    analyze_audio, analyze_progression, AnalysisError, AnalysisParams, CadenceKind, KeyEngine,
    KeyMode, ParallelExecutor, PitchClass, ScaleType, SequentialExecutor,
};
use pretty_assertions::assert_eq;

const RATE: u32 = 16_000;

fn tone(freqs: &[f32], seconds: f32) -> Vec<f32> {
    let n = (RATE as f32 * seconds) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / RATE as f32;
            let sum: f32 = freqs
                .iter()
                .map(|f| (2.0 * std::f32::consts::PI * f * t).sin())
                .sum();
            0.5 * sum / freqs.len() as f32
        })
        .collect()
}

fn argmax(bins: &[f32; 12]) -> usize {
    let mut best = 0;
    for i in 1..12 {
        if bins[i] > bins[best] {
            best = i;
        }
    }
    best
}

#[test]
fn a4_sine_lands_on_a() {
    let result = analyze_audio(&tone(&[440.0], 5.0), RATE).unwrap();
    assert_eq!(argmax(&result.pcp12), 9);
    assert!((result.pcp12.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    assert!(result.frames_analyzed > 0);
    assert_eq!(result.frames_skipped, 0);
    assert!(result.key_candidates.len() <= 5);
    assert!(result.confidence > 0.0 && result.confidence <= 1.0);
    for candidate in &result.key_candidates {
        assert!(candidate.reasons[0].starts_with("diatonic fit"));
    }
}

#[test]
fn audio_analysis_is_deterministic() {
    let audio = tone(&[261.63, 329.63, 392.0], 4.5);
    let first = analyze_audio(&audio, RATE).unwrap();
    let second = analyze_audio(&audio, RATE).unwrap();
    assert_eq!(first.pcp12, second.pcp12);
    assert_eq!(first.root_votes, second.root_votes);
    assert_eq!(first.key_candidates, second.key_candidates);
    assert_eq!(first.scale_candidates, second.scale_candidates);
}

#[test]
fn executors_agree() {
    let audio = tone(&[220.0, 277.18, 329.63], 4.5);
    let params = AnalysisParams::default();
    let sequential = KeyEngine::with_executor(params.clone(), Arc::new(SequentialExecutor));
    let parallel = KeyEngine::with_executor(params, Arc::new(ParallelExecutor::new(4).unwrap()));

    let a = sequential.analyze_audio(&audio, RATE).unwrap();
    let b = parallel.analyze_audio(&audio, RATE).unwrap();
    assert_eq!(a.pcp12, b.pcp12);
    assert_eq!(a.root_votes, b.root_votes);
    assert_eq!(a.key_candidates, b.key_candidates);
    assert_eq!(a.confidence, b.confidence);
}

#[test]
fn closing_window_pulls_the_aggregate() {
    // C for the body, G only in the closing 1.2 s
    let mut audio = tone(&[261.63], 4.8);
    audio.extend(tone(&[392.0], 1.2));

    let run = |cadence_weight: f32| {
        let params = AnalysisParams {
            cadence_weight,
            ..AnalysisParams::default()
        };
        KeyEngine::with_executor(params, Arc::new(SequentialExecutor))
            .analyze_audio(&audio, RATE)
            .unwrap()
    };

    let flat = run(1.0);
    let weighted = run(3.2);
    assert!(weighted.pcp12[7] > flat.pcp12[7]);
    assert!(weighted.pcp12[0] < flat.pcp12[0]);
    let total = |votes: &[f32; 12]| votes.iter().sum::<f32>();
    assert!(total(&weighted.root_votes) > total(&flat.root_votes));
    assert_eq!(weighted.frames_analyzed, flat.frames_analyzed);
}

#[test]
fn major_triad_ranks_its_relative_pair_first() {
    // Folding plus template matching leans toward the relative minor for a
    // bare triad; both readings must lead the list.
    let result = analyze_audio(&tone(&[261.63, 329.63, 392.0], 4.5), RATE).unwrap();
    let mut top: Vec<&str> = result.key_candidates[..2]
        .iter()
        .map(|c| c.label.as_str())
        .collect();
    top.sort();
    assert_eq!(top, vec!["A minor", "C major"]);
    assert_eq!(result.estimated_root, Some(PitchClass::new(9)));
    assert_eq!(result.estimated_mode, Some(KeyMode::Minor));
}

#[test]
fn short_capture_rejected() {
    let err = analyze_audio(&tone(&[440.0], 3.0), RATE).unwrap_err();
    assert!(matches!(err, AnalysisError::InputTooShort { .. }));
}

#[test]
fn silence_yields_empty_result() {
    let result = analyze_audio(&vec![0.0; RATE as usize * 5], RATE).unwrap();
    assert_eq!(result.pcp12, [0.0; 12]);
    assert!(result.key_candidates.is_empty());
    assert!(result.scale_candidates.is_empty());
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.frames_analyzed, 0);
    assert_eq!(result.estimated_root, None);
}

#[test]
fn long_capture_is_clamped() {
    let result = analyze_audio(&vec![0.0; 8_000 * 35], 8_000).unwrap();
    assert_eq!(result.length_sec, 30.0);
}

#[test]
fn progression_reranks_audio() {
    let engine = KeyEngine::new(AnalysisParams::default()).unwrap();
    let result = engine
        .analyze_audio_with_progression(&tone(&[440.0], 5.0), RATE, &["Am", "Dm", "E7", "Am"])
        .unwrap();
    assert!(!result.key_candidates.is_empty());
    for candidate in &result.key_candidates {
        assert!(candidate.reasons.last().unwrap().starts_with("progression fit"));
    }
}

#[test]
fn pop_progression() {
    let result = analyze_progression(&["C", "G", "Am", "F"]);
    let top: Vec<_> = result.key_candidates[..2]
        .iter()
        .map(|c| (c.tonic.value(), c.mode))
        .collect();
    assert_eq!(top, vec![(0, KeyMode::Major), (9, KeyMode::Minor)]);
    assert!(result.key_candidates[0].reasons[0].starts_with("diatonic fit"));
    assert!(result.key_candidates[1].reasons[0].starts_with("diatonic fit"));
}

#[test]
fn progression_ends_on_perfect_cadence() {
    let result = analyze_progression(&["C", "Am", "F", "G", "C"]);
    assert_eq!(result.key_candidates[0].label, "C major");
    let cadence = result.cadence.unwrap();
    assert_eq!(cadence.kind, CadenceKind::Perfect);
    assert_eq!((cadence.from.as_str(), cadence.to.as_str()), ("V", "I"));
}

#[test]
fn progression_scales_cover_chord_tones() {
    let result = analyze_progression(&["C", "G7", "Am", "F"]);
    assert_eq!(result.key_candidates[0].tonic, PitchClass::C);
    assert_eq!(result.scale_candidates[0].scale, ScaleType::Major);
    assert_eq!(result.scale_candidates[0].score, 100);
    assert!(result
        .scale_candidates
        .iter()
        .all(|s| !matches!(s.scale, ScaleType::HarmonicMinor | ScaleType::MelodicMinor)));
}

#[test]
fn empty_progression() {
    let result = analyze_progression::<&str>(&[]);
    assert!(result.key_candidates.is_empty());
    assert!(result.scale_candidates.is_empty());
    assert_eq!(result.cadence, None);
}

#[test]
fn pcp_wire_shape() {
    let engine = KeyEngine::new(AnalysisParams::default()).unwrap();
    let mut pcp = [0.02; 12];
    pcp[0] = 0.3;
    pcp[4] = 0.15;
    pcp[7] = 0.2;
    pcp[2] = 0.06;
    pcp[5] = 0.06;
    pcp[9] = 0.06;
    pcp[11] = 0.05;

    let result = engine.analyze_pcp(pcp, 6.0).unwrap();
    assert_eq!(result.key_candidates[0].label, "C major");
    assert!(result.conf <= 0.75);
    assert_eq!(result.salient_tones.len(), 7);

    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("keyCandidates").is_some());
    assert!(json.get("scaleCandidates").is_some());
    assert_eq!(json["lengthSec"], 6.0);
}
