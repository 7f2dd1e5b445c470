//! Key ranking: diatonic scoring of chord progressions and template
//! correlation of pitch-class profiles.

use tracing::debug;

use crate::consensus::ConsensusVote;
use crate::types::{ChordQuality, ChordSymbol, Key, KeyCandidate, KeyMode, PitchClassProfile};

/// Krumhansl-Kessler major key profile (duration-weighted perception studies).
pub const MAJOR_PROFILE: [f32; 12] = [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];

/// Krumhansl-Kessler minor key profile.
pub const MINOR_PROFILE: [f32; 12] = [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

const CORRELATION_WEIGHT: f32 = 0.6;
const FIT_WEIGHT: f32 = 0.4;
const CONSENSUS_ROOT_BONUS: f32 = 0.15;
const CONSENSUS_MODE_BONUS: f32 = 0.05;

use ChordQuality::*;

/// Scale degree → chord qualities a major key expects there.
static MAJOR_EXPECTED: &[(u8, &[ChordQuality])] = &[
    (0, &[Major, Major7, Major6]),
    (2, &[Minor, Minor7]),
    (4, &[Minor, Minor7]),
    (5, &[Major, Major7, Major6]),
    (7, &[Major, Dominant7]),
    (9, &[Minor, Minor7]),
    (11, &[Diminished, HalfDiminished7]),
];

/// Scale degree → chord qualities a natural minor key expects there.
/// The dominant accepts both the natural-minor v and the borrowed V.
static MINOR_EXPECTED: &[(u8, &[ChordQuality])] = &[
    (0, &[Minor, Minor7, Minor6]),
    (2, &[Diminished, HalfDiminished7]),
    (3, &[Major, Major7]),
    (5, &[Minor, Minor7]),
    (7, &[Minor, Minor7, Major, Dominant7]),
    (8, &[Major, Major7]),
    (10, &[Major, Dominant7]),
];

fn template(mode: KeyMode) -> &'static [f32; 12] {
    match mode {
        KeyMode::Major => &MAJOR_PROFILE,
        KeyMode::Minor => &MINOR_PROFILE,
    }
}

/// Qualities expected on `degree`, or `None` when the degree has no entry.
pub fn expected_qualities(mode: KeyMode, degree: u8) -> Option<&'static [ChordQuality]> {
    let table = match mode {
        KeyMode::Major => MAJOR_EXPECTED,
        KeyMode::Minor => MINOR_EXPECTED,
    };
    table
        .iter()
        .find(|(d, _)| *d == degree)
        .map(|(_, qualities)| *qualities)
}

/// The degree a progression may open on instead of the tonic.
fn opening_substitute(mode: KeyMode) -> u8 {
    match mode {
        KeyMode::Major => 9,
        KeyMode::Minor => 3,
    }
}

/// Points a single chord earns in `key`: 3, 2, 1 or 0.
pub fn chord_points(key: &Key, chord: &ChordSymbol) -> u32 {
    let degree = key.degree_of(chord.root);
    match expected_qualities(key.mode, degree) {
        Some(qualities) if qualities.contains(&chord.quality) => 3,
        Some(_) => 2,
        None if chord.tones().is_subset(key.scale()) => 1,
        None => 0,
    }
}

/// Raw diatonic score of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyScore {
    pub key: Key,
    pub score: u32,
    /// Chords that earned full points
    pub diatonic: usize,
    pub opening: Option<&'static str>,
    pub authentic: usize,
    pub predominant: usize,
}

impl KeyScore {
    /// `score / (3n + 3)` as a percentage, before clamping.
    pub fn raw_percent(&self, chord_count: usize) -> u32 {
        let max = 3 * chord_count as u32 + 3;
        (100.0 * self.score as f32 / max as f32).round() as u32
    }

    pub fn reasons(&self, chord_count: usize) -> Vec<String> {
        let mut reasons = vec![format!("diatonic fit {}%", self.raw_percent(chord_count))];
        if self.diatonic > 0 {
            reasons.push(format!("{}/{} chords diatonic", self.diatonic, chord_count));
        }
        if let Some(opening) = self.opening {
            reasons.push(opening.to_string());
        }
        if self.authentic > 0 {
            reasons.push(format!("V→I ×{}", self.authentic));
        }
        if self.predominant > 0 {
            reasons.push(format!("ii→V ×{}", self.predominant));
        }
        reasons
    }

    pub fn into_candidate(self, chord_count: usize) -> KeyCandidate {
        let confidence = self.raw_percent(chord_count).min(100) as u8;
        let reasons = self.reasons(chord_count);
        candidate(self.key, confidence, reasons)
    }
}

/// Score `chords` against one key.
pub fn score_key(key: Key, chords: &[ChordSymbol]) -> KeyScore {
    let mut score = KeyScore {
        key,
        score: 0,
        diatonic: 0,
        opening: None,
        authentic: 0,
        predominant: 0,
    };

    for chord in chords {
        let points = chord_points(&key, chord);
        if points == 3 {
            score.diatonic += 1;
        }
        score.score += points;
    }

    for pair in chords.windows(2) {
        match (key.degree_of(pair[0].root), key.degree_of(pair[1].root)) {
            (7, 0) => score.authentic += 1,
            (2, 7) => score.predominant += 1,
            _ => {}
        }
    }
    score.score += (score.authentic + score.predominant) as u32;

    if let Some(first) = chords.first() {
        let degree = key.degree_of(first.root);
        if degree == 0 {
            score.opening = Some("opens on tonic");
        } else if degree == opening_substitute(key.mode) {
            score.opening = Some("opens on relative");
        }
        if score.opening.is_some() {
            score.score += 2;
        }
    }

    score
}

/// Rank all 24 keys against a progression.
///
/// Sorted by score, descending; ties keep enumeration order (tonic 0..11,
/// major before minor). An empty progression yields an empty list.
pub fn score_key_candidates(chords: &[ChordSymbol]) -> Vec<KeyCandidate> {
    if chords.is_empty() {
        return Vec::new();
    }

    let mut scores: Vec<KeyScore> = Key::all().map(|key| score_key(key, chords)).collect();
    scores.sort_by(|a, b| b.score.cmp(&a.score));

    if let Some(top) = scores.first() {
        debug!(key = %top.key, score = top.score, chords = chords.len(), "diatonic ranking");
    }

    scores
        .into_iter()
        .map(|s| s.into_candidate(chords.len()))
        .collect()
}

/// Blend audio candidates with how well each key explains a progression.
///
/// `confidence = round(0.5·audio + 0.5·diatonic)`. Candidates are returned
/// stable-sorted by the blended confidence. An empty progression leaves the
/// list unchanged.
pub fn rerank_with_progression(candidates: &[KeyCandidate], chords: &[ChordSymbol]) -> Vec<KeyCandidate> {
    if chords.is_empty() {
        return candidates.to_vec();
    }

    let mut reranked: Vec<KeyCandidate> = candidates
        .iter()
        .map(|c| {
            let diatonic = score_key(c.key(), chords).raw_percent(chords.len()).min(100);
            let blended = (0.5 * c.confidence as f32 + 0.5 * diatonic as f32).round() as u8;
            let mut out = c.clone();
            out.confidence = blended;
            out.reasons.push(format!("progression fit {}%", diatonic));
            out
        })
        .collect();

    reranked.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    reranked
}

/// Rank all 24 keys against a pitch-class profile.
///
/// Each key scores `0.6·corr + 0.4·fit`, where `corr` is the template dot
/// product relative to the best key and `fit` the share of profile mass
/// inside the key's scale. A consensus vote adds a bonus to its root, and a
/// little more when its mode agrees. An all-zero profile yields no candidates.
pub fn rank_profile(profile: &PitchClassProfile, consensus: Option<&ConsensusVote>) -> Vec<KeyCandidate> {
    let pcp = profile.normalized();
    if pcp.sum() <= 0.0 {
        return Vec::new();
    }

    let correlations: Vec<(Key, f32)> = Key::all()
        .map(|key| {
            let rotated = PitchClassProfile(pcp.rotated(key.tonic));
            (key, rotated.dot(template(key.mode)))
        })
        .collect();
    let best_corr = correlations
        .iter()
        .map(|(_, c)| *c)
        .fold(f32::NEG_INFINITY, f32::max);

    let mut scored: Vec<(f32, KeyCandidate)> = correlations
        .into_iter()
        .map(|(key, corr)| {
            let corr = if best_corr > 0.0 { corr / best_corr } else { 0.0 };
            let fit = pcp.mass_in(key.scale());
            let mut score = CORRELATION_WEIGHT * corr + FIT_WEIGHT * fit;

            let mut reasons = vec![
                format!("diatonic fit {}%", percent(fit)),
                format!("profile match {}%", percent(corr)),
            ];

            if let Some(vote) = consensus {
                if vote.root == Some(key.tonic) {
                    score += CONSENSUS_ROOT_BONUS * vote.share;
                    if vote.mode == Some(key.mode) {
                        score += CONSENSUS_MODE_BONUS;
                    }
                    reasons.push(format!("frame consensus {}%", percent(vote.share)));
                }
            }

            let confidence = percent(score.min(1.0)) as u8;
            (score, candidate(key, confidence, reasons))
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    if let Some((score, top)) = scored.first() {
        debug!(key = %top.label, score, "profile ranking");
    }

    scored.into_iter().map(|(_, c)| c).collect()
}

fn percent(fraction: f32) -> u32 {
    (100.0 * fraction).round().max(0.0) as u32
}

fn candidate(key: Key, confidence: u8, reasons: Vec<String>) -> KeyCandidate {
    KeyCandidate {
        tonic: key.tonic,
        mode: key.mode,
        label: key.label(),
        confidence,
        reasons,
    }
}
