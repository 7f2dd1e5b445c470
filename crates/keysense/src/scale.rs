use tracing::debug;

use crate::types::{ChordQuality, ChordSymbol, Key, KeyMode, PitchClass, PitchClassProfile, PitchSet, ScaleCandidate, ScaleType};

const HOME_BONUS: f32 = 0.02;
const SEVENTH_BONUS: f32 = 0.03;
const MAX_SALIENT_TONES: usize = 7;
/// Half of a uniform bin.
const SALIENCE_FLOOR: f32 = 1.0 / 24.0;

static MAJOR_CANDIDATES: [ScaleType; 4] = [
    ScaleType::Major,
    ScaleType::Lydian,
    ScaleType::Mixolydian,
    ScaleType::MajorPentatonic,
];

static MINOR_CANDIDATES: [ScaleType; 6] = [
    ScaleType::NaturalMinor,
    ScaleType::Dorian,
    ScaleType::Phrygian,
    ScaleType::HarmonicMinor,
    ScaleType::MelodicMinor,
    ScaleType::MinorPentatonic,
];

/// Candidate scales for a mode, in table order.
pub fn candidates_for(mode: KeyMode) -> &'static [ScaleType] {
    match mode {
        KeyMode::Major => &MAJOR_CANDIDATES,
        KeyMode::Minor => &MINOR_CANDIDATES,
    }
}

pub fn home_scale(mode: KeyMode) -> ScaleType {
    match mode {
        KeyMode::Major => ScaleType::Major,
        KeyMode::Minor => ScaleType::NaturalMinor,
    }
}

/// Score each candidate scale of `key` by how much of `tones` it covers.
///
/// `score = round(100·min(1, coverage + bonus))`, sorted descending with
/// ties in table order. The home scale gets a small bonus, and harmonic and
/// melodic minor get one when the music contains a dominant seventh.
pub fn score_scales(key: Key, tones: PitchSet, dominant_seventh: bool) -> Vec<ScaleCandidate> {
    if tones.is_empty() {
        return Vec::new();
    }

    let home = home_scale(key.mode);
    let mut scored: Vec<ScaleCandidate> = candidates_for(key.mode)
        .iter()
        .map(|&scale| {
            let covered = tones.intersection(scale.tones(key.tonic)).len();
            let coverage = covered as f32 / tones.len() as f32;

            let mut bonus = 0.0;
            if scale == home {
                bonus += HOME_BONUS;
            }
            if dominant_seventh && matches!(scale, ScaleType::HarmonicMinor | ScaleType::MelodicMinor) {
                bonus += SEVENTH_BONUS;
            }

            ScaleCandidate {
                root: key.tonic,
                scale,
                label: format!("{} {}", key.tonic, scale.name()),
                score: (100.0 * (coverage + bonus).min(1.0)).round() as u8,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    debug!(key = %key, tones = tones.len(), top = ?scored.first().map(|s| s.scale), "scale ranking");
    scored
}

/// Score scales against the chord tones of a progression. Added sixths and
/// ninths do not count.
pub fn score_scales_for_progression(key: Key, chords: &[ChordSymbol]) -> Vec<ScaleCandidate> {
    let tones = chords
        .iter()
        .fold(PitchSet::EMPTY, |acc, chord| acc.union(chord.chord_tones()));
    let dominant_seventh = chords.iter().any(|c| c.quality == ChordQuality::Dominant7);
    score_scales(key, tones, dominant_seventh)
}

/// The up-to-seven strongest bins above half a uniform share.
pub fn salient_tones(profile: &PitchClassProfile) -> PitchSet {
    let pcp = profile.normalized();
    let mut order: Vec<usize> = (0..12).collect();
    // stable: equal bins keep ascending pitch-class order
    order.sort_by(|&a, &b| pcp.0[b].total_cmp(&pcp.0[a]));

    order
        .into_iter()
        .filter(|&i| pcp.0[i] > SALIENCE_FLOOR)
        .take(MAX_SALIENT_TONES)
        .map(|i| PitchClass::new(i as i32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chords::parse_chords;
    use pretty_assertions::assert_eq;

    fn chords(tokens: &[&str]) -> Vec<ChordSymbol> {
        parse_chords(tokens).chords
    }

    fn scores(list: &[ScaleCandidate]) -> Vec<(ScaleType, u8)> {
        list.iter().map(|s| (s.scale, s.score)).collect()
    }

    #[test]
    fn c_major_with_dominant_seventh() {
        let key = Key::new(PitchClass::C, KeyMode::Major);
        let ranked = score_scales_for_progression(key, &chords(&["C", "G7", "Am", "F"]));

        assert_eq!(
            scores(&ranked),
            vec![
                (ScaleType::Major, 100),
                (ScaleType::Lydian, 86),
                (ScaleType::Mixolydian, 86),
                (ScaleType::MajorPentatonic, 71),
            ]
        );
        assert!(ranked
            .iter()
            .all(|s| !matches!(s.scale, ScaleType::HarmonicMinor | ScaleType::MelodicMinor)));
        assert!(ranked.iter().all(|s| s.root == PitchClass::C));
        assert_eq!(ranked[0].label, "C major");
    }

    #[test]
    fn minor_progression_with_dominant_seventh() {
        let key = Key::new(PitchClass::new(9), KeyMode::Minor);
        let ranked = score_scales_for_progression(key, &chords(&["Am", "Dm", "E7", "Am"]));
        // tones A C E D F G# B: harmonic minor covers all seven
        assert_eq!(ranked[0].scale, ScaleType::HarmonicMinor);
        assert_eq!(ranked[0].score, 100);
        assert_eq!(ranked[0].label, "A harmonic minor");
        let natural = ranked.iter().find(|s| s.scale == ScaleType::NaturalMinor).unwrap();
        // 6/7 + 0.02
        assert_eq!(natural.score, 88);
    }

    #[test]
    fn seventh_bonus_follows_parsed_quality() {
        let key = Key::new(PitchClass::new(9), KeyMode::Minor);
        let score_of = |list: &[ScaleCandidate], scale: ScaleType| {
            list.iter().find(|s| s.scale == scale).map(|s| s.score)
        };

        // F A C E: no dominant seventh, harmonic minor covers everything
        let maj7 = score_scales_for_progression(key, &chords(&["Am", "Fmaj7"]));
        assert_eq!(score_of(&maj7, ScaleType::HarmonicMinor), Some(100));

        // F A C Eb: Eb is outside both, so 4 of 5 tones
        let dom7 = score_scales_for_progression(key, &chords(&["Am", "F7"]));
        assert_eq!(score_of(&dom7, ScaleType::HarmonicMinor), Some(83));
        assert_eq!(score_of(&dom7, ScaleType::NaturalMinor), Some(82));
    }

    #[test]
    fn added_sixth_is_not_a_chord_tone() {
        let key = Key::new(PitchClass::new(9), KeyMode::Minor);
        let ranked = score_scales_for_progression(key, &chords(&["Am6"]));

        // only A C E count, and every minor candidate holds them
        assert_eq!(
            scores(&ranked),
            vec![
                (ScaleType::NaturalMinor, 100),
                (ScaleType::Dorian, 100),
                (ScaleType::Phrygian, 100),
                (ScaleType::HarmonicMinor, 100),
                (ScaleType::MelodicMinor, 100),
                (ScaleType::MinorPentatonic, 100),
            ]
        );
    }

    #[test]
    fn added_ninth_is_not_a_chord_tone() {
        let key = Key::new(PitchClass::new(9), KeyMode::Minor);
        // Fadd9 sounds G; only F A C count
        let ranked = score_scales_for_progression(key, &chords(&["Am", "Fadd9"]));
        let natural = ranked.iter().find(|s| s.scale == ScaleType::NaturalMinor).unwrap();
        let pentatonic = ranked.iter().find(|s| s.scale == ScaleType::MinorPentatonic).unwrap();
        assert_eq!(natural.score, 100);
        // A C E F: pentatonic misses F
        assert_eq!(pentatonic.score, 75);
    }

    #[test]
    fn empty_tones_no_candidates() {
        let key = Key::new(PitchClass::C, KeyMode::Major);
        assert!(score_scales(key, PitchSet::EMPTY, false).is_empty());
        assert!(score_scales_for_progression(key, &[]).is_empty());
    }

    #[test]
    fn salient_tones_skip_weak_bins() {
        let mut bins = [0.0; 12];
        bins[0] = 0.4;
        bins[4] = 0.25;
        bins[7] = 0.3;
        bins[11] = 0.03;
        bins[2] = 0.02;
        let tones: Vec<u8> = salient_tones(&PitchClassProfile(bins)).iter().map(|pc| pc.value()).collect();
        assert_eq!(tones, vec![0, 4, 7]);
    }

    #[test]
    fn salient_tones_cap_at_seven() {
        let tones = salient_tones(&PitchClassProfile([1.0; 12]));
        // equal weights: the seven lowest pitch classes
        assert_eq!(tones.len(), 7);
        assert!(tones.contains(PitchClass::new(6)));
        assert!(!tones.contains(PitchClass::new(7)));
    }
}
