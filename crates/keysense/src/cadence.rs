use crate::types::{Cadence, CadenceKind, ChordSymbol, Key, PitchClass};

/// Chromatic roman numerals by semitones above the tonic.
pub static ROMAN_NUMERALS: [&str; 12] = [
    "I", "bII", "II", "bIII", "III", "IV", "#IV", "V", "bVI", "VI", "bVII", "VII",
];

const DOMINANT: u8 = 7;
const SUBMEDIANT: u8 = 9;

/// Numeral of a root relative to `key`. Quality is ignored.
pub fn roman_numeral(key: &Key, root: PitchClass) -> &'static str {
    ROMAN_NUMERALS[key.degree_of(root) as usize]
}

pub fn roman_numerals(key: &Key, chords: &[ChordSymbol]) -> Vec<String> {
    chords
        .iter()
        .map(|c| roman_numeral(key, c.root).to_string())
        .collect()
}

/// Classify the move between the last two chords.
///
/// V→I is perfect, V→VI deceptive, anything ending on V half. Degrees are
/// semitones above the tonic in either mode. Fewer than two chords yields
/// no cadence at all.
pub fn detect_cadence(key: &Key, chords: &[ChordSymbol]) -> Option<Cadence> {
    let [.., prev, last] = chords else {
        return None;
    };

    let from = key.degree_of(prev.root);
    let to = key.degree_of(last.root);

    let kind = match (from, to) {
        (DOMINANT, 0) => CadenceKind::Perfect,
        (DOMINANT, SUBMEDIANT) => CadenceKind::Deceptive,
        (_, DOMINANT) => CadenceKind::Half,
        _ => CadenceKind::None,
    };

    Some(Cadence {
        kind,
        from: ROMAN_NUMERALS[from as usize].to_string(),
        to: ROMAN_NUMERALS[to as usize].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chords::parse_chords;
    use crate::types::KeyMode;
    use pretty_assertions::assert_eq;

    fn c_major() -> Key {
        Key::new(PitchClass::C, KeyMode::Major)
    }

    fn cadence(key: &Key, tokens: &[&str]) -> Option<Cadence> {
        detect_cadence(key, &parse_chords(tokens).chords)
    }

    #[test]
    fn perfect_cadence() {
        let found = cadence(&c_major(), &["C", "Am", "F", "G", "C"]).unwrap();
        assert_eq!(
            found,
            Cadence {
                kind: CadenceKind::Perfect,
                from: "V".into(),
                to: "I".into(),
            }
        );
    }

    #[test]
    fn deceptive_and_half() {
        assert_eq!(cadence(&c_major(), &["F", "G7", "Am"]).unwrap().kind, CadenceKind::Deceptive);
        assert_eq!(cadence(&c_major(), &["C", "Dm", "G"]).unwrap().kind, CadenceKind::Half);
        assert_eq!(cadence(&c_major(), &["G", "F"]).unwrap().kind, CadenceKind::None);
    }

    #[test]
    fn minor_key_deceptive_uses_the_same_degrees() {
        let a_minor = Key::new(PitchClass::new(9), KeyMode::Minor);

        let found = cadence(&a_minor, &["E", "F#m"]).unwrap();
        assert_eq!(found.kind, CadenceKind::Deceptive);
        assert_eq!((found.from.as_str(), found.to.as_str()), ("V", "VI"));

        let flat_six = cadence(&a_minor, &["Dm", "E7", "F"]).unwrap();
        assert_eq!(flat_six.kind, CadenceKind::None);
        assert_eq!(flat_six.to, "bVI");
    }

    #[test]
    fn too_few_chords() {
        assert_eq!(cadence(&c_major(), &["C"]), None);
        assert_eq!(cadence(&c_major(), &[]), None);
    }

    #[test]
    fn unparseable_tokens_are_dropped_first() {
        // "??" is skipped, so the closing pair is G → C
        assert_eq!(cadence(&c_major(), &["G", "C", "??"]).unwrap().kind, CadenceKind::Perfect);
    }

    #[test]
    fn numerals_ignore_quality() {
        let chords = parse_chords(&["Cmaj7", "Ebm", "F#dim", "Bb7"]).chords;
        assert_eq!(roman_numerals(&c_major(), &chords), vec!["I", "bIII", "#IV", "bVII"]);
    }
}
