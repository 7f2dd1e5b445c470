use crate::types::ChordQuality;

/// A chord template: quality enum + interval set from root (as bitmask over 12 pitch classes).
pub struct ChordTemplate {
    pub quality: ChordQuality,
    pub intervals: u16, // bitmask: bit i set means interval i is in the template
    /// Colour tones (the sixth of 6 chords, the ninth of add9) that sound but
    /// are not root, third, fifth or seventh.
    pub added: u16,
}

const fn mask(intervals: &[u8]) -> u16 {
    let mut mask = 0u16;
    let mut i = 0;
    while i < intervals.len() {
        mask |= 1 << intervals[i];
        i += 1;
    }
    mask
}

impl ChordTemplate {
    const fn new(quality: ChordQuality, intervals: &[u8]) -> Self {
        Self {
            quality,
            intervals: mask(intervals),
            added: 0,
        }
    }

    const fn with_added(quality: ChordQuality, intervals: &[u8], added: &[u8]) -> Self {
        Self {
            quality,
            intervals: mask(intervals),
            added: mask(added),
        }
    }

    /// Root, third (or suspension), fifth and seventh only.
    pub fn chord_tones(&self) -> u16 {
        self.intervals & !self.added
    }
}

/// Interval sets for every quality the parser recognizes.
pub static TEMPLATES: &[ChordTemplate] = &[
    ChordTemplate::new(ChordQuality::Major, &[0, 4, 7]),
    ChordTemplate::new(ChordQuality::Minor, &[0, 3, 7]),
    ChordTemplate::new(ChordQuality::Diminished, &[0, 3, 6]),
    ChordTemplate::new(ChordQuality::Augmented, &[0, 4, 8]),
    ChordTemplate::new(ChordQuality::Suspended4, &[0, 5, 7]),
    ChordTemplate::new(ChordQuality::Suspended2, &[0, 2, 7]),
    ChordTemplate::new(ChordQuality::Dominant7, &[0, 4, 7, 10]),
    ChordTemplate::new(ChordQuality::Major7, &[0, 4, 7, 11]),
    ChordTemplate::new(ChordQuality::Minor7, &[0, 3, 7, 10]),
    ChordTemplate::new(ChordQuality::MinorMajor7, &[0, 3, 7, 11]),
    ChordTemplate::new(ChordQuality::Diminished7, &[0, 3, 6, 9]),
    ChordTemplate::new(ChordQuality::HalfDiminished7, &[0, 3, 6, 10]),
    ChordTemplate::with_added(ChordQuality::Major6, &[0, 4, 7, 9], &[9]),
    ChordTemplate::with_added(ChordQuality::Minor6, &[0, 3, 7, 9], &[9]),
    ChordTemplate::with_added(ChordQuality::Add9, &[0, 2, 4, 7], &[2]),
    ChordTemplate::new(ChordQuality::Power, &[0, 7]),
];

/// Quality spellings accepted after the root, matched exactly.
static QUALITY_ALIASES: &[(&str, ChordQuality)] = &[
    ("", ChordQuality::Major),
    ("maj", ChordQuality::Major),
    ("M", ChordQuality::Major),
    ("m", ChordQuality::Minor),
    ("min", ChordQuality::Minor),
    ("-", ChordQuality::Minor),
    ("7", ChordQuality::Dominant7),
    ("dom7", ChordQuality::Dominant7),
    ("maj7", ChordQuality::Major7),
    ("M7", ChordQuality::Major7),
    ("Δ", ChordQuality::Major7),
    ("Δ7", ChordQuality::Major7),
    ("m7", ChordQuality::Minor7),
    ("min7", ChordQuality::Minor7),
    ("-7", ChordQuality::Minor7),
    ("dim", ChordQuality::Diminished),
    ("°", ChordQuality::Diminished),
    ("o", ChordQuality::Diminished),
    ("aug", ChordQuality::Augmented),
    ("+", ChordQuality::Augmented),
    ("sus2", ChordQuality::Suspended2),
    ("sus4", ChordQuality::Suspended4),
    ("sus", ChordQuality::Suspended4),
    ("6", ChordQuality::Major6),
    ("m6", ChordQuality::Minor6),
    ("dim7", ChordQuality::Diminished7),
    ("°7", ChordQuality::Diminished7),
    ("o7", ChordQuality::Diminished7),
    ("m7b5", ChordQuality::HalfDiminished7),
    ("ø", ChordQuality::HalfDiminished7),
    ("ø7", ChordQuality::HalfDiminished7),
    ("mmaj7", ChordQuality::MinorMajor7),
    ("m(maj7)", ChordQuality::MinorMajor7),
    ("add9", ChordQuality::Add9),
    ("5", ChordQuality::Power),
];

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const NOTE_NAMES_FLAT: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Pitch classes conventionally spelled with flats.
pub static FLAT_KEY_ROOTS: [u8; 6] = [1, 3, 5, 6, 8, 10];

pub fn note_name(pitch_class: u8, use_flats: bool) -> &'static str {
    let idx = (pitch_class % 12) as usize;
    if use_flats {
        NOTE_NAMES_FLAT[idx]
    } else {
        NOTE_NAMES_SHARP[idx]
    }
}

pub fn template_for(quality: ChordQuality) -> &'static ChordTemplate {
    TEMPLATES
        .iter()
        .find(|t| t.quality == quality)
        .unwrap_or(&TEMPLATES[0])
}

/// Exact lookup of a quality tag.
pub fn lookup_quality(tag: &str) -> Option<ChordQuality> {
    QUALITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == tag)
        .map(|(_, quality)| *quality)
}
