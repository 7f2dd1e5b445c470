use serde::{Deserialize, Serialize};

use crate::chord_templates::{note_name, FLAT_KEY_ROOTS};

/// One of the 12 equal-tempered pitch classes (C=0 … B=11).
///
/// Always reduced mod 12 on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);

    pub fn new(value: i32) -> Self {
        Self(value.rem_euclid(12) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn transpose(self, semitones: i32) -> Self {
        Self::new(self.0 as i32 + semitones)
    }

    /// Semitones from `self` up to `other`, in 0..12.
    pub fn interval_to(self, other: PitchClass) -> u8 {
        (other.0 + 12 - self.0) % 12
    }

    /// Whether keys on this tonic are conventionally spelled with flats.
    pub fn prefers_flats(self) -> bool {
        FLAT_KEY_ROOTS.contains(&self.0)
    }

    pub fn name(self, use_flats: bool) -> &'static str {
        note_name(self.0, use_flats)
    }
}

impl TryFrom<u8> for PitchClass {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value < 12 {
            Ok(Self(value))
        } else {
            Err(format!("pitch class {} out of range 0..12", value))
        }
    }
}

impl From<PitchClass> for u8 {
    fn from(pc: PitchClass) -> u8 {
        pc.0
    }
}

impl std::fmt::Display for PitchClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name(self.prefers_flats()))
    }
}

/// A set of pitch classes as a 12-bit mask (bit i = pitch class i).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PitchSet(u16);

impl PitchSet {
    pub const EMPTY: PitchSet = PitchSet(0);

    pub const fn from_mask(mask: u16) -> Self {
        Self(mask & 0x0fff)
    }

    /// Build from intervals above `root`.
    pub fn from_intervals(root: PitchClass, intervals: u16) -> Self {
        let mut set = PitchSet::EMPTY;
        for interval in 0..12 {
            if intervals & (1 << interval) != 0 {
                set.insert(root.transpose(interval));
            }
        }
        set
    }

    pub fn mask(self) -> u16 {
        self.0
    }

    pub fn insert(&mut self, pc: PitchClass) {
        self.0 |= 1 << pc.value();
    }

    pub fn contains(self, pc: PitchClass) -> bool {
        self.0 & (1 << pc.value()) != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: PitchSet) -> PitchSet {
        PitchSet(self.0 | other.0)
    }

    pub fn intersection(self, other: PitchSet) -> PitchSet {
        PitchSet(self.0 & other.0)
    }

    pub fn is_subset(self, other: PitchSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = PitchClass> {
        (0..12).filter(move |i| self.0 & (1 << i) != 0).map(PitchClass::new)
    }
}

impl FromIterator<PitchClass> for PitchSet {
    fn from_iter<T: IntoIterator<Item = PitchClass>>(iter: T) -> Self {
        let mut set = PitchSet::EMPTY;
        for pc in iter {
            set.insert(pc);
        }
        set
    }
}

/// 12-bin pitch-class profile, indexed by absolute pitch class (C=0).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PitchClassProfile(pub [f32; 12]);

impl PitchClassProfile {
    pub fn zeros() -> Self {
        Self([0.0; 12])
    }

    pub fn bins(&self) -> &[f32; 12] {
        &self.0
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    /// Scale to sum 1. An all-zero profile stays all zero.
    pub fn normalized(&self) -> Self {
        let total = self.sum();
        if total <= 0.0 {
            return Self::zeros();
        }
        let mut out = [0.0; 12];
        for (o, v) in out.iter_mut().zip(self.0.iter()) {
            *o = v / total;
        }
        Self(out)
    }

    /// Index of the largest bin; the lowest index wins ties.
    pub fn argmax(&self) -> PitchClass {
        let mut best = 0;
        for i in 1..12 {
            if self.0[i] > self.0[best] {
                best = i;
            }
        }
        PitchClass::new(best as i32)
    }

    /// Rotate so that `shift` lands on index 0.
    pub fn rotated(&self, shift: PitchClass) -> [f32; 12] {
        let mut out = [0.0; 12];
        for (i, o) in out.iter_mut().enumerate() {
            *o = self.0[(i + shift.index()) % 12];
        }
        out
    }

    pub fn dot(&self, other: &[f32; 12]) -> f32 {
        self.0.iter().zip(other.iter()).map(|(a, b)| a * b).sum()
    }

    /// Total weight of the bins inside `set`.
    pub fn mass_in(&self, set: PitchSet) -> f32 {
        set.iter().map(|pc| self.0[pc.index()]).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    Major,
    Minor,
}

impl std::fmt::Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

const MAJOR_SCALE_MASK: u16 = 0b1010_1011_0101; // 0 2 4 5 7 9 11
const NATURAL_MINOR_SCALE_MASK: u16 = 0b0101_1010_1101; // 0 2 3 5 7 8 10

/// A tonic plus mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub tonic: PitchClass,
    pub mode: KeyMode,
}

impl Key {
    pub fn new(tonic: PitchClass, mode: KeyMode) -> Self {
        Self { tonic, mode }
    }

    /// All 24 keys in enumeration order: tonic 0..11, Major before Minor.
    pub fn all() -> impl Iterator<Item = Key> {
        (0..12).flat_map(|t| {
            let tonic = PitchClass::new(t);
            [Key::new(tonic, KeyMode::Major), Key::new(tonic, KeyMode::Minor)]
        })
    }

    /// The mode's 7-note diatonic scale.
    pub fn scale(&self) -> PitchSet {
        let mask = match self.mode {
            KeyMode::Major => MAJOR_SCALE_MASK,
            KeyMode::Minor => NATURAL_MINOR_SCALE_MASK,
        };
        PitchSet::from_intervals(self.tonic, mask)
    }

    /// Scale degree (semitones above the tonic) of a pitch class.
    pub fn degree_of(&self, pc: PitchClass) -> u8 {
        self.tonic.interval_to(pc)
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.tonic, self.mode)
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Suspended4,
    Suspended2,
    Dominant7,
    Major7,
    Minor7,
    MinorMajor7,
    Diminished7,
    HalfDiminished7,
    Major6,
    Minor6,
    Add9,
    Power,
}

impl ChordQuality {
    /// Suffix for chord symbol display
    pub fn suffix(&self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "aug",
            ChordQuality::Suspended4 => "sus4",
            ChordQuality::Suspended2 => "sus2",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "m7",
            ChordQuality::MinorMajor7 => "m(maj7)",
            ChordQuality::Diminished7 => "dim7",
            ChordQuality::HalfDiminished7 => "m7b5",
            ChordQuality::Major6 => "6",
            ChordQuality::Minor6 => "m6",
            ChordQuality::Add9 => "add9",
            ChordQuality::Power => "5",
        }
    }
}

/// A parsed chord symbol such as `F#m7` or `C/E`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordSymbol {
    /// The token as written by the caller.
    pub token: String,
    pub root: PitchClass,
    pub quality: ChordQuality,
    pub bass: Option<PitchClass>,
}

impl ChordSymbol {
    /// Interval mask above the root (bit i = interval i).
    pub fn intervals(&self) -> u16 {
        crate::chord_templates::template_for(self.quality).intervals
    }

    /// Every sounding tone as absolute pitch classes. The slash bass is not included.
    pub fn tones(&self) -> PitchSet {
        PitchSet::from_intervals(self.root, self.intervals())
    }

    /// Root, third, fifth and seventh when present; added sixths and ninths are left out.
    pub fn chord_tones(&self) -> PitchSet {
        PitchSet::from_intervals(self.root, crate::chord_templates::template_for(self.quality).chord_tones())
    }

    /// Canonical spelling, e.g. `Bbm7/F`.
    pub fn symbol(&self) -> String {
        let flats = self.root.prefers_flats();
        let mut out = format!("{}{}", self.root.name(flats), self.quality.suffix());
        if let Some(bass) = self.bass {
            out.push('/');
            out.push_str(bass.name(flats));
        }
        out
    }
}

/// A ranked key hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyCandidate {
    pub tonic: PitchClass,
    pub mode: KeyMode,
    /// Display label, e.g. "A minor"
    pub label: String,
    /// 0–100
    pub confidence: u8,
    /// Always starts with "diatonic fit N%"
    pub reasons: Vec<String>,
}

impl KeyCandidate {
    pub fn key(&self) -> Key {
        Key::new(self.tonic, self.mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    Major,
    Lydian,
    Mixolydian,
    MajorPentatonic,
    NaturalMinor,
    Dorian,
    Phrygian,
    HarmonicMinor,
    MelodicMinor,
    MinorPentatonic,
}

impl ScaleType {
    /// Intervals above the root.
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            ScaleType::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScaleType::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            ScaleType::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            ScaleType::MajorPentatonic => &[0, 2, 4, 7, 9],
            ScaleType::NaturalMinor => &[0, 2, 3, 5, 7, 8, 10],
            ScaleType::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            ScaleType::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            ScaleType::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            ScaleType::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            ScaleType::MinorPentatonic => &[0, 3, 5, 7, 10],
        }
    }

    pub fn tones(&self, root: PitchClass) -> PitchSet {
        self.intervals()
            .iter()
            .map(|&i| root.transpose(i as i32))
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScaleType::Major => "major",
            ScaleType::Lydian => "lydian",
            ScaleType::Mixolydian => "mixolydian",
            ScaleType::MajorPentatonic => "major pentatonic",
            ScaleType::NaturalMinor => "natural minor",
            ScaleType::Dorian => "dorian",
            ScaleType::Phrygian => "phrygian",
            ScaleType::HarmonicMinor => "harmonic minor",
            ScaleType::MelodicMinor => "melodic minor",
            ScaleType::MinorPentatonic => "minor pentatonic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleCandidate {
    /// Same as the enclosing key's tonic
    pub root: PitchClass,
    pub scale: ScaleType,
    /// Display label, e.g. "D dorian"
    pub label: String,
    /// 0–100
    pub score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceKind {
    Perfect,
    Deceptive,
    Half,
    None,
}

/// Classification of the closing move of a progression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence {
    pub kind: CadenceKind,
    /// Roman numeral of the penultimate chord root
    pub from: String,
    /// Roman numeral of the final chord root
    pub to: String,
}

/// Result of a full audio analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioAnalysis {
    /// Folded, normalized pitch-class profile
    pub pcp12: [f32; 12],
    /// 0.0–1.0
    pub confidence: f32,
    pub key_candidates: Vec<KeyCandidate>,
    pub scale_candidates: Vec<ScaleCandidate>,
    /// Weighted per-frame root votes
    pub root_votes: [f32; 12],
    pub estimated_root: Option<PitchClass>,
    pub estimated_mode: Option<KeyMode>,
    /// Analysed length after clamping
    pub length_sec: f32,
    pub frames_analyzed: usize,
    pub frames_skipped: usize,
}

/// Result of ranking a precomputed profile (the service wire shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcpAnalysis {
    /// 0.0–1.0
    pub conf: f32,
    pub length_sec: f32,
    pub key_candidates: Vec<KeyCandidate>,
    pub scale_candidates: Vec<ScaleCandidate>,
    /// Pitch classes the scale scorer treated as present
    pub salient_tones: Vec<PitchClass>,
}

/// Result of analysing a chord progression.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionAnalysis {
    /// Canonical spellings of the chords that parsed
    pub chords: Vec<String>,
    /// Tokens that failed to parse
    pub skipped: Vec<String>,
    pub key_candidates: Vec<KeyCandidate>,
    pub scale_candidates: Vec<ScaleCandidate>,
    pub cadence: Option<Cadence>,
    /// Roman numerals relative to the top key
    pub numerals: Vec<String>,
}
