//! Chord symbol parsing using winnow combinators.

use tracing::debug;
use winnow::combinator::{alt, opt};
use winnow::prelude::*;
use winnow::token::one_of;

use crate::chord_templates::lookup_quality;
use crate::error::ChordParseError;
use crate::types::{ChordQuality, ChordSymbol, PitchClass};

type PResult<T> = winnow::ModalResult<T>;

/// Parse a note letter (either case) into its natural pitch class.
fn parse_letter(input: &mut &str) -> PResult<i32> {
    let c = one_of(['C', 'D', 'E', 'F', 'G', 'A', 'B', 'c', 'd', 'e', 'f', 'g', 'a', 'b'])
        .parse_next(input)?;
    match c.to_ascii_uppercase() {
        'C' => Ok(0),
        'D' => Ok(2),
        'E' => Ok(4),
        'F' => Ok(5),
        'G' => Ok(7),
        'A' => Ok(9),
        'B' => Ok(11),
        _ => unreachable!(), // one_of already validated the character
    }
}

/// Parse a single accidental (#, b, ♯, ♭) as a semitone offset.
fn parse_accidental(input: &mut &str) -> PResult<i32> {
    alt(("#".value(1), "♯".value(1), "b".value(-1), "♭".value(-1))).parse_next(input)
}

/// Parse a root: letter plus optional accidental.
pub fn parse_root(input: &mut &str) -> PResult<PitchClass> {
    let natural = parse_letter.parse_next(input)?;
    let shift = opt(parse_accidental).parse_next(input)?.unwrap_or(0);
    Ok(PitchClass::new(natural + shift))
}

/// Parse a bare note name such as "Eb". Trailing text is rejected.
pub fn parse_note(text: &str) -> Option<PitchClass> {
    let mut input = text.trim();
    let pc = parse_root.parse_next(&mut input).ok()?;
    input.is_empty().then_some(pc)
}

/// Parse a chord symbol such as `F#m7`, `Bbmaj7` or `C/E`.
///
/// Only a missing root (or an unreadable slash bass) is an error. An
/// unrecognized quality tag falls back to minor when it starts with `m`
/// (but not `maj`), otherwise to major.
pub fn parse_chord(token: &str) -> Result<ChordSymbol, ChordParseError> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(ChordParseError::new(token, "empty token"));
    }

    let (main, bass_text) = match trimmed.split_once('/') {
        Some((main, bass)) => (main.trim(), Some(bass.trim())),
        None => (trimmed, None),
    };

    let mut rest = main;
    let root = parse_root
        .parse_next(&mut rest)
        .map_err(|_| ChordParseError::new(token, "no root note"))?;

    let quality = parse_quality(rest.trim());

    let bass = match bass_text {
        Some(text) => Some(parse_note(text).ok_or_else(|| {
            ChordParseError::new(token, format!("bad bass note '{}'", text))
        })?),
        None => None,
    };

    Ok(ChordSymbol {
        token: trimmed.to_string(),
        root,
        quality,
        bass,
    })
}

fn parse_quality(tag: &str) -> ChordQuality {
    if let Some(quality) = lookup_quality(tag) {
        return quality;
    }

    let fallback = if tag.starts_with('m') && !tag.starts_with("maj") {
        ChordQuality::Minor
    } else {
        ChordQuality::Major
    };
    debug!(tag, ?fallback, "unrecognized chord quality");
    fallback
}

/// Split free text such as `"C G | Am, F"` into chord tokens.
pub fn tokenize_progression(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == '|')
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != "-")
        .map(String::from)
        .collect()
}

/// Chords that parsed, plus the tokens that did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedProgression {
    pub chords: Vec<ChordSymbol>,
    pub skipped: Vec<String>,
}

/// Parse every token, dropping the ones that fail.
pub fn parse_chords<S: AsRef<str>>(tokens: &[S]) -> ParsedProgression {
    let mut parsed = ParsedProgression::default();

    for token in tokens {
        match parse_chord(token.as_ref()) {
            Ok(chord) => parsed.chords.push(chord),
            Err(e) => {
                debug!(error = %e, "skipping chord token");
                parsed.skipped.push(token.as_ref().to_string());
            }
        }
    }

    parsed
}
