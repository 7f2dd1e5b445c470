//! Per-frame root voting.
//!
//! Each non-silent frame is folded and matched against every rotation of
//! the major and minor key templates. The winning rotation casts a vote for
//! its root, weighted by the frame's cadence weight.

use tracing::debug;

use crate::chroma::FrameChroma;
use crate::fold::fold_profile;
use crate::key::{MAJOR_PROFILE, MINOR_PROFILE};
use crate::types::{KeyMode, PitchClass, PitchClassProfile};

/// Best template rotation for one profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatch {
    pub shift: PitchClass,
    pub mode: KeyMode,
    pub score: f32,
}

/// Try all 12 shifts against both templates. Earlier shifts win ties, and
/// major wins a tie with minor at the same shift.
pub fn best_rotation(profile: &PitchClassProfile) -> RotationMatch {
    let mut best = RotationMatch {
        shift: PitchClass::C,
        mode: KeyMode::Major,
        score: f32::NEG_INFINITY,
    };

    for shift in 0..12 {
        let shift = PitchClass::new(shift);
        let rotated = PitchClassProfile(profile.rotated(shift));

        let major = rotated.dot(&MAJOR_PROFILE);
        if major > best.score {
            best = RotationMatch { shift, mode: KeyMode::Major, score: major };
        }
        let minor = rotated.dot(&MINOR_PROFILE);
        if minor > best.score {
            best = RotationMatch { shift, mode: KeyMode::Minor, score: minor };
        }
    }

    best
}

/// Weighted root votes across a capture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsensusVote {
    /// Total weight per root
    pub votes: [f32; 12],
    /// Weight per root from frames won by the major template
    pub major: [f32; 12],
    /// Weight per root from frames won by the minor template
    pub minor: [f32; 12],
    pub root: Option<PitchClass>,
    pub mode: Option<KeyMode>,
    /// Winning root's fraction of all votes, 0.0–1.0
    pub share: f32,
}

impl ConsensusVote {
    pub fn total(&self) -> f32 {
        self.votes.iter().sum()
    }
}

/// Tally votes from every frame. No frames means no root.
pub fn vote(frames: &[FrameChroma]) -> ConsensusVote {
    let mut tally = ConsensusVote::default();

    for frame in frames {
        let folded = fold_profile(&frame.profile);
        if folded.sum() <= 0.0 {
            continue;
        }
        let best = best_rotation(&folded);
        let idx = best.shift.index();
        tally.votes[idx] += frame.weight;
        match best.mode {
            KeyMode::Major => tally.major[idx] += frame.weight,
            KeyMode::Minor => tally.minor[idx] += frame.weight,
        }
    }

    let total = tally.total();
    if total <= 0.0 {
        return tally;
    }

    let root = PitchClassProfile(tally.votes).argmax();
    let mode = if tally.minor[root.index()] > tally.major[root.index()] {
        KeyMode::Minor
    } else {
        KeyMode::Major
    };
    tally.share = tally.votes[root.index()] / total;
    tally.root = Some(root);
    tally.mode = Some(mode);

    debug!(root = %root, %mode, share = tally.share, "frame consensus");
    tally
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(pcs: &[usize]) -> PitchClassProfile {
        let mut bins = [0.0; 12];
        for &pc in pcs {
            bins[pc] = 1.0;
        }
        PitchClassProfile(bins).normalized()
    }

    fn make_frame(index: usize, pcs: &[usize], weight: f32) -> FrameChroma {
        let p = profile(pcs);
        FrameChroma {
            index,
            start_sec: index as f32 * 0.05,
            weight,
            energy: p.0,
            profile: p,
        }
    }

    #[test]
    fn folded_c_major_triad_votes_c() {
        let folded = fold_profile(&profile(&[0, 4, 7]));
        let best = best_rotation(&folded);
        assert_eq!(best.shift, PitchClass::C);
        assert_eq!(best.mode, KeyMode::Major);
    }

    #[test]
    fn rotation_follows_transposition() {
        // Same triad shape on G
        let folded = fold_profile(&profile(&[7, 11, 2]));
        assert_eq!(best_rotation(&folded).shift.value(), 7);
    }

    #[test]
    fn votes_are_weighted() {
        let frames = vec![
            make_frame(0, &[0, 4, 7], 1.0),
            make_frame(1, &[0, 4, 7], 1.0),
            make_frame(2, &[7, 11, 2], 3.2),
        ];
        let tally = vote(&frames);
        assert_eq!(tally.root, Some(PitchClass::new(7)));
        assert!((tally.votes[0] - 2.0).abs() < 1e-6);
        assert!((tally.share - 3.2 / 5.2).abs() < 1e-6);
    }

    #[test]
    fn no_frames_no_root() {
        let tally = vote(&[]);
        assert_eq!(tally.root, None);
        assert_eq!(tally.mode, None);
        assert_eq!(tally.share, 0.0);
    }
}
