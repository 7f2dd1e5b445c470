use crate::types::PitchClassProfile;

/// Weight of the perfect fifth above a candidate root.
pub const FIFTH_WEIGHT: f32 = 0.60;
/// Weight of the major third above a candidate root.
pub const MAJOR_THIRD_WEIGHT: f32 = 0.35;
/// Weight of the minor third above a candidate root.
pub const MINOR_THIRD_WEIGHT: f32 = 0.25;

/// Fold harmonic neighbours back onto their roots, then renormalize.
///
/// `folded[i] = p[i] + 0.60·p[i+7] + 0.35·p[i+4] + 0.25·p[i+3]` (mod 12).
/// Energy at a fundamental's fifth and thirds reinforces the fundamental
/// instead of posing as a competing root.
pub fn fold(profile: &[f32; 12]) -> [f32; 12] {
    let mut folded = [0.0f32; 12];
    for (i, out) in folded.iter_mut().enumerate() {
        *out = profile[i]
            + FIFTH_WEIGHT * profile[(i + 7) % 12]
            + MAJOR_THIRD_WEIGHT * profile[(i + 4) % 12]
            + MINOR_THIRD_WEIGHT * profile[(i + 3) % 12];
    }
    PitchClassProfile(folded).normalized().0
}

pub fn fold_profile(profile: &PitchClassProfile) -> PitchClassProfile {
    PitchClassProfile(fold(&profile.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triad(pcs: [usize; 3]) -> PitchClassProfile {
        let mut bins = [0.0; 12];
        for pc in pcs {
            bins[pc] = 1.0;
        }
        PitchClassProfile(bins).normalized()
    }

    #[test]
    fn folded_profile_sums_to_one() {
        let folded = fold_profile(&triad([0, 4, 7]));
        assert!((folded.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn fifth_reinforces_root() {
        // C and G: C receives 0.6 of G, G receives nothing from C
        let mut bins = [0.0; 12];
        bins[0] = 0.5;
        bins[7] = 0.5;
        let folded = fold(&bins);
        assert!(folded[0] > folded[7]);
        assert_eq!(PitchClassProfile(folded).argmax().value(), 0);
    }

    #[test]
    fn c_major_triad_folds_onto_c() {
        let folded = fold_profile(&triad([0, 4, 7]));
        assert_eq!(folded.argmax().value(), 0);
    }

    #[test]
    fn folding_twice_keeps_argmax() {
        for pcs in [[0, 4, 7], [9, 0, 4], [7, 11, 2], [2, 5, 9]] {
            let once = fold_profile(&triad(pcs));
            let twice = fold_profile(&once);
            assert_eq!(once.argmax(), twice.argmax(), "triad {:?}", pcs);
        }
    }

    #[test]
    fn zero_profile_folds_to_zero() {
        assert_eq!(fold(&[0.0; 12]), [0.0; 12]);
    }
}
