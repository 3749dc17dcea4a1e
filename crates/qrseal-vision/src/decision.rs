//! The tamper decision table.
//!
//! Three signals, two accepting rules evaluated in order, first match wins:
//!
//! 1. **primary**: `phash_distance <= 25 && ssim >= 0.15`
//! 2. **fallback**: `phash_distance <= 35 && ssim >= 0.10 && orb_ratio >= 0.05`
//! 3. otherwise tampered.
//!
//! The primary gate absorbs camera-versus-render drift; the fallback accepts
//! moderate drift when enough keypoints still correspond.

use std::fmt;

use crate::primitives::KeypointMatches;

/// Matches with a Hamming distance below this count as good.
pub const GOOD_MATCH_DISTANCE: u32 = 50;

/// Below this many descriptors in either image the ORB ratio is 0.0.
pub const MIN_DESCRIPTORS: usize = 10;

/// Decision thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TamperThresholds {
    pub primary_max_phash: u32,
    pub primary_min_ssim: f64,
    pub fallback_max_phash: u32,
    pub fallback_min_ssim: f64,
    pub fallback_min_orb: f64,
}

impl Default for TamperThresholds {
    fn default() -> Self {
        Self {
            primary_max_phash: 25,
            primary_min_ssim: 0.15,
            fallback_max_phash: 35,
            fallback_min_ssim: 0.10,
            fallback_min_orb: 0.05,
        }
    }
}

/// The raw signals for one comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualSignals {
    pub phash_distance: u32,
    pub ssim: f64,
    pub orb_ratio: f64,
}

/// The accepting rule that matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedRule {
    Primary,
    Fallback,
}

impl MatchedRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchedRule::Primary => "primary",
            MatchedRule::Fallback => "fallback",
        }
    }
}

impl fmt::Display for MatchedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verdict and the rule that produced it. No rule means tampered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub rule: Option<MatchedRule>,
}

impl Decision {
    pub fn tampered(&self) -> bool {
        self.rule.is_none()
    }
}

/// Evaluate the decision table.
pub fn decide(signals: &VisualSignals, thresholds: &TamperThresholds) -> Decision {
    let VisualSignals {
        phash_distance,
        ssim,
        orb_ratio,
    } = *signals;

    let rule = if phash_distance <= thresholds.primary_max_phash
        && ssim >= thresholds.primary_min_ssim
    {
        Some(MatchedRule::Primary)
    } else if phash_distance <= thresholds.fallback_max_phash
        && ssim >= thresholds.fallback_min_ssim
        && orb_ratio >= thresholds.fallback_min_orb
    {
        Some(MatchedRule::Fallback)
    } else {
        None
    };

    Decision { rule }
}

/// Fraction of cross-checked matches whose distance is below
/// [`GOOD_MATCH_DISTANCE`].
///
/// 0.0 when either image produced fewer than [`MIN_DESCRIPTORS`] descriptors.
pub fn orb_ratio(matches: &KeypointMatches) -> f64 {
    if matches.descriptors_a < MIN_DESCRIPTORS || matches.descriptors_b < MIN_DESCRIPTORS {
        return 0.0;
    }
    let good = matches
        .matches
        .iter()
        .filter(|m| m.distance < GOOD_MATCH_DISTANCE)
        .count();
    good as f64 / matches.matches.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::DescriptorMatch;
    use proptest::prelude::*;

    fn run(phash_distance: u32, ssim: f64, orb_ratio: f64) -> Decision {
        decide(
            &VisualSignals {
                phash_distance,
                ssim,
                orb_ratio,
            },
            &TamperThresholds::default(),
        )
    }

    #[test]
    fn test_primary_boundary_inclusive() {
        let d = run(25, 0.15, 0.0);
        assert!(!d.tampered());
        assert_eq!(d.rule, Some(MatchedRule::Primary));
    }

    #[test]
    fn test_primary_phash_just_over() {
        assert!(run(26, 0.15, 0.0).tampered());
    }

    #[test]
    fn test_fallback_recovers() {
        let d = run(30, 0.12, 0.06);
        assert!(!d.tampered());
        assert_eq!(d.rule, Some(MatchedRule::Fallback));
    }

    #[test]
    fn test_phash_beyond_fallback_is_tampered() {
        assert!(run(40, 0.50, 0.90).tampered());
    }

    #[test]
    fn test_fallback_boundaries_inclusive() {
        assert_eq!(run(35, 0.10, 0.05).rule, Some(MatchedRule::Fallback));
        assert!(run(35, 0.10, 0.049).tampered());
        assert!(run(35, 0.099, 0.05).tampered());
        assert!(run(36, 0.10, 0.05).tampered());
    }

    #[test]
    fn test_primary_wins_over_fallback() {
        assert_eq!(run(0, 1.0, 1.0).rule, Some(MatchedRule::Primary));
    }

    #[test]
    fn test_low_ssim_fails_even_with_zero_distance() {
        assert!(run(0, 0.05, 1.0).tampered());
    }

    fn matches_with(distances: &[u32], a: usize, b: usize) -> KeypointMatches {
        KeypointMatches {
            descriptors_a: a,
            descriptors_b: b,
            matches: distances
                .iter()
                .enumerate()
                .map(|(i, &distance)| DescriptorMatch {
                    query: i,
                    train: i,
                    distance,
                })
                .collect(),
        }
    }

    #[test]
    fn test_orb_ratio_counts_good_matches() {
        let m = matches_with(&[0, 10, 49, 50, 80], 20, 20);
        assert!((orb_ratio(&m) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_orb_ratio_too_few_descriptors() {
        assert_eq!(orb_ratio(&matches_with(&[0, 0, 0], 9, 100)), 0.0);
        assert_eq!(orb_ratio(&matches_with(&[0, 0, 0], 100, 9)), 0.0);
    }

    #[test]
    fn test_orb_ratio_no_matches() {
        assert_eq!(orb_ratio(&matches_with(&[], 50, 50)), 0.0);
    }

    proptest! {
        #[test]
        fn prop_better_signals_never_flip_to_tampered(
            phash in 0u32..=64,
            ssim in -1.0f64..=1.0,
            orb in 0.0f64..=1.0,
            phash_gain in 0u32..=64,
            ssim_gain in 0.0f64..=1.0,
            orb_gain in 0.0f64..=1.0,
        ) {
            let before = run(phash, ssim, orb);
            let after = run(
                phash.saturating_sub(phash_gain),
                (ssim + ssim_gain).min(1.0),
                (orb + orb_gain).min(1.0),
            );
            if !before.tampered() {
                prop_assert!(!after.tampered());
            }
        }

        #[test]
        fn prop_orb_ratio_in_unit_range(
            distances in proptest::collection::vec(0u32..=256, 0..64),
            a in 0usize..40,
            b in 0usize..40,
        ) {
            let r = orb_ratio(&matches_with(&distances, a, b));
            prop_assert!((0.0..=1.0).contains(&r));
        }
    }
}
