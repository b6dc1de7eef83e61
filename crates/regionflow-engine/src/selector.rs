// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Near-maximum prediction selection with a seeded tie-break.

use rand::Rng;

use crate::error::{EngineError, EngineResult};

/// Probabilities within this distance of the maximum count as tied
pub const TIE_EPSILON: f64 = 1e-5;

/// Picks one predicted value from a classifier's candidate/probability lists
///
/// A candidate is tied with the best one when `p_max - p < epsilon` (strict). One tied
/// candidate is drawn uniformly with the caller's random source; the source is drawn
/// from even when only one candidate is tied, so the random stream advances once per
/// selection regardless of the distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionSelector {
    epsilon: f64,
}

impl Default for PredictionSelector {
    fn default() -> Self {
        Self {
            epsilon: TIE_EPSILON,
        }
    }
}

impl PredictionSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epsilon(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Indices of candidates tied with the maximum probability, ascending
    ///
    /// # Errors
    ///
    /// - `CandidateLengthMismatch` when the two lists differ in length
    /// - `EmptyCandidateSet` when nothing qualifies (empty input, all-NaN probabilities)
    pub fn tie_set(
        &self,
        candidate_count: usize,
        probabilities: &[f64],
    ) -> EngineResult<Vec<usize>> {
        if candidate_count != probabilities.len() {
            return Err(EngineError::CandidateLengthMismatch {
                candidates: candidate_count,
                probabilities: probabilities.len(),
            });
        }

        let p_max = probabilities
            .iter()
            .copied()
            .filter(|p| !p.is_nan())
            .fold(f64::NEG_INFINITY, f64::max);

        let tied: Vec<usize> = probabilities
            .iter()
            .enumerate()
            // equality covers an infinite maximum, where the difference is NaN
            .filter(|&(_, &p)| p == p_max || p_max - p < self.epsilon)
            .map(|(i, _)| i)
            .collect();

        if tied.is_empty() {
            return Err(EngineError::EmptyCandidateSet {
                candidates: candidate_count,
            });
        }
        Ok(tied)
    }

    /// Select one candidate
    pub fn select<T: Copy, R: Rng + ?Sized>(
        &self,
        candidates: &[T],
        probabilities: &[f64],
        rng: &mut R,
    ) -> EngineResult<T> {
        let tied = self.tie_set(candidates.len(), probabilities)?;
        let pick = tied[rng.gen_range(0..tied.len())];
        Ok(candidates[pick])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_difference_just_above_epsilon_is_not_a_tie() {
        // 0.8 - 0.79999 == 1.0000000000065512e-5 in f64
        let selector = PredictionSelector::default();
        let tied = selector.tie_set(3, &[0.2, 0.79999, 0.8]).unwrap();
        assert_eq!(tied, vec![2]);
    }

    #[test]
    fn test_difference_below_epsilon_is_a_tie() {
        let selector = PredictionSelector::default();
        let tied = selector.tie_set(3, &[0.2, 0.799995, 0.8]).unwrap();
        assert_eq!(tied, vec![1, 2]);
    }

    #[test]
    fn test_exact_tie_never_picks_the_loser() {
        let selector = PredictionSelector::default();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = selector
                .select(&[10, 20, 30], &[0.5, 0.9, 0.9], &mut rng)
                .unwrap();
            assert!(picked == 20 || picked == 30, "seed {seed} picked {picked}");
        }
    }

    #[test]
    fn test_same_seed_same_pick() {
        let selector = PredictionSelector::default();
        let pick = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            selector
                .select(&[1.0, 2.0, 3.0, 4.0], &[0.25; 4], &mut rng)
                .unwrap()
        };
        assert_eq!(pick(1956), pick(1956));
    }

    #[test]
    fn test_infinite_weight_is_the_maximum() {
        let selector = PredictionSelector::default();
        assert_eq!(
            selector.tie_set(3, &[0.5, f64::INFINITY, 0.9]).unwrap(),
            vec![1]
        );
        assert_eq!(
            selector
                .tie_set(3, &[f64::INFINITY, 1.0, f64::INFINITY])
                .unwrap(),
            vec![0, 2]
        );

        let mut rng = StdRng::seed_from_u64(1956);
        let picked = selector
            .select(&[1.0, 2.0], &[0.5, f64::INFINITY], &mut rng)
            .unwrap();
        assert_eq!(picked, 2.0);
    }

    #[test]
    fn test_length_mismatch() {
        let selector = PredictionSelector::default();
        let mut rng = StdRng::seed_from_u64(1);
        let err = selector.select(&[1, 2], &[0.5], &mut rng).unwrap_err();
        assert!(matches!(
            err,
            EngineError::CandidateLengthMismatch {
                candidates: 2,
                probabilities: 1
            }
        ));
    }

    #[test]
    fn test_empty_and_nan_inputs() {
        let selector = PredictionSelector::default();
        assert!(matches!(
            selector.tie_set(0, &[]),
            Err(EngineError::EmptyCandidateSet { candidates: 0 })
        ));
        assert!(matches!(
            selector.tie_set(2, &[f64::NAN, f64::NAN]),
            Err(EngineError::EmptyCandidateSet { candidates: 2 })
        ));
    }

    #[test]
    fn test_single_candidate_still_advances_rng() {
        let selector = PredictionSelector::default();
        let mut drawn = StdRng::seed_from_u64(7);
        selector.select(&[5], &[1.0], &mut drawn).unwrap();

        let mut expected = StdRng::seed_from_u64(7);
        let _ = expected.gen_range(0..1usize);
        assert_eq!(drawn.gen::<u64>(), expected.gen::<u64>());
    }
}
