use rand::Rng;

use crate::report::AllocationDecision;

/// Size of the synthetic set of alternative uses of capital.
pub const REFERENCE_SET_SIZE: usize = 5;
/// Share of the budget each alternative is assumed to put at stake.
pub const STAKE_FRACTION: f64 = 0.1;
const EXPECTED_VALUE_RANGE: std::ops::Range<f64> = 0.1..0.9;

/// Rough counterfactual value forfeited by committing `budget` to `selected`.
///
/// Stochastic by construction; pass a seeded RNG for reproducible numbers.
/// `selected` does not change the estimate, it is the context the estimate
/// is reported against.
pub fn simulate<R: Rng>(selected: &[AllocationDecision], budget: f64, rng: &mut R) -> f64 {
    let estimate: f64 = (0..REFERENCE_SET_SIZE)
        .map(|_| rng.gen_range(EXPECTED_VALUE_RANGE) * budget * STAKE_FRACTION)
        .sum();
    tracing::debug!(selected = selected.len(), budget, estimate, "simulated opportunity cost");
    estimate
}
