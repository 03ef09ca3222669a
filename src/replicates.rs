use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::error::SimulationError;
use crate::marginal::Arg;
use crate::mutation::Haplotypes;
use crate::params::SimulationParameters;
use crate::scheduler::neutral_sample;
use crate::scheduler::simulate_arg;

fn replicate_rng(seed: u64, replicate: usize) -> StdRng {
    StdRng::seed_from_u64(seed.wrapping_add(replicate as u64))
}

/// Simulate `replicates` independent samples in parallel.
///
/// Replicate `i` draws from a generator seeded with `seed + i`,
/// so the output does not depend on how work is scheduled.
pub fn simulate_replicates(
    params: &SimulationParameters,
    seed: u64,
    replicates: usize,
) -> Result<Vec<Haplotypes>, SimulationError> {
    params.validate()?;
    log::debug!("simulating {replicates} replicates from seed {seed}");
    (0..replicates)
        .into_par_iter()
        .map(|i| neutral_sample(params, &mut replicate_rng(seed, i)))
        .collect()
}

/// As [`simulate_replicates`], returning the ARGs without mutations.
pub fn simulate_args(
    params: &SimulationParameters,
    seed: u64,
    replicates: usize,
) -> Result<Vec<Arg>, SimulationError> {
    params.validate()?;
    (0..replicates)
        .into_par_iter()
        .map(|i| simulate_arg(params, &mut replicate_rng(seed, i)))
        .collect()
}
