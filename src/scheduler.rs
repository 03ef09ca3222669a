use crate::chromosome::init_sample;
use crate::chromosome::Chromosome;
use crate::coalescence::coalesce;
use crate::coalescence::pick2;
use crate::coalescence::pick2_in_deme;
use crate::error::SimulationError;
use crate::marginal::Arg;
use crate::mutation::infinite_sites;
use crate::mutation::Haplotypes;
use crate::params::CapacityHints;
use crate::params::SimulationParameters;
use crate::recombination::crossover;
use crate::recombination::integrate_genetic_map;
use crate::recombination::pick_spot;
use crate::recombination::pick_uniform_spot;
use crate::rng::CoalescentRng;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SimulationStatus {
    /// At least one site has more than one ancestral lineage.
    Running,
    Done,
}

/// What happened during one call to [`step`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Event {
    Coalescence {
        time: f64,
        deme: usize,
        lineages_removed: usize,
    },
    Recombination {
        time: f64,
        chromosome: usize,
        breakpoint: i64,
        delta_links: i64,
    },
    /// Time reached a change in population size or the
    /// merging of demes before any event occurred.
    /// `relative_size` is the population size from `time` on.
    Boundary { time: f64, relative_size: f64 },
}

/// The state of one run, from the sample back to the MRCA of every site.
#[derive(Debug, Clone)]
pub struct SimulationState {
    pub(crate) time: f64,
    pub(crate) chromosomes: Vec<Chromosome>,
    pub(crate) total_links: i64,
    pub(crate) arg: Arg,
    // Per-chromosome rates under a recombination map.
    reclens: Vec<f64>,
}

impl SimulationState {
    pub fn new(sample_sizes: &[usize], nsites: i64) -> Self {
        let nsam = sample_sizes.iter().sum::<usize>();
        Self::with_capacity(sample_sizes, nsites, &CapacityHints::for_sample(nsam, 0.0))
    }

    pub fn with_capacity(sample_sizes: &[usize], nsites: i64, capacity: &CapacityHints) -> Self {
        let nsam = sample_sizes.iter().sum::<usize>();
        let mut chromosomes = Vec::with_capacity(std::cmp::max(capacity.max_chromosomes, nsam));
        if nsites > 0 {
            chromosomes.extend(init_sample(sample_sizes, nsites));
        }
        let mut state = Self {
            time: 0.0,
            chromosomes,
            total_links: 0,
            arg: Arg::new(nsam, nsites),
            reclens: vec![],
        };
        state.total_links = state.recount_links();
        state
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn chromosomes(&self) -> &[Chromosome] {
        &self.chromosomes
    }

    pub fn total_links(&self) -> i64 {
        self.total_links
    }

    pub fn arg(&self) -> &Arg {
        &self.arg
    }

    /// The links of every live chromosome, counted from scratch.
    pub fn recount_links(&self) -> i64 {
        self.chromosomes.iter().map(|c| c.links()).sum()
    }

    pub(crate) fn adjust_links(&mut self, delta: i64) {
        self.total_links += delta;
        assert!(
            self.total_links >= 0,
            "total links became negative ({}) at time {}",
            self.total_links,
            self.time
        );
    }

    pub fn status(&self) -> SimulationStatus {
        if self.chromosomes.len() > 1 {
            SimulationStatus::Running
        } else {
            SimulationStatus::Done
        }
    }

    pub fn into_arg(self) -> Arg {
        self.arg
    }
}

// Relative coalescence rate of each deme at the
// current time, for a population of relative size 1.
fn deme_rates(state: &SimulationState, params: &SimulationParameters) -> Vec<f64> {
    let sizes = params.demes().relative_sizes();
    let mut counts = vec![0usize; sizes.len()];
    for chromosome in state.chromosomes.iter() {
        counts[chromosome.population()] += 1;
    }
    counts
        .iter()
        .zip(sizes)
        .map(|(&k, &size)| {
            let k = k as f64;
            k * (k - 1.0) / size
        })
        .collect()
}

fn pick_deme<R: CoalescentRng + ?Sized>(rng: &mut R, rates: &[f64], total: f64) -> usize {
    let r = rng.uniform(0.0, total);
    let mut cumulative = 0.0;
    let mut chosen = 0;
    for (deme, &rate) in rates.iter().enumerate() {
        if rate > 0.0 {
            chosen = deme;
            cumulative += rate;
            if cumulative > r {
                break;
            }
        }
    }
    chosen
}

fn merge_demes(state: &mut SimulationState) {
    for chromosome in state.chromosomes.iter_mut() {
        chromosome.set_population(0);
    }
}

/// Advance `state` to the next event and apply it.
///
/// # Errors
///
/// [`SimulationError::Stalled`] if no event can ever occur.
///
/// # Panics
///
/// If the simulation is already done.
pub fn step<R: CoalescentRng + ?Sized>(
    state: &mut SimulationState,
    params: &SimulationParameters,
    rng: &mut R,
) -> Result<Event, SimulationError> {
    assert_eq!(state.status(), SimulationStatus::Running);

    let history = params.history();
    let rates = deme_rates(state, params);
    let coalescence_rate = rates.iter().sum::<f64>();
    let recombination_rate = match params.recombination_map() {
        Some(map) => integrate_genetic_map(&state.chromosomes, map, &mut state.reclens),
        None => params.rho_per_link() * state.total_links as f64,
    };

    let coalescence_wait = if coalescence_rate > 0.0 {
        history.waiting_time(state.time, rng.exponential(1.0 / coalescence_rate))
    } else {
        f64::INFINITY
    };
    let recombination_wait = if recombination_rate > 0.0 {
        rng.exponential(1.0 / recombination_rate)
    } else {
        f64::INFINITY
    };
    let wait = coalescence_wait.min(recombination_wait);

    let merge_time = params.demes().merge_time().filter(|&t| t > state.time);
    let boundary = match (history.next_change(state.time), merge_time) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    if let Some(boundary) = boundary {
        if state.time + wait >= boundary {
            state.time = boundary;
            if merge_time == Some(boundary) {
                merge_demes(state);
            }
            return Ok(Event::Boundary {
                time: boundary,
                relative_size: history.relative_size(boundary),
            });
        }
    }
    if !wait.is_finite() {
        return Err(SimulationError::Stalled {
            time: state.time,
            lineages: state.chromosomes.len(),
        });
    }

    state.time += wait;
    if coalescence_wait <= recombination_wait {
        let deme = pick_deme(rng, &rates, coalescence_rate);
        let in_deme = state
            .chromosomes
            .iter()
            .filter(|c| c.population() == deme)
            .count();
        let (c1, c2) = if in_deme == state.chromosomes.len() {
            pick2(rng, in_deme)
        } else {
            pick2_in_deme(rng, &state.chromosomes, deme)
        };
        let lineages_removed = coalesce(state, c1, c2);
        Ok(Event::Coalescence {
            time: state.time,
            deme,
            lineages_removed,
        })
    } else {
        let u = rng.uniform01();
        let (chromosome, breakpoint) = match params.recombination_map() {
            Some(map) => pick_spot(
                u,
                recombination_rate,
                &state.reclens,
                &state.chromosomes,
                map,
            ),
            None => pick_uniform_spot(u, state.total_links, &state.chromosomes),
        };
        let delta_links = crossover(state, chromosome, breakpoint);
        Ok(Event::Recombination {
            time: state.time,
            chromosome,
            breakpoint,
            delta_links,
        })
    }
}

/// Run `state` until every site has found its MRCA.
///
/// Returns the number of steps taken.
pub fn evolve<R: CoalescentRng + ?Sized>(
    state: &mut SimulationState,
    params: &SimulationParameters,
    rng: &mut R,
) -> Result<u64, SimulationError> {
    let check_invariants = params.options().check_invariants();
    let mut iterations = 0;
    while state.status() == SimulationStatus::Running {
        if let Some(limit) = params.max_iterations() {
            if iterations >= limit {
                return Err(SimulationError::IterationLimit {
                    limit,
                    time: state.time,
                });
            }
        }
        let time = state.time;
        let event = step(state, params, rng)?;
        iterations += 1;
        log::trace!("{event:?}, {} lineages", state.chromosomes.len());
        if check_invariants {
            assert!(state.time >= time, "time went backwards at {event:?}");
            assert_eq!(
                state.total_links,
                state.recount_links(),
                "link count out of sync after {event:?}"
            );
        }
    }
    Ok(iterations)
}

/// Simulate the ARG of a sample.
pub fn simulate_arg<R: CoalescentRng + ?Sized>(
    params: &SimulationParameters,
    rng: &mut R,
) -> Result<Arg, SimulationError> {
    params.validate()?;
    let mut state = SimulationState::with_capacity(
        params.sample_sizes(),
        params.nsites(),
        &params.capacity(),
    );
    log::debug!(
        "simulating {} samples over {} sites, rho = {}",
        params.sample_size(),
        params.nsites(),
        params.total_rho()
    );
    let iterations = evolve(&mut state, params, rng)?;
    let mut arg = state.into_arg();
    if params.options().check_invariants() {
        if let Err(e) = arg.validate() {
            panic!("simulated ARG is invalid: {e}");
        }
    }
    if params.options().minimize_arg() {
        arg.minimize();
    }
    log::debug!(
        "{iterations} events, {} marginal trees, total time {}",
        arg.len(),
        arg.total_time()
    );
    Ok(arg)
}

/// Simulate an ARG and throw down mutations at rate `theta`.
pub fn neutral_sample<R: CoalescentRng + ?Sized>(
    params: &SimulationParameters,
    rng: &mut R,
) -> Result<Haplotypes, SimulationError> {
    let arg = simulate_arg(params, rng)?;
    Ok(infinite_sites(rng, &arg, params.theta(), &params.capacity()))
}


#[cfg(test)]
mod test_recombination_runs {
    use super::*;
    use crate::SimulationOptions;
    use rand::SeedableRng;

    #[test]
    fn test_arg_is_complete() {
        let params = SimulationParameters::new(vec![10], 100)
            .with_rho(10.0)
            .with_options(SimulationOptions::default().with_invariant_checks());
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let mut max_trees = 0;
        for _ in 0..50 {
            let arg = simulate_arg(&params, &mut rng).unwrap();
            assert_eq!(arg.validate(), Ok(()));
            max_trees = std::cmp::max(max_trees, arg.len());
        }
        assert!(max_trees > 1);
    }

    #[test]
    fn test_step_by_step() {
        let params = SimulationParameters::new(vec![6], 50).with_rho(20.0);
        let mut rng = rand::rngs::StdRng::seed_from_u64(12);
        let mut state = SimulationState::new(params.sample_sizes(), params.nsites());
        assert_eq!(state.total_links(), 6 * 49);
        let mut recombinations = 0;
        let mut time = 0.0;
        while state.status() == SimulationStatus::Running {
            let event = step(&mut state, &params, &mut rng).unwrap();
            if let Event::Recombination { delta_links, .. } = event {
                assert!(delta_links < 0);
                recombinations += 1;
            }
            assert!(state.time() > time);
            time = state.time();
            assert_eq!(state.total_links(), state.recount_links());
        }
        assert!(recombinations > 0);
        assert!(state.chromosomes().len() <= 1);
        assert_eq!(state.into_arg().validate(), Ok(()));
    }

    #[test]
    fn test_breakpoints_only_where_the_map_allows() {
        let mut map = vec![0.0; 99];
        map[49] = 10.0;
        let params = SimulationParameters::new(vec![6], 100)
            .with_recombination_map(map)
            .with_options(SimulationOptions::default().with_invariant_checks());
        let mut rng = rand::rngs::StdRng::seed_from_u64(14);
        let mut split = 0;
        for _ in 0..50 {
            let arg = simulate_arg(&params, &mut rng).unwrap();
            assert_eq!(arg.validate(), Ok(()));
            assert!(arg.trees().iter().all(|t| t.left() == 0 || t.left() == 50));
            if arg.len() == 2 {
                split += 1;
            }
        }
        assert!(split > 25, "{split}");
    }

    #[test]
    fn test_map_events_are_recombinations() {
        let params = SimulationParameters::new(vec![4], 20)
            .with_recombination_map((0..19).map(|j| j as f64).collect());
        let mut rng = rand::rngs::StdRng::seed_from_u64(15);
        let mut state = SimulationState::new(params.sample_sizes(), params.nsites());
        let mut recombinations = 0;
        while state.status() == SimulationStatus::Running {
            if let Event::Recombination { breakpoint, .. } =
                step(&mut state, &params, &mut rng).unwrap()
            {
                // Link 0, between sites 0 and 1, never recombines.
                assert!(breakpoint > 1);
                recombinations += 1;
            }
            assert_eq!(state.total_links(), state.recount_links());
        }
        assert!(recombinations > 0);
        assert_eq!(state.into_arg().validate(), Ok(()));
    }

    #[test]
    fn test_minimized_arg() {
        let options = SimulationOptions::default().with_minimized_arg();
        let params = SimulationParameters::new(vec![4], 200).with_rho(5.0);
        let mut rng = rand::rngs::StdRng::seed_from_u64(13);
        let mut rng_minimized = rng.clone();
        let full = simulate_arg(&params, &mut rng).unwrap();
        let minimized =
            simulate_arg(&params.clone().with_options(options), &mut rng_minimized).unwrap();
        assert!(minimized.len() <= full.len());
        assert_eq!(minimized.validate(), Ok(()));
        assert!((minimized.total_time() - full.total_time()).abs() < 1e-9);
        for site in [0, 50, 100, 199] {
            assert_eq!(
                minimized.tree_at(site).to_newick(),
                full.tree_at(site).to_newick()
            );
        }
    }
}

#[cfg(test)]
mod test_kingman {
    use super::*;
    use crate::ConstantSize;
    use rand::SeedableRng;

    fn mean_tmrca_and_length(params: &SimulationParameters, seed: u64) -> (f64, f64) {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let reps = 10000;
        let mut tmrca = 0.0;
        let mut length = 0.0;
        for _ in 0..reps {
            let arg = simulate_arg(params, &mut rng).unwrap();
            let tree = &arg.trees()[0];
            tmrca += tree.tmrca().unwrap();
            length += tree.total_branch_length();
        }
        (tmrca / reps as f64, length / reps as f64)
    }

    #[test]
    fn test_four_samples() {
        // E[TMRCA] = 1 - 1/n and E[L] = H(n - 1), in units of 4N generations.
        let params = SimulationParameters::new(vec![4], 1);
        let (tmrca, length) = mean_tmrca_and_length(&params, 101);
        assert!((tmrca - 0.75).abs() < 0.03, "{tmrca}");
        assert!((length - 11.0 / 6.0).abs() < 0.06, "{length}");
    }

    #[test]
    fn test_smaller_population() {
        let params = SimulationParameters::new(vec![4], 1)
            .with_history(ConstantSize::new(0.5).unwrap());
        let (tmrca, _) = mean_tmrca_and_length(&params, 102);
        assert!((tmrca - 0.375).abs() < 0.02, "{tmrca}");
    }

    #[test]
    fn test_bottleneck_shortens_trees() {
        let bottleneck = crate::Epochs::new(vec![
            crate::Epoch::constant(0.0, 1.0),
            crate::Epoch::constant(0.05, 0.01),
            crate::Epoch::constant(0.1, 1.0),
        ])
        .unwrap();
        let params = SimulationParameters::new(vec![4], 1);
        let (constant, _) = mean_tmrca_and_length(&params, 103);
        let (shortened, _) = mean_tmrca_and_length(&params.with_history(bottleneck), 103);
        assert!(shortened < constant - 0.2, "{shortened} {constant}");
    }

    #[test]
    fn test_boundary_reports_new_size() {
        let history = crate::Epochs::new(vec![
            crate::Epoch::constant(0.0, 1.0),
            crate::Epoch::constant(1e-6, 0.25),
            crate::Epoch::constant(1e-5, 2.0),
        ])
        .unwrap();
        let params = SimulationParameters::new(vec![2], 1).with_history(history);
        let mut rng = rand::rngs::StdRng::seed_from_u64(104);
        let mut state = SimulationState::new(params.sample_sizes(), params.nsites());
        let mut boundaries = vec![];
        while state.status() == SimulationStatus::Running {
            if let Event::Boundary {
                time,
                relative_size,
            } = step(&mut state, &params, &mut rng).unwrap()
            {
                boundaries.push((time, relative_size));
            }
        }
        assert_eq!(boundaries, vec![(1e-6, 0.25), (1e-5, 2.0)]);
    }
}
