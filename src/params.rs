use std::sync::Arc;

use crate::demography::ConstantSize;
use crate::demography::DemeStructure;
use crate::demography::PopulationHistory;
use crate::error::ParameterError;
use crate::flags::SimulationOptions;

/// Initial sizes of the buffers used during a run.
///
/// These only affect allocation.  Buffers grow
/// as needed when a hint is too small.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityHints {
    /// Initial number of segregating sites reserved by the mutation overlay.
    pub max_segsites: usize,
    /// Number of sites added each time the overlay runs out of room.
    pub segsites_increment: usize,
    /// Initial number of live chromosomes reserved by the scheduler.
    pub max_chromosomes: usize,
}

impl CapacityHints {
    /// Sizing for a sample of `sample_size` with recombination rate `rho`.
    ///
    /// The expected number of recombination events
    /// is about `rho * H(n - 1)`; five times that is reserved.
    pub fn for_sample(sample_size: usize, rho: f64) -> Self {
        let harmonic = (1..sample_size).map(|i| 1.0 / i as f64).sum::<f64>();
        let expected = (5.0 * rho * harmonic).ceil();
        let extra = if expected.is_finite() && expected > 0.0 {
            expected as usize
        } else {
            0
        };
        Self {
            max_segsites: 200,
            segsites_increment: 100,
            max_chromosomes: sample_size + extra,
        }
    }
}

/// Everything needed to simulate one replicate.
///
/// ```
/// use coalescent_arg::{DemeStructure, SimulationParameters};
///
/// let params = SimulationParameters::new(vec![5, 5], 100)
///     .with_rho(2.0)
///     .with_demes(DemeStructure::new(vec![1.0, 0.5]).with_merge_time(0.25));
/// assert!(params.validate().is_ok());
/// assert_eq!(params.sample_size(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct SimulationParameters {
    sample_sizes: Vec<usize>,
    nsites: i64,
    theta: f64,
    rho: f64,
    recombination_map: Option<Vec<f64>>,
    demes: DemeStructure,
    history: Arc<dyn PopulationHistory>,
    options: SimulationOptions,
    capacity: Option<CapacityHints>,
    max_iterations: Option<u64>,
}

impl SimulationParameters {
    /// `sample_sizes[i]` chromosomes are sampled from deme `i`.
    ///
    /// All demes start with relative size 1, the population size is
    /// constant, and both mutation and recombination are off.
    pub fn new(sample_sizes: Vec<usize>, nsites: i64) -> Self {
        let demes = DemeStructure::new(vec![1.0; sample_sizes.len()]);
        Self {
            sample_sizes,
            nsites,
            theta: 0.0,
            rho: 0.0,
            recombination_map: None,
            demes,
            history: Arc::new(ConstantSize::default()),
            options: SimulationOptions::default(),
            capacity: None,
            max_iterations: None,
        }
    }

    pub fn with_theta(self, theta: f64) -> Self {
        Self { theta, ..self }
    }

    pub fn with_rho(self, rho: f64) -> Self {
        Self { rho, ..self }
    }

    /// Recombine link `j`, between sites `j` and `j + 1`, at rate
    /// `map[j]` instead of spreading `rho` evenly over the links.
    ///
    /// The map replaces `rho`, so it needs `nsites - 1` entries.
    pub fn with_recombination_map(self, map: Vec<f64>) -> Self {
        Self {
            recombination_map: Some(map),
            ..self
        }
    }

    pub fn with_demes(self, demes: DemeStructure) -> Self {
        Self { demes, ..self }
    }

    pub fn with_history<H: PopulationHistory + 'static>(self, history: H) -> Self {
        Self {
            history: Arc::new(history),
            ..self
        }
    }

    pub fn with_options(self, options: SimulationOptions) -> Self {
        Self { options, ..self }
    }

    pub fn with_capacity(self, capacity: CapacityHints) -> Self {
        Self {
            capacity: Some(capacity),
            ..self
        }
    }

    /// Fail a run with [`crate::SimulationError::IterationLimit`]
    /// once it has processed `max_iterations` events.
    pub fn with_max_iterations(self, max_iterations: u64) -> Self {
        Self {
            max_iterations: Some(max_iterations),
            ..self
        }
    }

    pub fn sample_sizes(&self) -> &[usize] {
        &self.sample_sizes
    }

    pub fn sample_size(&self) -> usize {
        self.sample_sizes.iter().sum()
    }

    pub fn nsites(&self) -> i64 {
        self.nsites
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn recombination_map(&self) -> Option<&[f64]> {
        self.recombination_map.as_deref()
    }

    /// Recombination rate over the whole region: the sum of
    /// the map when there is one, else `rho`.
    pub fn total_rho(&self) -> f64 {
        match &self.recombination_map {
            Some(map) => map.iter().sum(),
            None => self.rho,
        }
    }

    pub fn demes(&self) -> &DemeStructure {
        &self.demes
    }

    pub fn history(&self) -> &dyn PopulationHistory {
        self.history.as_ref()
    }

    pub fn options(&self) -> SimulationOptions {
        self.options
    }

    pub fn max_iterations(&self) -> Option<u64> {
        self.max_iterations
    }

    /// The hints passed to [`with_capacity`](Self::with_capacity),
    /// or [`CapacityHints::for_sample`].
    pub fn capacity(&self) -> CapacityHints {
        self.capacity
            .unwrap_or_else(|| CapacityHints::for_sample(self.sample_size(), self.total_rho()))
    }

    /// Recombination rate between adjacent sites.
    /// Zero when there is at most one site.
    pub fn rho_per_link(&self) -> f64 {
        if self.nsites < 2 {
            0.0
        } else {
            self.rho / (self.nsites - 1) as f64
        }
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.sample_sizes.is_empty() {
            return Err(ParameterError::EmptySampleConfiguration);
        }
        if self.sample_size() == 0 {
            return Err(ParameterError::ZeroSampleSize);
        }
        if self.nsites < 0 {
            return Err(ParameterError::NegativeSites(self.nsites));
        }
        for (name, value) in [("theta", self.theta), ("rho", self.rho)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ParameterError::InvalidRate { name, value });
            }
        }
        if let Some(map) = &self.recombination_map {
            let expected = std::cmp::max(self.nsites - 1, 0) as usize;
            if map.len() != expected {
                return Err(ParameterError::RecombinationMapLength {
                    nsites: self.nsites,
                    expected,
                    found: map.len(),
                });
            }
            if let Some((link, &value)) = map
                .iter()
                .enumerate()
                .find(|(_, value)| !value.is_finite() || **value < 0.0)
            {
                return Err(ParameterError::InvalidLinkRate { link, value });
            }
        }
        self.demes.validate(&self.sample_sizes)
    }
}
