use crate::error::ParameterError;

/// Population size as a function of time, relative to
/// the size used to scale time.
///
/// Coalescence rates are inversely proportional to size.
/// Implementations must be memoryless within an epoch so that the
/// scheduler can restart its waiting times at each [`next_change`].
///
/// [`next_change`]: PopulationHistory::next_change
pub trait PopulationHistory: std::fmt::Debug + Send + Sync {
    fn relative_size(&self, time: f64) -> f64;

    /// The first time after `time` at which the size
    /// stops following the current epoch's law.
    fn next_change(&self, time: f64) -> Option<f64>;

    /// Convert a waiting time drawn for a population of
    /// relative size 1 into the waiting time starting at `time`.
    ///
    /// Returns infinity if no event would ever occur.
    fn waiting_time(&self, time: f64, unit_wait: f64) -> f64;
}

/// A population whose size never changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSize {
    size: f64,
}

impl ConstantSize {
    pub fn new(size: f64) -> Result<Self, ParameterError> {
        if size.is_finite() && size > 0.0 {
            Ok(Self { size })
        } else {
            Err(ParameterError::InvalidEpochs(
                "population size must be finite and positive",
            ))
        }
    }
}

impl Default for ConstantSize {
    fn default() -> Self {
        Self { size: 1.0 }
    }
}

impl PopulationHistory for ConstantSize {
    fn relative_size(&self, _time: f64) -> f64 {
        self.size
    }

    fn next_change(&self, _time: f64) -> Option<f64> {
        None
    }

    fn waiting_time(&self, _time: f64, unit_wait: f64) -> f64 {
        unit_wait * self.size
    }
}

/// One piece of a piecewise population history.
///
/// Starting at `start`, the size is `size * exp(-growth_rate * (t - start))`,
/// so a positive rate is a population that grows forward in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Epoch {
    start: f64,
    size: f64,
    growth_rate: f64,
}

impl Epoch {
    pub fn constant(start: f64, size: f64) -> Self {
        Self::exponential(start, size, 0.0)
    }

    pub fn exponential(start: f64, size: f64, growth_rate: f64) -> Self {
        Self {
            start,
            size,
            growth_rate,
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    fn size_at(&self, time: f64) -> f64 {
        if self.growth_rate == 0.0 {
            self.size
        } else {
            self.size * (-self.growth_rate * (time - self.start)).exp()
        }
    }

    fn waiting_time(&self, time: f64, unit_wait: f64) -> f64 {
        let size = self.size_at(time);
        if self.growth_rate == 0.0 {
            return unit_wait * size;
        }
        // Solve integral_0^dt exp(g * x) / size dx = unit_wait for dt.
        let x = 1.0 + self.growth_rate * size * unit_wait;
        if x > 0.0 {
            x.ln() / self.growth_rate
        } else {
            f64::INFINITY
        }
    }
}

/// A population history made of consecutive epochs.
///
/// Bottlenecks and periods of exponential growth
/// are both expressed as sequences of [`Epoch`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct Epochs {
    epochs: Vec<Epoch>,
}

impl Epochs {
    /// The first epoch must start at time 0 and the rest
    /// must follow in strictly increasing order.
    pub fn new(epochs: Vec<Epoch>) -> Result<Self, ParameterError> {
        match epochs.first() {
            None => return Err(ParameterError::InvalidEpochs("no epochs were given")),
            Some(first) if first.start != 0.0 => {
                return Err(ParameterError::InvalidEpochs(
                    "the first epoch must start at time 0",
                ))
            }
            Some(_) => (),
        }
        if epochs.windows(2).any(|w| w[1].start <= w[0].start) {
            return Err(ParameterError::InvalidEpochs(
                "epoch start times must be strictly increasing",
            ));
        }
        if epochs
            .iter()
            .any(|e| !e.start.is_finite() || !e.size.is_finite() || e.size <= 0.0)
        {
            return Err(ParameterError::InvalidEpochs(
                "epoch sizes must be finite and positive",
            ));
        }
        if epochs.iter().any(|e| !e.growth_rate.is_finite()) {
            return Err(ParameterError::InvalidEpochs(
                "epoch growth rates must be finite",
            ));
        }
        Ok(Self { epochs })
    }

    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    fn epoch_index(&self, time: f64) -> usize {
        self.epochs
            .partition_point(|e| e.start <= time)
            .saturating_sub(1)
    }
}

impl PopulationHistory for Epochs {
    fn relative_size(&self, time: f64) -> f64 {
        self.epochs[self.epoch_index(time)].size_at(time)
    }

    fn next_change(&self, time: f64) -> Option<f64> {
        self.epochs.get(self.epoch_index(time) + 1).map(|e| e.start)
    }

    fn waiting_time(&self, time: f64, unit_wait: f64) -> f64 {
        if !unit_wait.is_finite() {
            return f64::INFINITY;
        }
        self.epochs[self.epoch_index(time)].waiting_time(time, unit_wait)
    }
}

/// Relative sizes of the sampled demes and the time
/// at which they merge into deme 0.
///
/// Until the merge, lineages only coalesce with
/// lineages from the same deme.
#[derive(Debug, Clone, PartialEq)]
pub struct DemeStructure {
    relative_sizes: Vec<f64>,
    merge_time: Option<f64>,
}

impl DemeStructure {
    pub fn new(relative_sizes: Vec<f64>) -> Self {
        Self {
            relative_sizes,
            merge_time: None,
        }
    }

    pub fn with_merge_time(self, merge_time: f64) -> Self {
        Self {
            merge_time: Some(merge_time),
            ..self
        }
    }

    pub fn relative_sizes(&self) -> &[f64] {
        &self.relative_sizes
    }

    pub fn num_demes(&self) -> usize {
        self.relative_sizes.len()
    }

    pub fn merge_time(&self) -> Option<f64> {
        self.merge_time
    }

    pub fn validate(&self, sample_sizes: &[usize]) -> Result<(), ParameterError> {
        if self.relative_sizes.len() != sample_sizes.len() {
            return Err(ParameterError::DemeCountMismatch {
                expected: sample_sizes.len(),
                found: self.relative_sizes.len(),
            });
        }
        for (deme, &value) in self.relative_sizes.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(ParameterError::InvalidDemeSize { deme, value });
            }
        }
        match self.merge_time {
            Some(t) if !t.is_finite() || t <= 0.0 => Err(ParameterError::InvalidMergeTime(t)),
            None if sample_sizes.iter().filter(|&&n| n > 0).count() > 1 => {
                Err(ParameterError::UnmergedDemes)
            }
            _ => Ok(()),
        }
    }
}
