use thiserror::Error;

/// A configuration that cannot be simulated.
///
/// These are reported before any simulation
/// state is created.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("the sample configuration is empty")]
    EmptySampleConfiguration,
    #[error("the total sample size must be at least 1")]
    ZeroSampleSize,
    #[error("the number of sites must be non-negative, got {0}")]
    NegativeSites(i64),
    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("relative size of deme {deme} must be finite and positive, got {value}")]
    InvalidDemeSize { deme: usize, value: f64 },
    #[error("{found} deme sizes were given for {expected} sampled demes")]
    DemeCountMismatch { expected: usize, found: usize },
    #[error("lineages are sampled from more than one deme but the demes never merge")]
    UnmergedDemes,
    #[error("deme merge time must be finite and positive, got {0}")]
    InvalidMergeTime(f64),
    #[error("invalid population history: {0}")]
    InvalidEpochs(&'static str),
    #[error("a recombination map over {nsites} sites needs {expected} links, got {found}")]
    RecombinationMapLength {
        nsites: i64,
        expected: usize,
        found: usize,
    },
    #[error("recombination rate of link {link} must be finite and non-negative, got {value}")]
    InvalidLinkRate { link: usize, value: f64 },
    #[error("fragments hold {found} sites but the ARG has {expected}")]
    FragmentLengthMismatch { expected: i64, found: i64 },
}

/// A structural defect found by [`crate::Arg::validate`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArgError {
    #[error("the ARG has no marginal trees for {nsites} sites")]
    Empty { nsites: i64 },
    #[error("the first marginal tree starts at {0}, not 0")]
    FirstTreeNotAtZero(i64),
    #[error("marginal tree {index} does not start to the right of its predecessor")]
    UnsortedBoundaries { index: usize },
    #[error("marginal tree {index} starts at {left}, beyond the {nsites} simulated sites")]
    BoundaryOutOfRange { index: usize, left: i64, nsites: i64 },
    #[error("marginal tree starting at {left} has not reached its MRCA")]
    IncompleteTree { left: i64 },
    #[error("node {node} of marginal tree starting at {left} is not younger than its parent")]
    TimeOrder { left: i64, node: usize },
    #[error("marginal tree starting at {left} has {roots} roots")]
    MultipleRoots { left: i64, roots: usize },
    #[error("root of marginal tree starting at {left} has {found} of {expected} samples as descendants")]
    MissingDescendants {
        left: i64,
        found: usize,
        expected: usize,
    },
}

/// Failure of a simulation run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error("simulation exceeded {limit} iterations at time {time}")]
    IterationLimit { limit: u64, time: f64 },
    #[error("no further event can occur at time {time} with {lineages} lineages")]
    Stalled { time: f64, lineages: usize },
}
