//! Coalescent simulation with recombination.
//!
//! The history of a sample is built backwards in time as an
//! ancestral recombination graph ([`Arg`]): an ordered set of
//! marginal trees, each valid over a contiguous block of sites.
//! Neutral mutations are then thrown down onto the finished graph
//! under the infinite-sites model, producing a [`Haplotypes`] matrix.
//!
//! ```
//! use coalescent_arg::{neutral_sample, SimulationParameters};
//! use rand::SeedableRng;
//!
//! let params = SimulationParameters::new(vec![10], 1000)
//!     .with_theta(10.0)
//!     .with_rho(5.0);
//! let mut rng = rand::rngs::StdRng::seed_from_u64(101);
//! let haplotypes = neutral_sample(&params, &mut rng).unwrap();
//! assert_eq!(haplotypes.nsam(), 10);
//! ```

mod chromosome;
mod coalescence;
mod demography;
mod error;
mod flags;
mod fragments;
mod marginal;
mod mutation;
mod params;
mod recombination;
mod replicates;
mod rng;
mod scheduler;

pub use chromosome::init_sample;
pub use chromosome::merge_ancestry;
pub use chromosome::split;
pub use chromosome::Chromosome;
pub use coalescence::coalesce;
pub use coalescence::pick2;
pub use coalescence::pick2_in_deme;
pub use demography::ConstantSize;
pub use demography::DemeStructure;
pub use demography::Epoch;
pub use demography::Epochs;
pub use demography::PopulationHistory;
pub use error::ArgError;
pub use error::ParameterError;
pub use error::SimulationError;
pub use flags::SimulationOptions;
pub use fragments::calculate_scales;
pub use fragments::fragment_genetic_map;
pub use fragments::rescale_arg;
pub use fragments::rescale_mutation_positions;
pub use fragments::sample_length;
pub use fragments::total_length;
pub use fragments::Fragment;
pub use fragments::FragmentScales;
pub use marginal::Arg;
pub use marginal::MarginalTree;
pub use marginal::TreeNode;
pub use mutation::infinite_sites;
pub use mutation::infinite_sites_fixed;
pub use mutation::Haplotypes;
pub use params::CapacityHints;
pub use params::SimulationParameters;
pub use recombination::crossover;
pub use recombination::integrate_genetic_map;
pub use recombination::pick_spot;
pub use recombination::pick_uniform_spot;
pub use replicates::simulate_args;
pub use replicates::simulate_replicates;
pub use rng::CoalescentRng;
pub use scheduler::evolve;
pub use scheduler::neutral_sample;
pub use scheduler::simulate_arg;
pub use scheduler::step;
pub use scheduler::Event;
pub use scheduler::SimulationState;
pub use scheduler::SimulationStatus;

/// Index of a node within a [`MarginalTree`].
///
/// Leaves are `Node(0)..Node(n)`.  Internal nodes are
/// numbered in the order they are created, so a parent
/// always has a larger index than its children.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Node(usize);

impl Node {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn as_index(&self) -> usize {
        self.0
    }
}

/// A half-open interval of sites, `[left, right)`,
/// along with the node ancestral to it.
///
/// The node is valid in every marginal tree
/// that the interval overlaps.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Segment {
    left: i64,
    right: i64,
    node: Node,
}

impl Segment {
    pub fn new(left: i64, right: i64, node: Node) -> Option<Self> {
        if left >= 0 && right > left {
            Some(Self { left, right, node })
        } else {
            None
        }
    }

    pub fn left(&self) -> i64 {
        self.left
    }

    pub fn right(&self) -> i64 {
        self.right
    }

    pub fn node(&self) -> Node {
        self.node
    }

    pub fn contains(&self, site: i64) -> bool {
        site >= self.left && site < self.right
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.right > other.left && other.right > self.left
    }
}

#[test]
fn test_segment_construction() {
    assert!(Segment::new(0, 10, Node(0)).is_some());
    assert!(Segment::new(5, 5, Node(0)).is_none());
    assert!(Segment::new(-1, 5, Node(0)).is_none());
    assert!(Segment::new(6, 5, Node(0)).is_none());
}

#[test]
fn test_segment_overlap() {
    let a = Segment::new(0, 5, Node(0)).unwrap();
    let b = Segment::new(5, 10, Node(1)).unwrap();
    let c = Segment::new(4, 6, Node(2)).unwrap();
    // Abutting intervals share no sites.
    assert!(!a.overlaps(&b));
    assert!(a.overlaps(&c));
    assert!(b.overlaps(&c));
    assert!(a.contains(4));
    assert!(!a.contains(5));
}
