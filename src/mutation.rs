use crate::marginal::Arg;
use crate::marginal::MarginalTree;
use crate::params::CapacityHints;
use crate::rng::CoalescentRng;
use crate::Node;

/// Derived (`1`) and ancestral (`0`) states of every sample
/// at every segregating site.
///
/// Sites are sorted by position and samples
/// are in the order they were configured.
#[derive(Debug, Clone, PartialEq)]
pub struct Haplotypes {
    positions: Vec<f64>,
    // one row per sample
    genotypes: Vec<Vec<u8>>,
}

impl Haplotypes {
    pub fn segsites(&self) -> usize {
        self.positions.len()
    }

    pub fn nsam(&self) -> usize {
        self.genotypes.len()
    }

    /// Positions on `(0, 1]`, increasing.
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub(crate) fn positions_mut(&mut self) -> &mut [f64] {
        &mut self.positions
    }

    pub fn haplotype(&self, sample: usize) -> &[u8] {
        &self.genotypes[sample]
    }

    pub fn genotype(&self, sample: usize, site: usize) -> u8 {
        self.genotypes[sample][site]
    }

    /// The states of all samples at `site`.
    pub fn site(&self, site: usize) -> Vec<u8> {
        self.genotypes.iter().map(|row| row[site]).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Mutation {
    position: f64,
    tree: usize,
    node: Node,
}

// Grow by the configured increment rather than doubling.
fn reserve_site(mutations: &mut Vec<Mutation>, capacity: &CapacityHints) {
    if mutations.len() == mutations.capacity() {
        mutations.reserve_exact(std::cmp::max(capacity.segsites_increment, 1));
    }
}

fn place_mutation<R: CoalescentRng + ?Sized>(
    rng: &mut R,
    arg: &Arg,
    index: usize,
    tree: &MarginalTree,
) -> Mutation {
    let (left, right) = arg.span(index);
    let node = tree.pick_branch(rng.uniform(0.0, tree.total_branch_length()));
    let u = 1.0 - rng.uniform01();
    let position = (left as f64 + u * (right - left) as f64) / arg.nsites() as f64;
    Mutation {
        position,
        tree: index,
        node,
    }
}

fn build_haplotypes(arg: &Arg, mut mutations: Vec<Mutation>) -> Haplotypes {
    mutations.sort_by(|a, b| a.position.total_cmp(&b.position));
    let segsites = mutations.len();
    let mut genotypes = vec![vec![0u8; segsites]; arg.sample_size()];
    for (site, mutation) in mutations.iter().enumerate() {
        let tree = &arg.trees()[mutation.tree];
        for sample in tree.descendants(mutation.node) {
            genotypes[sample][site] = 1;
        }
    }
    Haplotypes {
        positions: mutations.iter().map(|m| m.position).collect(),
        genotypes,
    }
}

/// Throw down mutations at scaled rate `theta` under the
/// infinite-sites model.
///
/// A tree with total branch length `L` covering `w` of the
/// `nsites` sites receives Poisson(`theta * L * w / nsites`)
/// mutations, each on a branch chosen with probability
/// proportional to its length.
pub fn infinite_sites<R: CoalescentRng + ?Sized>(
    rng: &mut R,
    arg: &Arg,
    theta: f64,
    capacity: &CapacityHints,
) -> Haplotypes {
    let mut mutations = Vec::with_capacity(capacity.max_segsites);
    let nsites = arg.nsites() as f64;
    for (index, (left, right, tree)) in arg.spans().enumerate() {
        let length = tree.total_branch_length();
        let mean = theta * length * (right - left) as f64 / nsites;
        for _ in 0..rng.poisson(mean) {
            reserve_site(&mut mutations, capacity);
            mutations.push(place_mutation(rng, arg, index, tree));
        }
    }
    build_haplotypes(arg, mutations)
}

/// Place exactly `segsites` mutations.
///
/// Each picks a tree with probability proportional to
/// its total branch length times the sites it covers,
/// then a branch as in [`infinite_sites`].
/// An ARG without branches gets no mutations.
pub fn infinite_sites_fixed<R: CoalescentRng + ?Sized>(
    rng: &mut R,
    arg: &Arg,
    segsites: usize,
    capacity: &CapacityHints,
) -> Haplotypes {
    let weights = arg
        .spans()
        .map(|(left, right, tree)| tree.total_branch_length() * (right - left) as f64)
        .collect::<Vec<_>>();
    let total = weights.iter().sum::<f64>();
    if total <= 0.0 {
        if segsites > 0 {
            log::warn!("cannot place {segsites} mutations on an ARG with no branches");
        }
        return build_haplotypes(arg, vec![]);
    }

    let mut mutations = Vec::with_capacity(capacity.max_segsites);
    for _ in 0..segsites {
        let r = rng.uniform(0.0, total);
        let mut cumulative = 0.0;
        let mut index = 0;
        for (i, &weight) in weights.iter().enumerate() {
            if weight > 0.0 {
                index = i;
                cumulative += weight;
                if cumulative > r {
                    break;
                }
            }
        }
        reserve_site(&mut mutations, capacity);
        mutations.push(place_mutation(rng, arg, index, &arg.trees()[index]));
    }
    build_haplotypes(arg, mutations)
}
