use crate::chromosome::merge_ancestry;
use crate::chromosome::Chromosome;
use crate::rng::CoalescentRng;
use crate::scheduler::SimulationState;

/// A uniformly chosen pair of distinct indices
/// in `0..n`, smallest first.
///
/// # Panics
///
/// If `n < 2`.
pub fn pick2<R: CoalescentRng + ?Sized>(rng: &mut R, n: usize) -> (usize, usize) {
    assert!(n >= 2, "cannot pick two of {n} lineages");
    let draw = |rng: &mut R| std::cmp::min((rng.uniform01() * n as f64) as usize, n - 1);
    let first = draw(rng);
    let mut second = draw(rng);
    while second == first {
        second = draw(rng);
    }
    (std::cmp::min(first, second), std::cmp::max(first, second))
}

/// A uniformly chosen pair among the chromosomes
/// currently in `deme`, smallest index first.
///
/// # Panics
///
/// If fewer than two chromosomes are in `deme`.
pub fn pick2_in_deme<R: CoalescentRng + ?Sized>(
    rng: &mut R,
    chromosomes: &[Chromosome],
    deme: usize,
) -> (usize, usize) {
    let in_deme = chromosomes
        .iter()
        .enumerate()
        .filter(|(_, c)| c.population() == deme)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    let (i, j) = pick2(rng, in_deme.len());
    (in_deme[i], in_deme[j])
}

/// Coalesce live chromosomes `c1` and `c2` at the current time.
///
/// The pair is replaced by the merged chromosome, or removed
/// entirely if every site they share reached its MRCA and
/// neither carries anything else.  The order of the remaining
/// live chromosomes is not preserved.
///
/// Returns the number of live chromosomes removed.
///
/// # Panics
///
/// If fewer than two chromosomes are live, if `c1 == c2`,
/// or if either index is out of range.
pub fn coalesce(state: &mut SimulationState, c1: usize, c2: usize) -> usize {
    assert!(
        state.chromosomes.len() >= 2,
        "coalescence requires two live chromosomes, found {}",
        state.chromosomes.len()
    );
    assert_ne!(c1, c2, "a chromosome cannot coalesce with itself");
    let (lo, hi) = (std::cmp::min(c1, c2), std::cmp::max(c1, c2));

    let b = state.chromosomes.swap_remove(hi);
    let a = &state.chromosomes[lo];
    debug_assert_eq!(a.population(), b.population());
    let segments = merge_ancestry(a.segments(), b.segments(), state.time, &mut state.arg);
    let merged = Chromosome::new(segments, a.population());
    let delta = merged.links() - a.links() - b.links();
    state.adjust_links(delta);

    if merged.is_empty() {
        let _ = state.chromosomes.swap_remove(lo);
        2
    } else {
        state.chromosomes[lo] = merged;
        1
    }
}
