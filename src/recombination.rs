use crate::chromosome::Chromosome;
use crate::scheduler::SimulationState;

/// Map `u`, uniform on `[0, 1)`, to a link chosen uniformly
/// among the `total_links` links of `chromosomes`.
///
/// Returns the index of the chromosome and the breakpoint,
/// which is the first site to the right of the link.
///
/// # Panics
///
/// If `total_links` is zero or exceeds the
/// links actually carried by `chromosomes`.
pub fn pick_uniform_spot(u: f64, total_links: i64, chromosomes: &[Chromosome]) -> (usize, i64) {
    assert!(
        total_links > 0,
        "cannot place a breakpoint with {total_links} links"
    );
    let mut position = std::cmp::min((u * total_links as f64) as i64 + 1, total_links);
    for (index, chromosome) in chromosomes.iter().enumerate() {
        let links = chromosome.links();
        if position <= links {
            return (index, chromosome.first() + position);
        }
        position -= links;
    }
    panic!("total_links = {total_links} exceeds the links of the live chromosomes");
}

/// Recombination rate of each live chromosome under a per-link
/// map, written into `reclens`.  `map[j]` is the rate between
/// sites `j` and `j + 1`.
///
/// A chromosome recombines across every link from its first to its
/// last ancestral site, gaps included.  Returns the total rate.
pub fn integrate_genetic_map(
    chromosomes: &[Chromosome],
    map: &[f64],
    reclens: &mut Vec<f64>,
) -> f64 {
    reclens.clear();
    reclens.extend(chromosomes.iter().map(|chromosome| {
        let first = chromosome.first() as usize;
        let last = chromosome.last() as usize;
        map[first..last].iter().sum::<f64>()
    }));
    reclens.iter().sum()
}

// Index of the positive weight at which the running sum first
// exceeds `target`.  Rounding past the end picks the last one.
fn pick_weighted<I: Iterator<Item = f64>>(target: f64, weights: I) -> Option<(usize, f64)> {
    let mut chosen = None;
    let mut cumulative = 0.0;
    for (i, weight) in weights.enumerate() {
        if weight > 0.0 {
            chosen = Some((i, cumulative));
            cumulative += weight;
            if cumulative > target {
                break;
            }
        }
    }
    chosen
}

/// Map `u`, uniform on `[0, 1)`, to a link chosen with probability
/// proportional to its rate in `map`.
///
/// `reclens` and `total_rate` come from [`integrate_genetic_map`].
/// A chromosome is chosen by its integrated rate, then a link
/// within it by the map.  Returns the index of the chromosome and
/// the breakpoint, the first site to the right of the link.
///
/// # Panics
///
/// If `total_rate` is not positive or no chromosome can recombine.
pub fn pick_spot(
    u: f64,
    total_rate: f64,
    reclens: &[f64],
    chromosomes: &[Chromosome],
    map: &[f64],
) -> (usize, i64) {
    assert!(
        total_rate > 0.0,
        "cannot place a breakpoint with recombination rate {total_rate}"
    );
    let target = u * total_rate;
    let Some((index, below)) = pick_weighted(target, reclens.iter().copied()) else {
        panic!("no live chromosome has a positive recombination rate");
    };
    let chromosome = &chromosomes[index];
    let first = chromosome.first() as usize;
    let last = chromosome.last() as usize;
    let Some((link, _)) = pick_weighted(target - below, map[first..last].iter().copied()) else {
        panic!("chromosome {index} has rate {} but no link to break", reclens[index]);
    };
    (index, (first + link + 1) as i64)
}

/// Recombine live chromosome `index` at `breakpoint`.
///
/// The sites left of the breakpoint stay at `index`.  The rest
/// become a new live chromosome at the end of the pool.  No
/// marginal tree changes until a later coalescence needs it.
///
/// Returns the change in the total number of links.
pub fn crossover(state: &mut SimulationState, index: usize, breakpoint: i64) -> i64 {
    let chromosome = &mut state.chromosomes[index];
    let before = chromosome.links();
    let right = chromosome.split_off(breakpoint);
    let delta = chromosome.links() + right.links() - before;
    state.chromosomes.push(right);
    state.adjust_links(delta);
    delta
}


#[cfg(test)]
mod test_pick_spot {
    use super::*;
    use crate::chromosome::init_sample;

    #[test]
    fn test_integrate_genetic_map() {
        let map = vec![1.0, 0.0, 2.0, 0.5];
        let mut sample = init_sample(&[2], 5);
        let mut reclens = vec![];
        assert_eq!(integrate_genetic_map(&sample, &map, &mut reclens), 7.0);
        assert_eq!(reclens, vec![3.5, 3.5]);
        // Sites 0..3 and 3..5 of the first sample, losing link 2.
        let right = sample[0].split_off(3);
        sample.push(right);
        assert_eq!(integrate_genetic_map(&sample, &map, &mut reclens), 5.0);
        assert_eq!(reclens, vec![1.0, 3.5, 0.5]);
    }

    #[test]
    fn test_links_without_rate_are_skipped() {
        let map = vec![1.0, 0.0, 2.0, 1.0];
        let sample = init_sample(&[2], 5);
        let mut reclens = vec![];
        let total = integrate_genetic_map(&sample, &map, &mut reclens);
        assert_eq!(pick_spot(0.0, total, &reclens, &sample, &map), (0, 1));
        assert_eq!(pick_spot(0.124, total, &reclens, &sample, &map), (0, 1));
        assert_eq!(pick_spot(0.125, total, &reclens, &sample, &map), (0, 3));
        assert_eq!(pick_spot(0.374, total, &reclens, &sample, &map), (0, 3));
        assert_eq!(pick_spot(0.375, total, &reclens, &sample, &map), (0, 4));
        assert_eq!(pick_spot(0.5, total, &reclens, &sample, &map), (1, 1));
        assert_eq!(pick_spot(0.9999, total, &reclens, &sample, &map), (1, 4));
        // u * total rounding up to the total still lands on a link.
        assert_eq!(pick_spot(1.0, total, &reclens, &sample, &map), (1, 4));
        for i in 0..1000 {
            let (_, breakpoint) = pick_spot(i as f64 / 1000.0, total, &reclens, &sample, &map);
            assert_ne!(breakpoint, 2);
        }
    }

    #[test]
    fn test_breakpoints_follow_the_map() {
        use rand::Rng;
        use rand::SeedableRng;
        // Link 4 carries 9 / 18 of the rate of each chromosome.
        let mut map = vec![1.0; 10];
        map[4] = 9.0;
        let sample = init_sample(&[3], 11);
        let mut reclens = vec![];
        let total = integrate_genetic_map(&sample, &map, &mut reclens);
        assert_eq!(total, 54.0);
        let mut rng = rand::rngs::StdRng::seed_from_u64(41);
        let draws = 20000;
        let mut hot = 0;
        let mut per_chromosome = [0; 3];
        for _ in 0..draws {
            let (index, breakpoint) =
                pick_spot(rng.gen::<f64>(), total, &reclens, &sample, &map);
            assert!((1..11).contains(&breakpoint));
            per_chromosome[index] += 1;
            if breakpoint == 5 {
                hot += 1;
            }
        }
        let fraction = hot as f64 / draws as f64;
        assert!((fraction - 0.5).abs() < 0.02, "{fraction}");
        assert!(per_chromosome
            .iter()
            .all(|&n| (n as f64 / draws as f64 - 1.0 / 3.0).abs() < 0.02));
    }

    #[test]
    #[should_panic]
    fn test_no_rate() {
        let map = vec![0.0; 4];
        let sample = init_sample(&[2], 5);
        let mut reclens = vec![];
        let total = integrate_genetic_map(&sample, &map, &mut reclens);
        let _ = pick_spot(0.5, total, &reclens, &sample, &map);
    }
}

#[cfg(test)]
mod test_crossover {
    use super::*;
    use crate::coalescence::coalesce;

    // Two samples over ten sites.  Sample 0 recombines
    // at site 4, its left part coalesces with sample 1,
    // then its right part does.
    #[test]
    fn test_recombine_then_coalesce() {
        let mut state = SimulationState::new(&[2], 10);
        assert_eq!(state.total_links, 18);

        state.time = 0.1;
        assert_eq!(crossover(&mut state, 0, 4), -1);
        assert_eq!(state.total_links, 17);
        assert_eq!(state.chromosomes.len(), 3);
        assert_eq!(state.chromosomes[0].last(), 3);
        assert_eq!(state.chromosomes[2].first(), 4);
        assert_eq!(state.arg.len(), 1);
        assert_eq!(state.total_links, state.recount_links());

        state.time = 0.2;
        assert_eq!(coalesce(&mut state, 0, 1), 1);
        let lefts = state.arg.trees().iter().map(|t| t.left()).collect::<Vec<_>>();
        assert_eq!(lefts, vec![0, 4]);
        assert!(state.arg.trees()[0].is_complete());
        assert!(!state.arg.trees()[1].is_complete());
        // Both samples still carry sites 4..10.
        assert_eq!(state.chromosomes.len(), 2);
        assert_eq!(state.total_links, 10);
        assert_eq!(state.total_links, state.recount_links());

        state.time = 0.3;
        assert_eq!(coalesce(&mut state, 0, 1), 2);
        assert!(state.chromosomes.is_empty());
        assert_eq!(state.total_links, 0);
        assert_eq!(state.arg.validate(), Ok(()));
        assert_eq!(state.arg.trees()[0].tmrca(), Some(0.2));
        assert_eq!(state.arg.trees()[1].tmrca(), Some(0.3));
    }

    #[test]
    fn test_crossover_in_gap() {
        let mut state = SimulationState::new(&[2], 10);
        state.time = 0.1;
        let _ = crossover(&mut state, 0, 3);
        let _ = crossover(&mut state, 2, 7);
        // Sample 0 is now spread over [0, 3), [3, 7) and [7, 10).
        state.time = 0.2;
        assert_eq!(coalesce(&mut state, 2, 1), 1);
        assert_eq!(state.total_links, state.recount_links());
        // Sites 3..7 reached their MRCA, leaving a gap in sample 1.
        let gapped = state
            .chromosomes
            .iter()
            .position(|c| c.segments().len() == 2)
            .unwrap();
        assert_eq!(state.chromosomes[gapped].links(), 9);
        let before = state.total_links;
        let delta = crossover(&mut state, gapped, 5);
        assert_eq!(delta, -5);
        assert_eq!(state.total_links, before - 5);
        assert_eq!(state.total_links, state.recount_links());
    }
}
