use crate::marginal::Arg;
use crate::Node;
use crate::Segment;

/// The ancestral material carried by one lineage.
///
/// Segments are sorted, non-overlapping and never empty.
/// Gaps between segments are sites whose ancestry is
/// carried by some other lineage, or that have already
/// found their most recent common ancestor.
#[derive(Debug, Clone, PartialEq)]
pub struct Chromosome {
    segments: Vec<Segment>,
    population: usize,
}

impl Chromosome {
    pub fn new(segments: Vec<Segment>, population: usize) -> Self {
        debug_assert!(
            segments.windows(2).all(|w| w[0].right <= w[1].left),
            "{segments:?}"
        );
        Self {
            segments,
            population,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn population(&self) -> usize {
        self.population
    }

    pub(crate) fn set_population(&mut self, population: usize) {
        self.population = population
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The first ancestral site.
    ///
    /// # Panics
    ///
    /// If the chromosome is empty.
    pub fn first(&self) -> i64 {
        self.segments[0].left
    }

    /// The last ancestral site.
    ///
    /// # Panics
    ///
    /// If the chromosome is empty.
    pub fn last(&self) -> i64 {
        self.segments[self.segments.len() - 1].right - 1
    }

    /// Number of positions between the first and last ancestral
    /// sites at which a crossover would separate ancestral material.
    pub fn links(&self) -> i64 {
        match (self.segments.first(), self.segments.last()) {
            (Some(first), Some(last)) => last.right - 1 - first.left,
            _ => 0,
        }
    }

    pub fn segment_at(&self, site: i64) -> Option<&Segment> {
        let index = self.segments.partition_point(|s| s.right <= site);
        self.segments.get(index).filter(|s| s.contains(site))
    }

    pub fn contains(&self, site: i64) -> bool {
        self.segment_at(site).is_some()
    }

    /// Split at `breakpoint`, keeping sites `< breakpoint` and
    /// returning a chromosome holding sites `>= breakpoint`.
    ///
    /// A segment straddling the breakpoint is cut in two,
    /// both halves keeping its node.
    ///
    /// # Panics
    ///
    /// If either half would be empty, i.e. unless
    /// `first() < breakpoint <= last()`.
    pub fn split_off(&mut self, breakpoint: i64) -> Chromosome {
        assert!(
            !self.is_empty() && self.first() < breakpoint && breakpoint <= self.last(),
            "breakpoint {breakpoint} does not fall between two ancestral sites of {:?}",
            self.segments
        );
        let index = self.segments.partition_point(|s| s.right <= breakpoint);
        let mut right = self.segments.split_off(index);
        let straddling = &mut right[0];
        if straddling.left < breakpoint {
            self.segments.push(Segment {
                left: straddling.left,
                right: breakpoint,
                node: straddling.node,
            });
            straddling.left = breakpoint;
        }
        Chromosome {
            segments: right,
            population: self.population,
        }
    }
}

/// One chromosome per sampled individual.
///
/// Deme `i` contributes `sample_sizes[i]` chromosomes with
/// population `i`.  Each carries the whole region, mapped
/// to its own leaf.
pub fn init_sample(sample_sizes: &[usize], nsites: i64) -> Vec<Chromosome> {
    assert!(nsites > 0, "cannot initialize a sample with {nsites} sites");
    let nsam = sample_sizes.iter().sum::<usize>();
    let mut sample = Vec::with_capacity(nsam);
    for (population, &size) in sample_sizes.iter().enumerate() {
        for _ in 0..size {
            let leaf = Node(sample.len());
            sample.push(Chromosome {
                segments: vec![Segment {
                    left: 0,
                    right: nsites,
                    node: leaf,
                }],
                population,
            });
        }
    }
    sample
}

/// Split a copy of `chromosome` at `breakpoint`.
///
/// See [`Chromosome::split_off`].
pub fn split(chromosome: &Chromosome, breakpoint: i64) -> (Chromosome, Chromosome) {
    let mut left = chromosome.clone();
    let right = left.split_off(breakpoint);
    (left, right)
}

/// Merge the ancestry of two lineages coalescing at `time`.
///
/// Where only one input carries a site, its segment passes
/// through unchanged.  Where both do, the marginal trees
/// covering the shared interval receive a new node at `time`,
/// splitting a tree first if the interval ends inside it.
/// Sites whose tree thereby reaches its MRCA are dropped.
pub fn merge_ancestry(a: &[Segment], b: &[Segment], time: f64, arg: &mut Arg) -> Vec<Segment> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let mut i = 0;
    let mut j = 0;
    // Everything to the left of cursor has been output.
    let mut cursor = 0;

    loop {
        match (a.get(i), b.get(j)) {
            (None, None) => break,
            (Some(sa), None) => {
                merged.push(clip(sa, cursor, sa.right));
                cursor = sa.right;
                i += 1;
            }
            (None, Some(sb)) => {
                merged.push(clip(sb, cursor, sb.right));
                cursor = sb.right;
                j += 1;
            }
            (Some(sa), Some(sb)) => {
                let la = std::cmp::max(sa.left, cursor);
                let lb = std::cmp::max(sb.left, cursor);
                if sa.right <= lb {
                    merged.push(clip(sa, la, sa.right));
                    cursor = sa.right;
                    i += 1;
                } else if sb.right <= la {
                    merged.push(clip(sb, lb, sb.right));
                    cursor = sb.right;
                    j += 1;
                } else if la < lb {
                    merged.push(clip(sa, la, lb));
                    cursor = lb;
                } else if lb < la {
                    merged.push(clip(sb, lb, la));
                    cursor = la;
                } else {
                    let right = std::cmp::min(sa.right, sb.right);
                    coalesce_interval(la, right, sa.node, sb.node, time, arg, &mut merged);
                    cursor = right;
                    if sa.right == right {
                        i += 1;
                    }
                    if sb.right == right {
                        j += 1;
                    }
                }
            }
        }
    }

    debug_assert!(merged.windows(2).all(|w| w[0].right <= w[1].left));
    merged
}

fn clip(segment: &Segment, left: i64, right: i64) -> Segment {
    let left = std::cmp::max(segment.left, left);
    debug_assert!(left < right && right <= segment.right);
    Segment {
        left,
        right,
        node: segment.node,
    }
}

// Both lineages carry [left, right).
fn coalesce_interval(
    left: i64,
    right: i64,
    a: Node,
    b: Node,
    time: f64,
    arg: &mut Arg,
    merged: &mut Vec<Segment>,
) {
    let _ = arg.split_at(left);
    let _ = arg.split_at(right);
    let mut index = arg.tree_index_at(left);
    while index < arg.len() {
        let (tree_left, tree_right) = arg.span(index);
        if tree_left >= right {
            break;
        }
        debug_assert!(tree_left >= left && tree_right <= right);
        let tree = arg.tree_mut(index);
        let parent = tree.add_node(time, a, b);
        if !tree.is_complete() {
            merged.push(Segment {
                left: tree_left,
                right: tree_right,
                node: parent,
            });
        }
        index += 1;
    }
}
