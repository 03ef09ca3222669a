use crate::error::ArgError;
use crate::Node;

/// A node of a marginal tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode {
    time: f64,
    parent: Option<Node>,
}

impl TreeNode {
    fn leaf() -> Self {
        Self {
            time: 0.0,
            parent: None,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// `None` for the root, and for any node
    /// whose lineage has not yet coalesced.
    pub fn parent(&self) -> Option<Node> {
        self.parent
    }
}

/// The genealogy of the sample over a contiguous block of sites.
///
/// Nodes live in a flat array of `2n - 1` entries.  The first `n`
/// are the samples.  Internal nodes are written bottom-up, so the
/// tree is complete once the last slot, the root, is written.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginalTree {
    left: i64,
    sample_size: usize,
    last_node: usize,
    nodes: Vec<TreeNode>,
}

impl MarginalTree {
    pub fn new(left: i64, sample_size: usize) -> Self {
        assert!(sample_size > 0, "a marginal tree needs at least one sample");
        Self {
            left,
            sample_size,
            last_node: sample_size - 1,
            nodes: vec![TreeNode::leaf(); 2 * sample_size - 1],
        }
    }

    /// The first site covered by this tree.
    pub fn left(&self) -> i64 {
        self.left
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Number of nodes written so far.
    pub fn num_nodes(&self) -> usize {
        self.last_node + 1
    }

    /// The nodes written so far.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes[..self.num_nodes()]
    }

    // NOTE: panics if node is out of bounds
    pub fn node(&self, node: Node) -> &TreeNode {
        &self.nodes[node.as_index()]
    }

    pub fn is_complete(&self) -> bool {
        self.last_node == 2 * self.sample_size - 2
    }

    pub fn root(&self) -> Option<Node> {
        if self.is_complete() {
            Some(Node(self.last_node))
        } else {
            None
        }
    }

    /// Time of the most recent common ancestor,
    /// or `None` if the tree is not complete.
    pub fn tmrca(&self) -> Option<f64> {
        self.root().map(|root| self.node(root).time)
    }

    /// Write a new internal node at `time` as the parent of
    /// `left_child` and `right_child`.
    ///
    /// # Panics
    ///
    /// If the tree is already complete or if either
    /// child already has a parent.
    pub(crate) fn add_node(&mut self, time: f64, left_child: Node, right_child: Node) -> Node {
        assert!(
            !self.is_complete(),
            "marginal tree starting at {} has no free nodes",
            self.left
        );
        self.last_node += 1;
        let parent = Node(self.last_node);
        self.nodes[parent.as_index()] = TreeNode { time, parent: None };
        for child in [left_child, right_child] {
            assert!(child < parent);
            let child_node = &mut self.nodes[child.as_index()];
            assert!(
                child_node.parent.is_none(),
                "{child:?} already has parent {:?}",
                child_node.parent
            );
            debug_assert!(child_node.time <= time);
            child_node.parent = Some(parent);
        }
        parent
    }

    /// Length of the branch above `node`.  Zero for the root.
    pub fn branch_length(&self, node: Node) -> f64 {
        let child = self.node(node);
        match child.parent {
            Some(parent) => self.node(parent).time - child.time,
            None => 0.0,
        }
    }

    /// Sum of all branch lengths.
    pub fn total_branch_length(&self) -> f64 {
        (0..self.num_nodes())
            .map(|i| self.branch_length(Node(i)))
            .sum()
    }

    /// Is sample `leaf` below (or equal to) `node`?
    pub fn is_descendant(&self, leaf: usize, node: Node) -> bool {
        let mut current = Node(leaf);
        while current < node {
            match self.node(current).parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        current == node
    }

    /// The samples below `node`, in increasing order.
    pub fn descendants(&self, node: Node) -> Vec<usize> {
        (0..self.sample_size)
            .filter(|&leaf| self.is_descendant(leaf, node))
            .collect()
    }

    /// Choose the branch on which the cumulative branch length,
    /// scanning nodes left to right, first reaches `r`.
    ///
    /// `r` should be drawn uniformly from `[0, total_branch_length())`.
    pub fn pick_branch(&self, r: f64) -> Node {
        assert!(self.last_node > 0, "a single-node tree has no branches");
        let mut cumulative = 0.0;
        // The root has no branch.  If rounding leaves r beyond
        // the cumulative total, the last branch is chosen.
        for i in 0..self.last_node - 1 {
            cumulative += self.branch_length(Node(i));
            if cumulative >= r {
                return Node(i);
            }
        }
        Node(self.last_node - 1)
    }

    /// Newick representation, with samples labelled `1..=n`.
    /// `None` if the tree is not complete.
    pub fn to_newick(&self) -> Option<String> {
        let root = self.root()?;
        let mut children = vec![vec![]; self.num_nodes()];
        for (i, node) in self.nodes().iter().enumerate() {
            if let Some(parent) = node.parent {
                children[parent.as_index()].push(Node(i));
            }
        }
        let mut newick = String::new();
        self.write_subtree(root, &children, &mut newick);
        newick.push(';');
        Some(newick)
    }

    fn write_subtree(&self, node: Node, children: &[Vec<Node>], newick: &mut String) {
        if node.as_index() < self.sample_size {
            newick.push_str(&(node.as_index() + 1).to_string());
        } else {
            newick.push('(');
            for (i, &child) in children[node.as_index()].iter().enumerate() {
                if i > 0 {
                    newick.push(',');
                }
                self.write_subtree(child, children, newick);
            }
            newick.push(')');
        }
        if self.node(node).parent.is_some() {
            newick.push_str(&format!(":{}", self.branch_length(node)));
        }
    }

    fn same_genealogy(&self, other: &Self) -> bool {
        self.last_node == other.last_node
            && self
                .nodes()
                .iter()
                .zip(other.nodes())
                .all(|(a, b)| a.parent == b.parent && (a.time - b.time).abs() <= f64::EPSILON)
    }
}

/// An ancestral recombination graph, stored as the sequence of
/// marginal trees along the region.
///
/// Tree `i` covers sites `[trees[i].left(), trees[i + 1].left())`,
/// the last tree extending to `nsites`.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    nsites: i64,
    sample_size: usize,
    trees: Vec<MarginalTree>,
}

impl Arg {
    /// A single tree containing only the samples.
    /// With no sites there are no trees.
    pub fn new(sample_size: usize, nsites: i64) -> Self {
        let trees = if nsites > 0 {
            vec![MarginalTree::new(0, sample_size)]
        } else {
            vec![]
        };
        Self {
            nsites,
            sample_size,
            trees,
        }
    }

    pub fn nsites(&self) -> i64 {
        self.nsites
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn trees(&self) -> &[MarginalTree] {
        &self.trees
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub(crate) fn tree_mut(&mut self, index: usize) -> &mut MarginalTree {
        &mut self.trees[index]
    }

    /// Index of the tree covering `site`.
    ///
    /// # Panics
    ///
    /// If `site` is outside `[0, nsites)`.
    pub fn tree_index_at(&self, site: i64) -> usize {
        assert!(
            site >= 0 && site < self.nsites,
            "site {site} is outside of [0, {})",
            self.nsites
        );
        self.trees.partition_point(|tree| tree.left <= site) - 1
    }

    pub fn tree_at(&self, site: i64) -> &MarginalTree {
        &self.trees[self.tree_index_at(site)]
    }

    /// The sites `[left, right)` covered by tree `index`.
    pub fn span(&self, index: usize) -> (i64, i64) {
        let left = self.trees[index].left;
        let right = match self.trees.get(index + 1) {
            Some(next) => next.left,
            None => self.nsites,
        };
        (left, right)
    }

    /// Iterate over `(left, right, tree)`.
    pub fn spans(&self) -> impl Iterator<Item = (i64, i64, &MarginalTree)> + '_ {
        self.trees.iter().enumerate().map(|(i, tree)| {
            let (left, right) = self.span(i);
            (left, right, tree)
        })
    }

    /// Start a new marginal tree at `site`, copied from the tree
    /// currently covering it.
    ///
    /// Returns `false`, doing nothing, if `site` is already a
    /// tree boundary or is not an interior site.
    pub(crate) fn split_at(&mut self, site: i64) -> bool {
        if site <= 0 || site >= self.nsites {
            return false;
        }
        let index = self.tree_index_at(site);
        if self.trees[index].left == site {
            return false;
        }
        let mut copy = self.trees[index].clone();
        copy.left = site;
        self.trees.insert(index + 1, copy);
        true
    }

    pub fn is_complete(&self) -> bool {
        self.trees.iter().all(|tree| tree.is_complete())
    }

    /// Move every tree boundary through `f` onto a region of `nsites`.
    ///
    /// `f` must be increasing.  The first tree always starts at 0.
    pub(crate) fn rescale_boundaries<F: Fn(i64) -> i64>(&mut self, nsites: i64, f: F) {
        for tree in self.trees.iter_mut().skip(1) {
            tree.left = f(tree.left);
        }
        self.nsites = nsites;
    }

    /// Total branch length averaged over sites.
    pub fn total_time(&self) -> f64 {
        let nsites = self.nsites as f64;
        self.spans()
            .map(|(left, right, tree)| {
                tree.total_branch_length() * (right - left) as f64 / nsites
            })
            .sum()
    }

    /// Remove trees identical, in topology and node times,
    /// to the tree on their left.
    pub fn minimize(&mut self) {
        self.trees
            .dedup_by(|next, previous| previous.same_genealogy(next));
    }

    /// Branch length leading to each derived-allele frequency class,
    /// weighted by the fraction of sites covered by each tree.
    ///
    /// Entry `i` holds the time on branches with `i + 1` descendants.
    /// When `folded`, classes `i` and `n - i` are pooled into the
    /// minor-allele class.
    pub fn site_frequency_times(&self, folded: bool) -> Vec<f64> {
        let n = self.sample_size;
        if n < 2 {
            return vec![];
        }
        let nbins = if folded { n / 2 } else { n - 1 };
        let mut times = vec![0.0; nbins];
        let nsites = self.nsites as f64;
        for (left, right, tree) in self.spans() {
            let scale = (right - left) as f64 / nsites;
            for i in 0..tree.num_nodes() {
                let node = Node(i);
                if tree.node(node).parent.is_none() {
                    continue;
                }
                let count = tree.descendants(node).len();
                let index = if folded {
                    std::cmp::min(count, n - count) - 1
                } else {
                    count - 1
                };
                times[index] += tree.branch_length(node) * scale;
            }
        }
        times
    }

    /// Check that the trees partition the region and that
    /// every tree is a complete genealogy of the sample.
    pub fn validate(&self) -> Result<(), ArgError> {
        let first = match self.trees.first() {
            Some(first) => first,
            None if self.nsites > 0 => {
                return Err(ArgError::Empty {
                    nsites: self.nsites,
                })
            }
            None => return Ok(()),
        };
        if first.left != 0 {
            return Err(ArgError::FirstTreeNotAtZero(first.left));
        }
        for (index, w) in self.trees.windows(2).enumerate() {
            if w[1].left <= w[0].left {
                return Err(ArgError::UnsortedBoundaries { index: index + 1 });
            }
        }
        for (index, tree) in self.trees.iter().enumerate() {
            if tree.left >= self.nsites {
                return Err(ArgError::BoundaryOutOfRange {
                    index,
                    left: tree.left,
                    nsites: self.nsites,
                });
            }
            validate_tree(tree, self.sample_size)?;
        }
        Ok(())
    }
}

fn validate_tree(tree: &MarginalTree, sample_size: usize) -> Result<(), ArgError> {
    let root = tree
        .root()
        .ok_or(ArgError::IncompleteTree { left: tree.left })?;
    let roots = tree
        .nodes()
        .iter()
        .filter(|node| node.parent.is_none())
        .count();
    if roots != 1 {
        return Err(ArgError::MultipleRoots {
            left: tree.left,
            roots,
        });
    }
    for (i, node) in tree.nodes().iter().enumerate() {
        if let Some(parent) = node.parent {
            if tree.node(parent).time <= node.time {
                return Err(ArgError::TimeOrder {
                    left: tree.left,
                    node: i,
                });
            }
        }
    }
    let found = tree.descendants(root).len();
    if found != sample_size {
        return Err(ArgError::MissingDescendants {
            left: tree.left,
            found,
            expected: sample_size,
        });
    }
    Ok(())
}



#[cfg(test)]
mod test_arg {
    use super::tree_fixtures::*;
    use super::*;

    #[test]
    fn test_new_arg() {
        let arg = Arg::new(3, 10);
        assert_eq!(arg.len(), 1);
        assert_eq!(arg.span(0), (0, 10));
        assert!(!arg.is_complete());
        assert!(Arg::new(3, 0).is_empty());
    }

    #[test]
    fn test_split_at() {
        let mut arg = Arg::new(2, 10);
        assert!(arg.split_at(5));
        assert!(!arg.split_at(5));
        assert!(!arg.split_at(0));
        assert!(!arg.split_at(10));
        assert!(arg.split_at(2));
        let lefts = arg.trees().iter().map(|t| t.left()).collect::<Vec<_>>();
        assert_eq!(lefts, vec![0, 2, 5]);
        assert_eq!(arg.span(1), (2, 5));
        assert_eq!(arg.span(2), (5, 10));
        assert_eq!(arg.tree_index_at(4), 1);
        assert_eq!(arg.tree_index_at(5), 2);
        assert_eq!(arg.tree_index_at(9), 2);
        assert_eq!(arg.tree_at(0).left(), 0);
    }

    #[test]
    fn test_split_copies_existing_nodes() {
        let mut arg = Arg::new(3, 10);
        let _ = arg.tree_mut(0).add_node(0.5, Node(0), Node(1));
        assert!(arg.split_at(4));
        assert_eq!(arg.trees()[0], {
            let mut t = arg.trees()[1].clone();
            t.left = 0;
            t
        });
        let _ = arg.tree_mut(1).add_node(0.7, Node(2), Node(3));
        assert!(arg.trees()[1].is_complete());
        assert!(!arg.trees()[0].is_complete());
    }

    #[test]
    fn test_validate() {
        assert_eq!(four_sample_arg().validate(), Ok(()));
        assert_eq!(
            Arg::new(4, 10).validate(),
            Err(ArgError::IncompleteTree { left: 0 })
        );
        let empty = Arg {
            nsites: 10,
            sample_size: 4,
            trees: vec![],
        };
        assert_eq!(empty.validate(), Err(ArgError::Empty { nsites: 10 }));
        assert_eq!(Arg::new(4, 0).validate(), Ok(()));
    }

    #[test]
    fn test_validate_bad_boundaries() {
        let arg = Arg {
            nsites: 10,
            sample_size: 4,
            trees: vec![four_sample_tree(1)],
        };
        assert_eq!(arg.validate(), Err(ArgError::FirstTreeNotAtZero(1)));
        let arg = Arg {
            nsites: 10,
            sample_size: 4,
            trees: vec![four_sample_tree(0), four_sample_tree(5), four_sample_tree(5)],
        };
        assert_eq!(arg.validate(), Err(ArgError::UnsortedBoundaries { index: 2 }));
        let arg = Arg {
            nsites: 10,
            sample_size: 4,
            trees: vec![four_sample_tree(0), four_sample_tree(10)],
        };
        assert!(matches!(
            arg.validate(),
            Err(ArgError::BoundaryOutOfRange { index: 1, .. })
        ));
    }

    #[test]
    fn test_validate_time_order() {
        let mut tree = MarginalTree::new(0, 2);
        let _ = tree.add_node(0.0, Node(0), Node(1));
        let arg = Arg {
            nsites: 1,
            sample_size: 2,
            trees: vec![tree],
        };
        assert_eq!(arg.validate(), Err(ArgError::TimeOrder { left: 0, node: 0 }));
    }

    #[test]
    fn test_total_time() {
        assert_eq!(four_sample_arg().total_time(), 2.75);
        let mut arg = Arg {
            nsites: 4,
            sample_size: 4,
            trees: vec![four_sample_tree(0)],
        };
        let mut other = MarginalTree::new(2, 4);
        let n4 = other.add_node(0.5, Node(0), Node(1));
        let n5 = other.add_node(0.5 + 0.25, Node(2), Node(3));
        let _ = other.add_node(1.0, n4, n5);
        arg.trees.push(other);
        // 2.75 over half of the sites, 0.5 + 0.5 + 0.75 + 0.75 + 0.5 + 0.25 over the rest
        assert_eq!(arg.total_time(), 0.5 * 2.75 + 0.5 * 3.25);
        assert_eq!(two_tree_arg().total_time(), 0.25 * 2.75 + 0.75 * 3.25);
    }

    #[test]
    fn test_validate_counts_samples_of_the_arg() {
        assert_eq!(two_tree_arg().validate(), Ok(()));
        let arg = Arg {
            nsites: 2,
            sample_size: 5,
            trees: vec![four_sample_tree(0)],
        };
        assert_eq!(
            arg.validate(),
            Err(ArgError::MissingDescendants {
                left: 0,
                found: 4,
                expected: 5
            })
        );
    }

    #[test]
    fn test_rescale_boundaries() {
        let mut arg = two_tree_arg();
        arg.rescale_boundaries(10, |left| left * 2);
        assert_eq!(arg.nsites(), 10);
        assert_eq!(arg.span(0), (0, 2));
        assert_eq!(arg.span(1), (2, 10));
        assert_eq!(arg.validate(), Ok(()));
    }

    #[test]
    fn test_minimize() {
        let mut arg = Arg {
            nsites: 10,
            sample_size: 4,
            trees: vec![four_sample_tree(0), four_sample_tree(3), four_sample_tree(7)],
        };
        arg.minimize();
        assert_eq!(arg.len(), 1);
        assert_eq!(arg.span(0), (0, 10));

        let mut different = MarginalTree::new(5, 4);
        let n4 = different.add_node(0.25, Node(0), Node(2));
        let n5 = different.add_node(0.5, Node(1), Node(3));
        let _ = different.add_node(1.0, n4, n5);
        let mut arg = Arg {
            nsites: 10,
            sample_size: 4,
            trees: vec![four_sample_tree(0), different],
        };
        arg.minimize();
        assert_eq!(arg.len(), 2);
    }

    #[test]
    fn test_site_frequency_times() {
        let arg = four_sample_arg();
        assert_eq!(arg.site_frequency_times(false), vec![1.5, 1.25, 0.0]);
        assert_eq!(arg.site_frequency_times(true), vec![1.5, 1.25]);
        assert!(Arg::new(1, 10).site_frequency_times(false).is_empty());
    }
}
