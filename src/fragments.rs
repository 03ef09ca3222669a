//! Partially linked fragments.
//!
//! Several fragments separated by unsampled sequence are simulated
//! as one contiguous region whose recombination map carries the
//! rate of each gap on the link joining two fragments.  The helpers
//! here build that map and move tree boundaries and mutation
//! positions from the contiguous region back to physical positions.

use crate::error::ParameterError;
use crate::marginal::Arg;
use crate::mutation::Haplotypes;

/// A sampled stretch of sequence, `distance` sites to the right
/// of the end of the previous fragment, or of the region start.
///
/// Two 1kb fragments 10kb apart are `(0, 1000)` then `(10000, 1000)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub distance: i64,
    pub length: i64,
}

impl Fragment {
    pub fn new(distance: i64, length: i64) -> Self {
        Self { distance, length }
    }
}

/// Sites actually sampled.
pub fn sample_length(fragments: &[Fragment]) -> i64 {
    fragments.iter().map(|f| f.length).sum()
}

/// Sites spanned by the fragments and the gaps between them.
pub fn total_length(fragments: &[Fragment]) -> i64 {
    fragments.iter().map(|f| f.distance + f.length).sum()
}

/// Each fragment as `(start, width)` on `[0, 1)`, both with the
/// fragments packed end to end and at their physical positions.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentScales {
    sample: Vec<(f64, f64)>,
    physical: Vec<(f64, f64)>,
}

impl FragmentScales {
    /// Positions on the simulated, contiguous region.
    pub fn sample(&self) -> &[(f64, f64)] {
        &self.sample
    }

    /// Positions on the whole region, gaps included.
    pub fn physical(&self) -> &[(f64, f64)] {
        &self.physical
    }

    /// Move a position on the contiguous region to its physical position.
    ///
    /// Positions outside every fragment are returned unchanged.
    pub fn rescale(&self, position: f64) -> f64 {
        let last = self.sample.len().saturating_sub(1);
        for (i, (&(start, width), &(physical_start, physical_width))) in
            self.sample.iter().zip(&self.physical).enumerate()
        {
            // The last fragment also owns the right end of the region.
            let inside = position >= start
                && (position < start + width || (i == last && position <= start + width));
            if inside {
                return physical_start + (position - start) / width * physical_width;
            }
        }
        position
    }
}

/// Where each fragment sits on `[0, 1)`, packed and physically.
pub fn calculate_scales(fragments: &[Fragment]) -> FragmentScales {
    let sampled = sample_length(fragments) as f64;
    let total = total_length(fragments) as f64;
    let mut sample = Vec::with_capacity(fragments.len());
    let mut physical = Vec::with_capacity(fragments.len());
    let mut packed = 0.0;
    let mut end = 0;
    for fragment in fragments {
        let length = fragment.length as f64;
        sample.push((packed, length / sampled));
        packed += length / sampled;
        physical.push(((end + fragment.distance) as f64 / total, length / total));
        end += fragment.distance + fragment.length;
    }
    FragmentScales { sample, physical }
}

/// The recombination map of the packed fragments: `within` spread
/// evenly over the links of each fragment and `between` on the link
/// joining one fragment to the next.
///
/// Has `sample_length(fragments) - 1` entries, one per link.
pub fn fragment_genetic_map(fragments: &[Fragment], within: f64, between: f64) -> Vec<f64> {
    let mut map = Vec::with_capacity(std::cmp::max(sample_length(fragments) - 1, 0) as usize);
    for (i, fragment) in fragments.iter().enumerate() {
        let links = fragment.length - 1;
        for _ in 0..links {
            map.push(within / links as f64);
        }
        if i + 1 < fragments.len() {
            map.push(between);
        }
    }
    map
}

/// Move the positions of `haplotypes` from the packed
/// fragments to their physical positions.
pub fn rescale_mutation_positions(haplotypes: &mut Haplotypes, scales: &FragmentScales) {
    for position in haplotypes.positions_mut() {
        *position = scales.rescale(*position);
    }
}

/// Move the tree boundaries of `arg`, simulated over the packed
/// fragments, to physical sites.  The ARG then spans
/// `total_length(fragments)` sites.
///
/// A tree starting `k` sites into a fragment starts `k` sites into
/// that fragment's physical position.  The first tree keeps starting
/// at 0.
///
/// # Errors
///
/// [`ParameterError::FragmentLengthMismatch`] if the fragments do
/// not hold exactly the sites of `arg`.
pub fn rescale_arg(arg: &mut Arg, fragments: &[Fragment]) -> Result<(), ParameterError> {
    let found = sample_length(fragments);
    if found != arg.nsites() {
        return Err(ParameterError::FragmentLengthMismatch {
            expected: arg.nsites(),
            found,
        });
    }
    arg.rescale_boundaries(total_length(fragments), |left| {
        let mut sampled = 0;
        let mut physical = 0;
        for fragment in fragments {
            physical += fragment.distance;
            if left < sampled + fragment.length {
                return physical + left - sampled;
            }
            sampled += fragment.length;
            physical += fragment.length;
        }
        physical
    });
    Ok(())
}
