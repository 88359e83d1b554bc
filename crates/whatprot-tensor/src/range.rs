//! Axis-aligned rectangular sub-region over a tensor's `1+C` index space.
//!
//! A [`KDRange`] is the unit of pruning: every step stores the `forward_range`
//! it consumed and the `backward_range` it produced, and the HMM driver
//! propagates a live region forward (pruning prepass) and backward through
//! each step so the backward pass visits exactly the cells the forward pass
//! touched.

use serde::{Deserialize, Serialize};

/// Closed-open rectangle `[min, max)` over `order` axes.
///
/// Axis `0` is the Edman-count axis; axes `1..order` are per-channel
/// dye-count axes. Cells outside `[min, max)` are implicitly zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KDRange {
    pub min: Vec<usize>,
    pub max: Vec<usize>,
}

impl KDRange {
    /// Construct a range from explicit bounds. `min[i] <= max[i]` is not
    /// enforced here; callers that violate it get an empty range from
    /// `len()`/iteration, never a panic.
    #[must_use]
    pub fn new(min: Vec<usize>, max: Vec<usize>) -> Self {
        debug_assert_eq!(min.len(), max.len());
        Self { min, max }
    }

    /// The full `[0, shape)` range over the given shape.
    #[must_use]
    pub fn full(shape: &[usize]) -> Self {
        Self {
            min: vec![0; shape.len()],
            max: shape.to_vec(),
        }
    }

    /// An empty range of the given order (min == max == 0 everywhere).
    #[must_use]
    pub fn empty(order: usize) -> Self {
        Self {
            min: vec![0; order],
            max: vec![0; order],
        }
    }

    #[inline]
    #[must_use]
    pub fn order(&self) -> usize {
        self.min.len()
    }

    /// Per-axis extent (`max[i] - min[i]`, or 0 if inverted).
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(&lo, &hi)| hi.saturating_sub(lo))
            .collect()
    }

    /// Total number of cells covered (0 if any axis is inverted/empty).
    #[must_use]
    pub fn len(&self) -> usize {
        self.shape().into_iter().product()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `loc` lies within `[min, max)` on every axis.
    #[must_use]
    pub fn contains(&self, loc: &[usize]) -> bool {
        debug_assert_eq!(loc.len(), self.order());
        (0..self.order()).all(|i| loc[i] >= self.min[i] && loc[i] < self.max[i])
    }

    /// Axis-wise intersection. Axes that don't overlap collapse to an
    /// empty (zero-length) interval on that axis rather than panicking.
    #[must_use]
    pub fn intersect(&self, other: &KDRange) -> KDRange {
        debug_assert_eq!(self.order(), other.order());
        let order = self.order();
        let mut min = Vec::with_capacity(order);
        let mut max = Vec::with_capacity(order);
        for i in 0..order {
            let lo = self.min[i].max(other.min[i]);
            let hi = self.max[i].min(other.max[i]);
            min.push(lo);
            max.push(hi.max(lo));
        }
        KDRange { min, max }
    }

    /// Returns a copy with `min[axis]` replaced.
    #[must_use]
    pub fn with_min(&self, axis: usize, value: usize) -> KDRange {
        let mut r = self.clone();
        r.min[axis] = value;
        r
    }

    /// Returns a copy with `max[axis]` replaced.
    #[must_use]
    pub fn with_max(&self, axis: usize, value: usize) -> KDRange {
        let mut r = self.clone();
        r.max[axis] = value;
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_range_covers_whole_shape() {
        let r = KDRange::full(&[2, 3, 4]);
        assert_eq!(r.shape(), vec![2, 3, 4]);
        assert_eq!(r.len(), 24);
        assert!(r.contains(&[1, 2, 3]));
        assert!(!r.contains(&[2, 0, 0]));
    }

    #[test]
    fn intersect_shrinks_to_overlap() {
        let a = KDRange::new(vec![0, 0], vec![5, 5]);
        let b = KDRange::new(vec![2, 3], vec![9, 4]);
        let c = a.intersect(&b);
        assert_eq!(c.min, vec![2, 3]);
        assert_eq!(c.max, vec![5, 4]);
        assert_eq!(c.len(), 3 * 1);
    }

    #[test]
    fn intersect_of_disjoint_ranges_is_empty() {
        let a = KDRange::new(vec![0], vec![2]);
        let b = KDRange::new(vec![5], vec![8]);
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn with_min_max_only_touch_one_axis() {
        let r = KDRange::full(&[3, 3]);
        let r2 = r.with_min(1, 1).with_max(0, 2);
        assert_eq!(r2.min, vec![0, 1]);
        assert_eq!(r2.max, vec![2, 3]);
    }
}
