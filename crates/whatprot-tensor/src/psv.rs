//! The [`PeptideStateVector`]: a dense tensor plus the scalar `p_detached`
//! mass, the parallel `blocked` tensor, and the live sub-region the most
//! recent step produced.

use crate::range::KDRange;
use crate::tensor::Tensor;

/// State carried between HMM steps: the per-(Edman, dye-count) tensor mass
/// still eligible for a future cleavage attempt, the same-shaped mass that
/// has been permanently blocked (it keeps imaging, bleaching, dudding, and
/// detaching like any other cell, but never again advances the Edman axis),
/// the scalar mass that has detached from the surface, and the live
/// sub-region — shared by `tensor` and `blocked` — that isn't implicitly
/// zero.
#[derive(Clone, Debug)]
pub struct PeptideStateVector {
    pub tensor: Tensor,
    pub blocked: Tensor,
    pub range: KDRange,
    pub p_detached: f64,
    pub allow_detached: bool,
}

impl PeptideStateVector {
    /// A zeroed PSV of the given shape, with the full shape marked live.
    #[must_use]
    pub fn new(shape: &[usize]) -> Self {
        Self {
            tensor: Tensor::new(shape),
            blocked: Tensor::new(shape),
            range: KDRange::full(shape),
            p_detached: 0.0,
            allow_detached: true,
        }
    }

    /// The initial forward PSV: all mass at row 0 (no Edman cleavages yet)
    /// with every dye-count axis at its full, nothing-lost-yet count —
    /// `full_counts[c]` is the total number of channel-`c` dyes the dye-seq
    /// carries. Nothing has detached yet.
    #[must_use]
    pub fn initial(shape: &[usize], full_counts: &[usize]) -> Self {
        debug_assert_eq!(shape.len(), full_counts.len() + 1);
        let mut psv = Self::new(shape);
        let mut cell = vec![0usize; shape.len()];
        cell[1..].copy_from_slice(full_counts);
        psv.tensor.set(&cell, 1.0);
        let min = cell.clone();
        let max: Vec<usize> = cell.iter().map(|&v| v + 1).collect();
        psv.range = KDRange::new(min, max);
        psv
    }

    /// The initial backward PSV: mass 1.0 everywhere in `range`, on both
    /// `tensor` and `blocked` (the "identity" functional every step's
    /// backward pass consumes).
    #[must_use]
    pub fn backward_seed(shape: &[usize], range: &KDRange) -> Self {
        let mut psv = Self::new(shape);
        psv.tensor.for_each_in_range_mut(range, |v| *v = 1.0);
        psv.blocked.for_each_in_range_mut(range, |v| *v = 1.0);
        psv.p_detached = 1.0;
        psv.range = range.clone();
        psv
    }

    /// Total live mass: in-range `tensor` and `blocked` sums, plus
    /// `p_detached` if allowed.
    #[must_use]
    pub fn total(&self) -> f64 {
        let mass = self.tensor.sum_range(&self.range) + self.blocked.sum_range(&self.range);
        if self.allow_detached {
            mass + self.p_detached
        } else {
            mass
        }
    }

    /// Pointwise sum of two PSVs over the union of their live ranges; missing
    /// cells on either side count as zero. Used to combine two bleach-channel
    /// contributions during the backward pass.
    #[must_use]
    pub fn add(&self, other: &PeptideStateVector) -> PeptideStateVector {
        let shape = self.tensor.shape().to_vec();
        debug_assert_eq!(shape, other.tensor.shape());
        let union = union_range(&self.range, &other.range);
        let mut out = PeptideStateVector::new(&shape);
        // Manual element-wise add over the union footprint.
        let mut cursor = union.min.clone();
        if !union.is_empty() {
            loop {
                let a = if self.range.contains(&cursor) {
                    self.tensor.get(&cursor)
                } else {
                    0.0
                };
                let b = if other.range.contains(&cursor) {
                    other.tensor.get(&cursor)
                } else {
                    0.0
                };
                out.tensor.set(&cursor, a + b);
                let blocked_a = if self.range.contains(&cursor) {
                    self.blocked.get(&cursor)
                } else {
                    0.0
                };
                let blocked_b = if other.range.contains(&cursor) {
                    other.blocked.get(&cursor)
                } else {
                    0.0
                };
                out.blocked.set(&cursor, blocked_a + blocked_b);
                if !advance(&mut cursor, &union) {
                    break;
                }
            }
        }
        out.range = union;
        out.p_detached = self.p_detached + other.p_detached;
        out.allow_detached = self.allow_detached || other.allow_detached;
        out
    }
}

fn union_range(a: &KDRange, b: &KDRange) -> KDRange {
    let order = a.order();
    let mut min = Vec::with_capacity(order);
    let mut max = Vec::with_capacity(order);
    for i in 0..order {
        min.push(a.min[i].min(b.min[i]));
        max.push(a.max[i].max(b.max[i]));
    }
    KDRange::new(min, max)
}

fn advance(cursor: &mut [usize], range: &KDRange) -> bool {
    for i in (0..cursor.len()).rev() {
        cursor[i] += 1;
        if cursor[i] < range.max[i] {
            return true;
        }
        cursor[i] = range.min[i];
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_psv_has_unit_mass_at_row_zero_full_dye_count() {
        let psv = PeptideStateVector::initial(&[3, 4], &[3]);
        assert_eq!(psv.total(), 1.0);
        assert_eq!(psv.tensor.get(&[0, 3]), 1.0);
        assert_eq!(psv.tensor.get(&[0, 0]), 0.0);
    }

    #[test]
    fn add_unions_ranges_and_treats_missing_as_zero() {
        let mut a = PeptideStateVector::new(&[2, 2]);
        a.tensor.set(&[0, 0], 1.0);
        a.range = KDRange::new(vec![0, 0], vec![1, 1]);
        a.p_detached = 0.1;

        let mut b = PeptideStateVector::new(&[2, 2]);
        b.tensor.set(&[1, 1], 2.0);
        b.range = KDRange::new(vec![1, 1], vec![2, 2]);
        b.p_detached = 0.2;

        let c = a.add(&b);
        assert_eq!(c.tensor.get(&[0, 0]), 1.0);
        assert_eq!(c.tensor.get(&[1, 1]), 2.0);
        assert!((c.p_detached - 0.3).abs() < 1e-12);
    }
}
