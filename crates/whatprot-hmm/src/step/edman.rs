//! The Edman cleavage attempt: with probability `1 - p_fail` the amino acid
//! currently at the N-terminus (position `k`, the cell's own axis-0
//! coordinate) is removed, advancing the Edman-cycle axis by one and, if that
//! position carried a dye, decrementing that dye's channel count by one.
//! `p_fail` is the chemistry-only failure rate — whether a cell gets the
//! chance to attempt cleavage at all is decided beforehand by a
//! [`crate::step::block::BlockTransition`], so this step only ever sees and
//! only ever updates the still-eligible population
//! ([`whatprot_tensor::PeptideStateVector::tensor`]); the permanently-blocked
//! population passes through unchanged.

use whatprot_model::ParameterFitter;
use whatprot_tensor::{KDRange, PeptideStateVector, Tensor};

/// The whole per-peptide cleavage schedule: a single chemistry-failure rate
/// shared by every cycle, and `label_at[k]`, the channel (if any) labeling
/// the residue exposed at Edman-count `k`.
#[derive(Clone, Debug)]
pub struct EdmanTransition {
    p_fail: f64,
    label_at: Vec<Option<usize>>,
}

impl EdmanTransition {
    /// `p_fail` is the chemistry-only failure rate; `label_at` is the
    /// channel each position labels, if any.
    #[must_use]
    pub fn new(p_fail: f64, label_at: Vec<Option<usize>>) -> Self {
        Self { p_fail, label_at }
    }

    /// Forward-live range after this cleavage attempt: axis 0 may extend by
    /// one (clipped to the allocated shape), every other axis is unchanged.
    #[must_use]
    pub fn prune_forward(&self, range: &KDRange, shape: &[usize]) -> KDRange {
        let mut next = range.clone();
        next = next.with_max(0, (range.max[0] + 1).min(shape[0]));
        next
    }

    #[must_use]
    pub fn prune_backward(&self, range: &KDRange) -> KDRange {
        range.clone()
    }

    #[must_use]
    pub fn forward(&self, input: &PeptideStateVector, range: &KDRange) -> PeptideStateVector {
        let shape = input.tensor.shape().to_vec();
        let mut out = PeptideStateVector::new(&shape);
        out.p_detached = input.p_detached;
        out.allow_detached = input.allow_detached;
        out.blocked = input.blocked.clone();

        if range.is_empty() {
            out.range = self.prune_forward(range, &shape);
            return out;
        }
        let mut cursor = range.min.clone();
        loop {
            let mass = input.tensor.get(&cursor);
            if mass != 0.0 {
                *out.tensor.get_mut(&cursor) += self.p_fail * mass;
                if let Some(next_cell) = self.shifted_cell(&cursor, &shape) {
                    *out.tensor.get_mut(&next_cell) += (1.0 - self.p_fail) * mass;
                }
            }
            if !advance(&mut cursor, range) {
                break;
            }
        }
        out.range = self.prune_forward(range, &shape);
        out
    }

    #[must_use]
    pub fn backward(&self, input: &PeptideStateVector, range: &KDRange) -> PeptideStateVector {
        let shape = input.tensor.shape().to_vec();
        let mut out = PeptideStateVector::new(&shape);
        out.p_detached = input.p_detached;
        out.allow_detached = input.allow_detached;
        out.blocked = input.blocked.clone();

        // `range` describes the *output*-side (post-cleavage) live region;
        // pre-cleavage cells span the same shape minus the extra axis-0 cell
        // cleavage could have produced.
        let pre_range = self.prune_backward(range);
        let mut cursor = pre_range.min.clone();
        loop {
            let fail_val = if range.contains(&cursor) {
                input.tensor.get(&cursor)
            } else {
                0.0
            };
            let succ_val = self
                .shifted_cell(&cursor, &shape)
                .filter(|c| range.contains(c))
                .map_or(0.0, |c| input.tensor.get(&c));
            let value = self.p_fail * fail_val + (1.0 - self.p_fail) * succ_val;
            out.tensor.set(&cursor, value);
            if !advance(&mut cursor, &pre_range) {
                break;
            }
        }
        out.range = pre_range;
        out
    }

    /// Expected (numerator, denominator) contribution to the Edman-failure
    /// `ParameterFitter`: for every pre-cleavage cell, the posterior weight
    /// of "failed" vs "succeeded" splits between the two outgoing paths.
    pub fn accumulate_fit(
        &self,
        forward_in: &Tensor,
        backward_out: &Tensor,
        range: &KDRange,
        z: f64,
        edman_failure: &mut ParameterFitter,
    ) {
        if z <= 0.0 || range.is_empty() {
            return;
        }
        let shape = forward_in.shape().to_vec();
        let mut cursor = range.min.clone();
        loop {
            let mass = forward_in.get(&cursor);
            if mass != 0.0 {
                let fail_w = mass * self.p_fail * backward_out.get(&cursor) / z;
                let mut succ_w = 0.0;
                if let Some(next_cell) = self.shifted_cell(&cursor, &shape) {
                    succ_w = mass * (1.0 - self.p_fail) * backward_out.get(&next_cell) / z;
                }
                edman_failure.add(fail_w, fail_w + succ_w);
            }
            if !advance(&mut cursor, range) {
                break;
            }
        }
    }

    /// The cell a cleavage success moves probability mass to: axis 0
    /// increments by one, and the labeled channel at position `k` (if any)
    /// decrements by one — but only if that channel's count hasn't already
    /// dropped to zero (the aggregate tensor state can't distinguish *which*
    /// dye was lost earlier to dud/bleach, so if none remain, cleaving this
    /// residue simply has nothing left to remove). `None` only if the axis-0
    /// move itself would leave the allocated shape.
    fn shifted_cell(&self, cell: &[usize], shape: &[usize]) -> Option<Vec<usize>> {
        let k = cell[0];
        let mut next = cell.to_vec();
        next[0] += 1;
        if next[0] >= shape[0] {
            return None;
        }
        if let Some(c) = self.label_at.get(k).copied().flatten() {
            if next[c + 1] > 0 {
                next[c + 1] -= 1;
            }
        }
        Some(next)
    }
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
