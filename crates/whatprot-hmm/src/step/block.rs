//! Blocked N-termini: some fraction of peptides never present a cleavable
//! N-terminus for the next Edman attempt, either from the outset
//! (`InitialBlockTransition`, applied once before the first cycle) or freshly
//! each cycle, from side reactions that cap a newly exposed residue
//! (`CyclicBlockTransition`, applied once per cycle immediately before the
//! Edman attempt). Both are the same shrinkage operator — shared here the
//! same way [`crate::step::channel_loss::ChannelLossTransition`] is shared
//! between dudding and bleaching — just instantiated with a different prior.
//!
//! The operator never shifts the Edman axis: a cell at `(k, counts)` splits
//! into `1 - p_block` mass that stays eligible for the next cleavage attempt
//! (left in [`whatprot_tensor::PeptideStateVector::tensor`]) and `p_block`
//! mass that moves into the parallel, permanently-ineligible
//! [`whatprot_tensor::PeptideStateVector::blocked`] tensor at the same cell.
//! Blocked mass keeps imaging, bleaching, dudding, and detaching normally —
//! only Edman skips it from here on.

use whatprot_model::ParameterFitter;
use whatprot_tensor::{KDRange, PeptideStateVector, Tensor};

/// A single block probability, shared in shape by both the initial and
/// cyclic variants.
#[derive(Clone, Copy, Debug)]
pub struct BlockTransition {
    pub p_block: f64,
}

impl BlockTransition {
    #[must_use]
    pub fn new(p_block: f64) -> Self {
        Self { p_block }
    }

    /// Blocking moves mass between `tensor` and `blocked` at the same cell;
    /// it never changes which cells are live.
    #[must_use]
    pub fn prune_forward(&self, range: &KDRange) -> KDRange {
        range.clone()
    }

    #[must_use]
    pub fn prune_backward(&self, range: &KDRange) -> KDRange {
        range.clone()
    }

    #[must_use]
    pub fn forward(&self, input: &PeptideStateVector, range: &KDRange) -> PeptideStateVector {
        let mut out = PeptideStateVector::new(input.tensor.shape());
        out.tensor = input.tensor.clone();
        out.blocked = input.blocked.clone();
        out.tensor
            .for_each_in_range_mut(range, |v| *v *= 1.0 - self.p_block);
        let p_block = self.p_block;
        // Add this cycle's newly blocked share on top of whatever was
        // already permanently blocked.
        let mut cursor = range.min.clone();
        if !range.is_empty() {
            loop {
                let newly_blocked = input.tensor.get(&cursor) * p_block;
                if newly_blocked != 0.0 {
                    *out.blocked.get_mut(&cursor) += newly_blocked;
                }
                if !advance(&mut cursor, range) {
                    break;
                }
            }
        }
        out.range = range.clone();
        out.p_detached = input.p_detached;
        out.allow_detached = input.allow_detached;
        out
    }

    /// Adjoint: a pre-block cell's backward value under `tensor` is a
    /// mixture of "stayed eligible, then followed `backward_out.tensor`" and
    /// "blocked now, then followed `backward_out.blocked`"; `blocked`'s
    /// backward value passes straight through unchanged, since already-
    /// blocked mass isn't touched by this step.
    #[must_use]
    pub fn backward(&self, input: &PeptideStateVector, range: &KDRange) -> PeptideStateVector {
        let mut out = PeptideStateVector::new(input.tensor.shape());
        out.blocked = input.blocked.clone();
        out.tensor = input.tensor.clone();
        let mut cursor = range.min.clone();
        if !range.is_empty() {
            loop {
                let stay = input.tensor.get(&cursor);
                let blocked = input.blocked.get(&cursor);
                let value = (1.0 - self.p_block) * stay + self.p_block * blocked;
                out.tensor.set(&cursor, value);
                if !advance(&mut cursor, range) {
                    break;
                }
            }
        }
        out.range = range.clone();
        out.p_detached = input.p_detached;
        out.allow_detached = input.allow_detached;
        out
    }

    /// Expected (numerator, denominator) contribution to the block-
    /// probability `ParameterFitter`: for every live cell, the posterior
    /// weight of "stayed eligible" vs "blocked" splits independently of any
    /// other cause of Edman failure, since blocking and chemistry failure are
    /// now separate sequential steps rather than a combined event.
    pub fn accumulate_fit(
        &self,
        forward_in: &Tensor,
        backward_out_tensor: &Tensor,
        backward_out_blocked: &Tensor,
        range: &KDRange,
        z: f64,
        fitter: &mut ParameterFitter,
    ) {
        if z <= 0.0 || range.is_empty() {
            return;
        }
        let mut cursor = range.min.clone();
        loop {
            let mass = forward_in.get(&cursor);
            if mass != 0.0 {
                let stay_w = mass * (1.0 - self.p_block) * backward_out_tensor.get(&cursor) / z;
                let block_w = mass * self.p_block * backward_out_blocked.get(&cursor) / z;
                fitter.add(block_w, stay_w + block_w);
            }
            if !advance(&mut cursor, range) {
                break;
            }
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_splits_mass_between_tensor_and_blocked() {
        let shape = [2usize, 2];
        let mut psv = PeptideStateVector::new(&shape);
        psv.tensor.set(&[0, 1], 1.0);
        psv.range = KDRange::full(&shape);
        let step = BlockTransition::new(0.3);
        let out = step.forward(&psv, &psv.range.clone());
        assert!((out.tensor.get(&[0, 1]) - 0.7).abs() < 1e-12);
        assert!((out.blocked.get(&[0, 1]) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn forward_adds_to_mass_already_blocked() {
        let shape = [2usize, 1];
        let mut psv = PeptideStateVector::new(&shape);
        psv.tensor.set(&[0, 0], 0.5);
        psv.blocked.set(&[0, 0], 0.2);
        psv.range = KDRange::full(&shape);
        let step = BlockTransition::new(0.4);
        let out = step.forward(&psv, &psv.range.clone());
        assert!((out.blocked.get(&[0, 0]) - (0.2 + 0.2)).abs() < 1e-12);
        assert!((out.tensor.get(&[0, 0]) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn zero_block_probability_is_identity() {
        let shape = [2usize, 1];
        let mut psv = PeptideStateVector::new(&shape);
        psv.tensor.set(&[0, 0], 0.6);
        psv.range = KDRange::full(&shape);
        let step = BlockTransition::new(0.0);
        let out = step.forward(&psv, &psv.range.clone());
        assert!((out.tensor.get(&[0, 0]) - 0.6).abs() < 1e-12);
        assert_eq!(out.blocked.get(&[0, 0]), 0.0);
    }

    #[test]
    fn forward_and_backward_are_adjoint() {
        let shape = [1usize, 2];
        let mut x = PeptideStateVector::new(&shape);
        x.tensor.set(&[0, 0], 0.4);
        x.tensor.set(&[0, 1], 0.6);
        x.blocked.set(&[0, 0], 0.1);
        x.range = KDRange::full(&shape);

        let mut y = PeptideStateVector::new(&shape);
        y.tensor.set(&[0, 0], 2.0);
        y.tensor.set(&[0, 1], 3.0);
        y.blocked.set(&[0, 0], 5.0);
        y.blocked.set(&[0, 1], 7.0);
        y.range = KDRange::full(&shape);

        let step = BlockTransition::new(0.25);
        let forward_x = step.forward(&x, &x.range.clone());
        let backward_y = step.backward(&y, &y.range.clone());

        let mut lhs = 0.0;
        let mut rhs = 0.0;
        for j in 0..2 {
            lhs += forward_x.tensor.get(&[0, j]) * y.tensor.get(&[0, j]);
            lhs += forward_x.blocked.get(&[0, j]) * y.blocked.get(&[0, j]);
            rhs += x.tensor.get(&[0, j]) * backward_y.tensor.get(&[0, j]);
            rhs += x.blocked.get(&[0, j]) * backward_y.blocked.get(&[0, j]);
        }
        assert!((lhs - rhs).abs() < 1e-9, "lhs={lhs} rhs={rhs}");
    }
}
