//! The dud and bleach transitions are both a per-channel binomial survival
//! redistribution along one tensor axis; this is the shared machinery both
//! build on.

use whatprot_model::ParameterFitter;
use whatprot_tensor::{KDRange, PeptideStateVector, Tensor};

use crate::binomial::BinomialTransition;

/// Applies a [`BinomialTransition`] along one dye-count axis. Used once per
/// channel for dudding (applied a single time, at the very first cycle) and
/// once per channel per cycle for bleaching.
#[derive(Clone, Debug)]
pub struct ChannelLossTransition {
    axis: usize,
    table: BinomialTransition,
}

impl ChannelLossTransition {
    #[must_use]
    pub fn new(axis: usize, p: f64, max_count: usize) -> Self {
        Self {
            axis,
            table: BinomialTransition::new(p, max_count),
        }
    }

    /// Forward-live range after loss: the target axis can only shrink
    /// (dyes are never gained), so its lower bound drops to zero while
    /// every other axis, and the axis's upper bound, are unchanged.
    #[must_use]
    pub fn prune_forward(&self, range: &KDRange) -> KDRange {
        range.with_min(self.axis, 0)
    }

    /// Backward pre-image: any pre-loss count up to the tensor's axis
    /// extent could have produced a post-loss count inside `range`, so the
    /// upper bound widens to the full axis while the lower bound (no count
    /// below what's live post-loss could have been reached) is unchanged.
    #[must_use]
    pub fn prune_backward(&self, range: &KDRange, shape: &[usize]) -> KDRange {
        range.with_max(self.axis, shape[self.axis])
    }

    #[must_use]
    pub fn forward(&self, input: &PeptideStateVector, range: &KDRange) -> PeptideStateVector {
        let shape = input.tensor.shape().to_vec();
        let out_range = self.prune_forward(range);
        let mut out = PeptideStateVector::new(&shape);
        out.tensor = self.redistribute_forward(&input.tensor, range, &out_range);
        out.blocked = self.redistribute_forward(&input.blocked, range, &out_range);
        out.range = out_range;
        out.p_detached = input.p_detached;
        out.allow_detached = input.allow_detached;
        out
    }

    fn redistribute_forward(&self, tensor: &Tensor, range: &KDRange, out_range: &KDRange) -> Tensor {
        let mut out = Tensor::new(tensor.shape());
        if out_range.is_empty() {
            return out;
        }
        let mut cursor = out_range.min.clone();
        loop {
            let to = cursor[self.axis];
            let from_max = range.max[self.axis];
            let mut acc = 0.0;
            let mut src = cursor.clone();
            let from_min = range.min[self.axis].max(to);
            for from in from_min..from_max {
                src[self.axis] = from;
                acc += tensor.get(&src) * self.table.prob(from, to);
            }
            out.set(&cursor, acc);
            if !advance(&mut cursor, out_range) {
                break;
            }
        }
        out
    }

    /// Adjoint of [`ChannelLossTransition::forward`]: pulls a backward
    /// vector defined over post-loss counts back to one defined over
    /// pre-loss counts.
    #[must_use]
    pub fn backward(&self, input: &PeptideStateVector, range: &KDRange) -> PeptideStateVector {
        let shape = input.tensor.shape().to_vec();
        let pre_range = self.prune_backward(range, &shape);
        let mut out = PeptideStateVector::new(&shape);
        out.tensor = self.redistribute_backward(&input.tensor, range, &pre_range);
        out.blocked = self.redistribute_backward(&input.blocked, range, &pre_range);
        out.range = pre_range;
        out.p_detached = input.p_detached;
        out.allow_detached = input.allow_detached;
        out
    }

    fn redistribute_backward(&self, tensor: &Tensor, range: &KDRange, pre_range: &KDRange) -> Tensor {
        let mut out = Tensor::new(tensor.shape());
        if pre_range.is_empty() {
            return out;
        }
        let mut cursor = pre_range.min.clone();
        loop {
            let from = cursor[self.axis];
            let to_min = range.min[self.axis];
            let to_max = (from + 1).min(range.max[self.axis]);
            let mut acc = 0.0;
            if to_min < to_max {
                let mut dst = cursor.clone();
                for to in to_min..to_max {
                    dst[self.axis] = to;
                    acc += tensor.get(&dst) * self.table.prob(from, to);
                }
            }
            out.set(&cursor, acc);
            if !advance(&mut cursor, pre_range) {
                break;
            }
        }
        out
    }

    /// Expected (numerator, denominator) contribution to the survival-
    /// probability `ParameterFitter`: for every pre-loss count `i` and
    /// post-loss count `j`, the posterior weight is
    /// `forward_in[i] * table.prob(i, j) * backward_out[j] / z`, and each
    /// surviving dye (`j` of them) is one Bernoulli "did not bleach" trial
    /// out of `i` total trials.
    pub fn accumulate_fit(
        &self,
        forward_in: &Tensor,
        backward_out: &Tensor,
        range: &KDRange,
        z: f64,
        fitter: &mut ParameterFitter,
    ) {
        if z <= 0.0 {
            return;
        }
        let axis = self.axis;
        let max_count = self.table.max_count();
        if range.is_empty() {
            return;
        }
        let mut cursor = range.min.clone();
        loop {
            let i = cursor[axis];
            for j in 0..=i.min(max_count) {
                let mut out_cursor = cursor.clone();
                out_cursor[axis] = j;
                if !range.contains(&out_cursor) {
                    continue;
                }
                let weight =
                    forward_in.get(&cursor) * self.table.prob(i, j) * backward_out.get(&out_cursor) / z;
                if weight > 0.0 {
                    fitter.add(weight * f64::from(j as u32), weight * f64::from(i as u32));
                }
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
