//! Detachment: at every cycle, a (possibly cycle-dependent) fraction of the
//! remaining peptide population falls off the imaging surface and stops
//! producing any further signal. Once detached, the only thing tracked is
//! how much total probability mass took that path (`PeptideStateVector::
//! p_detached`) — there's no tensor state left to evolve.

use whatprot_model::DecayingRateFitter;
use whatprot_tensor::{KDRange, PeptideStateVector};

#[derive(Clone, Copy, Debug)]
pub struct DetachTransition {
    pub p_detach: f64,
}

impl DetachTransition {
    #[must_use]
    pub fn new(p_detach: f64) -> Self {
        Self { p_detach }
    }

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
        let detached_mass =
            (input.tensor.sum_range(range) + input.blocked.sum_range(range)) * self.p_detach;
        out.tensor = input.tensor.clone();
        out.tensor
            .for_each_in_range_mut(range, |v| *v *= 1.0 - self.p_detach);
        out.blocked = input.blocked.clone();
        out.blocked
            .for_each_in_range_mut(range, |v| *v *= 1.0 - self.p_detach);
        out.range = range.clone();
        out.p_detached = input.p_detached + detached_mass;
        out.allow_detached = input.allow_detached;
        out
    }

    /// Adjoint: a cell's backward value (whether in `tensor` or `blocked`)
    /// is a mixture of "stayed, then followed `backward_out`'s value at that
    /// cell" and "detached now, then followed whatever the rest of the trace
    /// assigns to the detached channel" — captured by
    /// `backward_out.p_detached`, which every subsequent step passes through
    /// unchanged.
    #[must_use]
    pub fn backward(&self, input: &PeptideStateVector, range: &KDRange) -> PeptideStateVector {
        let mut out = PeptideStateVector::new(input.tensor.shape());
        out.tensor = input.tensor.clone();
        out.tensor.for_each_in_range_mut(range, |v| {
            *v = (1.0 - self.p_detach) * *v + self.p_detach * input.p_detached;
        });
        out.blocked = input.blocked.clone();
        out.blocked.for_each_in_range_mut(range, |v| {
            *v = (1.0 - self.p_detach) * *v + self.p_detach * input.p_detached;
        });
        out.range = range.clone();
        out.p_detached = input.p_detached;
        out.allow_detached = input.allow_detached;
        out
    }

    /// Expected (numerator, denominator) contribution to cycle `cycle`'s
    /// slot in the [`DecayingRateFitter`] — every live cell is one
    /// Bernoulli "did it detach" trial.
    #[allow(clippy::too_many_arguments)]
    pub fn accumulate_fit(
        &self,
        forward_in: &whatprot_tensor::Tensor,
        backward_out_p_detached: f64,
        backward_out_tensor: &whatprot_tensor::Tensor,
        range: &KDRange,
        cycle: u32,
        z: f64,
        fitter: &mut DecayingRateFitter,
    ) {
        if z <= 0.0 || range.is_empty() {
            return;
        }
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        let mut cursor = range.min.clone();
        loop {
            let mass = forward_in.get(&cursor);
            if mass != 0.0 {
                let stay_w = mass * (1.0 - self.p_detach) * backward_out_tensor.get(&cursor) / z;
                let detach_w = mass * self.p_detach * backward_out_p_detached / z;
                numerator += detach_w;
                denominator += stay_w + detach_w;
            }
            if !advance(&mut cursor, range) {
                break;
            }
        }
        fitter.add(cycle, numerator, denominator);
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
