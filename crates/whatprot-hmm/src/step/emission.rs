//! The imaging step: reweights every live cell by the likelihood of the
//! observed intensities given that cell's per-channel dye counts. Diagonal
//! in `(k, counts)` — no mass moves between cells, only its weight changes.

use whatprot_tensor::{KDRange, PeptideStateVector};

use crate::precomputations::RadiometryPrecomputations;

#[derive(Clone, Copy, Debug)]
pub struct PeptideEmission<'a> {
    precomp: &'a RadiometryPrecomputations,
    cycle: usize,
    num_channels: usize,
}

impl<'a> PeptideEmission<'a> {
    #[must_use]
    pub fn new(precomp: &'a RadiometryPrecomputations, cycle: usize, num_channels: usize) -> Self {
        Self {
            precomp,
            cycle,
            num_channels,
        }
    }

    #[must_use]
    pub fn prune_forward(&self, range: &KDRange) -> KDRange {
        range.clone()
    }

    #[must_use]
    pub fn prune_backward(&self, range: &KDRange) -> KDRange {
        range.clone()
    }

    fn weight(&self, counts: &[usize]) -> f64 {
        let mut w = 1.0;
        for c in 0..self.num_channels {
            w *= self.precomp.density(self.cycle, c, counts[c + 1]);
        }
        w
    }

    /// Diagonal reweight; identical operation in both directions, so
    /// `backward` just delegates here.
    #[must_use]
    pub fn apply(&self, input: &PeptideStateVector, range: &KDRange) -> PeptideStateVector {
        let mut out = PeptideStateVector::new(input.tensor.shape());
        out.tensor = input.tensor.clone();
        out.blocked = input.blocked.clone();
        let mut cursor = range.min.clone();
        if !range.is_empty() {
            loop {
                let w = self.weight(&cursor);
                *out.tensor.get_mut(&cursor) *= w;
                *out.blocked.get_mut(&cursor) *= w;
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

    #[must_use]
    pub fn forward(&self, input: &PeptideStateVector, range: &KDRange) -> PeptideStateVector {
        self.apply(input, range)
    }

    #[must_use]
    pub fn backward(&self, input: &PeptideStateVector, range: &KDRange) -> PeptideStateVector {
        self.apply(input, range)
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
    use whatprot_model::{ChannelModel, DecayingRateModel, SequencingModel};

    #[test]
    fn emission_is_diagonal_reweight() {
        let model = SequencingModel::new(
            vec![ChannelModel::default()],
            0.05,
            0.02,
            0.01,
            DecayingRateModel::default(),
        );
        let radiometry = crate::types::Radiometry::new(vec![0.0], 1, 1);
        let precomp = RadiometryPrecomputations::new(&model, &radiometry, &[1]);
        let emission = PeptideEmission::new(&precomp, 0, 1);

        let shape = [1usize, 2];
        let mut psv = PeptideStateVector::new(&shape);
        psv.tensor.set(&[0, 0], 1.0);
        psv.tensor.set(&[0, 1], 1.0);
        psv.range = KDRange::full(&shape);

        let out = emission.forward(&psv, &psv.range.clone());
        let expected_0 = model.channels[0].pdf(0.0, 0);
        let expected_1 = model.channels[0].pdf(0.0, 1);
        assert!((out.tensor.get(&[0, 0]) - expected_0).abs() < 1e-12);
        assert!((out.tensor.get(&[0, 1]) - expected_1).abs() < 1e-12);
    }
}
