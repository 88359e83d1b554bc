//! Per-cycle, per-channel emission densities, computed once per radiometry
//! so [`crate::step::emission::PeptideEmission`] never re-evaluates the
//! channel pdf inside the hot tensor loop.

use whatprot_model::SequencingModel;

use crate::types::Radiometry;

/// `density[t][c][n]` = probability density of the observed intensity at
/// cycle `t`, channel `c`, given `n` dyes present in that channel.
#[derive(Clone, Debug)]
pub struct RadiometryPrecomputations {
    density: Vec<Vec<Vec<f64>>>,
}

impl RadiometryPrecomputations {
    #[must_use]
    pub fn new(model: &SequencingModel, radiometry: &Radiometry, max_counts: &[usize]) -> Self {
        let t = radiometry.num_cycles();
        let c = radiometry.num_channels();
        debug_assert_eq!(c, model.num_channels());
        debug_assert_eq!(c, max_counts.len());

        let mut density = Vec::with_capacity(t);
        for cycle in 0..t {
            let mut per_channel = Vec::with_capacity(c);
            for channel in 0..c {
                let observed = radiometry.get(cycle, channel);
                let chan_model = &model.channels[channel];
                let table = (0..=max_counts[channel])
                    .map(|n| chan_model.pdf(observed, n as u32))
                    .collect();
                per_channel.push(table);
            }
            density.push(per_channel);
        }
        Self { density }
    }

    #[must_use]
    pub fn density(&self, cycle: usize, channel: usize, count: usize) -> f64 {
        self.density[cycle][channel]
            .get(count)
            .copied()
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whatprot_model::ChannelModel;

    #[test]
    fn precomputed_density_matches_direct_pdf_call() {
        let model = SequencingModel::new(
            vec![ChannelModel::default(), ChannelModel::default()],
            0.05,
            0.02,
            0.01,
            whatprot_model::DecayingRateModel::default(),
        );
        let radiometry = Radiometry::new(vec![0.0, 2.7, 0.1, 0.2], 2, 2);
        let precomp = RadiometryPrecomputations::new(&model, &radiometry, &[2, 2]);
        for cycle in 0..2 {
            for channel in 0..2 {
                for n in 0..=2 {
                    let direct = model.channels[channel].pdf(radiometry.get(cycle, channel), n);
                    assert!((precomp.density(cycle, channel, n as usize) - direct).abs() < 1e-12);
                }
            }
        }
    }
}
