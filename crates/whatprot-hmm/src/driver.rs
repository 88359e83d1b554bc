//! The HMM driver: builds the per-peptide step sequence, runs the pruned
//! forward pass to score a trace, and runs the matching backward pass to
//! fold expected sufficient statistics into a [`SequencingModelFitter`].
//!
//! Step order, fixed by how the instrument and the chemistry actually
//! operate: an initial block decision is drawn exactly once, before the
//! first cycle even starts; dudding happens once, before the very first
//! image; every cycle after that is image, then detach, then per-channel
//! bleach, then — if another cycle follows — a fresh cyclic-block decision
//! followed by an Edman cleavage attempt to expose the next residue.

use anyhow::{ensure, Result};
use whatprot_model::{SequencingModel, SequencingModelFitter};
use whatprot_tensor::PeptideStateVector;

use crate::precomputations::RadiometryPrecomputations;
use crate::step::{
    BlockTransition, ChannelLossTransition, DetachTransition, EdmanTransition, PeptideEmission,
};
use crate::types::{DyeSeq, Radiometry};

/// One of the checkpoints the forward pass records, replayed in reverse
/// during the backward pass so each step's `accumulate_fit` can see both
/// the forward state it consumed and the backward state it produced.
enum Checkpoint {
    InitialBlock(PeptideStateVector),
    Dud(usize, PeptideStateVector),
    Emission(usize, PeptideStateVector),
    Detach(usize, PeptideStateVector),
    Bleach(usize, PeptideStateVector),
    CyclicBlock(usize, PeptideStateVector),
    Edman(PeptideStateVector),
}

/// Runs the forward/backward algorithm for one [`SequencingModel`] against
/// many (dye-sequence, radiometry) traces. Holds only a shared reference to
/// the model, so the same `Hmm` can be driven concurrently from several
/// worker threads.
#[derive(Clone, Copy, Debug)]
pub struct Hmm<'a> {
    model: &'a SequencingModel,
}

impl<'a> Hmm<'a> {
    #[must_use]
    pub fn new(model: &'a SequencingModel) -> Self {
        Self { model }
    }

    fn shape(&self, dye_seq: &DyeSeq) -> Vec<usize> {
        let mut shape = vec![dye_seq.len() + 1];
        shape.extend(dye_seq.total_counts().into_iter().map(|n| n + 1));
        shape
    }

    fn edman_transition(&self, dye_seq: &DyeSeq) -> EdmanTransition {
        let label_at: Vec<Option<usize>> = (0..dye_seq.len()).map(|k| dye_seq.channel_at(k)).collect();
        EdmanTransition::new(self.model.p_edman_failure, label_at)
    }

    fn initial_block_transition(&self) -> BlockTransition {
        BlockTransition::new(self.model.p_initial_block)
    }

    fn cyclic_block_transition(&self) -> BlockTransition {
        BlockTransition::new(self.model.p_cyclic_block)
    }

    /// Run the forward pass only, returning the trace's total likelihood
    /// `Z` under this model.
    ///
    /// # Errors
    /// Returns an error if `radiometry`'s channel count disagrees with
    /// `dye_seq`'s or with the model.
    pub fn probability(&self, dye_seq: &DyeSeq, radiometry: &Radiometry) -> Result<f64> {
        let (z, _, _) = self.forward_pass(dye_seq, radiometry)?;
        Ok(z)
    }

    fn forward_pass(
        &self,
        dye_seq: &DyeSeq,
        radiometry: &Radiometry,
    ) -> Result<(f64, Vec<Checkpoint>, whatprot_tensor::KDRange)> {
        ensure!(
            dye_seq.num_channels() == radiometry.num_channels(),
            "dye sequence has {} channels, radiometry has {}",
            dye_seq.num_channels(),
            radiometry.num_channels()
        );
        ensure!(
            dye_seq.num_channels() == self.model.num_channels(),
            "dye sequence has {} channels, model has {}",
            dye_seq.num_channels(),
            self.model.num_channels()
        );

        let shape = self.shape(dye_seq);
        let num_channels = dye_seq.num_channels();
        let max_counts = dye_seq.total_counts();
        let num_cycles = radiometry.num_cycles();

        let precomp = RadiometryPrecomputations::new(self.model, radiometry, &max_counts);
        let dud_tables: Vec<ChannelLossTransition> = (0..num_channels)
            .map(|c| ChannelLossTransition::new(c + 1, self.model.channels[c].p_dud, max_counts[c]))
            .collect();
        let bleach_tables: Vec<ChannelLossTransition> = (0..num_channels)
            .map(|c| {
                ChannelLossTransition::new(c + 1, self.model.channels[c].p_bleach, max_counts[c])
            })
            .collect();
        let edman = self.edman_transition(dye_seq);
        let initial_block = self.initial_block_transition();
        let cyclic_block = self.cyclic_block_transition();

        let mut psv = PeptideStateVector::initial(&shape, &max_counts);
        let mut trace = Vec::new();

        trace.push(Checkpoint::InitialBlock(psv.clone()));
        psv = initial_block.forward(&psv, &psv.range.clone());

        for t in 0..num_cycles {
            if t == 0 {
                for (c, table) in dud_tables.iter().enumerate() {
                    trace.push(Checkpoint::Dud(c, psv.clone()));
                    psv = table.forward(&psv, &psv.range.clone());
                }
            }

            trace.push(Checkpoint::Emission(t, psv.clone()));
            let emission = PeptideEmission::new(&precomp, t, num_channels);
            psv = emission.forward(&psv, &psv.range.clone());

            trace.push(Checkpoint::Detach(t, psv.clone()));
            let detach = DetachTransition::new(self.model.p_detach.effective(t as u32));
            psv = detach.forward(&psv, &psv.range.clone());

            for (c, table) in bleach_tables.iter().enumerate() {
                trace.push(Checkpoint::Bleach(c, psv.clone()));
                psv = table.forward(&psv, &psv.range.clone());
            }

            if t + 1 < num_cycles {
                trace.push(Checkpoint::CyclicBlock(t, psv.clone()));
                psv = cyclic_block.forward(&psv, &psv.range.clone());

                trace.push(Checkpoint::Edman(psv.clone()));
                psv = edman.forward(&psv, &psv.range.clone());
            }
        }

        let z = psv.total();
        let final_range = psv.range.clone();
        Ok((z, trace, final_range))
    }

    /// Run the forward and backward passes, folding the trace's expected
    /// sufficient statistics into `fitter`, and return the trace's
    /// log-likelihood under this model.
    ///
    /// # Errors
    /// Returns an error under the same conditions as [`Hmm::probability`].
    pub fn improve_fit(
        &self,
        dye_seq: &DyeSeq,
        radiometry: &Radiometry,
        fitter: &mut SequencingModelFitter,
    ) -> Result<f64> {
        let shape = self.shape(dye_seq);
        let num_channels = dye_seq.num_channels();
        let max_counts = dye_seq.total_counts();

        let (z, trace, final_range) = self.forward_pass(dye_seq, radiometry)?;
        if z <= 0.0 {
            return Ok(f64::NEG_INFINITY);
        }

        let precomp = RadiometryPrecomputations::new(self.model, radiometry, &max_counts);
        let dud_tables: Vec<ChannelLossTransition> = (0..num_channels)
            .map(|c| ChannelLossTransition::new(c + 1, self.model.channels[c].p_dud, max_counts[c]))
            .collect();
        let bleach_tables: Vec<ChannelLossTransition> = (0..num_channels)
            .map(|c| {
                ChannelLossTransition::new(c + 1, self.model.channels[c].p_bleach, max_counts[c])
            })
            .collect();
        let edman = self.edman_transition(dye_seq);
        let initial_block = self.initial_block_transition();
        let cyclic_block = self.cyclic_block_transition();

        let mut back = PeptideStateVector::backward_seed(&shape, &final_range);

        for checkpoint in trace.into_iter().rev() {
            match checkpoint {
                Checkpoint::Edman(forward_in) => {
                    edman.accumulate_fit(
                        &forward_in.tensor,
                        &back.tensor,
                        &back.range,
                        z,
                        &mut fitter.edman_failure,
                    );
                    back = edman.backward(&back, &back.range.clone());
                }
                Checkpoint::CyclicBlock(_, forward_in) => {
                    cyclic_block.accumulate_fit(
                        &forward_in.tensor,
                        &back.tensor,
                        &back.blocked,
                        &back.range,
                        z,
                        &mut fitter.cyclic_block,
                    );
                    back = cyclic_block.backward(&back, &back.range.clone());
                }
                Checkpoint::InitialBlock(forward_in) => {
                    initial_block.accumulate_fit(
                        &forward_in.tensor,
                        &back.tensor,
                        &back.blocked,
                        &back.range,
                        z,
                        &mut fitter.initial_block,
                    );
                    back = initial_block.backward(&back, &back.range.clone());
                }
                Checkpoint::Bleach(c, forward_in) => {
                    bleach_tables[c].accumulate_fit(
                        &forward_in.tensor,
                        &back.tensor,
                        &back.range,
                        z,
                        &mut fitter.channels[c].bleach,
                    );
                    bleach_tables[c].accumulate_fit(
                        &forward_in.blocked,
                        &back.blocked,
                        &back.range,
                        z,
                        &mut fitter.channels[c].bleach,
                    );
                    back = bleach_tables[c].backward(&back, &back.range.clone());
                }
                Checkpoint::Detach(t, forward_in) => {
                    let detach = DetachTransition::new(self.model.p_detach.effective(t as u32));
                    detach.accumulate_fit(
                        &forward_in.tensor,
                        back.p_detached,
                        &back.tensor,
                        &back.range,
                        t as u32,
                        z,
                        &mut fitter.detach,
                    );
                    detach.accumulate_fit(
                        &forward_in.blocked,
                        back.p_detached,
                        &back.blocked,
                        &back.range,
                        t as u32,
                        z,
                        &mut fitter.detach,
                    );
                    back = detach.backward(&back, &back.range.clone());
                }
                Checkpoint::Emission(t, forward_in) => {
                    accumulate_emission_fit(
                        &forward_in,
                        &back,
                        t,
                        &precomp,
                        radiometry,
                        num_channels,
                        z,
                        fitter,
                    );
                    let emission = PeptideEmission::new(&precomp, t, num_channels);
                    back = emission.backward(&back, &back.range.clone());
                }
                Checkpoint::Dud(c, forward_in) => {
                    dud_tables[c].accumulate_fit(
                        &forward_in.tensor,
                        &back.tensor,
                        &back.range,
                        z,
                        &mut fitter.channels[c].dud,
                    );
                    dud_tables[c].accumulate_fit(
                        &forward_in.blocked,
                        &back.blocked,
                        &back.range,
                        z,
                        &mut fitter.channels[c].dud,
                    );
                    back = dud_tables[c].backward(&back, &back.range.clone());
                }
            }
        }

        Ok(z.ln())
    }
}

/// Folds the emission step's posterior cell weights into each channel's
/// intensity fitter and the background-noise fitter.
fn accumulate_emission_fit(
    forward_in: &PeptideStateVector,
    back: &PeptideStateVector,
    cycle: usize,
    precomp: &RadiometryPrecomputations,
    radiometry: &Radiometry,
    num_channels: usize,
    z: f64,
    fitter: &mut SequencingModelFitter,
) {
    if z <= 0.0 || back.range.is_empty() {
        return;
    }
    let mut cursor = back.range.min.clone();
    loop {
        let mut density = 1.0;
        for c in 0..num_channels {
            density *= precomp.density(cycle, c, cursor[c + 1]);
        }
        for (mass, back_mass) in [
            (forward_in.tensor.get(&cursor), back.tensor.get(&cursor)),
            (forward_in.blocked.get(&cursor), back.blocked.get(&cursor)),
        ] {
            if mass == 0.0 {
                continue;
            }
            let weight = mass * density * back_mass / z;
            if weight > 0.0 {
                for c in 0..num_channels {
                    let observed = radiometry.get(cycle, c);
                    let count = cursor[c + 1] as u32;
                    if count == 0 {
                        fitter.channels[c].background.add(observed, weight);
                    } else {
                        fitter.channels[c].intensity.add(observed, count, weight);
                    }
                }
            }
        }
        if !advance(&mut cursor, &back.range) {
            break;
        }
    }
}

fn advance(cursor: &mut [usize], range: &whatprot_tensor::KDRange) -> bool {
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
    use std::f64::consts::PI;
    use whatprot_model::{ChannelModel, DecayingRateModel, SequencingModelFitter};

    /// `mu = 0`, `sig = bg_sig = 1/sqrt(2*pi)` makes both the log-normal
    /// intensity pdf (at `observed = 1, count = 1`) and the background pdf
    /// (at `observed = 0, count = 0`) evaluate to exactly 1 — the "emission
    /// pdf returning 1" test double the literal single-dye scenario needs.
    fn unit_density_channel(p_bleach: f64, p_dud: f64) -> ChannelModel {
        let s = 1.0 / (2.0 * PI).sqrt();
        ChannelModel::new(p_bleach, p_dud, 0.0, s, s)
    }

    #[test]
    fn single_dye_two_cycles_no_loss_gives_unit_likelihood() {
        let model = SequencingModel::new(
            vec![unit_density_channel(0.0, 0.0)],
            0.0,
            0.0,
            0.0,
            DecayingRateModel::new(0.0, 0.0, 1.0),
        );
        let dye_seq = DyeSeq::new(vec![Some(0)], 1);
        // count=1 at cycle 0 (observed=1.0), count=0 at cycle 1 after the
        // deterministic cleavage (observed=0.0) — both hit the unit density.
        let radiometry = Radiometry::new(vec![1.0, 0.0], 2, 1);
        let hmm = Hmm::new(&model);
        let z = hmm.probability(&dye_seq, &radiometry).unwrap();
        assert!((z - 1.0).abs() < 1e-9, "z={z}");
    }

    #[test]
    fn mismatched_channel_counts_are_rejected() {
        let model = SequencingModel::new(
            vec![unit_density_channel(0.0, 0.0)],
            0.0,
            0.0,
            0.0,
            DecayingRateModel::default(),
        );
        let dye_seq = DyeSeq::new(vec![Some(0)], 1);
        let radiometry = Radiometry::new(vec![0.0, 0.0, 0.0, 0.0], 2, 2);
        let hmm = Hmm::new(&model);
        assert!(hmm.probability(&dye_seq, &radiometry).is_err());
    }

    #[test]
    fn certain_edman_failure_leaves_total_mass_unchanged() {
        // p_edman_failure = 1, p_bleach = p_dud = p_detach = 0, and a unit
        // emission density: nothing the tensor holds can ever leave or be
        // rescaled, so total mass stays at the initial 1.0 through every
        // cycle regardless of how many cycles run.
        let model = SequencingModel::new(
            vec![unit_density_channel(0.0, 0.0)],
            1.0,
            0.0,
            0.0,
            DecayingRateModel::new(0.0, 0.0, 1.0),
        );
        let dye_seq = DyeSeq::new(vec![Some(0)], 1);
        let radiometry = Radiometry::new(vec![1.0, 1.0, 1.0], 3, 1);
        let hmm = Hmm::new(&model);
        let z = hmm.probability(&dye_seq, &radiometry).unwrap();
        assert!((z - 1.0).abs() < 1e-9, "z={z}");
    }

    #[test]
    fn forward_backward_inner_product_is_constant_across_boundaries() {
        let model = SequencingModel::new(
            vec![
                ChannelModel::new(0.2, 0.1, 0.0, 0.3, 0.05),
                ChannelModel::new(0.15, 0.05, 0.2, 0.25, 0.04),
            ],
            0.1,
            0.02,
            0.03,
            DecayingRateModel::new(0.05, 0.1, 0.5),
        );
        let dye_seq = DyeSeq::new(vec![Some(0), Some(1), None, Some(0)], 2);
        let radiometry = Radiometry::new(
            vec![0.9, 1.1, 0.4, 0.3, 0.2, 0.15, 0.1, 0.05],
            4,
            2,
        );
        let hmm = Hmm::new(&model);
        let (z, trace, final_range) = hmm.forward_pass(&dye_seq, &radiometry).unwrap();
        assert!(z > 0.0);

        let shape = hmm.shape(&dye_seq);
        let num_channels = dye_seq.num_channels();
        let max_counts = dye_seq.total_counts();
        let precomp = RadiometryPrecomputations::new(&model, &radiometry, &max_counts);
        let dud_tables: Vec<ChannelLossTransition> = (0..num_channels)
            .map(|c| ChannelLossTransition::new(c + 1, model.channels[c].p_dud, max_counts[c]))
            .collect();
        let bleach_tables: Vec<ChannelLossTransition> = (0..num_channels)
            .map(|c| ChannelLossTransition::new(c + 1, model.channels[c].p_bleach, max_counts[c]))
            .collect();
        let edman = hmm.edman_transition(&dye_seq);
        let initial_block = hmm.initial_block_transition();
        let cyclic_block = hmm.cyclic_block_transition();

        let mut back = PeptideStateVector::backward_seed(&shape, &final_range);
        for checkpoint in trace.into_iter().rev() {
            let (forward_in, next_back) = match checkpoint {
                Checkpoint::Edman(forward_in) => {
                    let nb = edman.backward(&back, &back.range.clone());
                    (forward_in, nb)
                }
                Checkpoint::CyclicBlock(_, forward_in) => {
                    let nb = cyclic_block.backward(&back, &back.range.clone());
                    (forward_in, nb)
                }
                Checkpoint::InitialBlock(forward_in) => {
                    let nb = initial_block.backward(&back, &back.range.clone());
                    (forward_in, nb)
                }
                Checkpoint::Bleach(c, forward_in) => {
                    let nb = bleach_tables[c].backward(&back, &back.range.clone());
                    (forward_in, nb)
                }
                Checkpoint::Detach(t, forward_in) => {
                    let detach = DetachTransition::new(model.p_detach.effective(t as u32));
                    let nb = detach.backward(&back, &back.range.clone());
                    (forward_in, nb)
                }
                Checkpoint::Emission(t, forward_in) => {
                    let emission = PeptideEmission::new(&precomp, t, num_channels);
                    let nb = emission.backward(&back, &back.range.clone());
                    (forward_in, nb)
                }
                Checkpoint::Dud(c, forward_in) => {
                    let nb = dud_tables[c].backward(&back, &back.range.clone());
                    (forward_in, nb)
                }
            };
            back = next_back;
            let inner = dot(&forward_in, &back);
            assert!((inner - z).abs() < 1e-6, "inner={inner} z={z}");
        }
    }

    fn dot(forward: &PeptideStateVector, backward: &PeptideStateVector) -> f64 {
        let mut total = forward.p_detached * backward.p_detached;
        let range = forward.range.intersect(&backward.range);
        if !range.is_empty() {
            let mut cursor = range.min.clone();
            loop {
                total += forward.tensor.get(&cursor) * backward.tensor.get(&cursor);
                total += forward.blocked.get(&cursor) * backward.blocked.get(&cursor);
                if !advance(&mut cursor, &range) {
                    break;
                }
            }
        }
        total
    }

    #[test]
    fn improve_fit_returns_log_of_the_same_likelihood_as_probability() {
        let model = SequencingModel::new(
            vec![ChannelModel::new(0.1, 0.05, 0.1, 0.3, 0.05)],
            0.1,
            0.01,
            0.02,
            DecayingRateModel::new(0.05, 0.1, 0.5),
        );
        let dye_seq = DyeSeq::new(vec![Some(0), None, Some(0)], 1);
        let radiometry = Radiometry::new(vec![1.0, 0.9, 0.1, 0.05], 4, 1);
        let hmm = Hmm::new(&model);
        let z = hmm.probability(&dye_seq, &radiometry).unwrap();
        let mut fitter = SequencingModelFitter::new(1);
        let log_z = hmm.improve_fit(&dye_seq, &radiometry, &mut fitter).unwrap();
        assert!((log_z - z.ln()).abs() < 1e-9);
        // Every accumulated ratio should land in [0, 1] and stay finite.
        assert!(fitter.edman_failure.get(0.5).is_finite());
        assert!(fitter.channels[0].bleach.get(0.5).is_finite());
    }

    #[test]
    fn zero_likelihood_trace_is_skipped_without_producing_nan() {
        // p_dud = 1 on the sole dye with a positive observed intensity at
        // the very first cycle forces Z to 0 (no state can explain a
        // nonzero reading once the only dye is guaranteed dudded before any
        // image is taken).
        let model = SequencingModel::new(
            vec![ChannelModel::new(0.0, 1.0, 0.0, 0.3, 1e-9)],
            0.0,
            0.0,
            0.0,
            DecayingRateModel::default(),
        );
        let dye_seq = DyeSeq::new(vec![Some(0)], 1);
        let radiometry = Radiometry::new(vec![5.0], 1, 1);
        let hmm = Hmm::new(&model);
        let mut fitter = SequencingModelFitter::new(1);
        let log_z = hmm.improve_fit(&dye_seq, &radiometry, &mut fitter).unwrap();
        assert_eq!(log_z, f64::NEG_INFINITY);
        assert!(fitter.channels[0].bleach.get(0.5).is_finite());
    }
}
