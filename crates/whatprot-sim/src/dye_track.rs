//! Monte-Carlo simulation of a single peptide's dye track: per-cycle
//! per-channel live dye counts, produced by sampling the same per-dye
//! events (dud, detach, bleach, Edman cleavage) the HMM scores the
//! probability of rather than summing over.

use rand::Rng;
use serde::{Deserialize, Serialize};
use whatprot_hmm::DyeSeq;
use whatprot_model::SequencingModel;

/// `counts[t][c]` is the number of live, unbleached, undudded dyes in
/// channel `c` at imaging cycle `t`, for one simulated peptide. Equality
/// and hashing are purely structural — two tracks with the same cycle/
/// channel counts compare equal regardless of how they were generated,
/// which is exactly what deduplicating simulated tracks by content needs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DyeTrack {
    counts: Vec<Vec<usize>>,
}

impl DyeTrack {
    #[must_use]
    pub fn num_timesteps(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.counts.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn get(&self, t: usize, c: usize) -> usize {
        self.counts[t][c]
    }

    /// A track is trivial (and thus never actually observable) if every
    /// channel reads zero at the first cycle — since dye counts only ever
    /// decrease, a zero first reading means every later reading is zero too.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.counts.first().map_or(true, |row| row.iter().all(|&n| n == 0))
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<usize>> {
        self.counts
    }
}

/// Sample one dye track for `dye_seq` under `model` across `num_timesteps`
/// imaging cycles.
///
/// Mirrors the per-cycle order the HMM's forward pass scores probabilities
/// for: dud once before the first image, an initial-block draw once before
/// the first cycle, then per cycle image, detach, per-channel bleach, and
/// (if another cycle follows) a fresh cyclic-block draw followed by one
/// Edman cleavage attempt at the current N-terminal position.
#[must_use]
pub fn generate_dye_track<R: Rng + ?Sized>(
    model: &SequencingModel,
    dye_seq: &DyeSeq,
    num_timesteps: usize,
    rng: &mut R,
) -> DyeTrack {
    let len = dye_seq.len();
    let num_channels = dye_seq.num_channels();
    let mut present: Vec<bool> = (0..len).map(|i| dye_seq.channel_at(i).is_some()).collect();

    for (i, p) in present.iter_mut().enumerate() {
        if *p {
            let c = dye_seq.channel_at(i).expect("present implies labeled");
            if rng.random_bool(model.channels[c].p_dud) {
                *p = false;
            }
        }
    }

    let mut cleaved = 0usize;
    let mut detached = false;
    let mut blocked = rng.random_bool(model.p_initial_block.clamp(0.0, 1.0));
    let mut counts = Vec::with_capacity(num_timesteps);

    for t in 0..num_timesteps {
        let mut row = vec![0usize; num_channels];
        if !detached {
            for i in cleaved..len {
                if present[i] {
                    if let Some(c) = dye_seq.channel_at(i) {
                        row[c] += 1;
                    }
                }
            }
        }
        counts.push(row);

        if detached {
            continue;
        }

        if rng.random_bool(model.p_detach.effective(t as u32).clamp(0.0, 1.0)) {
            detached = true;
            continue;
        }

        for i in cleaved..len {
            if present[i] {
                let c = dye_seq.channel_at(i).expect("present implies labeled");
                if rng.random_bool(model.channels[c].p_bleach) {
                    present[i] = false;
                }
            }
        }

        if t + 1 < num_timesteps && cleaved < len && !blocked {
            if rng.random_bool(model.p_cyclic_block.clamp(0.0, 1.0)) {
                blocked = true;
            } else if !rng.random_bool(model.p_edman_failure.clamp(0.0, 1.0)) {
                cleaved += 1;
            }
        }
    }

    DyeTrack { counts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use whatprot_model::ChannelModel;

    fn model() -> SequencingModel {
        SequencingModel::new(
            vec![ChannelModel::new(0.0, 0.0, 1.0, 0.2, 0.01)],
            0.0,
            0.0,
            0.0,
            whatprot_model::DecayingRateModel::new(0.0, 0.0, 1.0),
        )
    }

    #[test]
    fn zero_loss_model_never_loses_dyes_before_cleavage() {
        let dye_seq = DyeSeq::new(vec![Some(0), Some(0), Some(0)], 1);
        let mut rng = StdRng::seed_from_u64(7);
        let track = generate_dye_track(&model(), &dye_seq, 3, &mut rng);
        assert_eq!(track.get(0, 0), 3);
    }

    #[test]
    fn fully_unlabeled_sequence_is_trivial() {
        let dye_seq = DyeSeq::new(vec![None, None], 1);
        let mut rng = StdRng::seed_from_u64(1);
        let track = generate_dye_track(&model(), &dye_seq, 2, &mut rng);
        assert!(track.is_trivial());
    }

    #[test]
    fn certain_dud_produces_trivial_track() {
        let m = SequencingModel::new(
            vec![ChannelModel::new(0.0, 1.0, 1.0, 0.2, 0.01)],
            0.0,
            0.0,
            0.0,
            whatprot_model::DecayingRateModel::default(),
        );
        let dye_seq = DyeSeq::new(vec![Some(0)], 1);
        let mut rng = StdRng::seed_from_u64(3);
        let track = generate_dye_track(&m, &dye_seq, 2, &mut rng);
        assert!(track.is_trivial());
    }
}
