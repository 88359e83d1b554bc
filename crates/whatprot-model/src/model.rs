//! The full sequencing model: one [`ChannelModel`] per dye channel plus the
//! shared [`DecayingRateModel`] governing detachment.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelModel;
use crate::rate::DecayingRateModel;

/// An immutable snapshot of every parameter the HMM needs. Always passed by
/// shared reference — never stored as global/mutable state — so the same
/// model can be evaluated from many worker threads concurrently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequencingModel {
    pub channels: Vec<ChannelModel>,
    pub p_edman_failure: f64,
    pub p_initial_block: f64,
    pub p_cyclic_block: f64,
    pub p_detach: DecayingRateModel,
}

impl SequencingModel {
    #[must_use]
    pub fn new(
        channels: Vec<ChannelModel>,
        p_edman_failure: f64,
        p_initial_block: f64,
        p_cyclic_block: f64,
        p_detach: DecayingRateModel,
    ) -> Self {
        Self {
            channels,
            p_edman_failure,
            p_initial_block,
            p_cyclic_block,
            p_detach,
        }
    }

    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Max absolute difference across every scalar parameter in the model
    /// (each channel's five fields, the three block/failure scalars, and the
    /// three detach-rate components). Used as the EM convergence criterion.
    #[must_use]
    pub fn distance(&self, other: &SequencingModel) -> f64 {
        assert_eq!(self.channels.len(), other.channels.len());
        let mut d: f64 = 0.0;
        for (a, b) in self.channels.iter().zip(&other.channels) {
            d = d.max((a.p_bleach - b.p_bleach).abs());
            d = d.max((a.p_dud - b.p_dud).abs());
            d = d.max((a.mu - b.mu).abs());
            d = d.max((a.sig - b.sig).abs());
            d = d.max((a.bg_sig - b.bg_sig).abs());
        }
        d = d.max((self.p_edman_failure - other.p_edman_failure).abs());
        d = d.max((self.p_initial_block - other.p_initial_block).abs());
        d = d.max((self.p_cyclic_block - other.p_cyclic_block).abs());
        d = d.max(self.p_detach.distance(&other.p_detach));
        d
    }
}
