//! Sampling an observed [`Radiometry`] from a simulated [`DyeTrack`]: one
//! `Normal(mu, sig)` draw per cycle/channel cell, where `mu`/`sig` are the
//! same count-scaled parameters [`whatprot_model::ChannelModel::pdf`]
//! scores density against.
//!
//! Grounded in the original simulator's rejection of trivial tracks: a
//! peptide with no live dye at the first cycle can never be distinguished
//! from background and is never a usable fixture.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use whatprot_hmm::{DyeSeq, Radiometry};
use whatprot_model::SequencingModel;

use crate::dye_track::generate_dye_track;

/// Sample a radiometry for `dye_seq` under `model`, or `None` if the
/// sampled dye track is trivial (all channels read zero at the first
/// cycle, which the original simulator discards since it is permanently
/// invisible to any classifier).
#[must_use]
pub fn generate_radiometry<R: Rng + ?Sized>(
    model: &SequencingModel,
    dye_seq: &DyeSeq,
    num_timesteps: usize,
    rng: &mut R,
) -> Option<Radiometry> {
    let track = generate_dye_track(model, dye_seq, num_timesteps, rng);
    if track.is_trivial() {
        return None;
    }

    let num_channels = dye_seq.num_channels();
    let mut values = Vec::with_capacity(num_timesteps * num_channels);
    for t in 0..num_timesteps {
        for c in 0..num_channels {
            let count = track.get(t, c);
            values.push(sample_channel(model, c, count, rng));
        }
    }
    Some(Radiometry::new(values, num_timesteps, num_channels))
}

/// Draw one reading for `count` live dyes in channel `c`: zero dyes is
/// background noise, `Normal(0, bg_sig)`; one or more dyes matches
/// [`whatprot_model::ChannelModel::pdf`]'s log-normal by drawing the *log*
/// of the reading from `Normal(mu + ln(count), sig)` and exponentiating.
fn sample_channel<R: Rng + ?Sized>(model: &SequencingModel, c: usize, count: usize, rng: &mut R) -> f64 {
    let chan = &model.channels[c];
    if count == 0 {
        let normal = Normal::new(0.0, chan.bg_sig.max(f64::MIN_POSITIVE)).expect("positive sigma");
        return normal.sample(rng);
    }
    let n = count as f64;
    let normal = Normal::new(chan.mu + n.ln(), chan.sig.max(f64::MIN_POSITIVE)).expect("positive sigma");
    normal.sample(rng).exp()
}
