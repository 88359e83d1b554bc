//! Per-channel dye-loss and intensity-noise parameters.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// The parameters governing one fluorescent channel: how often a dye fails
/// to attach (`p_dud`), how often it bleaches per Edman/imaging cycle
/// (`p_bleach`), and the log-normal intensity distribution a single
/// surviving dye produces, plus the background-noise spread observed when
/// zero dyes are present.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelModel {
    pub p_bleach: f64,
    pub p_dud: f64,
    pub mu: f64,
    pub sig: f64,
    pub bg_sig: f64,
}

impl ChannelModel {
    #[must_use]
    pub fn new(p_bleach: f64, p_dud: f64, mu: f64, sig: f64, bg_sig: f64) -> Self {
        Self {
            p_bleach,
            p_dud,
            mu,
            sig,
            bg_sig,
        }
    }

    /// Probability density of observing intensity `observed` given that
    /// `count` dyes are present and emitting in this channel.
    ///
    /// `count == 0` is background noise, modeled as `Normal(0, bg_sig)`
    /// rather than the log-normal used for `count >= 1`; a literal
    /// delta-at-zero (as used for counts that provably cannot fluoresce)
    /// would assign zero density to any nonzero background reading, which
    /// the persisted `bg_sig` parameter exists to avoid.
    #[must_use]
    pub fn pdf(&self, observed: f64, count: u32) -> f64 {
        if count == 0 {
            return normal_pdf(observed, 0.0, self.bg_sig);
        }
        if observed <= 0.0 {
            return 0.0;
        }
        // Sum of `count` iid log-normal variables is approximated, as in the
        // original model, by a single log-normal whose log-mean/variance
        // scale with `count`: mean scales linearly, variance stays per-dye.
        let n = f64::from(count);
        let scaled_mu = self.mu + n.ln();
        let scaled_sig = self.sig;
        log_normal_pdf(observed, scaled_mu, scaled_sig)
    }
}

impl Default for ChannelModel {
    fn default() -> Self {
        Self {
            p_bleach: 0.05,
            p_dud: 0.07,
            mu: 1.0,
            sig: 0.2,
            bg_sig: 0.00667,
        }
    }
}

fn normal_pdf(x: f64, mean: f64, std: f64) -> f64 {
    let z = (x - mean) / std;
    (-0.5 * z * z).exp() / (std * (2.0 * PI).sqrt())
}

fn log_normal_pdf(x: f64, mu: f64, sig: f64) -> f64 {
    let z = (x.ln() - mu) / sig;
    (-0.5 * z * z).exp() / (x * sig * (2.0 * PI).sqrt())
}
