//! EM-style accumulators that turn expected sufficient statistics (gathered
//! by the HMM's forward/backward pass) into updated model parameters.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelModel;
use crate::model::SequencingModel;
use crate::rate::DecayingRateModel;

/// A generic `numerator / denominator` ratio estimator for any Bernoulli-like
/// parameter (bleach, dud, edman-failure, block probabilities): each HMM
/// trace contributes an expected event count to the numerator and an
/// expected number-of-trials count to the denominator.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ParameterFitter {
    numerator: f64,
    denominator: f64,
}

impl ParameterFitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, numerator: f64, denominator: f64) {
        self.numerator += numerator;
        self.denominator += denominator;
    }

    pub fn merge(&mut self, other: &ParameterFitter) {
        self.numerator += other.numerator;
        self.denominator += other.denominator;
    }

    /// The fitted ratio, or `fallback` if no trials were ever observed.
    #[must_use]
    pub fn get(&self, fallback: f64) -> f64 {
        if self.denominator <= 0.0 {
            fallback
        } else {
            (self.numerator / self.denominator).clamp(0.0, 1.0)
        }
    }
}

/// Weighted maximum-likelihood fitter for a log-normal intensity
/// distribution: accumulates `(weight, weight * ln(x), weight * ln(x)^2)`
/// so `mu`/`sig` can be recovered in closed form once every observation has
/// been folded in.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct LogNormalDistributionFitter {
    total_weight: f64,
    weighted_log: f64,
    weighted_log_sq: f64,
}

impl LogNormalDistributionFitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one observation: `count` dyes were responsible for intensity
    /// `observed`, with posterior responsibility `weight`.
    pub fn add(&mut self, observed: f64, count: u32, weight: f64) {
        if count == 0 || observed <= 0.0 || weight <= 0.0 {
            return;
        }
        let log_per_dye = observed.ln() - f64::from(count).ln();
        self.total_weight += weight;
        self.weighted_log += weight * log_per_dye;
        self.weighted_log_sq += weight * log_per_dye * log_per_dye;
    }

    pub fn merge(&mut self, other: &LogNormalDistributionFitter) {
        self.total_weight += other.total_weight;
        self.weighted_log += other.weighted_log;
        self.weighted_log_sq += other.weighted_log_sq;
    }

    #[must_use]
    pub fn mu(&self, fallback: f64) -> f64 {
        if self.total_weight <= 0.0 {
            fallback
        } else {
            self.weighted_log / self.total_weight
        }
    }

    #[must_use]
    pub fn sig(&self, fallback: f64) -> f64 {
        if self.total_weight <= 0.0 {
            return fallback;
        }
        let mean = self.weighted_log / self.total_weight;
        let var = (self.weighted_log_sq / self.total_weight) - mean * mean;
        var.max(1e-12).sqrt()
    }
}

/// Weighted fitter for the background-noise spread (`bg_sig`), observed only
/// on zero-dye-count cells.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct BackgroundNoiseFitter {
    total_weight: f64,
    weighted_sq: f64,
}

impl BackgroundNoiseFitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observed: f64, weight: f64) {
        if weight <= 0.0 {
            return;
        }
        self.total_weight += weight;
        self.weighted_sq += weight * observed * observed;
    }

    pub fn merge(&mut self, other: &BackgroundNoiseFitter) {
        self.total_weight += other.total_weight;
        self.weighted_sq += other.weighted_sq;
    }

    #[must_use]
    pub fn sig(&self, fallback: f64) -> f64 {
        if self.total_weight <= 0.0 {
            fallback
        } else {
            (self.weighted_sq / self.total_weight).max(1e-12).sqrt()
        }
    }
}

/// Accumulates every statistic needed to refit one [`ChannelModel`].
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ChannelModelFitter {
    pub bleach: ParameterFitter,
    pub dud: ParameterFitter,
    pub intensity: LogNormalDistributionFitter,
    pub background: BackgroundNoiseFitter,
}

impl ChannelModelFitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &ChannelModelFitter) {
        self.bleach.merge(&other.bleach);
        self.dud.merge(&other.dud);
        self.intensity.merge(&other.intensity);
        self.background.merge(&other.background);
    }

    #[must_use]
    pub fn fit(&self, prior: &ChannelModel) -> ChannelModel {
        ChannelModel::new(
            self.bleach.get(prior.p_bleach),
            self.dud.get(prior.p_dud),
            self.intensity.mu(prior.mu),
            self.intensity.sig(prior.sig),
            self.background.sig(prior.bg_sig),
        )
    }
}

/// Heuristic fitter for [`DecayingRateModel`]: one [`ParameterFitter`] per
/// Edman-cycle index, each estimating the raw detach probability observed at
/// that cycle. The three decay parameters don't admit a single linear-ratio
/// EM update the way a plain Bernoulli parameter does, so `base`/`initial`/
/// `initial_decay` are recovered from the per-cycle ratios after the fact:
/// `base` is the average of the later (plateaued) cycles, and the first two
/// cycles are used to solve for the initial excess and its decay factor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DecayingRateFitter {
    per_cycle: Vec<ParameterFitter>,
}

impl DecayingRateFitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cycle: u32, numerator: f64, denominator: f64) {
        let idx = cycle as usize;
        if self.per_cycle.len() <= idx {
            self.per_cycle.resize(idx + 1, ParameterFitter::new());
        }
        self.per_cycle[idx].add(numerator, denominator);
    }

    pub fn merge(&mut self, other: &DecayingRateFitter) {
        if self.per_cycle.len() < other.per_cycle.len() {
            self.per_cycle.resize(other.per_cycle.len(), ParameterFitter::new());
        }
        for (a, b) in self.per_cycle.iter_mut().zip(&other.per_cycle) {
            a.merge(b);
        }
    }

    #[must_use]
    pub fn fit(&self, prior: &DecayingRateModel) -> DecayingRateModel {
        if self.per_cycle.is_empty() {
            return *prior;
        }
        let ratios: Vec<f64> = self
            .per_cycle
            .iter()
            .map(|f| f.get(prior.base))
            .collect();
        let plateau_start = ratios.len() / 2;
        let plateau = &ratios[plateau_start..];
        let base = plateau.iter().sum::<f64>() / plateau.len() as f64;

        let r0 = ratios[0] - base;
        if ratios.len() < 2 || r0.abs() < 1e-9 {
            return DecayingRateModel::new(base.max(0.0), prior.initial, prior.initial_decay);
        }
        let r1 = ratios[1] - base;
        let decay = (r1 / r0).clamp(1e-6, 1.0 - 1e-6);
        DecayingRateModel::new(base.max(0.0), r0, decay)
    }
}

/// Top-level fitter: owns one [`ChannelModelFitter`] per channel plus the
/// scalar Bernoulli parameters and the detach-rate fitter. A full EM epoch
/// folds every trace's statistics in (via [`SequencingModelFitter::merge`]
/// across worker threads), then [`SequencingModelFitter::fit`] produces the
/// next model.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SequencingModelFitter {
    pub channels: Vec<ChannelModelFitter>,
    pub edman_failure: ParameterFitter,
    pub initial_block: ParameterFitter,
    pub cyclic_block: ParameterFitter,
    pub detach: DecayingRateFitter,
}

impl SequencingModelFitter {
    #[must_use]
    pub fn new(num_channels: usize) -> Self {
        Self {
            channels: vec![ChannelModelFitter::new(); num_channels],
            edman_failure: ParameterFitter::new(),
            initial_block: ParameterFitter::new(),
            cyclic_block: ParameterFitter::new(),
            detach: DecayingRateFitter::new(),
        }
    }

    pub fn merge(&mut self, other: &SequencingModelFitter) {
        for (a, b) in self.channels.iter_mut().zip(&other.channels) {
            a.merge(b);
        }
        self.edman_failure.merge(&other.edman_failure);
        self.initial_block.merge(&other.initial_block);
        self.cyclic_block.merge(&other.cyclic_block);
        self.detach.merge(&other.detach);
    }

    #[must_use]
    pub fn fit(&self, prior: &SequencingModel) -> SequencingModel {
        let channels = self
            .channels
            .iter()
            .zip(&prior.channels)
            .map(|(f, c)| f.fit(c))
            .collect();
        SequencingModel::new(
            channels,
            self.edman_failure.get(prior.p_edman_failure),
            self.initial_block.get(prior.p_initial_block),
            self.cyclic_block.get(prior.p_cyclic_block),
            self.detach.fit(&prior.p_detach),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_fitter_falls_back_with_no_data() {
        let f = ParameterFitter::new();
        assert_eq!(f.get(0.25), 0.25);
    }

    #[test]
    fn parameter_fitter_recovers_exact_ratio() {
        let mut f = ParameterFitter::new();
        f.add(3.0, 10.0);
        assert!((f.get(0.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn merge_combines_independent_accumulations() {
        let mut a = ParameterFitter::new();
        a.add(1.0, 4.0);
        let mut b = ParameterFitter::new();
        b.add(1.0, 4.0);
        a.merge(&b);
        assert!((a.get(0.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn log_normal_fitter_recovers_known_mu_sig() {
        let mut f = LogNormalDistributionFitter::new();
        // log-intensities per dye all exactly 1.0 -> mu=1, sig=0 (clamped).
        for _ in 0..50 {
            f.add(std::f64::consts::E, 1, 1.0);
        }
        assert!((f.mu(0.0) - 1.0).abs() < 1e-9);
        assert!(f.sig(1.0) < 1e-3);
    }

    #[test]
    fn decaying_rate_fitter_falls_back_when_empty() {
        let f = DecayingRateFitter::new();
        let prior = DecayingRateModel::new(0.1, 0.2, 0.5);
        let fit = f.fit(&prior);
        assert_eq!(fit, prior);
    }

    #[test]
    fn sequencing_model_fitter_round_trips_channel_count() {
        let prior = SequencingModel::new(
            vec![ChannelModel::default(), ChannelModel::default()],
            0.05,
            0.02,
            0.01,
            DecayingRateModel::default(),
        );
        let fitter = SequencingModelFitter::new(prior.num_channels());
        let fitted = fitter.fit(&prior);
        assert_eq!(fitted.num_channels(), 2);
    }
}
