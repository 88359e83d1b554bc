//! The decaying-rate model used for `p_detach`.

use serde::{Deserialize, Serialize};

/// A probability that decays geometrically with Edman step index:
/// `effective(k) = base + initial * initial_decay^k`.
///
/// Detachment is typically elevated in the first few cycles (loose peptides
/// falling off early) and settles to a steady-state `base` rate thereafter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayingRateModel {
    pub base: f64,
    pub initial: f64,
    pub initial_decay: f64,
}

impl DecayingRateModel {
    #[must_use]
    pub fn new(base: f64, initial: f64, initial_decay: f64) -> Self {
        Self {
            base,
            initial,
            initial_decay,
        }
    }

    /// Effective probability at Edman-cycle index `k` (0-based).
    #[must_use]
    pub fn effective(&self, k: u32) -> f64 {
        self.base + self.initial * self.initial_decay.powi(k as i32)
    }

    /// Max absolute difference across the three components.
    #[must_use]
    pub fn distance(&self, other: &DecayingRateModel) -> f64 {
        (self.base - other.base)
            .abs()
            .max((self.initial - other.initial).abs())
            .max((self.initial_decay - other.initial_decay).abs())
    }
}

impl Default for DecayingRateModel {
    fn default() -> Self {
        Self {
            base: 0.0,
            initial: 0.0,
            initial_decay: 1.0,
        }
    }
}
