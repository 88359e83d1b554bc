//! The two inputs the HMM consumes for one peptide: its dye sequence (which
//! channel, if any, labels each amino acid position) and the observed
//! radiometry (one intensity reading per channel per imaging cycle).

use serde::{Deserialize, Serialize};

/// A single peptide's per-position labeling: `channel_at[i]` is `Some(c)` if
/// the amino acid at position `i` (0 = N-terminus) carries a dye in channel
/// `c`, or `None` if unlabeled. `num_channels` is carried alongside so an
/// all-unlabeled sequence still knows its tensor order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DyeSeq {
    channel_at: Vec<Option<usize>>,
    num_channels: usize,
}

impl DyeSeq {
    #[must_use]
    pub fn new(channel_at: Vec<Option<usize>>, num_channels: usize) -> Self {
        debug_assert!(channel_at.iter().flatten().all(|&c| c < num_channels));
        Self {
            channel_at,
            num_channels,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channel_at.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channel_at.is_empty()
    }

    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// The channel labeling the amino acid at position `i`, if any.
    #[must_use]
    pub fn channel_at(&self, i: usize) -> Option<usize> {
        self.channel_at[i]
    }

    /// Total dye count per channel, assuming nothing has yet been cleaved,
    /// dudded, or bleached. This is the tensor shape's upper bound on each
    /// channel axis.
    #[must_use]
    pub fn total_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_channels];
        for c in self.channel_at.iter().flatten() {
            counts[*c] += 1;
        }
        counts
    }
}

/// Observed intensities for one peptide across `T` imaging cycles and `C`
/// channels, stored row-major (`cycle * num_channels + channel`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Radiometry {
    values: Vec<f64>,
    num_cycles: usize,
    num_channels: usize,
}

impl Radiometry {
    /// # Panics
    /// Panics if `values.len() != num_cycles * num_channels`.
    #[must_use]
    pub fn new(values: Vec<f64>, num_cycles: usize, num_channels: usize) -> Self {
        assert_eq!(values.len(), num_cycles * num_channels);
        Self {
            values,
            num_cycles,
            num_channels,
        }
    }

    #[must_use]
    pub fn num_cycles(&self) -> usize {
        self.num_cycles
    }

    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    #[must_use]
    pub fn get(&self, cycle: usize, channel: usize) -> f64 {
        self.values[cycle * self.num_channels + channel]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_counts_matches_label_occurrences() {
        let seq = DyeSeq::new(vec![Some(0), None, Some(0), Some(1)], 2);
        assert_eq!(seq.total_counts(), vec![2, 1]);
    }

    #[test]
    fn radiometry_indexes_row_major() {
        let r = Radiometry::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        assert_eq!(r.get(0, 0), 1.0);
        assert_eq!(r.get(0, 1), 2.0);
        assert_eq!(r.get(1, 0), 3.0);
        assert_eq!(r.get(1, 1), 4.0);
    }
}
