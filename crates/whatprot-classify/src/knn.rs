//! The k-nearest-neighbor classifier: brute-force squared-Euclidean search
//! over a training set of simulated dye tracks, followed by a pdf-weighted
//! vote among the `k` nearest. Shares nothing with the HMM code path
//! beyond the [`whatprot_hmm::Radiometry`] type and `ChannelModel::pdf`.

use std::collections::HashMap;

use whatprot_hmm::Radiometry;
use whatprot_io::ScoredClassification;
use whatprot_model::SequencingModel;

use crate::training::TrainingEntry;

/// A brute-force k-NN classifier over a fixed training set.
pub struct NnClassifier<'a> {
    model: &'a SequencingModel,
    entries: &'a [TrainingEntry],
    k: usize,
}

impl<'a> NnClassifier<'a> {
    /// # Panics
    /// Panics if `entries` is empty or `k` is zero.
    #[must_use]
    pub fn new(model: &'a SequencingModel, entries: &'a [TrainingEntry], k: usize) -> Self {
        assert!(!entries.is_empty(), "training set must be non-empty");
        assert!(k > 0, "k must be positive");
        Self { model, entries, k }
    }

    /// Squared Euclidean distance between `radiometry` and one training
    /// track's flattened counts.
    fn squared_distance(&self, radiometry: &Radiometry, track: &whatprot_sim::DyeTrack) -> f64 {
        let mut acc = 0.0;
        for t in 0..radiometry.num_cycles() {
            for c in 0..radiometry.num_channels() {
                let observed = radiometry.get(t, c);
                let count = track.get(t, c) as f64;
                let d = observed - count;
                acc += d * d;
            }
        }
        acc
    }

    fn weight(&self, radiometry: &Radiometry, track: &whatprot_sim::DyeTrack) -> f64 {
        let mut weight = 1.0;
        for t in 0..radiometry.num_cycles() {
            for c in 0..radiometry.num_channels() {
                weight *= self.model.channels[c].pdf(radiometry.get(t, c), track.get(t, c) as u32);
            }
        }
        weight
    }

    /// The `k` training indices nearest `radiometry`, nearest first.
    fn nearest(&self, radiometry: &Radiometry) -> Vec<usize> {
        let mut by_distance: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, self.squared_distance(radiometry, &e.track)))
            .collect();
        by_distance.sort_by(|a, b| a.1.total_cmp(&b.1));
        by_distance.truncate(self.k);
        by_distance.into_iter().map(|(i, _)| i).collect()
    }

    /// Score every source among the `k` nearest tracks, returning the
    /// per-source vote total and the combined total score (the
    /// normalizing denominator every candidate's score is divided against
    /// in [`ScoredClassification::adjusted_score`]).
    fn score_neighbors(&self, radiometry: &Radiometry) -> (HashMap<i64, f64>, f64) {
        let mut id_score = HashMap::new();
        let mut total = 0.0;
        for i in self.nearest(radiometry) {
            let entry = &self.entries[i];
            let weight = self.weight(radiometry, &entry.track);
            total += weight;
            *id_score.entry(entry.source_id).or_insert(0.0) += weight / entry.source_copy_count as f64;
        }
        (id_score, total)
    }

    /// Classify one radiometry, returning its single best-scoring
    /// candidate. A radiometry with no positive-weight neighbor (e.g. an
    /// all-zero reading) yields [`ScoredClassification::degenerate`].
    #[must_use]
    pub fn classify(&self, radiometry: &Radiometry) -> ScoredClassification {
        let (id_score, total) = self.score_neighbors(radiometry);
        let best = id_score
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1));
        match best {
            Some((id, score)) => {
                let result = ScoredClassification::new(id, score, total.max(f64::MIN_POSITIVE));
                if result.adjusted_score().is_nan() {
                    ScoredClassification::degenerate()
                } else {
                    result
                }
            }
            None => ScoredClassification::degenerate(),
        }
    }

    /// Classify one radiometry, returning up to `h` candidates ranked by
    /// score, highest first.
    #[must_use]
    pub fn classify_top_h(&self, radiometry: &Radiometry, h: usize) -> Vec<ScoredClassification> {
        let (id_score, total) = self.score_neighbors(radiometry);
        let mut ranked: Vec<ScoredClassification> = id_score
            .into_iter()
            .map(|(id, score)| ScoredClassification::new(id, score, total.max(f64::MIN_POSITIVE)))
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(h);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use whatprot_hmm::DyeSeq;
    use whatprot_model::ChannelModel;
    use whatprot_sim::generate_dye_track;

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
    fn exact_match_training_track_wins() {
        let m = model();
        let dye_seq = DyeSeq::new(vec![Some(0), Some(0)], 1);
        let mut rng = StdRng::from_seed([1u8; 32]);
        let track = generate_dye_track(&m, &dye_seq, 2, &mut rng);
        let entries = vec![crate::training::TrainingEntry {
            track: track.clone(),
            source_id: 42,
            source_copy_count: 1,
        }];
        let classifier = NnClassifier::new(&m, &entries, 1);
        let radiometry = Radiometry::new(
            vec![track.get(0, 0) as f64, track.get(1, 0) as f64],
            2,
            1,
        );
        let result = classifier.classify(&radiometry);
        assert_eq!(result.id, 42);
    }

    #[test]
    fn classify_top_h_caps_result_count() {
        let m = model();
        let entries = vec![
            crate::training::TrainingEntry {
                track: generate_dye_track(&m, &DyeSeq::new(vec![Some(0)], 1), 1, &mut StdRng::from_seed([2u8; 32])),
                source_id: 1,
                source_copy_count: 1,
            },
            crate::training::TrainingEntry {
                track: generate_dye_track(&m, &DyeSeq::new(vec![Some(0)], 1), 1, &mut StdRng::from_seed([3u8; 32])),
                source_id: 2,
                source_copy_count: 1,
            },
        ];
        let classifier = NnClassifier::new(&m, &entries, 2);
        let radiometry = Radiometry::new(vec![1.0], 1, 1);
        let results = classifier.classify_top_h(&radiometry, 1);
        assert_eq!(results.len(), 1);
    }
}
