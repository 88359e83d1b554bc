// crates/whatprot-classify/src/lib.rs

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! A brute-force k-nearest-neighbor classifier over simulated dye tracks —
//! a separable alternative to the HMM classifier that shares no code path
//! with it beyond [`whatprot_hmm::Radiometry`] and [`whatprot_model::
//! ChannelModel::pdf`].

pub mod knn;
pub mod training;

pub use knn::NnClassifier;
pub use training::{build_training_set, TrainingEntry};
