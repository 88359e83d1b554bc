// crates/whatprot-model/src/lib.rs

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! The sequencing model: per-channel dye-loss and intensity parameters, the
//! shared detachment-rate model, EM fitters that turn expected sufficient
//! statistics into an updated model, and text-format snapshot persistence.

pub mod channel;
pub mod fitter;
pub mod model;
pub mod persist;
pub mod rate;

pub use channel::ChannelModel;
pub use fitter::{
    BackgroundNoiseFitter, ChannelModelFitter, DecayingRateFitter, LogNormalDistributionFitter,
    ParameterFitter, SequencingModelFitter,
};
pub use model::SequencingModel;
pub use rate::DecayingRateModel;
