// crates/whatprot-sim/src/lib.rs

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Monte-Carlo generation of synthetic traces: sample a [`DyeTrack`] by
//! simulating the same per-dye events (dud, detach, bleach, Edman
//! cleavage) the HMM scores the probability of, then sample a
//! [`whatprot_hmm::Radiometry`] from it. Used to build test fixtures that
//! exercise the fitter's "EM recovers the generating parameters" property
//! without needing real instrument data.

pub mod dye_track;
pub mod radiometry;

pub use dye_track::{generate_dye_track, DyeTrack};
pub use radiometry::generate_radiometry;
