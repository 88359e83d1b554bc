// crates/whatprot-hmm/src/lib.rs

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! The HMM over [`whatprot_tensor::PeptideStateVector`]s: per-cycle step
//! operators (dud, image, detach, bleach, Edman), per-radiometry density
//! precomputation, and the [`Hmm`] driver that runs the pruned forward pass
//! to score a trace and the matching backward pass to fold expected
//! sufficient statistics into a [`whatprot_model::SequencingModelFitter`].

pub mod binomial;
pub mod driver;
pub mod precomputations;
pub mod step;
pub mod types;

pub use binomial::BinomialTransition;
pub use driver::Hmm;
pub use precomputations::RadiometryPrecomputations;
pub use types::{DyeSeq, Radiometry};
