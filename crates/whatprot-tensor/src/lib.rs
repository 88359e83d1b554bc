// crates/whatprot-tensor/src/lib.rs

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Dense order-`1+C` tensor storage and the [`PeptideStateVector`] built on
//! top of it.
//!
//! `C` is the number of dye channels; axis `0` is the Edman-cleavage count
//! and axes `1..=C` are per-channel dye counts. Everything in this crate is
//! pure data manipulation — no model parameters, no I/O.

pub mod psv;
pub mod range;
pub mod tensor;

pub use psv::PeptideStateVector;
pub use range::KDRange;
pub use tensor::{StridedVec, StridedVecMut, Tensor};
