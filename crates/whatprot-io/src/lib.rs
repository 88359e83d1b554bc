// crates/whatprot-io/src/lib.rs

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! The file formats at the engine boundary: dye-sequence lists, radiometry
//! matrices (text or raw binary), and scored-classification output. Every
//! reader here fails hard and names the offending line rather than
//! defaulting a field — a malformed batch is not recoverable mid-read.

pub mod classification;
pub mod dye_seq;
pub mod radiometry;

pub use classification::{read_scored_classifications, write_scored_classifications, ScoredClassification};
pub use dye_seq::{read_dye_seqs, write_dye_seqs, SourcedDyeSeq};
pub use radiometry::{read_radiometries_binary, read_radiometries_text, write_radiometries_binary, write_radiometries_text};
