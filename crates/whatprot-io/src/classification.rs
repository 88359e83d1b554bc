//! Scored-classification output: one record per classified radiometry,
//! `id,score,total,adjusted_score`, written in the order the radiometries
//! were classified.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// The winning candidate for one radiometry, plus the raw score and
/// normalizing total it was chosen from.
///
/// `id` is `-1` and `score`/`total` are `0.0`/`1.0` for a degenerate
/// (e.g. all-zero) radiometry that no classifier could score — this is a
/// valid result, not an error.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredClassification {
    pub id: i64,
    pub score: f64,
    pub total: f64,
}

impl ScoredClassification {
    #[must_use]
    pub fn new(id: i64, score: f64, total: f64) -> Self {
        Self { id, score, total }
    }

    /// A classification for a radiometry no candidate could be scored
    /// against.
    #[must_use]
    pub fn degenerate() -> Self {
        Self { id: -1, score: 0.0, total: 1.0 }
    }

    /// `score / total`, guarded against the `0 / 0` that a fully degenerate
    /// score produces: that case reports `0.0` rather than `NaN`.
    #[must_use]
    pub fn adjusted_score(&self) -> f64 {
        let ratio = self.score / self.total;
        if ratio.is_nan() { 0.0 } else { ratio }
    }
}

/// Parse a scored-classification batch from its CSV text representation.
///
/// # Errors
/// Returns an error naming the offending line if a row has the wrong
/// number of fields or a field fails to parse.
pub fn parse_scored_classifications(text: &str) -> Result<Vec<ScoredClassification>> {
    let mut out = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 4 {
            bail!(
                "line {}: expected 4 fields (id,score,total,adjusted_score), got {}",
                line_no + 1,
                fields.len()
            );
        }
        let id: i64 = fields[0]
            .parse()
            .with_context(|| format!("line {}: id {:?} is not an integer", line_no + 1, fields[0]))?;
        let score: f64 = fields[1]
            .parse()
            .with_context(|| format!("line {}: score {:?} is not a float", line_no + 1, fields[1]))?;
        let total: f64 = fields[2]
            .parse()
            .with_context(|| format!("line {}: total {:?} is not a float", line_no + 1, fields[2]))?;
        // fields[3] (adjusted_score) is derived and re-checked, not stored.
        out.push(ScoredClassification::new(id, score, total));
    }
    Ok(out)
}

/// Render a scored-classification batch to its CSV text representation.
#[must_use]
pub fn render_scored_classifications(classifications: &[ScoredClassification]) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    for c in classifications {
        let _ = writeln!(out, "{},{},{},{}", c.id, c.score, c.total, c.adjusted_score());
    }
    out
}

/// Read a scored-classification batch from `path`.
///
/// # Errors
/// Returns an error if the file can't be opened or fails to parse.
pub fn read_scored_classifications<P: AsRef<Path>>(path: P) -> Result<Vec<ScoredClassification>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("open {}", path.display()))?;
    parse_scored_classifications(&text).with_context(|| format!("parsing classifications {}", path.display()))
}

/// Write a scored-classification batch to `path`.
///
/// # Errors
/// Returns an error if the file can't be created or written.
pub fn write_scored_classifications<P: AsRef<Path>>(path: P, classifications: &[ScoredClassification]) -> Result<()> {
    let path = path.as_ref();
    let text = render_scored_classifications(classifications);
    fs::write(path, text).with_context(|| format!("writing classifications to {}", path.display()))
}
