//! Text-format model snapshot persistence.
//!
//! One line per channel: `p_bleach p_dud mu sig bg_sig`, followed by a line
//! of the three scalar block/failure probabilities, then a line of the three
//! detach-rate components. A malformed file is a hard error — there is no
//! sensible default to substitute for a missing or unparsable parameter.

use anyhow::{bail, Context, Result};
use std::fmt::Write as _;

use crate::channel::ChannelModel;
use crate::model::SequencingModel;
use crate::rate::DecayingRateModel;

/// Parse a model snapshot from its text representation.
pub fn load(text: &str) -> Result<SequencingModel> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let num_channels: usize = lines
        .next()
        .context("missing channel-count line")?
        .trim()
        .parse()
        .context("channel-count line is not an integer")?;

    let mut channels = Vec::with_capacity(num_channels);
    for i in 0..num_channels {
        let line = lines
            .next()
            .with_context(|| format!("missing parameter line for channel {i}"))?;
        let fields: Vec<f64> = line
            .split_whitespace()
            .map(|tok| tok.parse::<f64>().with_context(|| format!("bad float {tok:?}")))
            .collect::<Result<_>>()?;
        if fields.len() != 5 {
            bail!(
                "channel {i} line has {} fields, expected 5 (p_bleach p_dud mu sig bg_sig)",
                fields.len()
            );
        }
        channels.push(ChannelModel::new(
            fields[0], fields[1], fields[2], fields[3], fields[4],
        ));
    }

    let scalars_line = lines.next().context("missing scalar parameter line")?;
    let scalars: Vec<f64> = scalars_line
        .split_whitespace()
        .map(|tok| tok.parse::<f64>().with_context(|| format!("bad float {tok:?}")))
        .collect::<Result<_>>()?;
    if scalars.len() != 3 {
        bail!(
            "scalar line has {} fields, expected 3 (p_edman_failure p_initial_block p_cyclic_block)",
            scalars.len()
        );
    }

    let detach_line = lines.next().context("missing detach-rate line")?;
    let detach: Vec<f64> = detach_line
        .split_whitespace()
        .map(|tok| tok.parse::<f64>().with_context(|| format!("bad float {tok:?}")))
        .collect::<Result<_>>()?;
    if detach.len() != 3 {
        bail!(
            "detach-rate line has {} fields, expected 3 (base initial initial_decay)",
            detach.len()
        );
    }

    Ok(SequencingModel::new(
        channels,
        scalars[0],
        scalars[1],
        scalars[2],
        DecayingRateModel::new(detach[0], detach[1], detach[2]),
    ))
}

/// Render a model snapshot to its text representation, readable back by
/// [`load`].
#[must_use]
pub fn save(model: &SequencingModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", model.channels.len());
    for c in &model.channels {
        let _ = writeln!(out, "{} {} {} {} {}", c.p_bleach, c.p_dud, c.mu, c.sig, c.bg_sig);
    }
    let _ = writeln!(
        out,
        "{} {} {}",
        model.p_edman_failure, model.p_initial_block, model.p_cyclic_block
    );
    let _ = writeln!(
        out,
        "{} {} {}",
        model.p_detach.base, model.p_detach.initial, model.p_detach.initial_decay
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> SequencingModel {
        SequencingModel::new(
            vec![
                ChannelModel::new(0.05, 0.07, 1.0, 0.2, 0.01),
                ChannelModel::new(0.04, 0.06, 1.2, 0.25, 0.015),
            ],
            0.06,
            0.03,
            0.01,
            DecayingRateModel::new(0.05, 0.3, 0.5),
        )
    }

    #[test]
    fn round_trips_through_text() {
        let model = sample_model();
        let text = save(&model);
        let parsed = load(&text).expect("valid snapshot");
        assert_eq!(model, parsed);
    }

    #[test]
    fn rejects_truncated_channel_line() {
        let bad = "1\n0.05 0.07 1.0\n0.06 0.03 0.01\n0.05 0.3 0.5\n";
        assert!(load(bad).is_err());
    }

    #[test]
    fn rejects_missing_detach_line() {
        let bad = "1\n0.05 0.07 1.0 0.2 0.01\n0.06 0.03 0.01\n";
        assert!(load(bad).is_err());
    }

    #[test]
    fn rejects_non_numeric_field() {
        let bad = "1\nfoo 0.07 1.0 0.2 0.01\n0.06 0.03 0.01\n0.05 0.3 0.5\n";
        assert!(load(bad).is_err());
    }
}
