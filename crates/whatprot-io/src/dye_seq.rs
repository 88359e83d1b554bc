//! Dye-sequence list format: `<num_channels>\n<total>\n<amino-length>
//! <copy-count> <labeled-string>\n…`, one record per peptide dye sequence.
//! The labeled string carries one character per amino-acid position: `.`
//! for unlabeled, or a single digit `0..C-1` naming the channel that
//! position's dye fluoresces in.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use whatprot_hmm::DyeSeq;

/// One dye-sequence record plus how many times it occurs in the candidate
/// library (`SourceCount` in the original source; the identity of a record
/// is its 0-based position in the list, not a field of its own).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourcedDyeSeq {
    pub dye_seq: DyeSeq,
    pub copy_count: usize,
}

/// Parse a dye-seq list from its text representation.
///
/// # Errors
/// Returns an error naming the offending line if the header is missing, a
/// record has the wrong number of fields, or a labeled-string character
/// isn't `.` or a valid channel digit.
pub fn parse_dye_seqs(text: &str) -> Result<(usize, Vec<SourcedDyeSeq>)> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines.next().context("missing channel-count line")?;
    let num_channels: usize = header
        .trim()
        .parse()
        .with_context(|| format!("channel-count line {:?} is not an integer", header))?;

    let (_, total_line) = lines.next().context("missing total-count line")?;
    let total: usize = total_line
        .trim()
        .parse()
        .with_context(|| format!("total-count line {:?} is not an integer", total_line))?;

    let mut records = Vec::with_capacity(total);
    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            bail!(
                "line {}: expected 3 fields (amino-length copy-count labeled-string), got {}",
                line_no + 1,
                fields.len()
            );
        }
        let amino_length: usize = fields[0]
            .parse()
            .with_context(|| format!("line {}: amino-length {:?} is not an integer", line_no + 1, fields[0]))?;
        let copy_count: usize = fields[1]
            .parse()
            .with_context(|| format!("line {}: copy-count {:?} is not an integer", line_no + 1, fields[1]))?;
        let labeled = fields[2];
        if labeled.chars().count() != amino_length {
            bail!(
                "line {}: labeled string has {} characters, expected amino-length {}",
                line_no + 1,
                labeled.chars().count(),
                amino_length
            );
        }
        let mut channel_at = Vec::with_capacity(amino_length);
        for ch in labeled.chars() {
            if ch == '.' {
                channel_at.push(None);
                continue;
            }
            let c = ch
                .to_digit(10)
                .with_context(|| format!("line {}: {:?} is not '.' or a channel digit", line_no + 1, ch))?
                as usize;
            if c >= num_channels {
                bail!(
                    "line {}: channel digit {} is out of range for {} channels",
                    line_no + 1,
                    c,
                    num_channels
                );
            }
            channel_at.push(Some(c));
        }
        records.push(SourcedDyeSeq {
            dye_seq: DyeSeq::new(channel_at, num_channels),
            copy_count,
        });
    }

    if records.len() != total {
        bail!(
            "header declared {} records but {} were present",
            total,
            records.len()
        );
    }

    Ok((num_channels, records))
}

/// Render a dye-seq list to its text representation, readable back by
/// [`parse_dye_seqs`].
#[must_use]
pub fn render_dye_seqs(num_channels: usize, records: &[SourcedDyeSeq]) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    let _ = writeln!(out, "{num_channels}");
    let _ = writeln!(out, "{}", records.len());
    for r in records {
        let labeled: String = (0..r.dye_seq.len())
            .map(|i| match r.dye_seq.channel_at(i) {
                Some(c) => char::from_digit(c as u32, 10).unwrap_or('.'),
                None => '.',
            })
            .collect();
        let _ = writeln!(out, "{} {} {}", r.dye_seq.len(), r.copy_count, labeled);
    }
    out
}

/// Read a dye-seq list from `path`.
///
/// # Errors
/// Returns an error if the file can't be opened or fails to parse.
pub fn read_dye_seqs<P: AsRef<Path>>(path: P) -> Result<(usize, Vec<SourcedDyeSeq>)> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("open {}", path.display()))?;
    parse_dye_seqs(&text).with_context(|| format!("parsing dye-seq list {}", path.display()))
}

/// Write a dye-seq list to `path`.
///
/// # Errors
/// Returns an error if the file can't be created or written.
pub fn write_dye_seqs<P: AsRef<Path>>(path: P, num_channels: usize, records: &[SourcedDyeSeq]) -> Result<()> {
    let path = path.as_ref();
    let text = render_dye_seqs(num_channels, records);
    fs::write(path, text).with_context(|| format!("writing dye-seq list to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text() -> &'static str {
        "2\n2\n3 5 0.1\n2 1 ..\n"
    }

    #[test]
    fn parses_labeled_strings_into_channel_positions() {
        let (num_channels, records) = parse_dye_seqs(sample_text()).expect("valid list");
        assert_eq!(num_channels, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].dye_seq.channel_at(0), Some(0));
        assert_eq!(records[0].dye_seq.channel_at(1), None);
        assert_eq!(records[0].dye_seq.channel_at(2), Some(1));
        assert_eq!(records[0].copy_count, 5);
        assert_eq!(records[1].dye_seq.channel_at(0), None);
    }

    #[test]
    fn round_trips_through_text() {
        let (num_channels, records) = parse_dye_seqs(sample_text()).unwrap();
        let text = render_dye_seqs(num_channels, &records);
        let (num_channels2, records2) = parse_dye_seqs(&text).unwrap();
        assert_eq!(num_channels, num_channels2);
        assert_eq!(records, records2);
    }

    #[test]
    fn rejects_out_of_range_channel_digit() {
        let bad = "1\n1\n1 1 5\n";
        assert!(parse_dye_seqs(bad).is_err());
    }

    #[test]
    fn rejects_mismatched_total_count() {
        let bad = "1\n2\n1 1 0\n";
        assert!(parse_dye_seqs(bad).is_err());
    }

    #[test]
    fn rejects_length_mismatch() {
        let bad = "1\n1\n3 1 0.\n";
        assert!(parse_dye_seqs(bad).is_err());
    }
}
