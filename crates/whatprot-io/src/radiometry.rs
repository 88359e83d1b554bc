//! Radiometry matrices: one `T x C` grid of intensities per peptide trace,
//! either a human-readable text form or a raw little-endian binary form for
//! large batches.
//!
//! Binary layout: a 12-byte header of three little-endian `u32`s
//! (`num_cycles`, `num_channels`, `num_radiometries`), followed by that many
//! records, each `num_cycles * num_channels` little-endian `f64`s in
//! row-major (cycle-major) order.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use whatprot_hmm::Radiometry;

/// Parse a text-format radiometry batch: a header line `num_cycles
/// num_channels num_radiometries`, then that many blocks of `num_cycles`
/// lines of `num_channels` whitespace-separated floats each.
///
/// # Errors
/// Returns an error naming the offending line on any malformed header,
/// row, or field count.
pub fn parse_radiometries_text(text: &str) -> Result<Vec<Radiometry>> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines.next().context("missing header line")?;
    let fields: Vec<&str> = header.split_whitespace().collect();
    if fields.len() != 3 {
        bail!("header line {:?}: expected 3 fields, got {}", header, fields.len());
    }
    let num_cycles: usize = fields[0]
        .parse()
        .with_context(|| format!("header: num_cycles {:?} is not an integer", fields[0]))?;
    let num_channels: usize = fields[1]
        .parse()
        .with_context(|| format!("header: num_channels {:?} is not an integer", fields[1]))?;
    let num_radiometries: usize = fields[2]
        .parse()
        .with_context(|| format!("header: num_radiometries {:?} is not an integer", fields[2]))?;

    let mut out = Vec::with_capacity(num_radiometries);
    for r in 0..num_radiometries {
        let mut values = Vec::with_capacity(num_cycles * num_channels);
        for row in 0..num_cycles {
            let (line_no, line) = lines
                .next()
                .with_context(|| format!("radiometry {r}: missing row {row} of {num_cycles}"))?;
            let row_fields: Vec<&str> = line.split_whitespace().collect();
            if row_fields.len() != num_channels {
                bail!(
                    "line {}: expected {} channel values, got {}",
                    line_no + 1,
                    num_channels,
                    row_fields.len()
                );
            }
            for field in row_fields {
                let v: f64 = field
                    .parse()
                    .with_context(|| format!("line {}: {:?} is not a float", line_no + 1, field))?;
                values.push(v);
            }
        }
        out.push(Radiometry::new(values, num_cycles, num_channels));
    }
    Ok(out)
}

/// Render a radiometry batch to its text representation, readable back by
/// [`parse_radiometries_text`].
///
/// # Panics
/// Panics if `radiometries` is non-empty and its members disagree on cycle
/// or channel count.
#[must_use]
pub fn render_radiometries_text(radiometries: &[Radiometry]) -> String {
    use std::fmt::Write as _;
    let (num_cycles, num_channels) = radiometries
        .first()
        .map_or((0, 0), |r| (r.num_cycles(), r.num_channels()));
    let mut out = String::new();
    let _ = writeln!(out, "{num_cycles} {num_channels} {}", radiometries.len());
    for r in radiometries {
        assert_eq!(r.num_cycles(), num_cycles, "mixed cycle counts in one batch");
        assert_eq!(r.num_channels(), num_channels, "mixed channel counts in one batch");
        for cycle in 0..num_cycles {
            let row: Vec<String> = (0..num_channels).map(|c| r.get(cycle, c).to_string()).collect();
            let _ = writeln!(out, "{}", row.join(" "));
        }
    }
    out
}

/// Read a text-format radiometry batch from `path`.
///
/// # Errors
/// Returns an error if the file can't be opened or fails to parse.
pub fn read_radiometries_text<P: AsRef<Path>>(path: P) -> Result<Vec<Radiometry>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).with_context(|| format!("open {}", path.display()))?;
    parse_radiometries_text(&text).with_context(|| format!("parsing radiometries {}", path.display()))
}

/// Write a text-format radiometry batch to `path`.
///
/// # Errors
/// Returns an error if the file can't be created or written.
pub fn write_radiometries_text<P: AsRef<Path>>(path: P, radiometries: &[Radiometry]) -> Result<()> {
    let path = path.as_ref();
    let text = render_radiometries_text(radiometries);
    std::fs::write(path, text).with_context(|| format!("writing radiometries to {}", path.display()))
}

/// Read a raw binary radiometry batch from `path`.
///
/// # Errors
/// Returns an error if the file can't be opened, is truncated, or its
/// header declares a size inconsistent with the file's length.
pub fn read_radiometries_binary<P: AsRef<Path>>(path: P) -> Result<Vec<Radiometry>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut header = [0u8; 12];
    reader
        .read_exact(&mut header)
        .with_context(|| format!("{}: truncated header", path.display()))?;
    let num_cycles = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
    let num_channels = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;
    let num_radiometries = u32::from_le_bytes(header[8..12].try_into().unwrap()) as usize;

    let record_len = num_cycles * num_channels;
    let mut out = Vec::with_capacity(num_radiometries);
    for r in 0..num_radiometries {
        let mut buf = vec![0u8; record_len * 8];
        reader
            .read_exact(&mut buf)
            .with_context(|| format!("{}: truncated at radiometry {r} of {num_radiometries}", path.display()))?;
        let values: Vec<f64> = buf
            .chunks_exact(8)
            .map(|chunk| f64::from_le_bytes(chunk.try_into().unwrap()))
            .collect();
        out.push(Radiometry::new(values, num_cycles, num_channels));
    }
    Ok(out)
}

/// Write a raw binary radiometry batch to `path`.
///
/// # Errors
/// Returns an error if the file can't be created or written, or if
/// `radiometries` mix cycle/channel counts.
///
/// # Panics
/// Panics if `radiometries` is non-empty and its members disagree on cycle
/// or channel count.
pub fn write_radiometries_binary<P: AsRef<Path>>(path: P, radiometries: &[Radiometry]) -> Result<()> {
    let path = path.as_ref();
    let (num_cycles, num_channels) = radiometries
        .first()
        .map_or((0, 0), |r| (r.num_cycles(), r.num_channels()));

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&(num_cycles as u32).to_le_bytes())?;
    writer.write_all(&(num_channels as u32).to_le_bytes())?;
    writer.write_all(&(radiometries.len() as u32).to_le_bytes())?;
    for r in radiometries {
        assert_eq!(r.num_cycles(), num_cycles, "mixed cycle counts in one batch");
        assert_eq!(r.num_channels(), num_channels, "mixed channel counts in one batch");
        for cycle in 0..num_cycles {
            for c in 0..num_channels {
                writer.write_all(&r.get(cycle, c).to_le_bytes())?;
            }
        }
    }
    writer
        .flush()
        .with_context(|| format!("writing radiometries to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Radiometry> {
        vec![
            Radiometry::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2),
            Radiometry::new(vec![0.5, 0.25, 0.1, 0.2], 2, 2),
        ]
    }

    #[test]
    fn text_round_trips() {
        let original = sample();
        let text = render_radiometries_text(&original);
        let parsed = parse_radiometries_text(&text).expect("valid batch");
        assert_eq!(parsed, original);
    }

    #[test]
    fn binary_round_trips_through_tmp_file() {
        let original = sample();
        let path = std::env::temp_dir().join("whatprot-io-test-radiometries.bin");
        write_radiometries_binary(&path, &original).expect("write");
        let parsed = read_radiometries_binary(&path).expect("read");
        let _ = std::fs::remove_file(&path);
        assert_eq!(parsed, original);
    }

    #[test]
    fn rejects_mismatched_row_width() {
        let bad = "2 2 1\n1.0 2.0\n3.0\n";
        assert!(parse_radiometries_text(bad).is_err());
    }

    #[test]
    fn rejects_truncated_binary_record() {
        let path = std::env::temp_dir().join("whatprot-io-test-truncated.bin");
        std::fs::write(&path, [1u8, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]).unwrap();
        let result = read_radiometries_binary(&path);
        let _ = std::fs::remove_file(&path);
        assert!(result.is_err());
    }
}
