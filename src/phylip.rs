// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sovereign PHYLIP distance-matrix parser — zero external parsing
//! dependencies.
//!
//! Reads the square PHYLIP layout emitted by distance tools:
//!
//! ```text
//! 4
//! a  0.0 5.0 9.0 9.0
//! b  5.0 0.0 10.0 10.0
//! c  9.0 10.0 0.0 8.0
//! d  9.0 10.0 8.0 0.0
//! ```
//!
//! Tokens are whitespace-separated; line breaks carry no meaning
//! beyond whitespace. Gzip-compressed files (`.gz` extension) are
//! decompressed on the fly via [`flate2::read::GzDecoder`].
//!
//! Asymmetric pairs are repaired on load: for every `c < r` where
//! `D[r][c] != D[c][r]`, both cells are replaced by their arithmetic
//! mean, so engines can assume symmetry from the first iteration.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// Read a PHYLIP square distance matrix from `path`.
///
/// # Errors
///
/// [`Error::Io`] on file failures, [`Error::Phylip`] on malformed
/// content (see [`parse`]).
pub fn read(path: &Path) -> Result<(Vec<String>, Matrix<f64>)> {
    let io_err = |e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let file = File::open(path).map_err(io_err)?;
    let ext = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("");
    let mut text = String::new();
    if ext.eq_ignore_ascii_case("gz") {
        flate2::read::GzDecoder::new(file)
            .read_to_string(&mut text)
            .map_err(io_err)?;
    } else {
        let mut file = file;
        file.read_to_string(&mut text).map_err(io_err)?;
    }
    parse(&text)
}

/// Parse PHYLIP square distance-matrix text.
///
/// Returns the taxon names in row order and the symmetrized distance
/// matrix with row totals computed.
///
/// # Errors
///
/// Returns [`Error::Phylip`] when the header is missing or not a
/// count, the count is below 2, a row is truncated, or a distance
/// fails to parse as a number.
pub fn parse(text: &str) -> Result<(Vec<String>, Matrix<f64>)> {
    let mut tokens = text.split_whitespace();
    let header = tokens
        .next()
        .ok_or_else(|| Error::Phylip("empty input; expected taxon count".into()))?;
    let rank: usize = header
        .parse()
        .map_err(|_| Error::Phylip(format!("taxon count is not a number: {header:?}")))?;
    if rank < 2 {
        return Err(Error::Phylip(format!(
            "need at least 2 taxa, header says {rank}"
        )));
    }

    let mut names = Vec::with_capacity(rank);
    let mut matrix = Matrix::with_rank(rank)?;
    for r in 0..rank {
        let name = tokens
            .next()
            .ok_or_else(|| Error::Phylip(format!("expected {rank} rows, found {r}")))?;
        names.push(name.to_string());
        for c in 0..rank {
            let tok = tokens.next().ok_or_else(|| {
                Error::Phylip(format!(
                    "row {:?} is truncated: expected {rank} distances, found {c}",
                    names[r]
                ))
            })?;
            let value: f64 = tok.parse().map_err(|_| {
                Error::Phylip(format!("row {:?}: not a number: {tok:?}", names[r]))
            })?;
            matrix.set(r, c, value);
        }
        // Repair asymmetry as the row is read.
        for c in 0..r {
            let lower = matrix.at(r, c);
            let upper = matrix.at(c, r);
            if lower != upper {
                let mean = 0.5 * (lower + upper);
                matrix.set(r, c, mean);
                matrix.set(c, r, mean);
            }
        }
    }
    matrix.calculate_row_totals();
    Ok((names, matrix))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "\
4
a  0 5 9 9
b  5 0 10 10
c  9 10 0 8
d  9 10 8 0
";

    // ── Well-formed input ────────────────────────────────────────

    #[test]
    fn parses_square_matrix() {
        let (names, m) = parse(SQUARE).unwrap();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(m.rank(), 4);
        assert!((m.at(2, 3) - 8.0).abs() < f64::EPSILON);
        assert!((m.at(3, 2) - 8.0).abs() < f64::EPSILON);
        assert!((m.row_total(0) - 23.0).abs() < 1e-12);
    }

    #[test]
    fn asymmetric_pairs_are_averaged() {
        let text = "2\nx 0 4\ny 2 0\n";
        let (_, m) = parse(text).unwrap();
        assert!((m.at(0, 1) - 3.0).abs() < f64::EPSILON);
        assert!((m.at(1, 0) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn line_breaks_are_just_whitespace() {
        let text = "2 x 0\n1 y\n1 0";
        let (names, m) = parse(text).unwrap();
        assert_eq!(names, vec!["x", "y"]);
        assert!((m.at(0, 1) - 1.0).abs() < f64::EPSILON);
    }

    // ── Malformed input ──────────────────────────────────────────

    #[test]
    fn empty_input_is_error() {
        assert!(matches!(parse(""), Err(Error::Phylip(_))));
    }

    #[test]
    fn non_numeric_header_is_error() {
        assert!(matches!(parse("four\na 0"), Err(Error::Phylip(_))));
    }

    #[test]
    fn single_taxon_is_error() {
        assert!(matches!(parse("1\na 0\n"), Err(Error::Phylip(_))));
    }

    #[test]
    fn missing_row_is_error() {
        let text = "3\na 0 1 2\nb 1 0 3\n";
        assert!(matches!(parse(text), Err(Error::Phylip(_))));
    }

    #[test]
    fn truncated_row_is_error() {
        let text = "3\na 0 1 2\nb 1 0\nc 2 3 0\n";
        assert!(matches!(parse(text), Err(Error::Phylip(_))));
    }

    #[test]
    fn non_numeric_distance_is_error() {
        let text = "2\na 0 one\nb 1 0\n";
        assert!(matches!(parse(text), Err(Error::Phylip(_))));
    }

    // ── File round-trip ──────────────────────────────────────────

    #[test]
    fn reads_plain_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dist.phy");
        std::fs::write(&path, SQUARE).unwrap();
        let (names, m) = read(&path).unwrap();
        assert_eq!(names.len(), 4);
        assert_eq!(m.rank(), 4);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read(Path::new("/no/such/dist.phy")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn reads_gzip_file() {
        use std::io::Write as _;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dist.phy.gz");
        let file = std::fs::File::create(&path).unwrap();
        let mut gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        gz.write_all(SQUARE.as_bytes()).unwrap();
        gz.finish().unwrap();
        let (names, m) = read(&path).unwrap();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert!((m.at(1, 2) - 10.0).abs() < f64::EPSILON);
    }
}
