// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lane-parallel row-minimum kernels with compile-time architecture
//! dispatch.
//!
//! The clustering inner loop is "find the minimum (optionally
//! total-adjusted) value in a row prefix, with its column". These
//! kernels keep per-lane running minima and per-lane column indices,
//! blend on strict less-than, then reduce across lanes with a
//! lowest-column tie-break, so every kernel returns exactly what the
//! sequential scan returns.
//!
//! On `x86_64` the widest instruction set enabled at compile time is
//! selected: AVX > SSE2 (SSE2 is baseline). Enable AVX via
//! `-C target-cpu=native` or `-C target-feature=+avx`. On `aarch64`
//! the NEON kernel is used (baseline). Everything else falls back to
//! the scalar loop, which is also the reference the lane kernels are
//! tested against.
//!
//! | Arch      | ISA    | f64 lanes |
//! |-----------|--------|-----------|
//! | `x86_64`  | SSE2   | 2         |
//! | `x86_64`  | AVX    | 4         |
//! | `aarch64` | NEON   | 2         |
//! | other     | scalar | 1         |

pub(crate) mod scalar;

#[cfg(target_arch = "aarch64")]
pub(crate) mod f64_neon;

#[cfg(target_arch = "x86_64")]
pub(crate) mod f64_sse2;

#[cfg(all(target_arch = "x86_64", target_feature = "avx"))]
pub(crate) mod f64_avx;

/// Minimum of `values` with its column; lowest column on ties.
/// Empty input yields `(0, INFINITE_DISTANCE)`.
#[inline]
#[must_use]
pub fn min_index(values: &[f64]) -> (usize, f64) {
    #[cfg(target_arch = "aarch64")]
    return f64_neon::min_index(values);
    #[cfg(all(target_arch = "x86_64", target_feature = "avx"))]
    return f64_avx::min_index(values);
    #[cfg(all(target_arch = "x86_64", not(target_feature = "avx")))]
    return f64_sse2::min_index(values);
    #[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
    return scalar::min_index(values);
}

/// Minimum of `values[c] − totals[c]` with its column; lowest column
/// on ties. Empty input yields `(0, INFINITE_DISTANCE)`.
///
/// # Panics
///
/// Panics (debug) if `totals` is shorter than `values`.
#[inline]
#[must_use]
pub fn min_index_adjusted(values: &[f64], totals: &[f64]) -> (usize, f64) {
    debug_assert!(totals.len() >= values.len());
    #[cfg(target_arch = "aarch64")]
    return f64_neon::min_index_adjusted(values, totals);
    #[cfg(all(target_arch = "x86_64", target_feature = "avx"))]
    return f64_avx::min_index_adjusted(values, totals);
    #[cfg(all(target_arch = "x86_64", not(target_feature = "avx")))]
    return f64_sse2::min_index_adjusted(values, totals);
    #[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
    return scalar::min_index_adjusted(values, totals);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pseudo_row(n: usize, seed: u64) -> Vec<f64> {
        // Deterministic LCG so lane boundaries see varied values.
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                f64::from(u32::try_from(state >> 40).unwrap()) / 1e6
            })
            .collect()
    }

    // ── Lane kernels match the scalar reference ──────────────────

    #[test]
    fn min_index_matches_scalar_at_lane_boundaries() {
        for n in [0, 1, 2, 3, 4, 5, 7, 8, 9, 15, 16, 17, 31, 33, 100] {
            let row = pseudo_row(n, 42 + n as u64);
            let got = min_index(&row);
            let want = scalar::min_index(&row);
            assert_eq!(got.0, want.0, "column mismatch at n={n}");
            assert_eq!(got.1.to_bits(), want.1.to_bits(), "value mismatch at n={n}");
        }
    }

    #[test]
    fn adjusted_matches_scalar_at_lane_boundaries() {
        for n in [0, 1, 2, 3, 4, 5, 7, 8, 9, 15, 16, 17, 31, 33, 100] {
            let row = pseudo_row(n, 7 + n as u64);
            let totals = pseudo_row(n, 1000 + n as u64);
            let got = min_index_adjusted(&row, &totals);
            let want = scalar::min_index_adjusted(&row, &totals);
            assert_eq!(got.0, want.0, "column mismatch at n={n}");
            assert_eq!(got.1.to_bits(), want.1.to_bits(), "value mismatch at n={n}");
        }
    }

    #[test]
    fn ties_resolve_to_lowest_column() {
        // Duplicated minimum straddling lane boundaries.
        let mut row = vec![5.0; 12];
        row[3] = 1.0;
        row[6] = 1.0;
        row[9] = 1.0;
        assert_eq!(min_index(&row).0, 3);

        let totals = vec![0.0; 12];
        assert_eq!(min_index_adjusted(&row, &totals).0, 3);
    }

    #[test]
    fn single_element_row() {
        assert_eq!(min_index(&[2.5]), (0, 2.5));
        let (c, v) = min_index_adjusted(&[2.5], &[0.5]);
        assert_eq!(c, 0);
        assert!((v - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_row_is_infinite() {
        let (c, v) = min_index(&[]);
        assert_eq!(c, 0);
        assert!(v >= crate::matrix::INFINITE_DISTANCE);
    }
}
