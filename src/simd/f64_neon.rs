// SPDX-License-Identifier: AGPL-3.0-or-later
//! NEON row-minimum kernels for aarch64.
//!
//! NEON provides 128-bit registers → 2×f64 lanes and is baseline on
//! aarch64. `vbslq` performs the masked blend directly.

use core::arch::aarch64::{
    uint64x2_t, vaddq_f64, vbslq_f64, vcltq_f64, vdupq_n_f64, vld1q_f64, vst1q_f64, vsubq_f64,
};

use crate::matrix::INFINITE_DISTANCE;

const LANES: usize = 2;

/// Reduce per-lane minima/columns to a scalar pair, preferring the
/// lowest column among equal minima, then fold in the scalar tail.
#[inline]
fn finish(
    min_lanes: [f64; LANES],
    ix_lanes: [f64; LANES],
    values: &[f64],
    totals: Option<&[f64]>,
    tail_start: usize,
) -> (usize, f64) {
    let mut best = INFINITE_DISTANCE;
    let mut best_col = usize::MAX;
    for lane in 0..LANES {
        if ix_lanes[lane] < 0.0 {
            continue;
        }
        let col = ix_lanes[lane] as usize;
        let v = min_lanes[lane];
        if v < best || (v == best && col < best_col) {
            best = v;
            best_col = col;
        }
    }
    if best_col == usize::MAX {
        best_col = 0;
    }
    // Tail columns sit above every block column, so strict less-than
    // preserves the lowest-column tie rule.
    for c in tail_start..values.len() {
        let v = match totals {
            Some(t) => values[c] - t[c],
            None => values[c],
        };
        if v < best {
            best = v;
            best_col = c;
        }
    }
    (best_col, best)
}

/// Minimum of `values` with its column (2 lanes).
#[inline]
pub fn min_index(values: &[f64]) -> (usize, f64) {
    let n = values.len();
    let chunks = n / LANES;
    let mut min_lanes = [INFINITE_DISTANCE; LANES];
    let mut ix_lanes = [-1.0; LANES];
    if chunks > 0 {
        unsafe {
            let ptr = values.as_ptr();
            let mut min_v = vdupq_n_f64(INFINITE_DISTANCE);
            let mut ix_v = vdupq_n_f64(-1.0);
            let first = [0.0_f64, 1.0];
            let mut num_v = vld1q_f64(first.as_ptr());
            let step = vdupq_n_f64(LANES as f64);
            for i in 0..chunks {
                let v = vld1q_f64(ptr.add(i * LANES));
                let lt: uint64x2_t = vcltq_f64(v, min_v);
                min_v = vbslq_f64(lt, v, min_v);
                ix_v = vbslq_f64(lt, num_v, ix_v);
                num_v = vaddq_f64(num_v, step);
            }
            vst1q_f64(min_lanes.as_mut_ptr(), min_v);
            vst1q_f64(ix_lanes.as_mut_ptr(), ix_v);
        }
    }
    finish(min_lanes, ix_lanes, values, None, chunks * LANES)
}

/// Minimum of `values[c] − totals[c]` with its column (2 lanes).
#[inline]
pub fn min_index_adjusted(values: &[f64], totals: &[f64]) -> (usize, f64) {
    let n = values.len();
    let chunks = n / LANES;
    let mut min_lanes = [INFINITE_DISTANCE; LANES];
    let mut ix_lanes = [-1.0; LANES];
    if chunks > 0 {
        unsafe {
            let vp = values.as_ptr();
            let tp = totals.as_ptr();
            let mut min_v = vdupq_n_f64(INFINITE_DISTANCE);
            let mut ix_v = vdupq_n_f64(-1.0);
            let first = [0.0_f64, 1.0];
            let mut num_v = vld1q_f64(first.as_ptr());
            let step = vdupq_n_f64(LANES as f64);
            for i in 0..chunks {
                let off = i * LANES;
                let adj = vsubq_f64(vld1q_f64(vp.add(off)), vld1q_f64(tp.add(off)));
                let lt: uint64x2_t = vcltq_f64(adj, min_v);
                min_v = vbslq_f64(lt, adj, min_v);
                ix_v = vbslq_f64(lt, num_v, ix_v);
                num_v = vaddq_f64(num_v, step);
            }
            vst1q_f64(min_lanes.as_mut_ptr(), min_v);
            vst1q_f64(ix_lanes.as_mut_ptr(), ix_v);
        }
    }
    finish(min_lanes, ix_lanes, values, Some(totals), chunks * LANES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::scalar;

    #[test]
    fn matches_scalar_on_odd_lengths() {
        let values: Vec<f64> = (0..13).map(|i| f64::from((i * 7) % 13)).collect();
        assert_eq!(min_index(&values), scalar::min_index(&values));
    }

    #[test]
    fn adjusted_matches_scalar() {
        let values: Vec<f64> = (0..9).map(|i| f64::from(9 - i)).collect();
        let totals: Vec<f64> = (0..9).map(|i| f64::from(i) * 0.25).collect();
        assert_eq!(
            min_index_adjusted(&values, &totals),
            scalar::min_index_adjusted(&values, &totals)
        );
    }
}
