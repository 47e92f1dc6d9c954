// SPDX-License-Identifier: AGPL-3.0-or-later
//! SSE2 row-minimum kernels for x86_64.
//!
//! SSE2 provides 128-bit registers → 2×f64 lanes. SSE2 is baseline on
//! x86_64 (always available). Blending predates `blendv`, so masks
//! are applied with and/andnot/or.

#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::{
    __m128d, _mm_add_pd, _mm_and_pd, _mm_andnot_pd, _mm_cmplt_pd, _mm_loadu_pd, _mm_or_pd,
    _mm_set1_pd, _mm_set_pd, _mm_storeu_pd, _mm_sub_pd,
};

use crate::matrix::INFINITE_DISTANCE;

const LANES: usize = 2;

#[inline]
unsafe fn select(mask: __m128d, on_true: __m128d, on_false: __m128d) -> __m128d {
    _mm_or_pd(_mm_and_pd(mask, on_true), _mm_andnot_pd(mask, on_false))
}

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
            let mut min_v = _mm_set1_pd(INFINITE_DISTANCE);
            let mut ix_v = _mm_set1_pd(-1.0);
            let mut num_v = _mm_set_pd(1.0, 0.0);
            let step = _mm_set1_pd(LANES as f64);
            for i in 0..chunks {
                let v = _mm_loadu_pd(ptr.add(i * LANES));
                let lt = _mm_cmplt_pd(v, min_v);
                min_v = select(lt, v, min_v);
                ix_v = select(lt, num_v, ix_v);
                num_v = _mm_add_pd(num_v, step);
            }
            _mm_storeu_pd(min_lanes.as_mut_ptr(), min_v);
            _mm_storeu_pd(ix_lanes.as_mut_ptr(), ix_v);
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
            let mut min_v = _mm_set1_pd(INFINITE_DISTANCE);
            let mut ix_v = _mm_set1_pd(-1.0);
            let mut num_v = _mm_set_pd(1.0, 0.0);
            let step = _mm_set1_pd(LANES as f64);
            for i in 0..chunks {
                let off = i * LANES;
                let adj = _mm_sub_pd(_mm_loadu_pd(vp.add(off)), _mm_loadu_pd(tp.add(off)));
                let lt = _mm_cmplt_pd(adj, min_v);
                min_v = select(lt, adj, min_v);
                ix_v = select(lt, num_v, ix_v);
                num_v = _mm_add_pd(num_v, step);
            }
            _mm_storeu_pd(min_lanes.as_mut_ptr(), min_v);
            _mm_storeu_pd(ix_lanes.as_mut_ptr(), ix_v);
        }
    }
    finish(min_lanes, ix_lanes, values, Some(totals), chunks * LANES)
}
