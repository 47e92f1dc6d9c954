// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dense matrices with swap-with-last row removal.
//!
//! One matrix type serves four roles in the clustering engines: the
//! square distance matrix D, the square variance-estimate matrix V,
//! and the rectangular sorted-distance / cluster-id matrices S and I
//! used by the branch-and-bound engines. Rows live in a single flat
//! buffer at a padded stride so that every row starts on a
//! [`MATRIX_ALIGNMENT`]-byte boundary relative to the buffer start;
//! a row-offset table stands in for row pointers, so removing a row
//! is an O(1) offset swap and removing a column is an O(n) per-row
//! element swap — no reallocation, no row copying.
//!
//! The upper triangle is maintained alongside the lower one: reads
//! vastly outnumber writes in the row scans, and symmetric storage
//! keeps every scan a contiguous forward walk.

use rayon::prelude::*;

use crate::error::{Error, Result};

/// Sentinel for "no valid entry"; larger than any real distance.
pub const INFINITE_DISTANCE: f64 = 1e300;

/// Row starts are padded to this many bytes.
pub const MATRIX_ALIGNMENT: usize = 64;

/// A dense matrix over `Copy` scalars with O(1) row removal.
///
/// `rank` is the live row/column count; it only ever shrinks. The
/// allocation is sized for the initial rank and never grows, so rows
/// retired by a swap leave their storage in place (the branch-and-bound
/// engines rely on this: a sorted row keeps its sentinel-terminated
/// contents until it is rewritten).
#[derive(Debug, Clone)]
pub struct Matrix<T> {
    n: usize,
    width: usize,
    stride: usize,
    data: Vec<T>,
    offsets: Vec<usize>,
    pub(crate) row_totals: Vec<f64>,
}

impl<T: Copy + Default> Matrix<T> {
    /// An empty matrix (rank 0, no allocation).
    #[must_use]
    pub fn new() -> Self {
        Self {
            n: 0,
            width: 0,
            stride: 0,
            data: Vec::new(),
            offsets: Vec::new(),
            row_totals: Vec::new(),
        }
    }

    /// Allocate a `rank` × `rank` matrix of default-valued cells.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the buffer cannot be
    /// allocated; the matrix is left in the cleared (rank 0) state.
    pub fn with_rank(rank: usize) -> Result<Self> {
        if rank == 0 {
            return Ok(Self::new());
        }
        let per_align = MATRIX_ALIGNMENT / std::mem::size_of::<T>();
        let stride = if per_align <= 1 {
            rank
        } else {
            rank.div_ceil(per_align) * per_align
        };
        let count = stride
            .checked_mul(rank)
            .ok_or(Error::OutOfMemory(usize::MAX))?;
        let mut data: Vec<T> = Vec::new();
        data.try_reserve_exact(count)
            .map_err(|_| Error::OutOfMemory(count))?;
        data.resize(count, T::default());
        Ok(Self {
            n: rank,
            width: rank,
            stride,
            data,
            offsets: (0..rank).map(|r| r * stride).collect(),
            row_totals: vec![0.0; rank],
        })
    }

    /// Live row/column count.
    #[inline]
    #[must_use]
    pub fn rank(&self) -> usize {
        self.n
    }

    /// Row `r` at its full allocated width (the initial rank).
    ///
    /// Square-matrix callers index only `[..rank()]`; the sorted-row
    /// callers walk to a sentinel that may sit beyond the live rank.
    #[inline]
    #[must_use]
    pub fn row(&self, r: usize) -> &[T] {
        let off = self.offsets[r];
        &self.data[off..off + self.width]
    }

    /// Mutable view of row `r` at its full allocated width.
    #[inline]
    pub fn row_mut(&mut self, r: usize) -> &mut [T] {
        let off = self.offsets[r];
        &mut self.data[off..off + self.width]
    }

    /// Cell read.
    #[inline]
    #[must_use]
    pub fn at(&self, r: usize, c: usize) -> T {
        self.data[self.offsets[r] + c]
    }

    /// Cell write.
    #[inline]
    pub fn set(&mut self, r: usize, c: usize, v: T) {
        self.data[self.offsets[r] + c] = v;
    }

    /// Reset row `r` to default-valued cells.
    pub fn zero_row(&mut self, r: usize) {
        let off = self.offsets[r];
        self.data[off..off + self.width].fill(T::default());
    }

    /// Remove row and column `k` from a square matrix by swapping the
    /// last row and column into its place, then shrinking the rank.
    pub fn remove_row_and_column(&mut self, k: usize) {
        let last = self.n - 1;
        for r in 0..self.n {
            let off = self.offsets[r];
            self.data[off + k] = self.data[off + last];
        }
        self.offsets[k] = self.offsets[last];
        self.row_totals[k] = self.row_totals[last];
        self.n = last;
    }

    /// Mark the matrix fully consumed (rank 0) without releasing its
    /// storage. Engines call this once clustering has closed the tree
    /// so a second `construct_tree` cannot re-walk stale rows.
    pub(crate) fn consume(&mut self) {
        self.n = 0;
    }

    /// Remove row `k` from a rectangular matrix: swap the row offset
    /// and total only, leaving in-row contents untouched.
    pub fn remove_row_only(&mut self, k: usize) {
        let last = self.n - 1;
        self.offsets[k] = self.offsets[last];
        self.row_totals[k] = self.row_totals[last];
        self.n = last;
    }
}

impl<T: Copy + Default> Default for Matrix<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default + Send> Matrix<T> {
    /// Mutable rows in allocation order, for parallel bulk
    /// initialization. Only valid on a freshly sized matrix: once any
    /// row has been removed, allocation order and row order diverge.
    pub(crate) fn par_rows_mut(&mut self) -> impl IndexedParallelIterator<Item = &mut [T]> + '_ {
        let width = self.width;
        self.data
            .par_chunks_mut(self.stride)
            .take(self.n)
            .map(move |chunk| &mut chunk[..width])
    }
}

impl Matrix<f64> {
    /// Recompute every row total as the sum of the row's live cells,
    /// diagonal excluded. Parallel over rows; each row is summed
    /// sequentially in column order, so the result is identical to a
    /// sequential pass.
    pub fn calculate_row_totals(&mut self) {
        let n = self.n;
        let this: &Self = self;
        let totals: Vec<f64> = (0..n)
            .into_par_iter()
            .map(|r| {
                let row = &this.row(r)[..n];
                let mut total = 0.0;
                for &v in &row[..r] {
                    total += v;
                }
                for &v in &row[r + 1..] {
                    total += v;
                }
                total
            })
            .collect();
        self.row_totals[..n].copy_from_slice(&totals);
    }

    /// Row total (U vector entry) for live row `r`.
    #[inline]
    #[must_use]
    pub fn row_total(&self, r: usize) -> f64 {
        self.row_totals[r]
    }
}
