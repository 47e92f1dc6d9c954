// SPDX-License-Identifier: AGPL-3.0-or-later
//! Branch-and-bound neighbour joining (Simonsen, Mailund & Pedersen
//! 2011).
//!
//! Wraps the NJ or BIONJ merge rule with two auxiliary rectangular
//! matrices: S, each row of D sorted ascending over the clusters that
//! were live and *earlier* when the row was last sorted, and I, the
//! matching cluster ids. A row scan walks S in ascending distance and
//! stops at the first entry that cannot beat the best Q seen so far
//! (`rowBound = qBest + maxEarlierTotal + T[row]`), which prunes the
//! bulk of every row once a good candidate is known.
//!
//! Cluster-keyed bookkeeping replaces row-keyed totals: rows shuffle
//! on every merge, cluster ids never move. Retired clusters keep a
//! `−INFINITE_DISTANCE` total so their Q comes out astronomically
//! large and they lose every comparison; the explicit liveness check
//! on `cluster_to_row` keeps the property robust anyway.
//!
//! Rows are scanned in ascending order of the previous iteration's
//! minima, so `qBest` drops early and later rows prune hard.
//!
//! # References
//!
//! - Simonsen, Mailund & Pedersen 2011, *CCIS* 127:334-344 (RapidNJ)
//! - Saitou & Nei 1987; Gascuel 1997 (the wrapped merge rules)

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::engine::{Position, ScalarScan, TreeBuilder};
use crate::error::{Error, Result};
use crate::heap::mirrored_heapsort;
use crate::matrix::{Matrix, INFINITE_DISTANCE};
use crate::nj::{NeighborJoining, Reduction};
use crate::tree::ClusterTree;

/// Tuning knobs for the bounding engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoundingParams {
    /// Periodically compact retired clusters out of the sorted rows
    /// once the live count falls to two thirds of its value at the
    /// last compaction. Off by default, as in the reference runs;
    /// purging bounds scan length but is not needed for correctness.
    pub periodic_purge: bool,
}

/// Monotone-decreasing shared bound. Lost updates only forgo pruning;
/// every row's own minimum is still compared in the global reduction.
struct AtomicMinF64(AtomicU64);

impl AtomicMinF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn fetch_min(&self, value: f64) {
        let mut current = self.0.load(Ordering::Relaxed);
        while value < f64::from_bits(current) {
            match self.0.compare_exchange_weak(
                current,
                value.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(seen) => current = seen,
            }
        }
    }
}

/// Branch-and-bound engine over an NJ-family merge rule.
#[derive(Debug, Default)]
pub struct Bounding<R: Reduction> {
    nj: NeighborJoining<R, ScalarScan>,
    /// Inverse of `row_to_cluster`; −1 marks a retired cluster.
    cluster_to_row: Vec<isize>,
    /// U keyed by cluster id instead of row index.
    cluster_totals: Vec<f64>,
    /// `cluster_totals` × 1/(n−2), refreshed every iteration.
    scaled_cluster_totals: Vec<f64>,
    /// For cluster c: max scaled total over live clusters with id < c.
    scaled_max_earlier: Vec<f64>,
    row_order_chosen: Vec<bool>,
    row_scan_order: Vec<usize>,
    /// S: per-row ascending distances, sentinel-terminated.
    sorted: Matrix<f64>,
    /// I: cluster ids aligned with S.
    index: Matrix<u32>,
    params: BoundingParams,
}

/// Copy the live off-diagonal entries of `d_row` whose cluster id is
/// below `bound` into `values`/`ids`, append the sentinel pair, and
/// sort ascending with mirrored ids.
fn gather_and_sort(
    d_row: &[f64],
    row_to_cluster: &[usize],
    r: usize,
    bound: usize,
    values: &mut [f64],
    ids: &mut [u32],
) {
    let mut w = 0;
    for (i, &cluster) in row_to_cluster.iter().enumerate() {
        if i != r && cluster < bound {
            values[w] = d_row[i];
            ids[w] = cluster as u32;
            w += 1;
        }
    }
    values[w] = INFINITE_DISTANCE;
    ids[w] = 0;
    mirrored_heapsort(&mut values[..w], &mut ids[..w]);
}

impl<R: Reduction> Bounding<R> {
    /// A fresh engine with nothing loaded, default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::with_params(BoundingParams::default())
    }

    /// A fresh engine with explicit parameters.
    #[must_use]
    pub fn with_params(params: BoundingParams) -> Self {
        Self {
            nj: NeighborJoining::new(),
            cluster_to_row: Vec::new(),
            cluster_totals: Vec::new(),
            scaled_cluster_totals: Vec::new(),
            scaled_max_earlier: Vec::new(),
            row_order_chosen: Vec::new(),
            row_scan_order: Vec::new(),
            sorted: Matrix::new(),
            index: Matrix::new(),
            params,
        }
    }

    /// Set up cluster-keyed bookkeeping and sort every row of S/I.
    fn prepare_bounds(&mut self) -> Result<()> {
        let n = self.nj.core.rank();
        self.cluster_to_row = (0..n).map(|r| r as isize).collect();
        self.cluster_totals = (0..n).map(|r| self.nj.core.d.row_total(r)).collect();
        self.scaled_cluster_totals = vec![0.0; n];
        self.scaled_max_earlier = vec![0.0; n];
        self.row_order_chosen = vec![false; n];
        self.row_scan_order = vec![0; n];
        self.sorted = Matrix::with_rank(n)?;
        self.index = Matrix::with_rank(n)?;

        let d = &self.nj.core.d;
        let map = &self.nj.core.row_to_cluster[..n];
        self.sorted
            .par_rows_mut()
            .zip(self.index.par_rows_mut())
            .enumerate()
            .for_each(|(r, (values, ids))| {
                // Initial bound r keeps only earlier clusters, so row
                // r of S covers the lower triangle of D.
                gather_and_sort(d.row(r), map, r, r, values, ids);
            });
        Ok(())
    }

    /// Re-sort the single row `r` against all clusters below `bound`.
    fn sort_row(&mut self, r: usize, bound: usize) {
        let n = self.nj.core.rank();
        let d_row = self.nj.core.d.row(r);
        let map = &self.nj.core.row_to_cluster[..n];
        gather_and_sort(
            d_row,
            map,
            r,
            bound,
            self.sorted.row_mut(r),
            self.index.row_mut(r),
        );
    }

    /// Order rows by the previous iteration's minima (smallest first,
    /// deduplicated), then append the rest in row order.
    fn decide_scan_order(&mut self) {
        let minima = &mut self.nj.core.row_minima;
        // One shrinking pass of pairwise compare-swaps: cheap, and the
        // order only has to be roughly ascending to warm the bound.
        let mut len = minima.len();
        while len > 1 {
            let half = len / 2;
            for j in (half..len).rev() {
                let i = j - half;
                if minima[j].value < minima[i].value {
                    minima.swap(i, j);
                }
            }
            len = (len + 1) / 2;
        }

        let n = self.nj.core.rank();
        self.row_order_chosen.fill(false);
        let mut w = 0;
        for pos in self.nj.core.row_minima.iter() {
            if pos.value >= INFINITE_DISTANCE {
                break;
            }
            // The later cluster's row holds the pair in its sorted
            // row. Rows here may be stale after swaps; the rank guard
            // drops those.
            let cluster_a = self.nj.core.row_to_cluster[pos.row];
            let cluster_b = self.nj.core.row_to_cluster[pos.column];
            let row = if cluster_a < cluster_b {
                pos.column
            } else {
                pos.row
            };
            if row < n && !self.row_order_chosen[row] {
                self.row_scan_order[w] = row;
                w += 1;
            }
            self.row_order_chosen[row] = true;
        }
        for r in 0..n {
            if !self.row_order_chosen[r] {
                self.row_scan_order[w] = r;
                w += 1;
            }
        }
        debug_assert_eq!(w, n);
    }

    /// Walk row `row` of S ascending, pruning at the bound. Returns
    /// the row's best candidate normalised to `column < row`.
    fn row_minimum(&self, row: usize, max_earlier: f64, mut q_best: f64) -> Position {
        let n = self.nj.core.rank();
        let t_mult = if n <= 2 { 0.0 } else { 1.0 / (n as f64 - 2.0) };
        let row_total = self.nj.core.d.row_total(row) * t_mult;
        let mut row_bound = q_best + max_earlier + row_total;
        let mut pos = Position::unset(row);
        let values = self.sorted.row(row);
        let ids = self.index.row(row);
        for (i, &d_rc) in values.iter().enumerate() {
            if d_rc >= row_bound {
                break;
            }
            let cluster = ids[i] as usize;
            let q_rc = d_rc - self.scaled_cluster_totals[cluster] - row_total;
            if q_rc < pos.value {
                let other = self.cluster_to_row[cluster];
                if other >= 0 {
                    let other = other as usize;
                    pos.column = other.min(row);
                    pos.row = other.max(row);
                    pos.value = q_rc;
                    if q_rc < q_best {
                        q_best = q_rc;
                        row_bound = q_best + max_earlier + row_total;
                    }
                }
            }
        }
        pos
    }

    /// Refresh the scaled cluster totals and per-cluster earlier
    /// maxima, then scan rows (parallel, in decided order) for their
    /// bounded minima.
    fn scan_row_minima(&mut self) {
        let n = self.nj.core.rank();
        let cluster_count = self.nj.core.tree.len();
        let t_mult = if n <= 2 { 0.0 } else { 1.0 / (n as f64 - 2.0) };
        let mut max_tot = -INFINITE_DISTANCE;
        for c in 0..cluster_count {
            self.scaled_cluster_totals[c] = self.cluster_totals[c] * t_mult;
            self.scaled_max_earlier[c] = max_tot;
            if self.cluster_to_row[c] >= 0 && max_tot < self.scaled_cluster_totals[c] {
                max_tot = self.scaled_cluster_totals[c];
            }
        }

        self.decide_scan_order();

        let this = &*self;
        let q_best = AtomicMinF64::new(INFINITE_DISTANCE);
        let scanned: Vec<(usize, Position)> = this.row_scan_order[..n]
            .par_iter()
            .map(|&row| {
                let cluster = this.nj.core.row_to_cluster[row];
                let max_earlier = this.scaled_max_earlier[cluster];
                let pos = this.row_minimum(row, max_earlier, q_best.load());
                q_best.fetch_min(pos.value);
                (row, pos)
            })
            .collect();

        let mut minima = vec![Position::unset(0); n];
        for (row, pos) in scanned {
            minima[row] = pos;
        }
        self.nj.core.row_minima = minima;
    }

    /// Merge rows `a < b`: retire both clusters, delegate the
    /// distance/variance update, then restore the cluster-keyed
    /// caches and re-sort the merged row.
    fn merge(&mut self, a: usize, b: usize) -> Result<()> {
        let n = self.nj.core.rank();
        let cluster_a = self.nj.core.row_to_cluster[a];
        let cluster_b = self.nj.core.row_to_cluster[b];
        let cluster_moved = self.nj.core.row_to_cluster[n - 1];
        self.cluster_to_row[cluster_a] = -1;
        self.cluster_to_row[cluster_b] = -1;
        let prior_clusters = self.nj.core.tree.len();

        self.nj.merge(a, b)?;

        let n = self.nj.core.rank();
        self.cluster_to_row.push(a as isize);
        self.cluster_totals.push(self.nj.core.d.row_total(a));
        self.scaled_cluster_totals
            .push(self.nj.core.d.row_total(a) / (n as f64 - 1.0));
        self.scaled_max_earlier.push(0.0);
        if b < n {
            self.cluster_to_row[cluster_moved] = b as isize;
        }

        // Mirror the row swap done on D (and V) onto S and I.
        self.sorted.remove_row_only(b);
        self.index.remove_row_only(b);

        // Retired clusters get a total so negative that their Q never
        // competes; then refresh totals for the live rows.
        for total in &mut self.cluster_totals[..prior_clusters] {
            *total = -INFINITE_DISTANCE;
        }
        for r in 0..n {
            let cluster = self.nj.core.row_to_cluster[r];
            self.cluster_totals[cluster] = self.nj.core.d.row_total(r);
        }

        self.sort_row(a, self.nj.core.tree.len());
        Ok(())
    }

    /// Compact retired clusters out of every sorted row.
    fn purge_all_rows(&mut self) {
        let n = self.nj.core.rank();
        for r in 0..n {
            let values = self.sorted.row_mut(r);
            let ids = self.index.row_mut(r);
            let mut w = 0;
            for i in 0..values.len() {
                values[w] = values[i];
                ids[w] = ids[i];
                if values[i] >= INFINITE_DISTANCE {
                    break;
                }
                if self.cluster_to_row[ids[i] as usize] >= 0 {
                    w += 1;
                }
            }
        }
    }
}

impl<R: Reduction> TreeBuilder for Bounding<R> {
    fn load_phylip(&mut self, path: &Path) -> Result<()> {
        self.nj.load_phylip(path)
    }

    fn load_matrix(&mut self, names: &[String], flat: &[f64]) -> Result<()> {
        self.nj.load_matrix(names, flat)
    }

    fn construct_tree(&mut self) -> Result<()> {
        if self.nj.core.rank() == 0 {
            return Err(Error::InvalidInput("no distance matrix loaded".into()));
        }
        if self.nj.core.rank() == 2 {
            self.nj.core.close_pair();
            return Ok(());
        }
        self.prepare_bounds()?;
        let mut next_purge = if self.params.periodic_purge {
            self.nj.core.rank() * 2 / 3
        } else {
            0
        };
        while self.nj.core.rank() > 3 {
            self.scan_row_minima();
            let best = self.nj.core.global_minimum()?;
            self.merge(best.column, best.row)?;
            if self.params.periodic_purge && self.nj.core.rank() == next_purge {
                self.purge_all_rows();
                next_purge = self.nj.core.rank() * 2 / 3;
            }
        }
        self.nj.close_triple();
        Ok(())
    }

    fn write_newick(&self, path: &Path) -> Result<()> {
        self.nj.write_newick(path)
    }

    fn newick_string(&self) -> Result<String> {
        self.nj.newick_string()
    }

    fn tree(&self) -> &ClusterTree {
        self.nj.tree()
    }
}
