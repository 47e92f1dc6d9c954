// SPDX-License-Identifier: AGPL-3.0-or-later
//! Neighbour joining (Saitou & Nei 1987).
//!
//! Each iteration merges the pair minimising the Q-criterion
//! `Q(r,c) = D[r][c] − T[r] − T[c]`, where `T[r] = U[r] / (n−2)` is
//! the scaled row total. Working with scaled totals costs n
//! multiplications per iteration instead of n·(n−1)/2: the inner scan
//! subtracts `T[c]` per cell and `T[r]` once after the scan.
//!
//! The merge rule is a seam ([`Reduction`]): plain NJ uses λ = 0.5
//! and maintains row totals in place; BIONJ substitutes a
//! variance-weighted λ and a parallel variance matrix (see
//! [`crate::bionj`]). The row scanner is the same seam the UPGMA
//! engine uses, so the lane-parallel variants are type aliases.
//!
//! # References
//!
//! - Saitou & Nei 1987, *Mol Biol Evol* 4:406-425
//! - Studier & Keppler 1988, *Mol Biol Evol* 5:729-731 (O(n³) form)

use std::marker::PhantomData;
use std::path::Path;

use rayon::prelude::*;

use crate::engine::{EngineCore, MinScan, Position, ScalarScan, TreeBuilder};
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::tree::ClusterTree;

/// Merge-rule seam between plain NJ and BIONJ.
///
/// The engine drives one call sequence per merge of rows `a < b`:
/// [`begin_merge`](Self::begin_merge) once, then
/// [`update_column`](Self::update_column) for every surviving column,
/// then [`retire`](Self::retire) after the distance matrix has shrunk.
/// `Send + Sync` because engines holding a reduction are shared
/// across the parallel row scans.
pub trait Reduction: Default + Send + Sync + std::fmt::Debug {
    /// Whether the new row's total survives the in-place delta update
    /// (true for plain NJ; BIONJ recomputes it by summation).
    const INCREMENTAL_TOTALS: bool;

    /// Called after a distance matrix loads; clones auxiliary state.
    ///
    /// # Errors
    ///
    /// Propagates allocation failures.
    fn prepare(&mut self, d: &Matrix<f64>) -> Result<()>;

    /// Merge weight λ for joining rows `a < b` (μ = 1 − λ).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invariant`] if the weight comes out
    /// non-finite.
    fn begin_merge(&mut self, d: &Matrix<f64>, a: usize, b: usize) -> Result<f64>;

    /// Auxiliary per-column update for surviving column `i` of the
    /// merge begun with `(a, b)`.
    fn update_column(&mut self, a: usize, b: usize, i: usize);

    /// Drop auxiliary row/column `b` in lockstep with D.
    fn retire(&mut self, b: usize);
}

/// Plain NJ: λ = 0.5, no auxiliary state.
#[derive(Debug, Default, Clone, Copy)]
pub struct NjReduction;

impl Reduction for NjReduction {
    const INCREMENTAL_TOTALS: bool = true;

    fn prepare(&mut self, _d: &Matrix<f64>) -> Result<()> {
        Ok(())
    }

    fn begin_merge(&mut self, _d: &Matrix<f64>, _a: usize, _b: usize) -> Result<f64> {
        Ok(0.5)
    }

    fn update_column(&mut self, _a: usize, _b: usize, _i: usize) {}

    fn retire(&mut self, _b: usize) {}
}

/// Neighbour-joining engine, generic over merge rule and row scanner.
#[derive(Debug, Default)]
pub struct NeighborJoining<R: Reduction, S: MinScan = ScalarScan> {
    pub(crate) core: EngineCore,
    scaled_totals: Vec<f64>,
    pub(crate) reduction: R,
    _scan: PhantomData<S>,
}

impl<R: Reduction, S: MinScan> NeighborJoining<R, S> {
    /// A fresh engine with nothing loaded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: EngineCore::default(),
            scaled_totals: Vec::new(),
            reduction: R::default(),
            _scan: PhantomData,
        }
    }

    /// Refresh `T[r] = U[r] / (n−2)` (zero when n ≤ 2).
    fn refresh_scaled_totals(&mut self) {
        let n = self.core.rank();
        let t_mult = if n <= 2 { 0.0 } else { 1.0 / (n as f64 - 2.0) };
        self.scaled_totals.clear();
        self.scaled_totals
            .extend((0..n).map(|r| self.core.d.row_total(r) * t_mult));
    }

    /// Per-row Q minima, parallel over rows. `T[row]` is subtracted
    /// once per row after the inner scan.
    fn scan_row_minima(&mut self) {
        self.refresh_scaled_totals();
        let n = self.core.rank();
        let d = &self.core.d;
        let tot = &self.scaled_totals;
        let mut minima: Vec<Position> = Vec::with_capacity(n);
        minima.push(Position::unset(0));
        minima.par_extend((1..n).into_par_iter().map(|row| {
            let (col, value) = S::min_adjusted(&d.row(row)[..row], &tot[..row]);
            Position::new(row, col, value - tot[row])
        }));
        self.core.row_minima = minima;
    }

    /// Merge rows `a < b` under the engine's reduction rule.
    pub(crate) fn merge(&mut self, a: usize, b: usize) -> Result<()> {
        let n = self.core.rank();
        let t_mult = if n < 3 { 0.0 } else { 0.5 / (n as f64 - 2.0) };
        let core = &mut self.core;
        let half = 0.5 * core.d.at(b, a);
        let fudge = (core.d.row_total(a) - core.d.row_total(b)) * t_mult;
        let a_len = half + fudge;
        let b_len = half - fudge;
        let lambda = self.reduction.begin_merge(&core.d, a, b)?;
        let mu = 1.0 - lambda;
        let d_corr = -lambda * a_len - mu * b_len;
        for i in 0..n {
            if i == a || i == b {
                continue;
            }
            let d_ai = core.d.at(a, i);
            let d_bi = core.d.at(b, i);
            let d_ci = lambda * d_ai + mu * d_bi + d_corr;
            core.d.set(a, i, d_ci);
            core.d.set(i, a, d_ci);
            core.d.row_totals[i] += d_ci - d_ai - d_bi;
            if R::INCREMENTAL_TOTALS {
                core.d.row_totals[a] += d_ci - d_ai;
            }
            self.reduction.update_column(a, b, i);
        }
        if R::INCREMENTAL_TOTALS {
            core.d.row_totals[a] -= core.d.at(a, b);
        } else {
            // The variance-weighted merge invalidates the delta form
            // for the merged row itself; recompute by summation.
            let mut total = 0.0;
            for i in 0..n {
                if i != a && i != b {
                    total += core.d.at(a, i);
                }
            }
            core.d.row_totals[a] = total;
        }
        core.merge_bookkeeping(a, b, a_len, b_len);
        self.reduction.retire(b);
        Ok(())
    }

    /// Close the final three rows with half-distance sums.
    pub(crate) fn close_triple(&mut self) {
        let core = &mut self.core;
        let h01 = 0.5 * core.d.at(0, 1);
        let h02 = 0.5 * core.d.at(0, 2);
        let h12 = 0.5 * core.d.at(1, 2);
        core.tree.add_terminal(
            core.row_to_cluster[0],
            h01 + h02 - h12,
            core.row_to_cluster[1],
            h01 + h12 - h02,
            core.row_to_cluster[2],
            h02 + h12 - h01,
        );
        core.d.consume();
    }

    /// Shared entry for loading: parse, then let the reduction clone
    /// whatever it tracks.
    fn after_load(&mut self) -> Result<()> {
        self.reduction.prepare(&self.core.d)
    }
}

impl<R: Reduction, S: MinScan> TreeBuilder for NeighborJoining<R, S> {
    fn load_phylip(&mut self, path: &Path) -> Result<()> {
        self.core.load_phylip(path)?;
        self.after_load()
    }

    fn load_matrix(&mut self, names: &[String], flat: &[f64]) -> Result<()> {
        self.core.load_matrix(names, flat)?;
        self.after_load()
    }

    fn construct_tree(&mut self) -> Result<()> {
        if self.core.rank() == 0 {
            return Err(Error::InvalidInput("no distance matrix loaded".into()));
        }
        if self.core.rank() == 2 {
            self.core.close_pair();
            return Ok(());
        }
        while self.core.rank() > 3 {
            self.scan_row_minima();
            let best = self.core.global_minimum()?;
            self.merge(best.column, best.row)?;
        }
        self.close_triple();
        Ok(())
    }

    fn write_newick(&self, path: &Path) -> Result<()> {
        self.core.finished_newick()?;
        self.core.tree.write_newick(path)
    }

    fn newick_string(&self) -> Result<String> {
        self.core.finished_newick()
    }

    fn tree(&self) -> &ClusterTree {
        &self.core.tree
    }
}
