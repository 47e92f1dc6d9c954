// SPDX-License-Identifier: AGPL-3.0-or-later
//! BIONJ merge rule (Gascuel 1997).
//!
//! BIONJ is neighbour joining with a second matrix V of estimated
//! variances, cloned from D at load and reduced in lockstep. The merge
//! weight λ is chosen to minimise the variance of the merged row
//! (Gascuel's reduction 10) instead of the fixed 0.5, which measurably
//! improves trees from noisy distance estimates.
//!
//! # References
//!
//! - Gascuel 1997, *Mol Biol Evol* 14:685-695 (BIONJ)
//! - Gascuel & Cong 2009 web distribution (reference C sources)

use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::nj::Reduction;

/// Variance-weighted merge rule: the V matrix plus the per-merge
/// weights frozen by [`Reduction::begin_merge`].
#[derive(Debug, Default)]
pub struct BionjReduction {
    variance: Matrix<f64>,
    lambda: f64,
    mu: f64,
    v_corr: f64,
}

impl BionjReduction {
    /// λ for merging rows `a < b`, per Gascuel's estimator: 0.5 plus
    /// the normalized sum of variance differences, clamped to [0, 1].
    /// `Vab == 0` (identical rows) short-circuits to 0.5.
    fn choose_lambda(&self, a: usize, b: usize, v_ab: f64) -> Result<f64> {
        if v_ab == 0.0 {
            return Ok(0.5);
        }
        let n = self.variance.rank();
        let row_a = self.variance.row(a);
        let row_b = self.variance.row(b);
        let mut sum = 0.0;
        for i in 0..n {
            if i != a && i != b {
                sum += row_b[i] - row_a[i];
            }
        }
        let lambda = 0.5 + sum / (2.0 * (n as f64 - 2.0) * v_ab);
        if !lambda.is_finite() {
            return Err(Error::Invariant(format!(
                "variance-weighted merge weight is not finite (Vab = {v_ab})"
            )));
        }
        Ok(lambda.clamp(0.0, 1.0))
    }
}

impl Reduction for BionjReduction {
    const INCREMENTAL_TOTALS: bool = false;

    fn prepare(&mut self, d: &Matrix<f64>) -> Result<()> {
        self.variance = d.clone();
        Ok(())
    }

    fn begin_merge(&mut self, _d: &Matrix<f64>, a: usize, b: usize) -> Result<f64> {
        let v_ab = self.variance.at(b, a);
        let lambda = self.choose_lambda(a, b, v_ab)?;
        self.lambda = lambda;
        self.mu = 1.0 - lambda;
        self.v_corr = -lambda * self.mu * v_ab;
        Ok(lambda)
    }

    fn update_column(&mut self, a: usize, b: usize, i: usize) {
        let v_ci =
            self.lambda * self.variance.at(a, i) + self.mu * self.variance.at(b, i) + self.v_corr;
        self.variance.set(a, i, v_ci);
        self.variance.set(i, a, v_ci);
    }

    fn retire(&mut self, b: usize) {
        self.variance.remove_row_and_column(b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ScalarScan, TreeBuilder};
    use crate::nj::NeighborJoining;
    use crate::tolerances;
    use crate::tree::ParsedTree;

    type Bionj = NeighborJoining<BionjReduction, ScalarScan>;

    fn reduction_for(flat: &[f64], n: usize) -> BionjReduction {
        let mut d = Matrix::with_rank(n).unwrap();
        for r in 0..n {
            d.row_mut(r)[..n].copy_from_slice(&flat[r * n..(r + 1) * n]);
        }
        let mut reduction = BionjReduction::default();
        reduction.prepare(&d).unwrap();
        reduction
    }

    // ── λ selection ──────────────────────────────────────────────

    #[test]
    fn lambda_is_half_when_pair_variance_is_zero() {
        let flat = [
            0.0, 0.0, 2.0, //
            0.0, 0.0, 2.0, //
            2.0, 2.0, 0.0,
        ];
        let reduction = reduction_for(&flat, 3);
        assert!((reduction.choose_lambda(0, 1, 0.0).unwrap() - 0.5).abs() <= tolerances::EXACT);
    }

    #[test]
    fn lambda_is_half_when_variance_differences_cancel() {
        // V[b][i] == V[a][i] for every other i → the sum vanishes.
        #[rustfmt::skip]
        let flat = [
            0.0, 3.0, 7.0, 9.0,
            3.0, 0.0, 7.0, 9.0,
            7.0, 7.0, 0.0, 4.0,
            9.0, 9.0, 4.0, 0.0,
        ];
        let reduction = reduction_for(&flat, 4);
        let lambda = reduction.choose_lambda(0, 1, 3.0).unwrap();
        assert!((lambda - 0.5).abs() <= tolerances::ANALYTICAL_F64);
    }

    #[test]
    fn lambda_is_clamped_to_unit_interval() {
        // Strongly asymmetric variances push the raw estimator far
        // outside [0, 1].
        #[rustfmt::skip]
        let flat = [
            0.0,  0.001, 1.0,   9.0,
            0.001, 0.0,  90.0, 200.0,
            1.0,  90.0,  0.0,   4.0,
            9.0, 200.0,  4.0,   0.0,
        ];
        let reduction = reduction_for(&flat, 4);
        let lambda = reduction.choose_lambda(0, 1, 0.001).unwrap();
        assert!((0.0..=1.0).contains(&lambda));
    }

    // ── Engine behaviour ─────────────────────────────────────────

    #[test]
    fn first_merge_lambda_in_range_for_worked_matrix() {
        // ab=3, ac=7, ad=9, bc=6, bd=8, cd=4.
        #[rustfmt::skip]
        let flat = [
            0.0, 3.0, 7.0, 9.0,
            3.0, 0.0, 6.0, 8.0,
            7.0, 6.0, 0.0, 4.0,
            9.0, 8.0, 4.0, 0.0,
        ];
        let reduction = reduction_for(&flat, 4);
        let lambda = reduction.choose_lambda(0, 1, 3.0).unwrap();
        assert!((0.0..=1.0).contains(&lambda), "λ = {lambda}");
    }

    #[test]
    fn variance_matrix_shrinks_with_distance_matrix() {
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| (*s).to_string()).collect();
        #[rustfmt::skip]
        let flat = [
            0.0, 3.0, 7.0, 9.0,
            3.0, 0.0, 6.0, 8.0,
            7.0, 6.0, 0.0, 4.0,
            9.0, 8.0, 4.0, 0.0,
        ];
        let mut engine = Bionj::new();
        engine.load_matrix(&names, &flat).unwrap();
        engine.construct_tree().unwrap();
        // One 4-taxon merge retires one variance row.
        assert_eq!(engine.reduction.variance.rank(), 3);
    }

    #[test]
    fn additive_matrix_matches_plain_nj() {
        // On clean additive input the variance weighting changes λ
        // but not the recovered tree.
        #[rustfmt::skip]
        let flat = [
            0.0,  5.0,  9.0,  9.0,
            5.0,  0.0, 10.0, 10.0,
            9.0, 10.0,  0.0,  8.0,
            9.0, 10.0,  8.0,  0.0,
        ];
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| (*s).to_string()).collect();
        let mut engine = Bionj::new();
        engine.load_matrix(&names, &flat).unwrap();
        engine.construct_tree().unwrap();
        let parsed = ParsedTree::parse(&engine.newick_string().unwrap()).unwrap();
        for (leaf, len) in [("a", 2.0), ("b", 3.0), ("c", 4.0), ("d", 4.0)] {
            assert!(
                (parsed.pendant_length(leaf).unwrap() - len).abs() <= tolerances::BRANCH_LENGTH,
                "pendant {leaf}"
            );
        }
    }
}
