// SPDX-License-Identifier: AGPL-3.0-or-later
//! UPGMA agglomeration (Sokal & Michener 1958).
//!
//! Repeatedly merges the closest pair of clusters, replacing the
//! pair's rows with their exterior-count-weighted mean. The row scan
//! is the plain distance minimum — no row-total adjustment — which is
//! what separates this engine from neighbour joining.
//!
//! # References
//!
//! - Sokal & Michener 1958, *Univ Kansas Sci Bull* 38:1409-1438
//! - Felsenstein 2004, *Inferring Phylogenies* (Sinauer), ch. 11

use std::marker::PhantomData;
use std::path::Path;

use rayon::prelude::*;

use crate::engine::{EngineCore, MinScan, Position, ScalarScan, TreeBuilder};
use crate::error::{Error, Result};
use crate::tree::ClusterTree;

/// UPGMA engine, generic over the row-minimum scanner.
#[derive(Debug, Default)]
pub struct Upgma<S: MinScan = ScalarScan> {
    pub(crate) core: EngineCore,
    _scan: PhantomData<S>,
}

impl<S: MinScan> Upgma<S> {
    /// A fresh engine with nothing loaded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: EngineCore::default(),
            _scan: PhantomData,
        }
    }

    /// Per-row distance minima over the lower triangle, parallel over
    /// rows. Row 0 has no columns below the diagonal and reports the
    /// sentinel.
    fn scan_row_minima(&mut self) {
        let n = self.core.rank();
        let d = &self.core.d;
        let mut minima: Vec<Position> = Vec::with_capacity(n);
        minima.push(Position::unset(0));
        minima.par_extend((1..n).into_par_iter().map(|row| {
            let (col, value) = S::min_in_row(&d.row(row)[..row]);
            Position::new(row, col, value)
        }));
        self.core.row_minima = minima;
    }

    /// Merge rows `a < b`: pendant lengths are half the pair distance,
    /// surviving distances are the exterior-count-weighted mean.
    fn join(&mut self, a: usize, b: usize) {
        let core = &mut self.core;
        let a_len = 0.5 * core.d.at(b, a);
        let b_len = a_len;
        let a_count = core.tree.exterior_count(core.row_to_cluster[a]) as f64;
        let b_count = core.tree.exterior_count(core.row_to_cluster[b]) as f64;
        let lambda = a_count / (a_count + b_count);
        let mu = 1.0 - lambda;
        for i in 0..core.rank() {
            if i == a || i == b {
                continue;
            }
            let merged = lambda * core.d.at(a, i) + mu * core.d.at(b, i);
            core.d.set(a, i, merged);
            core.d.set(i, a, merged);
        }
        core.merge_bookkeeping(a, b, a_len, b_len);
    }

    /// Close the final three rows with count-weighted half distances.
    ///
    /// Felsenstein (2004) ch. 11 only derives rooted UPGMA; the
    /// unrooted ternary form here is unverified, and shares the
    /// emitter with the neighbour-joining engines.
    fn close_triple(&mut self) {
        let core = &mut self.core;
        let mut weights = [0.0_f64; 3];
        for (i, w) in weights.iter_mut().enumerate() {
            *w = core.tree.exterior_count(core.row_to_cluster[i]) as f64;
        }
        let denom: f64 = 2.0 * weights.iter().sum::<f64>();
        for w in &mut weights {
            *w /= denom;
        }
        let d01 = core.d.at(0, 1);
        let d02 = core.d.at(0, 2);
        let d12 = core.d.at(1, 2);
        core.tree.add_terminal(
            core.row_to_cluster[0],
            weights[1] * d01 + weights[2] * d02,
            core.row_to_cluster[1],
            weights[0] * d01 + weights[2] * d12,
            core.row_to_cluster[2],
            weights[0] * d02 + weights[1] * d12,
        );
        core.d.consume();
    }
}

impl<S: MinScan> TreeBuilder for Upgma<S> {
    fn load_phylip(&mut self, path: &Path) -> Result<()> {
        self.core.load_phylip(path)
    }

    fn load_matrix(&mut self, names: &[String], flat: &[f64]) -> Result<()> {
        self.core.load_matrix(names, flat)
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
            self.join(best.column, best.row);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tolerances;
    use crate::tree::ParsedTree;

    fn build(names: &[&str], flat: &[f64]) -> Upgma {
        let names: Vec<String> = names.iter().map(|s| (*s).to_string()).collect();
        let mut engine = Upgma::new();
        engine.load_matrix(&names, flat).unwrap();
        engine.construct_tree().unwrap();
        engine
    }

    // ── Boundary sizes ───────────────────────────────────────────

    #[test]
    fn two_taxa_split_the_distance() {
        let engine = build(&["a", "b"], &[0.0, 3.0, 3.0, 0.0]);
        assert_eq!(engine.newick_string().unwrap(), "(a:1.5,b:1.5);\n");
    }

    #[test]
    fn construct_before_load_is_error() {
        let mut engine: Upgma = Upgma::new();
        assert!(matches!(
            engine.construct_tree(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn newick_before_construct_is_error() {
        let mut engine: Upgma = Upgma::new();
        let names = vec!["a".to_string(), "b".to_string()];
        engine.load_matrix(&names, &[0.0, 1.0, 1.0, 0.0]).unwrap();
        assert!(engine.newick_string().is_err());
    }

    // ── Merge semantics ──────────────────────────────────────────

    #[test]
    fn identical_taxa_merge_first_with_zero_lengths() {
        // e and f are identical (distance 0); they must join first,
        // both pendant lengths zero.
        #[rustfmt::skip]
        let flat = [
            0.0, 0.0, 4.0, 6.0,
            0.0, 0.0, 4.0, 6.0,
            4.0, 4.0, 0.0, 6.0,
            6.0, 6.0, 6.0, 0.0,
        ];
        let engine = build(&["e", "f", "g", "h"], &flat);
        let text = engine.newick_string().unwrap();
        let parsed = ParsedTree::parse(&text).unwrap();
        assert!(parsed.pendant_length("e").unwrap().abs() <= tolerances::EXACT);
        assert!(parsed.pendant_length("f").unwrap().abs() <= tolerances::EXACT);
        let splits = parsed.splits();
        assert!(splits.contains(&vec!["e".to_string(), "f".to_string()]));
    }

    #[test]
    fn ultrametric_line_metric_topology() {
        // d(i,j) = |i-j| over five taxa.
        let n = 5;
        let names: Vec<&str> = vec!["t0", "t1", "t2", "t3", "t4"];
        let mut flat = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                flat[i * n + j] = (i as f64 - j as f64).abs();
            }
        }
        let engine = build(&names, &flat);
        let parsed = ParsedTree::parse(&engine.newick_string().unwrap()).unwrap();
        let splits = parsed.splits();
        assert!(splits.contains(&vec!["t0".to_string(), "t1".to_string()]));
        assert!(splits.contains(&vec!["t3".to_string(), "t4".to_string()]));
        // First two merges are distance-1 pairs: pendants are 0.5.
        for leaf in ["t0", "t1", "t3", "t4"] {
            assert!(
                (parsed.pendant_length(leaf).unwrap() - 0.5).abs() <= tolerances::ANALYTICAL_F64
            );
        }
    }

    // ── Determinism ──────────────────────────────────────────────

    #[test]
    fn deterministic_across_runs() {
        #[rustfmt::skip]
        let flat = [
            0.0, 2.0, 5.0, 9.0,
            2.0, 0.0, 4.0, 8.0,
            5.0, 4.0, 0.0, 7.0,
            9.0, 8.0, 7.0, 0.0,
        ];
        let first = build(&["a", "b", "c", "d"], &flat)
            .newick_string()
            .unwrap();
        let second = build(&["a", "b", "c", "d"], &flat)
            .newick_string()
            .unwrap();
        assert_eq!(first, second);
    }
}
