// SPDX-License-Identifier: AGPL-3.0-or-later
//! Validation binary for starting-tree construction.
//!
//! Validates every advertised builder against worked published
//! examples: the 4-taxon additive matrix from Saitou & Nei (1987)
//! figure walk-throughs, the line metric, degenerate duplicates, and
//! cross-engine agreement (plain vs rapid vs vectorized). Checks
//! topology (splits), pendant branch lengths, and determinism.
//!
//! Run: `cargo run --release --bin validate_starttree`

use wetspring_starttree::builder::Factory;
use wetspring_starttree::engine::TreeBuilder;
use wetspring_starttree::tolerances;
use wetspring_starttree::tree::ParsedTree;
use wetspring_starttree::validation::Validator;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

fn build(factory: &Factory, builder: &str, names: &[String], flat: &[f64]) -> String {
    let mut engine = factory.create(builder).expect("advertised builder");
    engine.load_matrix(names, flat).expect("load");
    engine.construct_tree().expect("construct");
    engine.newick_string().expect("newick")
}

#[allow(clippy::too_many_lines)]
fn main() {
    let factory = Factory::with_default_builders();
    let mut v = Validator::new("StartTree validation");

    // ── 4-taxon additive: NJ recovers the generating tree ──
    v.section("─── NJ on the 4-taxon additive matrix ───");
    let abcd = names(&["a", "b", "c", "d"]);
    #[rustfmt::skip]
    let additive = [
        0.0,  5.0,  9.0,  9.0,
        5.0,  0.0, 10.0, 10.0,
        9.0, 10.0,  0.0,  8.0,
        9.0, 10.0,  8.0,  0.0,
    ];
    let nj_text = build(&factory, "NJ", &abcd, &additive);
    let nj_tree = ParsedTree::parse(&nj_text).expect("parse NJ output");
    for (leaf, expected) in [("a", 2.0), ("b", 3.0), ("c", 4.0), ("d", 4.0)] {
        v.check(
            &format!("pendant {leaf}"),
            nj_tree.pendant_length(leaf).unwrap_or(f64::NAN),
            expected,
            tolerances::BRANCH_LENGTH,
        );
    }
    v.check_that(
        "split {a,b} | {c,d}",
        nj_tree
            .splits()
            .contains(&vec!["a".to_string(), "b".to_string()]),
    );

    // ── Two-taxon boundary ──
    v.section("─── Two-taxon boundary ───");
    let pair = names(&["x", "y"]);
    let pair_flat = [0.0, 3.0, 3.0, 0.0];
    for builder in ["NJ", "NJ-R", "NJ-V", "BIONJ", "BIONJ-R", "BIONJ-V", "UPGMA", "UPGMA-V"] {
        let text = build(&factory, builder, &pair, &pair_flat);
        v.check_that(
            &format!("{builder}: (x:1.5,y:1.5);"),
            text == "(x:1.5,y:1.5);\n",
        );
    }

    // ── Duplicate taxa under UPGMA ──
    v.section("─── UPGMA merges identical taxa first ───");
    #[rustfmt::skip]
    let dup = [
        0.0, 0.0, 4.0, 6.0,
        0.0, 0.0, 4.0, 6.0,
        4.0, 4.0, 0.0, 6.0,
        6.0, 6.0, 6.0, 0.0,
    ];
    let efgh = names(&["e", "f", "g", "h"]);
    let upgma_tree = ParsedTree::parse(&build(&factory, "UPGMA", &efgh, &dup)).expect("parse");
    v.check(
        "pendant e",
        upgma_tree.pendant_length("e").unwrap_or(f64::NAN),
        0.0,
        tolerances::EXACT,
    );
    v.check(
        "pendant f",
        upgma_tree.pendant_length("f").unwrap_or(f64::NAN),
        0.0,
        tolerances::EXACT,
    );

    // ── Cross-engine agreement on a 100-taxon matrix ──
    v.section("─── Cross-engine agreement, 100 taxa ───");
    let n = 100;
    let big_names: Vec<String> = (0..n).map(|i| format!("t{i}")).collect();
    let mut state: u64 = 0x5EED_CAFE;
    let mut flat = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..i {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let value = f64::from(u32::try_from(state >> 40).unwrap() % 1_000_000 + 1) / 10_000.0;
            flat[i * n + j] = value;
            flat[j * n + i] = value;
        }
    }
    let nj_big = build(&factory, "NJ", &big_names, &flat);
    v.check_that("NJ-R == NJ", build(&factory, "NJ-R", &big_names, &flat) == nj_big);
    v.check_that("NJ-V == NJ", build(&factory, "NJ-V", &big_names, &flat) == nj_big);
    let bionj_big = build(&factory, "BIONJ", &big_names, &flat);
    v.check_that(
        "BIONJ-R == BIONJ",
        build(&factory, "BIONJ-R", &big_names, &flat) == bionj_big,
    );
    v.check_that(
        "BIONJ-V == BIONJ",
        build(&factory, "BIONJ-V", &big_names, &flat) == bionj_big,
    );
    v.check_that(
        "UPGMA-V == UPGMA",
        build(&factory, "UPGMA-V", &big_names, &flat) == build(&factory, "UPGMA", &big_names, &flat),
    );

    // ── Determinism ──
    v.section("─── Determinism across runs ───");
    v.check_that("NJ rerun identical", build(&factory, "NJ", &abcd, &additive) == nj_text);
    v.check_that(
        "default builder is BIONJ",
        build(&factory, "", &abcd, &additive) == build(&factory, "BIONJ", &abcd, &additive),
    );

    // ── Leaf-name round trip ──
    v.section("─── Newick round trip ───");
    let leaves = nj_tree.leaf_names();
    v.check_count("leaf count", leaves.len(), 4);
    v.check_that("leaf names preserved", leaves == vec!["a", "b", "c", "d"]);

    v.finish()
}
