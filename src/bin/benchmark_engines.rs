// SPDX-License-Identifier: AGPL-3.0-or-later
//! Benchmark: starting-tree engines across matrix sizes.
//!
//! Measures wall-clock construction time for every advertised builder
//! on synthetic symmetric matrices. The plain engines are O(n³) in
//! the scan; the branch-and-bound variants prune most of each row
//! once a good candidate is known, and the vectorized variants divide
//! the scan by the lane width. Emits a human-readable table.
//!
//! Run: `cargo run --release --bin benchmark_engines [max_n]`

use std::time::Instant;

use wetspring_starttree::builder::Factory;
use wetspring_starttree::engine::TreeBuilder;

fn pseudo_matrix(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    let mut flat = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..i {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let value = f64::from(u32::try_from(state >> 40).unwrap() % 1_000_000 + 1) / 10_000.0;
            flat[i * n + j] = value;
            flat[j * n + i] = value;
        }
    }
    flat
}

fn main() {
    let max_n: usize = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(1000);
    let sizes: Vec<usize> = [100, 250, 500, 1000, 2000, 4000]
        .into_iter()
        .filter(|&n| n <= max_n)
        .collect();
    let factory = Factory::with_default_builders();

    println!("┌──────────────────────────────────────────────────────────┐");
    println!("│  StartTree engine benchmark (wall-clock, release build)  │");
    println!("└──────────────────────────────────────────────────────────┘");
    println!();
    println!("{:<10} {:>8} {:>14} {:>16}", "builder", "n", "seconds", "vs NJ same n");

    for &n in &sizes {
        let names: Vec<String> = (0..n).map(|i| format!("t{i}")).collect();
        let flat = pseudo_matrix(n, 0xB16_B00C + n as u64);
        let mut nj_seconds = None;
        for builder in factory.names() {
            let mut engine = factory.create(builder).expect("advertised builder");
            engine.load_matrix(&names, &flat).expect("load");
            let start = Instant::now();
            engine.construct_tree().expect("construct");
            let seconds = start.elapsed().as_secs_f64();
            if builder == "NJ" {
                nj_seconds = Some(seconds);
            }
            let ratio = nj_seconds
                .map_or_else(String::new, |base| format!("{:>15.2}x", base / seconds));
            println!("{builder:<10} {n:>8} {seconds:>14.4} {ratio:>16}");
        }
        println!();
    }
}
