// SPDX-License-Identifier: AGPL-3.0-or-later
#![warn(missing_docs, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::similar_names
)]
//! wetSpring `StartTree` — distance-matrix starting trees for
//! phylogenetic pipelines.
//!
//! Agglomerative construction of rooted or unrooted binary trees from
//! a symmetric pairwise distance matrix over N taxa, emitted as
//! Newick text. One engine family, three criteria, two accelerations:
//!
//! - [`upgma`] — UPGMA (Sokal & Michener 1958), plain distance minima
//! - [`nj`] — Neighbour Joining (Saitou & Nei 1987), Q-criterion
//! - [`bionj`] — BIONJ (Gascuel 1997), variance-weighted merges
//! - [`rapid`] — branch-and-bound row pruning over sorted rows
//!   (Simonsen, Mailund & Pedersen 2011), wrapping NJ or BIONJ
//! - [`simd`] — lane-parallel row scans behind the same engines
//!
//! Builders are advertised by name through [`builder::Factory`]
//! ("NJ", "NJ-R", "NJ-V", "BIONJ", "BIONJ-R", "BIONJ-V", "UPGMA",
//! "UPGMA-V"; the empty name selects BIONJ):
//!
//! ```
//! use wetspring_starttree::builder::Factory;
//! use wetspring_starttree::engine::TreeBuilder;
//!
//! let factory = Factory::with_default_builders();
//! let mut engine = factory.create("NJ")?;
//! let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
//! let flat = [0.0, 0.2, 0.4, 0.2, 0.0, 0.4, 0.4, 0.4, 0.0];
//! engine.load_matrix(&names, &flat)?;
//! engine.construct_tree()?;
//! assert!(engine.newick_string()?.ends_with(";\n"));
//! # Ok::<(), wetspring_starttree::error::Error>(())
//! ```
//!
//! Input is a PHYLIP square distance matrix (plain or gzipped) or an
//! in-memory `(names, flat)` pair; see [`phylip`]. Row scans, row
//! totals and the bulk row sort are data-parallel over rows (rayon);
//! everything else is sequential, and output is a deterministic
//! function of the input matrix.

pub mod bionj;
pub mod builder;
pub mod engine;
pub mod error;
pub mod heap;
pub mod matrix;
pub mod nj;
pub mod phylip;
pub mod rapid;
pub mod simd;
pub mod tolerances;
pub mod tree;
pub mod upgma;
pub mod validation;
