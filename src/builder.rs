// SPDX-License-Identifier: AGPL-3.0-or-later
//! Named tree-builder factory.
//!
//! Maps the builder names accepted on the outside ("NJ", "BIONJ-R",
//! "UPGMA-V", …) to engine constructors, with citations in the
//! descriptions. The empty name selects the default (BIONJ).

use std::collections::BTreeMap;

use crate::bionj::BionjReduction;
use crate::engine::{ScalarScan, SimdScan, TreeBuilder};
use crate::error::{Error, Result};
use crate::nj::{NeighborJoining, NjReduction};
use crate::rapid::Bounding;
use crate::upgma::Upgma;

/// Plain neighbour joining.
pub type Nj = NeighborJoining<NjReduction, ScalarScan>;
/// Branch-and-bound neighbour joining.
pub type RapidNj = Bounding<NjReduction>;
/// Lane-parallel neighbour joining.
pub type VectorizedNj = NeighborJoining<NjReduction, SimdScan>;
/// BIONJ.
pub type Bionj = NeighborJoining<BionjReduction, ScalarScan>;
/// Branch-and-bound BIONJ.
pub type RapidBionj = Bounding<BionjReduction>;
/// Lane-parallel BIONJ.
pub type VectorizedBionj = NeighborJoining<BionjReduction, SimdScan>;
/// Lane-parallel UPGMA.
pub type VectorizedUpgma = Upgma<SimdScan>;

struct Entry {
    description: &'static str,
    make: fn() -> Box<dyn TreeBuilder>,
}

/// Registry of advertised tree builders.
pub struct Factory {
    builders: BTreeMap<&'static str, Entry>,
}

impl Factory {
    /// The standard registry: NJ, BIONJ and UPGMA, each with its
    /// branch-and-bound (`-R`) and lane-parallel (`-V`) variants
    /// where they exist.
    #[must_use]
    pub fn with_default_builders() -> Self {
        let mut factory = Self {
            builders: BTreeMap::new(),
        };
        factory.advertise(
            "NJ",
            "Neighbour Joining (Saitou, Nei [1987])",
            || Box::new(Nj::new()),
        );
        factory.advertise(
            "NJ-R",
            "Rapid Neighbour Joining (Simonsen, Mailund, Pedersen [2011])",
            || Box::new(RapidNj::new()),
        );
        factory.advertise(
            "NJ-V",
            "Vectorized Neighbour Joining (Saitou, Nei [1987])",
            || Box::new(VectorizedNj::new()),
        );
        factory.advertise(
            "BIONJ",
            "BIONJ (Gascuel [1997])",
            || Box::new(Bionj::new()),
        );
        factory.advertise(
            "BIONJ-R",
            "Rapid BIONJ (Gascuel [1997], Simonsen, Mailund, Pedersen [2011])",
            || Box::new(RapidBionj::new()),
        );
        factory.advertise(
            "BIONJ-V",
            "Vectorized BIONJ (Gascuel [1997])",
            || Box::new(VectorizedBionj::new()),
        );
        factory.advertise(
            "UPGMA",
            "UPGMA (Sokal, Michener [1958])",
            || Box::new(Upgma::<ScalarScan>::new()),
        );
        factory.advertise(
            "UPGMA-V",
            "Vectorized UPGMA (Sokal, Michener [1958])",
            || Box::new(VectorizedUpgma::new()),
        );
        factory
    }

    /// Register (or replace) a named builder.
    pub fn advertise(
        &mut self,
        name: &'static str,
        description: &'static str,
        make: fn() -> Box<dyn TreeBuilder>,
    ) {
        self.builders.insert(name, Entry { description, make });
    }

    /// Construct the named engine; the empty name selects BIONJ.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownBuilder`] for unrecognised names.
    pub fn create(&self, name: &str) -> Result<Box<dyn TreeBuilder>> {
        let effective = if name.is_empty() { "BIONJ" } else { name };
        self.builders
            .get(effective)
            .map(|entry| (entry.make)())
            .ok_or_else(|| Error::UnknownBuilder(name.to_string()))
    }

    /// Advertised names in lexical order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.builders.keys().copied().collect()
    }

    /// Description of the named builder, if advertised.
    #[must_use]
    pub fn description(&self, name: &str) -> Option<&'static str> {
        let effective = if name.is_empty() { "BIONJ" } else { name };
        self.builders.get(effective).map(|e| e.description)
    }
}

impl Default for Factory {
    fn default() -> Self {
        Self::with_default_builders()
    }
}
