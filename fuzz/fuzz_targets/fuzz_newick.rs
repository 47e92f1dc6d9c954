// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz the Newick re-reader: arbitrary bytes must produce `Ok` or a
//! structured `Error`, never a panic or runaway recursion.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wetspring_starttree::tree::ParsedTree;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(parsed) = ParsedTree::parse(text) {
        // Leaf extraction and split enumeration must hold up on
        // anything the parser accepted.
        let _ = parsed.leaf_names();
        let _ = parsed.splits();
    }
});
