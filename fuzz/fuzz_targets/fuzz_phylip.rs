// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz the PHYLIP distance-matrix parser: arbitrary bytes must
//! produce `Ok` or a structured `Error`, never a panic, and accepted
//! matrices must come back symmetric.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wetspring_starttree::phylip;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok((names, matrix)) = phylip::parse(text) {
        let n = matrix.rank();
        assert_eq!(names.len(), n);
        for r in 0..n {
            for c in 0..r {
                let lower = matrix.at(r, c);
                let upper = matrix.at(c, r);
                assert!(
                    lower == upper || (lower.is_nan() && upper.is_nan()),
                    "asymmetry survived load at ({r},{c})"
                );
            }
        }
    }
});
