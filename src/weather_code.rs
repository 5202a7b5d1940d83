use std::collections::BTreeMap;

/// Most frequent weather code and its count. Ties go to the smallest code.
/// An empty week yields `(0, 0)`, meaning no dominant code is available.
pub fn resolve_mode(codes: &[i32]) -> (i32, usize) {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for code in codes {
        *counts.entry(*code).or_insert(0) += 1;
    }

    // BTreeMap iterates in ascending code order, so a strict `>` keeps the
    // smallest code among equal counts.
    let mut best = (0, 0);
    for (code, count) in counts {
        if count > best.1 {
            best = (code, count);
        }
    }
    best
}
