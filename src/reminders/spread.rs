use std::collections::BTreeSet;

/// Canonical week ordering for the spread, Monday-first ISO numbering.
const CANONICAL_WEEK: [u8; 7] = [1, 2, 3, 4, 5, 6, 7];

/// Distribute a weekly quota of N occurrences evenly across the week.
/// Pure: the same quota always yields the same set. Quotas above 7
/// saturate to the full week; rounding collisions collapse into the set.
pub fn spread(quota: u32) -> BTreeSet<u8> {
    if quota == 0 {
        return BTreeSet::new();
    }

    let step = CANONICAL_WEEK.len() as f64 / quota as f64;
    (0..quota)
        .map(|i| {
            let index = (i as f64 * step).round() as usize % CANONICAL_WEEK.len();
            CANONICAL_WEEK[index]
        })
        .collect()
}
