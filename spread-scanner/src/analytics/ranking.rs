//! Candidate ranking.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::spread_screener::SpreadCandidate;

/// Sort candidates by expected value, best first.
///
/// Equal EVs fall back to ticker, expiration and short strike so the order
/// does not depend on how the scan interleaved its results.
pub fn rank_candidates(candidates: &mut [SpreadCandidate]) {
    candidates.sort_by(compare_candidates);
}

fn compare_candidates(a: &SpreadCandidate, b: &SpreadCandidate) -> Ordering {
    b.expected_value
        .total_cmp(&a.expected_value)
        .then_with(|| a.ticker.cmp(&b.ticker))
        .then_with(|| a.expiration_date.cmp(&b.expiration_date))
        .then_with(|| a.short_strike.cmp(&b.short_strike))
}

/// The `n` best candidates of an already ranked slice.
pub fn top_candidates(candidates: &[SpreadCandidate], n: usize) -> &[SpreadCandidate] {
    &candidates[..n.min(candidates.len())]
}

/// Best `per_date` candidates for each expiration, earliest expiration first.
pub fn best_by_expiration(
    candidates: &[SpreadCandidate],
    per_date: usize,
) -> BTreeMap<NaiveDate, Vec<&SpreadCandidate>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<&SpreadCandidate>> = BTreeMap::new();
    for candidate in candidates {
        grouped
            .entry(candidate.expiration_date)
            .or_default()
            .push(candidate);
    }

    for group in grouped.values_mut() {
        group.sort_by(|a, b| compare_candidates(a, b));
        group.truncate(per_date);
    }

    grouped
}
