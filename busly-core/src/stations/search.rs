//! Typo-tolerant station search.
//!
//! A station matches when some substring of its name or city is within a
//! few edits of the query. Each candidate is scored as
//! `edits / query_len + start_offset / 100`; lower is better, and anything
//! above [`MATCH_THRESHOLD`] is dropped.

use crate::models::Station;

/// Highest score still considered a match.
pub const MATCH_THRESHOLD: f64 = 0.3;

/// Characters of offset that cost as much as one full mismatch.
const OFFSET_SCALE: f64 = 100.0;

/// Stations matching `query`, best first. A blank query matches nothing.
pub fn fuzzy_search<'a>(stations: &'a [Station], query: &str) -> Vec<&'a Station> {
    let pattern: Vec<char> = query.trim().to_lowercase().chars().collect();
    if pattern.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f64, &Station)> = stations
        .iter()
        .filter_map(|station| {
            let score = field_score(&pattern, &station.name).min(field_score(&pattern, &station.city));
            (score <= MATCH_THRESHOLD).then_some((score, station))
        })
        .collect();

    // Stable, so equal scores keep catalogue order.
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().map(|(_, station)| station).collect()
}

fn field_score(pattern: &[char], field: &str) -> f64 {
    let text: Vec<char> = field.to_lowercase().chars().collect();
    let mut best = f64::INFINITY;

    for start in 0..=text.len() {
        let offset_cost = start as f64 / OFFSET_SCALE;
        if offset_cost >= best {
            break;
        }
        let edits = prefix_distance(pattern, &text[start..]);
        best = best.min(edits as f64 / pattern.len() as f64 + offset_cost);
    }
    best
}

/// Smallest edit distance between `pattern` and any prefix of `text`.
fn prefix_distance(pattern: &[char], text: &[char]) -> usize {
    // prev[i]: distance between pattern[..i] and the text consumed so far.
    let mut prev: Vec<usize> = (0..=pattern.len()).collect();
    let mut best = prev[pattern.len()];

    for &c in text {
        let mut cur = Vec::with_capacity(prev.len());
        cur.push(prev[0] + 1);
        for i in 1..=pattern.len() {
            let substitution = prev[i - 1] + usize::from(pattern[i - 1] != c);
            cur.push(substitution.min(prev[i] + 1).min(cur[i - 1] + 1));
        }
        best = best.min(cur[pattern.len()]);
        if best == 0 {
            break;
        }
        prev = cur;
    }
    best
}
