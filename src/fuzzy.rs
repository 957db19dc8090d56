//! Free-text ranking of every leaf in the index.
//!
//! Scoring is a pure function of the snapshot and the query: identical
//! inputs always produce the identical ordering.

use std::cmp::Ordering;

use crate::index::IndexEntry;

const EXACT_POINTS: f64 = 2.0;
const PREFIX_POINTS: f64 = 1.0;
const SUBSTRING_POINTS: f64 = 0.5;
const ORDER_BONUS: f64 = 1.0;

/// A ranked leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Leaf path as the user types it (`git commit`).
    pub command: String,
    pub points: f64,
}

/// Rank every leaf against `query`, best first. Leaves scoring zero are
/// left out, so an empty query returns nothing.
pub fn search(index: &IndexEntry, query: &str) -> Vec<Match> {
    let query: Vec<String> =
        query.split_whitespace().map(str::to_lowercase).collect();
    if query.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<(usize, Match)> = index
        .leaves()
        .into_iter()
        .filter_map(|leaf| {
            let tokens: Vec<String> =
                leaf.segments().iter().map(|s| s.to_lowercase()).collect();
            let points = score(&query, &tokens);
            (points > 0.0).then(|| {
                (tokens.len(), Match {
                    command: leaf.command(),
                    points,
                })
            })
        })
        .collect();

    matches.sort_by(|(a_len, a), (b_len, b)| {
        b.points
            .partial_cmp(&a.points)
            .unwrap_or(Ordering::Equal)
            .then(a_len.cmp(b_len))
            .then_with(|| a.command.len().cmp(&b.command.len()))
            .then_with(|| a.command.cmp(&b.command))
    });

    tracing::debug!(results = matches.len(), "fuzzy search");
    matches.into_iter().map(|(_, m)| m).collect()
}

/// Score one candidate's lowercase tokens against lowercase query tokens.
fn score(query: &[String], candidate: &[String]) -> f64 {
    if candidate.is_empty() {
        return 0.0;
    }

    let mut raw = 0.0;
    let mut positions = Vec::with_capacity(query.len());
    let mut covered = vec![false; candidate.len()];

    for q in query {
        let last = positions.last().copied();
        let best = candidate
            .iter()
            .enumerate()
            .map(|(pos, token)| {
                (pos, token_points(q, token), placement(pos, last, &covered))
            })
            .filter(|(_, points, _)| *points > 0.0)
            // Among equal points, prefer a fresh position after the previous
            // match, then any fresh position, then the first one.
            .fold(
                None,
                |best: Option<(usize, f64, u8)>, (pos, points, rank)| match best {
                    Some((_, best_points, best_rank))
                        if best_points > points
                            || (best_points == points && best_rank >= rank) =>
                    {
                        best
                    }
                    _ => Some((pos, points, rank)),
                },
            );

        if let Some((pos, points, _)) = best {
            raw += points;
            positions.push(pos);
            covered[pos] = true;
        }
    }

    if raw == 0.0 {
        return 0.0;
    }

    if positions.len() >= 2 && positions.windows(2).all(|w| w[0] < w[1]) {
        raw += ORDER_BONUS;
    }

    let covered = covered.iter().filter(|c| **c).count() as f64;
    let coverage = covered / candidate.len() as f64;
    raw * (0.5 + 0.5 * coverage)
}

fn placement(pos: usize, last: Option<usize>, covered: &[bool]) -> u8 {
    match (covered[pos], last) {
        (true, _) => 0,
        (false, Some(last)) if pos < last => 1,
        (false, _) => 2,
    }
}

fn token_points(query: &str, token: &str) -> f64 {
    if token == query {
        EXACT_POINTS
    } else if token.starts_with(query) {
        PREFIX_POINTS
    } else if token.contains(query) {
        SUBSTRING_POINTS
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc_path::DocPath;

    fn tree(items: &[&str]) -> IndexEntry {
        let paths: Vec<DocPath> =
            items.iter().map(|p| p.parse().unwrap()).collect();
        IndexEntry::from_paths(&paths)
    }

    fn commands(matches: &[Match]) -> Vec<&str> {
        matches.iter().map(|m| m.command.as_str()).collect()
    }

    #[test]
    fn empty_query_returns_nothing() {
        let index = tree(&["git/commit", "git/push"]);
        assert!(search(&index, "").is_empty());
        assert!(search(&index, "   ").is_empty());
    }

    #[test]
    fn unrelated_query_returns_nothing() {
        let index = tree(&["git/commit", "git/push"]);
        assert!(search(&index, "kubernetes").is_empty());
    }

    #[test]
    fn single_token_finds_leaf() {
        let index = tree(&["git/commit", "git/commit.detail", "git/push"]);
        let results = search(&index, "commit");
        assert_eq!(commands(&results), vec!["git commit"]);
        assert!(results[0].points > 0.0);
    }

    #[test]
    fn exact_path_outranks_partial_matches() {
        let index = tree(&[
            "git",
            "git/commit",
            "git/commit/amend",
            "git/push",
            "svn/commit",
        ]);
        let results = search(&index, "git commit");
        assert_eq!(results[0].command, "git commit");
        assert!(results[0].points > results[1].points);
    }

    #[test]
    fn repeated_segments_match_the_full_path() {
        let index = tree(&["go", "go/go"]);
        let results = search(&index, "go go");
        assert_eq!(commands(&results), vec!["go go", "go"]);
        assert!(results[0].points > results[1].points);
    }

    #[test]
    fn order_preservation_is_rewarded() {
        let index = tree(&["remote/add", "add/remote"]);
        let results = search(&index, "remote add");
        assert_eq!(commands(&results), vec!["remote add", "add remote"]);
        assert!(results[0].points > results[1].points);
    }

    #[test]
    fn ties_prefer_shorter_paths() {
        let index = tree(&["docker/run/detached", "docker/run"]);
        let results = search(&index, "run");
        assert_eq!(results[0].command, "docker run");
    }

    #[test]
    fn prefix_beats_substring() {
        let index = tree(&["tools/chase", "tools/hashsum"]);
        let results = search(&index, "has");
        assert_eq!(results[0].command, "tools hashsum");
    }

    #[test]
    fn results_are_sorted_and_deterministic() {
        let index = tree(&[
            "git/commit",
            "git/checkout",
            "git/cherry-pick",
            "hg/commit",
            "svn/commit",
            "git/config",
        ]);
        let first = search(&index, "git c");
        let second = search(&index, "git c");
        assert_eq!(first, second);
        for window in first.windows(2) {
            assert!(window[0].points >= window[1].points);
        }
    }

    #[test]
    fn query_is_case_insensitive() {
        let index = tree(&["Docker/Run"]);
        assert_eq!(commands(&search(&index, "docker RUN")), vec!["Docker Run"]);
    }
}
