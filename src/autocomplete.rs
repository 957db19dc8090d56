//! Completion of the last token of a partial command phrase.
//!
//! The engine only walks the tree. Whether a child name completes the
//! typed token is decided by a [`Matcher`], so match policies can be
//! swapped without touching traversal.

use std::collections::BTreeSet;

use crate::index::IndexEntry;

/// Decides whether `candidate` completes the typed `prefix`.
pub trait Matcher {
    fn matches(&self, candidate: &str, prefix: &str) -> bool;
}

/// Candidate starts with the typed text, ignoring case.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixMatcher;

impl Matcher for PrefixMatcher {
    fn matches(&self, candidate: &str, prefix: &str) -> bool {
        candidate.to_lowercase().starts_with(&prefix.to_lowercase())
    }
}

/// Candidate contains the typed text anywhere, ignoring case.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl Matcher for SubstringMatcher {
    fn matches(&self, candidate: &str, prefix: &str) -> bool {
        candidate.to_lowercase().contains(&prefix.to_lowercase())
    }
}

/// Every typed character appears in the candidate in order (`gco` matches
/// `git-commit`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsequenceMatcher;

impl Matcher for SubsequenceMatcher {
    fn matches(&self, candidate: &str, prefix: &str) -> bool {
        let mut chars = candidate.chars().flat_map(char::to_lowercase);
        prefix
            .chars()
            .flat_map(char::to_lowercase)
            .all(|wanted| chars.any(|c| c == wanted))
    }
}

/// Complete the trailing token of `partial` against the children of the
/// node its leading tokens reach.
///
/// Iterations 0 and 1 return the whole candidate set. Later iterations
/// rotate it left by `iteration - 1` so a shell pressing tab repeatedly
/// cycles through the candidates. Results are de-duplicated but not sorted
/// for display.
///
/// # Examples
///
/// ```
/// use cheatdex::{
///     autocomplete::{PrefixMatcher, autocomplete},
///     doc_path::DocPath,
///     index::IndexEntry,
/// };
///
/// let paths: Vec<DocPath> = ["git/commit", "git/config", "git/push"]
///     .iter()
///     .map(|p| p.parse().unwrap())
///     .collect();
/// let tree = IndexEntry::from_paths(&paths);
///
/// let found = autocomplete("git co", 0, &tree, &PrefixMatcher);
/// assert_eq!(found, vec!["commit", "config"]);
/// ```
pub fn autocomplete(
    partial: &str,
    iteration: usize,
    index: &IndexEntry,
    matcher: &dyn Matcher,
) -> Vec<String> {
    let (prefix, token) = match partial.rfind(char::is_whitespace) {
        Some(at) => {
            let (head, tail) = partial.split_at(at);
            (head, tail.trim_start())
        }
        None => ("", partial),
    };

    let segments: Vec<&str> = prefix.split_whitespace().collect();
    let Some(node) = index.descend(&segments) else {
        tracing::debug!(prefix, "completion prefix does not resolve");
        return Vec::new();
    };

    let mut seen = BTreeSet::new();
    let mut candidates: Vec<String> = node
        .children
        .keys()
        .filter(|name| matcher.matches(name, token))
        .filter(|name| seen.insert(name.to_lowercase()))
        .cloned()
        .collect();

    if iteration > 1 && !candidates.is_empty() {
        let shift = (iteration - 1) % candidates.len();
        candidates.rotate_left(shift);
    }
    candidates
}
