//! Resolve a typed command phrase against the topic tree.

use crate::{
    doc_path::{DocPath, Variant},
    index::IndexEntry,
};

/// Recognized request flags.
///
/// Only these fields are understood; the CLI rejects any other flag
/// before a request is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Prefer the detailed write-up.
    pub detail: bool,
    /// Prefer the installation write-up.
    pub install: bool,
    /// Display limit for listings.
    pub max: Option<usize>,
    /// Treat every document as stale on update.
    pub force: bool,
}

impl RequestOptions {
    /// Variant the user asked for. `detail` wins over `install`.
    pub fn requested_variant(&self) -> Variant {
        if self.detail {
            Variant::Detail
        } else if self.install {
            Variant::Install
        } else {
            Variant::Basic
        }
    }
}

/// Result of [`build_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath<'a> {
    /// The phrase landed exactly on a leaf.
    pub exists: bool,
    /// Deepest node reached; the root when nothing matched.
    pub entry: &'a IndexEntry,
    /// Children available where descent stopped. `None` when nothing
    /// matched at the first segment (or the phrase was empty).
    pub suggestions: Option<Vec<String>>,
}

impl ResolvedPath<'_> {
    /// Matched segments in their stored case.
    pub fn path(&self) -> &[String] {
        &self.entry.segments
    }

    /// Matched prefix as the user would type it (`git`).
    pub fn command(&self) -> String {
        self.entry.segments.join(" ")
    }

    /// Requested variant the leaf cannot provide, if any.
    pub fn downgrade(&self, options: &RequestOptions) -> Option<Variant> {
        let requested = options.requested_variant();
        (self.exists && chosen_variant(self.entry, options) != requested)
            .then_some(requested)
    }
}

/// Descend the tree one whitespace-separated segment at a time, ignoring
/// case.
///
/// # Examples
///
/// ```
/// use cheatdex::{doc_path::DocPath, index::IndexEntry, resolve::build_path};
///
/// let paths: Vec<DocPath> = ["git/commit", "git/push"]
///     .iter()
///     .map(|p| p.parse().unwrap())
///     .collect();
/// let tree = IndexEntry::from_paths(&paths);
///
/// let found = build_path("Git Commit", &tree);
/// assert!(found.exists);
///
/// let miss = build_path("git pull", &tree);
/// assert!(!miss.exists);
/// assert_eq!(miss.suggestions, Some(vec!["commit".into(), "push".into()]));
/// ```
pub fn build_path<'a>(command_text: &str, index: &'a IndexEntry) -> ResolvedPath<'a> {
    let mut node = index;

    for (depth, segment) in command_text.split_whitespace().enumerate() {
        match node.child(segment) {
            Some(child) => node = child,
            None => {
                tracing::debug!(segment, depth, "no matching child");
                return ResolvedPath {
                    exists: false,
                    entry: node,
                    suggestions: (depth > 0).then(|| node.child_names()),
                };
            }
        }
    }

    if node.leaf {
        ResolvedPath {
            exists: true,
            entry: node,
            suggestions: None,
        }
    } else {
        ResolvedPath {
            exists: false,
            entry: node,
            suggestions: (node.depth() > 0).then(|| node.child_names()),
        }
    }
}

fn chosen_variant(entry: &IndexEntry, options: &RequestOptions) -> Variant {
    match options.requested_variant() {
        Variant::Detail if entry.has_detail => Variant::Detail,
        Variant::Install if entry.has_install => Variant::Install,
        _ => Variant::Basic,
    }
}

/// Map a resolved leaf and the requested variant to the resource to
/// fetch. A variant the leaf lacks falls back to the basic document.
/// Returns `None` for a node that is not a leaf.
pub fn build_extension(
    entry: &IndexEntry,
    options: &RequestOptions,
) -> Option<DocPath> {
    if !entry.leaf {
        return None;
    }
    DocPath::new(entry.segments.clone(), chosen_variant(entry, options)).ok()
}
