//! In-memory topic tree and its atomically published snapshot.
//!
//! The tree maps command segments (`git`, `commit`) to nodes. A node is a
//! leaf when a basic document exists for its path; `.detail` and
//! `.install` resources fold into flags on the same node rather than
//! becoming nodes of their own.
//!
//! [`IndexStore`] owns the published snapshot. Readers clone an
//! `Arc<IndexEntry>` and never observe a tree under construction: every
//! rebuild happens on a private value that is swapped in whole by
//! [`IndexStore::publish`].

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use crate::{
    doc_path::{DocPath, Variant},
    error::Result,
    queue::{Reason, UpdateQueue},
    store::DocumentStore,
};

/// One node of the topic tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexEntry {
    /// Segments from the root to this node; empty for the root.
    pub segments: Vec<String>,
    /// A basic document exists for this node.
    pub leaf: bool,
    pub has_detail: bool,
    pub has_install: bool,
    /// Children keyed by their segment name.
    pub children: BTreeMap<String, IndexEntry>,
}

impl IndexEntry {
    /// Build a fresh tree from a set of resource paths.
    ///
    /// # Examples
    ///
    /// ```
    /// use cheatdex::{doc_path::DocPath, index::IndexEntry};
    ///
    /// let paths: Vec<DocPath> = ["git/commit", "git/commit.detail", "git/push"]
    ///     .iter()
    ///     .map(|p| p.parse().unwrap())
    ///     .collect();
    /// let tree = IndexEntry::from_paths(&paths);
    /// assert_eq!(tree.leaf_count(), 2);
    /// assert!(tree.descend(&["git", "commit"]).unwrap().has_detail);
    /// ```
    pub fn from_paths<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a DocPath>,
    {
        let mut root = Self::default();
        for path in paths {
            root.insert(path);
        }
        root
    }

    fn insert(&mut self, path: &DocPath) {
        let mut node = self;
        for (depth, segment) in path.segments().iter().enumerate() {
            node = node.children.entry(segment.clone()).or_insert_with(|| {
                IndexEntry {
                    segments: path.segments()[..=depth].to_vec(),
                    ..IndexEntry::default()
                }
            });
        }
        match path.variant() {
            Variant::Basic => node.leaf = true,
            Variant::Detail => node.has_detail = true,
            Variant::Install => node.has_install = true,
        }
    }

    /// Last segment, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Find a direct child by name, ignoring case. An exact-case match is
    /// preferred when siblings differ only by case.
    pub fn child(&self, name: &str) -> Option<&IndexEntry> {
        if let Some(child) = self.children.get(name) {
            return Some(child);
        }
        let wanted = name.to_lowercase();
        self.children
            .iter()
            .find(|(key, _)| key.to_lowercase() == wanted)
            .map(|(_, child)| child)
    }

    pub fn child_names(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    /// Walk down by exact (case-insensitive) segment names.
    pub fn descend<S: AsRef<str>>(&self, segments: &[S]) -> Option<&IndexEntry> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.child(segment.as_ref()))
    }

    /// Basic resource for this node, if it is a leaf.
    pub fn doc_path(&self) -> Option<DocPath> {
        if !self.leaf {
            return None;
        }
        DocPath::new(self.segments.clone(), Variant::Basic).ok()
    }

    /// Every leaf below (and including) this node, depth-first in key order.
    pub fn leaves(&self) -> Vec<DocPath> {
        let mut out = Vec::new();
        self.visit(&mut |node| {
            if let Some(path) = node.doc_path() {
                out.push(path);
            }
        });
        out
    }

    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |node| {
            if node.leaf {
                count += 1;
            }
        });
        count
    }

    /// Every resource (basic and variants) the tree was built from.
    pub fn resources(&self) -> Vec<DocPath> {
        let mut out = Vec::new();
        self.visit(&mut |node| {
            let flags = [
                (node.leaf, Variant::Basic),
                (node.has_detail, Variant::Detail),
                (node.has_install, Variant::Install),
            ];
            for (present, variant) in flags {
                if present
                    && let Ok(path) =
                        DocPath::new(node.segments.clone(), variant)
                {
                    out.push(path);
                }
            }
        });
        out
    }

    fn visit<F: FnMut(&IndexEntry)>(&self, f: &mut F) {
        f(self);
        for child in self.children.values() {
            child.visit(f);
        }
    }
}

/// Options accepted by [`IndexStore::update`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Treat every resource as stale.
    pub force: bool,
}

/// Outcome of an index update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Leaves in the newly published tree.
    pub leaves: usize,
    /// Items newly added to the update queue.
    pub enqueued: usize,
}

/// Holder of the published index snapshot.
#[derive(Debug, Default)]
pub struct IndexStore {
    published: RwLock<Arc<IndexEntry>>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a tree built from previously persisted paths.
    pub fn with_paths(paths: &[DocPath]) -> Self {
        Self {
            published: RwLock::new(Arc::new(IndexEntry::from_paths(paths))),
        }
    }

    /// Current snapshot. No I/O, never waits on a rebuild.
    pub fn index(&self) -> Arc<IndexEntry> {
        match self.published.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swap in a fully built tree.
    pub fn publish(&self, tree: IndexEntry) -> Arc<IndexEntry> {
        let tree = Arc::new(tree);
        let mut guard = match self.published.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::clone(&tree);
        tree
    }

    /// Rebuild the tree from scratch out of the document store's listing.
    pub async fn build<S>(&self, store: &S) -> Result<Arc<IndexEntry>>
    where
        S: DocumentStore + ?Sized,
    {
        let listing = store.list().await?;
        let tree = IndexEntry::from_paths(listing.iter().map(|l| &l.path));
        warn_orphan_variants(&tree);
        let tree = self.publish(tree);
        tracing::info!(
            leaves = tree.leaf_count(),
            resources = listing.len(),
            "index built"
        );
        Ok(tree)
    }

    /// Refresh the remote manifest, republish the tree and queue stale
    /// resources for download.
    pub async fn update<S>(
        &self,
        store: &S,
        queue: &UpdateQueue,
        options: UpdateOptions,
    ) -> Result<UpdateReport>
    where
        S: DocumentStore + ?Sized,
    {
        let remote = store.refresh_manifest().await?;
        tracing::debug!(remote, "manifest refreshed");

        let listing = store.list().await?;
        let tree = IndexEntry::from_paths(listing.iter().map(|l| &l.path));
        warn_orphan_variants(&tree);
        let tree = self.publish(tree);

        let mut enqueued = 0;
        for entry in &listing {
            // Variants without a basic document are never offered.
            let is_leaf = tree
                .descend(entry.path.segments())
                .is_some_and(|node| node.leaf);
            if !is_leaf {
                continue;
            }
            let reason = if options.force {
                Reason::Force
            } else if entry.is_stale() {
                Reason::Stale
            } else {
                continue;
            };
            if queue.enqueue(entry.path.clone(), reason) {
                enqueued += 1;
            }
        }

        tracing::info!(leaves = tree.leaf_count(), enqueued, "index updated");
        Ok(UpdateReport {
            leaves: tree.leaf_count(),
            enqueued,
        })
    }
}

fn warn_orphan_variants(tree: &IndexEntry) {
    tree.visit(&mut |node| {
        if !node.leaf && (node.has_detail || node.has_install) {
            tracing::warn!(
                topic = node.segments.join("/"),
                "variant document without a basic document"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn paths(items: &[&str]) -> Vec<DocPath> {
        items.iter().map(|p| p.parse().unwrap()).collect()
    }

    #[test]
    fn leaves_equal_input_paths() {
        let input = paths(&["git/commit", "git/push", "tar", "docker/run"]);
        let tree = IndexEntry::from_paths(&input);

        let leaves: BTreeSet<_> = tree.leaves().into_iter().collect();
        let expected: BTreeSet<_> = input.into_iter().collect();
        assert_eq!(leaves, expected);
    }

    #[test]
    fn variants_fold_into_flags() {
        let tree = IndexEntry::from_paths(&paths(&[
            "git/commit",
            "git/commit.detail",
            "git/push",
            "git/push.install",
        ]));

        assert_eq!(tree.leaf_count(), 2);
        let commit = tree.descend(&["git", "commit"]).unwrap();
        assert!(commit.leaf && commit.has_detail && !commit.has_install);
        let push = tree.descend(&["git", "push"]).unwrap();
        assert!(push.leaf && !push.has_detail && push.has_install);
    }

    #[test]
    fn node_can_be_leaf_and_directory() {
        let tree = IndexEntry::from_paths(&paths(&["git", "git/push"]));
        let git = tree.child("git").unwrap();
        assert!(git.leaf);
        assert_eq!(git.child_names(), vec!["push"]);
    }

    #[test]
    fn child_lookup_ignores_case() {
        let tree = IndexEntry::from_paths(&paths(&["Git/Commit"]));
        assert!(tree.descend(&["git", "commit"]).is_some());
        assert_eq!(tree.child("GIT").unwrap().name(), Some("Git"));
    }

    #[test]
    fn resources_round_trip() {
        let input = paths(&["git/commit", "git/commit.detail", "npm.install"]);
        let tree = IndexEntry::from_paths(&input);
        let out: BTreeSet<_> = tree.resources().into_iter().collect();
        let expected: BTreeSet<_> = input.into_iter().collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn orphan_variant_is_not_a_leaf() {
        let tree = IndexEntry::from_paths(&paths(&["npm.install"]));
        let npm = tree.child("npm").unwrap();
        assert!(!npm.leaf);
        assert!(npm.has_install);
        assert!(tree.leaves().is_empty());
    }

    #[test]
    fn publish_swaps_snapshot() {
        let store = IndexStore::with_paths(&paths(&["git/push"]));
        let before = store.index();

        store.publish(IndexEntry::from_paths(&paths(&["tar", "ls"])));
        let after = store.index();

        // The old snapshot is untouched by the swap.
        assert_eq!(before.leaf_count(), 1);
        assert!(before.child("git").is_some());
        assert_eq!(after.leaf_count(), 2);
        assert!(after.child("git").is_none());
    }

    #[test]
    fn segments_track_depth() {
        let tree = IndexEntry::from_paths(&paths(&["a/b/c"]));
        let c = tree.descend(&["a", "b", "c"]).unwrap();
        assert_eq!(c.segments, vec!["a", "b", "c"]);
        assert_eq!(c.depth(), 3);
        assert_eq!(tree.depth(), 0);
    }
}
