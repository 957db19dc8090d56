use std::collections::{BTreeMap, BTreeSet};

use crate::{
    doc_path::DocPath,
    store::{DocListing, RemoteEntry},
};

/// A mirrored document whose upstream copy is newer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleDoc {
    pub path: DocPath,
    pub local_mtime: u64,
    pub remote_mtime: u64,
}

/// Result of comparing the local listing against a fresh upstream manifest.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StaleReport {
    /// Mirrored documents older than upstream.
    pub stale: Vec<StaleDoc>,
    /// Published upstream but unknown locally.
    pub new_upstream: Vec<DocPath>,
    /// Mirrored locally but no longer published upstream.
    pub removed_upstream: Vec<DocPath>,
}

impl StaleReport {
    pub fn is_clean(&self) -> bool {
        self.stale.is_empty()
            && self.new_upstream.is_empty()
            && self.removed_upstream.is_empty()
    }
}

/// Compare what the mirror holds against what upstream publishes.
///
/// Only local modification times are trusted from `local`; the remote side
/// comes entirely from `remote`. Nothing is modified.
pub fn diff_listings(local: &[DocListing], remote: &[RemoteEntry]) -> StaleReport {
    let published: BTreeMap<&DocPath, u64> =
        remote.iter().map(|e| (&e.path, e.mtime)).collect();
    let known: BTreeSet<&DocPath> = local.iter().map(|l| &l.path).collect();

    let mut report = StaleReport::default();

    for listing in local {
        let Some(local_mtime) = listing.local_mtime else {
            continue;
        };
        match published.get(&listing.path) {
            None => report.removed_upstream.push(listing.path.clone()),
            Some(&remote_mtime) if local_mtime < remote_mtime => {
                report.stale.push(StaleDoc {
                    path: listing.path.clone(),
                    local_mtime,
                    remote_mtime,
                });
            }
            // Up to date.
            Some(_) => {}
        }
    }

    for (path, _) in published {
        if !known.contains(path) {
            report.new_upstream.push(path.clone());
        }
    }

    report.stale.sort_by(|a, b| a.path.cmp(&b.path));
    report.removed_upstream.sort();
    report
}
