use std::{path::Path, time::SystemTime};

use crate::{doc_path::DocPath, error::Result};

/// A document found on disk.
#[derive(Debug, Clone)]
pub struct DiscoveredDoc {
    /// Resource identifier derived from the path relative to the root.
    pub path: DocPath,
    /// Last modification time as seconds since the Unix epoch.
    pub mtime: u64,
}

/// Recursively walk a directory and discover document files.
///
/// Skips hidden files/directories (names starting with `.`) and anything
/// that does not map onto a valid [`DocPath`]. A missing root yields an
/// empty listing.
pub fn discover_docs(root: &Path) -> Result<Vec<DiscoveredDoc>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, &mut results)?;
    results.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    results: &mut Vec<DiscoveredDoc>,
) -> Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        if name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(root, &entry.path(), results)?;
        } else if file_type.is_file() || file_type.is_symlink() {
            let Ok(resolved) = entry.path().canonicalize() else {
                continue; // broken symlink
            };
            if !resolved.is_file() {
                continue;
            }
            if let Some(doc) = make_discovered(root, &entry.path(), &resolved)?
            {
                results.push(doc);
            }
        }
    }

    Ok(())
}

fn make_discovered(
    root: &Path,
    original_path: &Path,
    resolved: &Path,
) -> Result<Option<DiscoveredDoc>> {
    let relative = original_path.strip_prefix(root).unwrap_or(original_path);
    let Some(path) = DocPath::from_file(relative) else {
        tracing::debug!(file = %relative.display(), "skipping non-document");
        return Ok(None);
    };

    Ok(Some(DiscoveredDoc {
        path,
        mtime: file_mtime(resolved)?,
    }))
}

/// Modification time of a file in whole seconds since the Unix epoch.
pub fn file_mtime(path: &Path) -> Result<u64> {
    Ok(std::fs::metadata(path)?
        .modified()
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs())
}
