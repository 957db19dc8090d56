//! Document collaborator: a local mirror of cheat sheets backed by an
//! upstream source.
//!
//! The mirror is a directory of `.md` files laid out like the topic tree
//! (`git/commit.md`, `git/commit.detail.md`). The upstream publishes a
//! manifest of every resource with its modification time; a cached copy of
//! that manifest lets the mirror answer staleness questions offline.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::{
    data_dir::DataDir,
    doc_path::DocPath,
    error::{Error, Result},
    state_db::StateDb,
    walker::{self, discover_docs},
};

pub const UPSTREAM_ENV_VAR: &str = "CHEATDEX_UPSTREAM";

/// Settings key holding the last upstream passed on the command line.
pub const UPSTREAM_SETTING: &str = "upstream";

/// One resource as published by an upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub path: DocPath,
    /// Seconds since the Unix epoch.
    pub mtime: u64,
}

/// One row of [`DocumentStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocListing {
    pub path: DocPath,
    /// Modification time of the mirrored copy, if there is one.
    pub local_mtime: Option<u64>,
    /// Last known upstream modification time.
    pub remote_mtime: Option<u64>,
}

impl DocListing {
    /// The mirrored copy predates the upstream one. Resources that were
    /// never mirrored are not stale; they are fetched lazily on first read.
    pub fn is_stale(&self) -> bool {
        matches!(
            (self.local_mtime, self.remote_mtime),
            (Some(local), Some(remote)) if local < remote
        )
    }
}

/// A fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: DocPath,
    pub content: String,
    pub local_mtime: u64,
    pub remote_mtime: Option<u64>,
}

/// Durable document collection the index is built from.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every known resource with its local and remote modification times.
    /// Never touches the network.
    async fn list(&self) -> Result<Vec<DocListing>>;

    /// Read a document, fetching and caching it first if it was never
    /// mirrored.
    async fn get(&self, path: &DocPath) -> Result<Document>;

    /// Re-download a document unconditionally.
    async fn refresh(&self, path: &DocPath) -> Result<()>;

    /// Download the upstream manifest and cache it. Returns the number of
    /// published resources.
    async fn refresh_manifest(&self) -> Result<usize>;

    /// Download the upstream manifest without caching it.
    async fn remote_manifest(&self) -> Result<Vec<RemoteEntry>>;
}

/// Source of truth the mirror copies from.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn manifest(&self) -> Result<Vec<RemoteEntry>>;

    async fn fetch(&self, path: &DocPath) -> Result<String>;

    /// Short human description for logs.
    fn describe(&self) -> String;
}

/// Resolve the upstream location from, in order of priority:
/// 1. An explicit location (from --upstream), which is also remembered
/// 2. The CHEATDEX_UPSTREAM environment variable
/// 3. The location remembered in the state database
pub fn configured_upstream(
    state: &StateDb,
    explicit: Option<&str>,
) -> Result<Option<String>> {
    if let Some(location) = explicit {
        state.set_setting(UPSTREAM_SETTING, location)?;
        return Ok(Some(location.to_string()));
    }
    if let Ok(location) = std::env::var(UPSTREAM_ENV_VAR)
        && !location.is_empty()
    {
        return Ok(Some(location));
    }
    state.get_setting(UPSTREAM_SETTING)
}

/// Pick an upstream implementation from a user-supplied location: an
/// `http(s)://` base URL or a local directory.
pub fn upstream_from(location: Option<&str>) -> Result<Box<dyn Upstream>> {
    Ok(match location {
        None => Box::new(Offline),
        Some(url)
            if url.starts_with("http://") || url.starts_with("https://") =>
        {
            Box::new(HttpUpstream::new(url)?)
        }
        Some(dir) => Box::new(DirUpstream::new(dir)),
    })
}

/// Upstream used when none is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

#[async_trait]
impl Upstream for Offline {
    async fn manifest(&self) -> Result<Vec<RemoteEntry>> {
        Err(no_upstream())
    }

    async fn fetch(&self, _path: &DocPath) -> Result<String> {
        Err(no_upstream())
    }

    fn describe(&self) -> String {
        "offline".to_string()
    }
}

fn no_upstream() -> Error {
    Error::Config(
        "no upstream configured; pass --upstream or set CHEATDEX_UPSTREAM"
            .into(),
    )
}

/// A directory of `.md` files acting as the upstream.
#[derive(Debug, Clone)]
pub struct DirUpstream {
    root: PathBuf,
}

impl DirUpstream {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Upstream for DirUpstream {
    async fn manifest(&self) -> Result<Vec<RemoteEntry>> {
        if !self.root.is_dir() {
            return Err(Error::NotFound {
                kind: "upstream directory",
                name: self.root.display().to_string(),
            });
        }
        Ok(discover_docs(&self.root)?
            .into_iter()
            .map(|doc| RemoteEntry {
                path: doc.path,
                mtime: doc.mtime,
            })
            .collect())
    }

    async fn fetch(&self, path: &DocPath) -> Result<String> {
        let file = self.root.join(path.file_path());
        std::fs::read_to_string(&file).map_err(|e| Error::Fetch {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Characters escaped inside one URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const HTTP_TIMEOUT_SECS: u64 = 30;

/// An HTTP server publishing `manifest.json` and the documents under one
/// base URL.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    base: String,
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("cheatdex/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn document_url(&self, path: &DocPath) -> String {
        let relative = path.file_path();
        let encoded: Vec<String> = relative
            .iter()
            .map(|part| {
                utf8_percent_encode(&part.to_string_lossy(), PATH_SEGMENT)
                    .to_string()
            })
            .collect();
        format!("{}/{}", self.base, encoded.join("/"))
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn manifest(&self) -> Result<Vec<RemoteEntry>> {
        let url = format!("{}/manifest.json", self.base);
        let entries = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<RemoteEntry>>()
            .await?;
        Ok(entries)
    }

    async fn fetch(&self, path: &DocPath) -> Result<String> {
        let url = self.document_url(path);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Fetch {
                path: path.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        Ok(response.text().await?)
    }

    fn describe(&self) -> String {
        self.base.clone()
    }
}

/// Local mirror directory plus cached manifest in front of an upstream.
pub struct MirrorStore {
    docs_dir: PathBuf,
    manifest_path: PathBuf,
    upstream: Box<dyn Upstream>,
}

impl MirrorStore {
    pub fn new(
        docs_dir: PathBuf,
        manifest_path: PathBuf,
        upstream: Box<dyn Upstream>,
    ) -> Self {
        Self {
            docs_dir,
            manifest_path,
            upstream,
        }
    }

    /// Mirror rooted in the standard data directory layout.
    pub fn open(data_dir: &DataDir, upstream: Box<dyn Upstream>) -> Result<Self> {
        Ok(Self::new(data_dir.docs_dir()?, data_dir.manifest(), upstream))
    }

    pub fn docs_dir(&self) -> &Path {
        &self.docs_dir
    }

    fn cached_manifest(&self) -> Result<Vec<RemoteEntry>> {
        match std::fs::read(&self.manifest_path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }

    fn remote_mtime(&self, path: &DocPath) -> Result<Option<u64>> {
        Ok(self
            .cached_manifest()?
            .into_iter()
            .find(|entry| &entry.path == path)
            .map(|entry| entry.mtime))
    }

    fn write_doc(&self, path: &DocPath, content: &str) -> Result<PathBuf> {
        let file = self.docs_dir.join(path.file_path());
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file, content)?;
        Ok(file)
    }
}

impl std::fmt::Debug for MirrorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorStore")
            .field("docs_dir", &self.docs_dir)
            .field("upstream", &self.upstream.describe())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DocumentStore for MirrorStore {
    async fn list(&self) -> Result<Vec<DocListing>> {
        let mut rows: BTreeMap<DocPath, DocListing> = BTreeMap::new();

        for doc in discover_docs(&self.docs_dir)? {
            rows.insert(
                doc.path.clone(),
                DocListing {
                    path: doc.path,
                    local_mtime: Some(doc.mtime),
                    remote_mtime: None,
                },
            );
        }

        for entry in self.cached_manifest()? {
            rows.entry(entry.path.clone())
                .or_insert_with(|| DocListing {
                    path: entry.path.clone(),
                    local_mtime: None,
                    remote_mtime: None,
                })
                .remote_mtime = Some(entry.mtime);
        }

        Ok(rows.into_values().collect())
    }

    async fn get(&self, path: &DocPath) -> Result<Document> {
        let file = self.docs_dir.join(path.file_path());
        let content = match std::fs::read_to_string(&file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(%path, "not mirrored yet, fetching");
                let content = self.upstream.fetch(path).await?;
                self.write_doc(path, &content)?;
                content
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Document {
            path: path.clone(),
            content,
            local_mtime: walker::file_mtime(&file)?,
            remote_mtime: self.remote_mtime(path)?,
        })
    }

    async fn refresh(&self, path: &DocPath) -> Result<()> {
        let content = self.upstream.fetch(path).await?;
        self.write_doc(path, &content)?;
        tracing::debug!(%path, "refreshed");
        Ok(())
    }

    async fn refresh_manifest(&self) -> Result<usize> {
        let entries = self.upstream.manifest().await?;
        let tmp = self.manifest_path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&entries)?)?;
        std::fs::rename(&tmp, &self.manifest_path)?;
        Ok(entries.len())
    }

    async fn remote_manifest(&self) -> Result<Vec<RemoteEntry>> {
        self.upstream.manifest().await
    }
}
