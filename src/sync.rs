//! The context object the CLI drives.
//!
//! [`DocumentSynchronizer`] owns the published index, the update queue and
//! the history log, and is the only place they meet the document store and
//! the state database. Lookups (`resolve`, `search`, `autocomplete`) read
//! the current snapshot and never touch the network or the queue.

use std::sync::Arc;

use crate::{
    autocomplete::{self, Matcher},
    doc_path::{DocPath, Variant},
    error::Result,
    fuzzy::{self, Match},
    history::{HistoryLog, RecordKind},
    index::{IndexEntry, IndexStore, UpdateOptions, UpdateReport},
    queue::{DrainReport, MAX_ATTEMPTS, UpdateQueue},
    resolve::{RequestOptions, build_extension, build_path},
    staleness::{StaleReport, diff_listings},
    state_db::StateDb,
    store::{Document, DocumentStore},
};

/// What a command phrase led to.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// A document to show.
    Found {
        /// Leaf as the user would type it.
        command: String,
        doc: DocPath,
        /// Requested variant the leaf lacks; the basic document is shown.
        downgraded: Option<Variant>,
        /// Reached through fuzzy search rather than an exact phrase.
        via_search: bool,
    },
    /// Descent stopped below the root; these children exist there.
    Suggestions {
        /// Deepest matched prefix.
        command: String,
        names: Vec<String>,
    },
    /// Fuzzy candidates, best first. Empty when nothing matched.
    Candidates(Vec<Match>),
}

pub struct DocumentSynchronizer {
    store: Box<dyn DocumentStore>,
    state: Arc<StateDb>,
    index: IndexStore,
    queue: UpdateQueue,
    history: HistoryLog,
}

impl DocumentSynchronizer {
    /// Load the persisted index, queue and history. The index is built from
    /// the store when none was ever saved.
    pub async fn start(
        store: Box<dyn DocumentStore>,
        state: Arc<StateDb>,
    ) -> Result<Self> {
        let queue = UpdateQueue::from_items(state.load_queue()?);
        let history = HistoryLog::open(Arc::clone(&state))?;
        let persisted = state.load_index()?;

        let sync = Self {
            store,
            index: match &persisted {
                Some(paths) => IndexStore::with_paths(paths),
                None => IndexStore::new(),
            },
            state,
            queue,
            history,
        };

        if persisted.is_none() {
            tracing::debug!("no persisted index, building");
            sync.build().await?;
        }
        Ok(sync)
    }

    /// Persist the queue and the index resources.
    pub fn flush(&self) -> Result<()> {
        self.state.save_queue(&self.queue.items())?;
        self.state.save_index(&self.index.index().resources())?;
        tracing::debug!(queued = self.queue.len(), "state flushed");
        Ok(())
    }

    // -- Index --

    /// Rebuild the index from the store's current listing and persist it.
    pub async fn build(&self) -> Result<Arc<IndexEntry>> {
        let tree = self.index.build(self.store.as_ref()).await?;
        self.state.save_index(&tree.resources())?;
        Ok(tree)
    }

    /// Refresh the manifest, republish the index and queue stale documents.
    pub async fn update(&self, options: UpdateOptions) -> Result<UpdateReport> {
        let report = self
            .index
            .update(self.store.as_ref(), &self.queue, options)
            .await?;
        self.flush()?;
        self.history.append(
            RecordKind::Update,
            format!(
                "index updated: {} commands, {} queued",
                report.leaves, report.enqueued
            ),
        )?;
        Ok(report)
    }

    pub fn index(&self) -> Arc<IndexEntry> {
        self.index.index()
    }

    // -- Lookups --

    /// Turn a command phrase into something to show: the document itself,
    /// sibling suggestions, or fuzzy candidates.
    pub fn resolve(&self, text: &str, options: &RequestOptions) -> Lookup {
        let index = self.index();
        let resolved = build_path(text, &index);

        if resolved.exists
            && let Some(doc) = build_extension(resolved.entry, options)
        {
            return Lookup::Found {
                command: resolved.command(),
                downgraded: resolved.downgrade(options),
                doc,
                via_search: false,
            };
        }

        if let Some(names) = resolved.suggestions.clone()
            && !names.is_empty()
        {
            return Lookup::Suggestions {
                command: resolved.command(),
                names,
            };
        }

        let mut candidates = fuzzy::search(&index, text);
        if candidates.len() == 1 {
            let best = build_path(&candidates[0].command, &index);
            if best.exists
                && let Some(doc) = build_extension(best.entry, options)
            {
                return Lookup::Found {
                    command: best.command(),
                    downgraded: best.downgrade(options),
                    doc,
                    via_search: true,
                };
            }
            candidates.clear();
        }
        Lookup::Candidates(candidates)
    }

    pub fn search(&self, query: &str) -> Vec<Match> {
        fuzzy::search(&self.index(), query)
    }

    pub fn autocomplete(
        &self,
        text: &str,
        iteration: usize,
        matcher: &dyn Matcher,
    ) -> Vec<String> {
        autocomplete::autocomplete(text, iteration, &self.index(), matcher)
    }

    // -- Documents --

    /// Read a document, fetching it on first use, and record the lookup.
    pub async fn fetch(&self, path: &DocPath) -> Result<Document> {
        self.history.append(RecordKind::Command, path.describe())?;
        self.store.get(path).await
    }

    /// Compare the mirror against a fresh upstream manifest. Read-only.
    pub async fn compare_docs(&self) -> Result<StaleReport> {
        let local = self.store.list().await?;
        let remote = self.store.remote_manifest().await?;
        Ok(diff_listings(&local, &remote))
    }

    /// Download every queued document once, then persist what is left.
    pub async fn drain(&self) -> Result<DrainReport> {
        let report = self.queue.drain(self.store.as_ref()).await;

        for path in &report.dropped {
            self.history.append(
                RecordKind::Update,
                format!("gave up on {} after {MAX_ATTEMPTS} attempts", path.describe()),
            )?;
        }
        if !report.refreshed.is_empty() {
            self.history.append(
                RecordKind::Update,
                format!("refreshed {} documents", report.refreshed.len()),
            )?;
        }

        self.state.save_queue(&self.queue.items())?;
        Ok(report)
    }

    // -- Read accessors --

    pub fn queue(&self) -> &UpdateQueue {
        &self.queue
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn record_command(&self, text: &str) -> Result<()> {
        self.history.append(RecordKind::Command, text)?;
        Ok(())
    }
}

impl std::fmt::Debug for DocumentSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSynchronizer")
            .field("queued", &self.queue.len())
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}
