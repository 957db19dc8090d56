//! cheatdex - command cheat sheets for the terminal.
//!
//! Type a command the way you would run it (`git commit`) and cheatdex
//! finds the matching reference card in a tree of markdown documents. When
//! the phrase is not an exact path it degrades gracefully: sibling
//! suggestions, then fuzzy search over every known command. Documents are
//! mirrored locally from an upstream (an HTTP server or a directory) and
//! kept fresh through a de-duplicated update queue.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cheatdex::{DataDir, DocumentSynchronizer, StateDb};
//! use cheatdex::resolve::RequestOptions;
//! use cheatdex::store::{MirrorStore, upstream_from};
//! use cheatdex::sync::Lookup;
//!
//! # async fn run() -> cheatdex::Result<()> {
//! let data_dir = DataDir::resolve(None)?;
//! let state = Arc::new(StateDb::open(&data_dir.state_db())?);
//! let store = MirrorStore::open(&data_dir, upstream_from(Some("/srv/sheets"))?)?;
//! let sync = DocumentSynchronizer::start(Box::new(store), state).await?;
//!
//! if let Lookup::Found { doc, .. } = sync.resolve("git commit", &RequestOptions::default()) {
//!     println!("{}", sync.fetch(&doc).await?.content);
//! }
//! sync.flush()?;
//! # Ok(())
//! # }
//! ```

pub mod autocomplete;
pub mod data_dir;
pub mod doc_path;
pub mod error;
pub mod fuzzy;
pub mod history;
pub mod index;
pub mod queue;
pub mod resolve;
pub mod staleness;
pub mod state_db;
pub mod store;
pub mod sync;
pub mod text_util;
pub mod walker;
pub mod web;

pub use data_dir::DataDir;
pub use doc_path::{DocPath, Variant};
pub use error::{Error, Result};
pub use index::{IndexEntry, IndexStore};
pub use state_db::StateDb;
pub use sync::DocumentSynchronizer;
