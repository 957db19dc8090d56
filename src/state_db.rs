use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{
    doc_path::DocPath,
    error::Result,
    history::HistoryRecord,
    queue::QueueItem,
};

const INDEX_PATHS: TableDefinition<&str, ()> =
    TableDefinition::new("index_paths");
const HISTORY: TableDefinition<u64, &[u8]> = TableDefinition::new("history");
const QUEUE: TableDefinition<u64, &[u8]> = TableDefinition::new("queue");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Settings key recording when the index was last persisted.
const INDEX_SAVED_AT: &str = "index_saved_at";

/// Durable state: the index resource list, history log, update queue and
/// settings.
pub struct StateDb {
    db: Database,
}

impl StateDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(redb::Error::from)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(INDEX_PATHS)?;
        txn.open_table(HISTORY)?;
        txn.open_table(QUEUE)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Index --

    /// Replace the persisted resource list in a single transaction.
    pub fn save_index(&self, paths: &[DocPath]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            txn.delete_table(INDEX_PATHS)?;
            let mut table = txn.open_table(INDEX_PATHS)?;
            for path in paths {
                table.insert(path.to_string().as_str(), ())?;
            }
            let mut settings = txn.open_table(SETTINGS)?;
            settings.insert(
                INDEX_SAVED_AT,
                chrono::Utc::now().to_rfc3339().as_str(),
            )?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Persisted resource list, or `None` if no index was ever saved.
    pub fn load_index(&self) -> Result<Option<Vec<DocPath>>> {
        if self.get_setting(INDEX_SAVED_AT)?.is_none() {
            return Ok(None);
        }
        let txn = self.db.begin_read()?;
        let table = txn.open_table(INDEX_PATHS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, _) = entry?;
            match DocPath::parse(k.value()) {
                Ok(path) => result.push(path),
                Err(e) => tracing::warn!(error = %e, "skipping stored path"),
            }
        }
        Ok(Some(result))
    }

    // -- History --

    pub fn append_history(&self, record: &HistoryRecord) -> Result<u64> {
        let bytes = serde_json::to_vec(record)?;
        let txn = self.db.begin_write()?;
        let seq = {
            let mut table = txn.open_table(HISTORY)?;
            let seq = match table.last()? {
                Some((k, _)) => k.value() + 1,
                None => 0,
            };
            table.insert(seq, bytes.as_slice())?;
            seq
        };
        txn.commit()?;
        Ok(seq)
    }

    pub fn load_history(&self) -> Result<Vec<HistoryRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(HISTORY)?;
        let mut result: Vec<HistoryRecord> = Vec::new();
        for entry in table.iter()? {
            let (_, v) = entry?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    // -- Queue --

    /// Replace the persisted queue in a single transaction.
    pub fn save_queue(&self, items: &[QueueItem]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            txn.delete_table(QUEUE)?;
            let mut table = txn.open_table(QUEUE)?;
            for (seq, item) in items.iter().enumerate() {
                let bytes = serde_json::to_vec(item)?;
                table.insert(seq as u64, bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn load_queue(&self) -> Result<Vec<QueueItem>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(QUEUE)?;
        let mut result: Vec<QueueItem> = Vec::new();
        for entry in table.iter()? {
            let (_, v) = entry?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }
}

impl std::fmt::Debug for StateDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDb").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{history::RecordKind, queue::Reason};

    fn test_db() -> (tempfile::TempDir, StateDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = StateDb::open(&tmp.path().join("state.redb")).unwrap();
        (tmp, db)
    }

    fn doc(path: &str) -> DocPath {
        path.parse().unwrap()
    }

    #[test]
    fn index_absent_until_saved() {
        let (_tmp, db) = test_db();
        assert_eq!(db.load_index().unwrap(), None);

        db.save_index(&[]).unwrap();
        assert_eq!(db.load_index().unwrap(), Some(vec![]));
    }

    #[test]
    fn save_index_replaces_previous() {
        let (_tmp, db) = test_db();
        db.save_index(&[doc("git/push"), doc("tar")]).unwrap();
        db.save_index(&[doc("git/commit"), doc("git/commit.detail")])
            .unwrap();

        let loaded = db.load_index().unwrap().unwrap();
        assert_eq!(loaded, vec![doc("git/commit"), doc("git/commit.detail")]);
    }

    #[test]
    fn history_appends_in_sequence() {
        let (_tmp, db) = test_db();
        for (i, value) in ["a", "b", "c"].into_iter().enumerate() {
            let record = HistoryRecord {
                date: Utc::now(),
                kind: RecordKind::Command,
                value: value.to_string(),
            };
            assert_eq!(db.append_history(&record).unwrap(), i as u64);
        }

        let values: Vec<_> = db
            .load_history()
            .unwrap()
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn queue_round_trips_in_order() {
        let (_tmp, db) = test_db();
        let items: Vec<_> = ["z", "a", "m"]
            .into_iter()
            .map(|p| QueueItem {
                path: doc(p),
                enqueued_at: Utc::now(),
                reason: Reason::Stale,
                attempts: 0,
            })
            .collect();

        db.save_queue(&items).unwrap();
        assert_eq!(db.load_queue().unwrap(), items);

        db.save_queue(&items[..1]).unwrap();
        assert_eq!(db.load_queue().unwrap().len(), 1);
    }

    #[test]
    fn settings_crud() {
        let (_tmp, db) = test_db();
        assert_eq!(db.get_setting("upstream").unwrap(), None);
        db.set_setting("upstream", "https://example.com").unwrap();
        assert_eq!(
            db.get_setting("upstream").unwrap(),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.redb");

        {
            let db = StateDb::open(&path).unwrap();
            db.save_index(&[doc("ls")]).unwrap();
            db.set_setting("upstream", "/srv/sheets").unwrap();
        }

        {
            let db = StateDb::open(&path).unwrap();
            assert_eq!(db.load_index().unwrap(), Some(vec![doc("ls")]));
            assert_eq!(
                db.get_setting("upstream").unwrap(),
                Some("/srv/sheets".to_string())
            );
        }
    }
}
