use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::Result, state_db::StateDb};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Command,
    Update,
}

impl RecordKind {
    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Command => "Command",
            RecordKind::Update => "Update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub value: String,
}

/// Append-only audit trail of commands and sync events.
///
/// Records are written through to the state database when one is
/// attached, so the log survives restarts.
#[derive(Debug, Default)]
pub struct HistoryLog {
    records: Mutex<Vec<HistoryRecord>>,
    db: Option<Arc<StateDb>>,
}

impl HistoryLog {
    /// In-memory log with no persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log backed by `db`, preloaded with the records already stored there.
    pub fn open(db: Arc<StateDb>) -> Result<Self> {
        let records = db.load_history()?;
        Ok(Self {
            records: Mutex::new(records),
            db: Some(db),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HistoryRecord>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn append(
        &self,
        kind: RecordKind,
        value: impl Into<String>,
    ) -> Result<HistoryRecord> {
        let record = HistoryRecord {
            date: Utc::now(),
            kind,
            value: value.into(),
        };
        if let Some(db) = &self.db {
            db.append_history(&record)?;
        }
        self.lock().push(record.clone());
        Ok(record)
    }

    /// Every record, oldest first.
    pub fn get(&self) -> Vec<HistoryRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_appends_in_order() {
        let log = HistoryLog::new();
        for i in 0..25 {
            log.append(RecordKind::Command, format!("cmd {i}")).unwrap();
        }

        let records = log.get();
        assert_eq!(records.len(), 25);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.value, format!("cmd {i}"));
        }
        assert!(records.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn persisted_log_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.redb");

        {
            let db = Arc::new(StateDb::open(&path).unwrap());
            let log = HistoryLog::open(db).unwrap();
            log.append(RecordKind::Command, "git commit").unwrap();
            log.append(RecordKind::Update, "refreshed 3 documents")
                .unwrap();
        }

        let db = Arc::new(StateDb::open(&path).unwrap());
        let log = HistoryLog::open(db).unwrap();
        let records = log.get();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, RecordKind::Command);
        assert_eq!(records[1].value, "refreshed 3 documents");
    }

    #[test]
    fn record_uses_type_field() {
        let log = HistoryLog::new();
        let record = log.append(RecordKind::Update, "x").unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "update");
    }
}
