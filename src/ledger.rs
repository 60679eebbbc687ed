//! Revision ledger: the ordered list of revisions of one recipe or package
//!
//! Persisted as `revisions.txt`, one `revision_id,timestamp` line per record,
//! oldest first. "Latest" is the last line; ids are opaque and never compared.
//! Writes hold the ledger's write lock and replace the file atomically, so
//! readers never need a lock.

use crate::error::{StoreError, StoreResult};
use crate::lock::{LockManager, LockMode};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// One revision and when it was recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub revision_id: String,
    pub timestamp: DateTime<Utc>,
}

impl RevisionRecord {
    pub fn new(revision_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            revision_id: revision_id.into(),
            timestamp,
        }
    }
}

/// In-memory ledger contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionList {
    records: Vec<RevisionRecord>,
}

impl RevisionList {
    /// Parse ledger text; `path` only labels errors
    pub fn parse(content: &str, path: &Path) -> StoreResult<Self> {
        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let invalid = |reason: String| StoreError::InvalidLedger {
                path: path.to_path_buf(),
                line: index + 1,
                reason,
            };

            let (id, timestamp) = line
                .split_once(',')
                .ok_or_else(|| invalid("expected 'revision,timestamp'".to_string()))?;
            let id = id.trim();
            if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(invalid(format!("invalid revision id '{}'", id)));
            }
            let timestamp = DateTime::parse_from_rfc3339(timestamp.trim())
                .map_err(|e| invalid(format!("invalid timestamp: {}", e)))?
                .with_timezone(&Utc);
            records.push(RevisionRecord::new(id, timestamp));
        }
        Ok(Self { records })
    }

    pub fn serialize(&self) -> String {
        self.records
            .iter()
            .map(|r| {
                format!(
                    "{},{}\n",
                    r.revision_id,
                    r.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
                )
            })
            .collect()
    }

    /// Append; duplicates are allowed and become the new latest
    pub fn add(&mut self, record: RevisionRecord) {
        self.records.push(record);
    }

    /// Remove every record with `revision_id`; returns whether any matched
    pub fn remove(&mut self, revision_id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.revision_id != revision_id);
        self.records.len() != before
    }

    pub fn latest(&self) -> Option<&RevisionRecord> {
        self.records.last()
    }

    /// Most recent record for `revision_id`
    pub fn find(&self, revision_id: &str) -> Option<&RevisionRecord> {
        self.records.iter().rev().find(|r| r.revision_id == revision_id)
    }

    /// `revision_id` if recorded, the latest record otherwise
    pub fn resolve(&self, revision_id: Option<&str>) -> Option<&RevisionRecord> {
        match revision_id {
            Some(id) => self.find(id),
            None => self.latest(),
        }
    }

    /// Oldest first
    pub fn records(&self) -> &[RevisionRecord] {
        &self.records
    }

    /// Newest first, one entry per distinct revision id
    pub fn newest_first(&self) -> Vec<RevisionRecord> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .rev()
            .filter(|r| seen.insert(r.revision_id.as_str()))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Ledger file for one recipe or package
#[derive(Debug, Clone)]
pub struct RevisionLedger {
    path: PathBuf,
    locks: LockManager,
}

impl RevisionLedger {
    pub fn new(path: impl Into<PathBuf>, locks: LockManager) -> Self {
        Self {
            path: path.into(),
            locks,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents; a missing file is an empty ledger
    pub fn load(&self) -> StoreResult<RevisionList> {
        match fs::read_to_string(&self.path) {
            Ok(content) => RevisionList::parse(&content, &self.path),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(RevisionList::default()),
            Err(e) => Err(StoreError::io(
                format!("reading ledger {}", self.path.display()),
                e,
            )),
        }
    }

    pub fn latest(&self) -> StoreResult<Option<RevisionRecord>> {
        Ok(self.load()?.latest().cloned())
    }

    /// Append `revision_id` stamped now
    pub fn add_revision(&self, revision_id: &str) -> StoreResult<RevisionRecord> {
        self.add_revision_at(revision_id, Utc::now())
    }

    /// Append `revision_id` with an explicit timestamp
    pub fn add_revision_at(
        &self,
        revision_id: &str,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<RevisionRecord> {
        let record = RevisionRecord::new(revision_id, timestamp);
        self.update(|list| list.add(record.clone()))?;
        debug!("Ledger {}: added {}", self.path.display(), revision_id);
        Ok(record)
    }

    /// Remove every record of `revision_id`; returns whether any existed
    pub fn remove_revision(&self, revision_id: &str) -> StoreResult<bool> {
        let removed = self.update(|list| list.remove(revision_id))?;
        if removed {
            debug!("Ledger {}: removed {}", self.path.display(), revision_id);
        }
        Ok(removed)
    }

    /// Delete the ledger file
    pub fn clear(&self) -> StoreResult<()> {
        let _lock = self.locks.acquire(&self.path, LockMode::Write)?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(
                format!("removing ledger {}", self.path.display()),
                e,
            )),
        }
    }

    /// Read-modify-write under the ledger's write lock
    fn update<T>(&self, f: impl FnOnce(&mut RevisionList) -> T) -> StoreResult<T> {
        let _lock = self.locks.acquire(&self.path, LockMode::Write)?;
        let mut list = self.load()?;
        let result = f(&mut list);
        self.store(&list)?;
        Ok(result)
    }

    fn store(&self, list: &RevisionList) -> StoreResult<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .map_err(|e| StoreError::io(format!("creating {}", parent.display()), e))?;

        let temp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&temp, list.serialize())
            .map_err(|e| StoreError::io(format!("writing {}", temp.display()), e))?;
        fs::rename(&temp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            StoreError::io(format!("replacing ledger {}", self.path.display()), e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn ledger(dir: &TempDir) -> RevisionLedger {
        RevisionLedger::new(
            dir.path().join("lib/1.0/user/channel/revisions.txt"),
            LockManager::new(Default::default()),
        )
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        assert!(ledger.load().unwrap().is_empty());
        assert!(ledger.latest().unwrap().is_none());
    }

    #[test]
    fn add_and_remove_scenario() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);

        ledger.add_revision_at("aaa", ts(0)).unwrap();
        ledger.add_revision_at("bbb", ts(1)).unwrap();
        assert_eq!(ledger.latest().unwrap().unwrap().revision_id, "bbb");

        assert!(ledger.remove_revision("bbb").unwrap());
        assert_eq!(ledger.latest().unwrap().unwrap().revision_id, "aaa");

        assert!(ledger.remove_revision("aaa").unwrap());
        assert!(ledger.latest().unwrap().is_none());
        assert!(!ledger.remove_revision("aaa").unwrap());
    }

    #[test]
    fn latest_is_last_added_regardless_of_id() {
        let mut list = RevisionList::default();
        for (i, id) in ["zzz", "aaa", "mmm", "aaa", "bbb"].iter().enumerate() {
            list.add(RevisionRecord::new(*id, ts(i as i64)));
            assert_eq!(list.latest().unwrap().revision_id, *id);
        }
        // duplicates collapse in the listing, newest position wins
        let ids: Vec<_> = list
            .newest_first()
            .into_iter()
            .map(|r| r.revision_id)
            .collect();
        assert_eq!(ids, vec!["bbb", "aaa", "mmm", "zzz"]);
    }

    #[test]
    fn removing_duplicates_removes_all() {
        let mut list = RevisionList::default();
        list.add(RevisionRecord::new("aaa", ts(0)));
        list.add(RevisionRecord::new("bbb", ts(1)));
        list.add(RevisionRecord::new("aaa", ts(2)));
        assert!(list.remove("aaa"));
        assert_eq!(list.records().len(), 1);
        assert_eq!(list.latest().unwrap().revision_id, "bbb");
    }

    #[test]
    fn file_format() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        ledger.add_revision_at("aaa", ts(0)).unwrap();
        ledger.add_revision_at("bbb", ts(60)).unwrap();

        let content = fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(
            content,
            "aaa,2023-11-14T22:13:20.000000Z\nbbb,2023-11-14T22:14:20.000000Z\n"
        );

        let parsed = RevisionList::parse(&content, ledger.path()).unwrap();
        assert_eq!(parsed.records()[1], RevisionRecord::new("bbb", ts(60)));
    }

    #[test]
    fn unparsable_ledger_is_an_error() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        fs::create_dir_all(ledger.path().parent().unwrap()).unwrap();
        fs::write(ledger.path(), "aaa,2023-11-14T22:13:20Z\ngarbage\n").unwrap();

        match ledger.load() {
            Err(StoreError::InvalidLedger { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(ledger.add_revision("ccc").is_err());
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("revisions.txt");
        let locks = LockManager::new(crate::lock::LockOptions {
            read_delay: std::time::Duration::from_millis(1),
            write_delay: std::time::Duration::from_millis(1),
            ..Default::default()
        });
        let ledger = Arc::new(RevisionLedger::new(path, locks));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for j in 0..5 {
                        ledger.add_revision(&format!("r{}x{}", i, j)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.load().unwrap().records().len(), 40);
    }
}
