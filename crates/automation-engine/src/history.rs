//! Bounded execution history, newest first

use crate::error::AutomationError;
use crate::model::ExecutionRecord;
use crate::persistence::{self, BlobStore};
use std::collections::VecDeque;
use std::sync::Arc;

/// Default number of retained records
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// In-memory history mirrored to a blob on every append
pub struct ExecutionHistory {
    records: VecDeque<ExecutionRecord>,
    limit: usize,
    store: Arc<dyn BlobStore>,
    key: String,
}

impl ExecutionHistory {
    /// Load the history blob. Anything unreadable starts an empty log.
    pub async fn load(store: Arc<dyn BlobStore>, key: &str, limit: usize) -> Self {
        let mut records: VecDeque<ExecutionRecord> =
            persistence::load_list(store.as_ref(), key).await.into();
        records.truncate(limit);
        Self {
            records,
            limit,
            store,
            key: key.to_string(),
        }
    }

    /// Prepend a record and drop the oldest beyond the limit (memory only)
    fn push(&mut self, record: ExecutionRecord) {
        self.records.push_front(record);
        self.records.truncate(self.limit);
    }

    /// Prepend a record and persist the log
    pub async fn append(&mut self, record: ExecutionRecord) -> Result<(), AutomationError> {
        self.push(record);
        self.save().await
    }

    /// Remove all records and persist the empty log
    pub async fn clear(&mut self) -> Result<(), AutomationError> {
        self.records.clear();
        self.save().await
    }

    async fn save(&self) -> Result<(), AutomationError> {
        let records: Vec<&ExecutionRecord> = self.records.iter().collect();
        persistence::save_list(self.store.as_ref(), &self.key, &records).await
    }

    /// All records, newest first
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.iter().cloned().collect()
    }

    /// Records for one automation, newest first
    pub fn for_automation(&self, automation_id: &str) -> Vec<ExecutionRecord> {
        self.records
            .iter()
            .filter(|r| r.automation_id == automation_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryBlobStore;
    use chrono::Utc;

    fn record(n: usize) -> ExecutionRecord {
        ExecutionRecord {
            id: format!("r{n}"),
            automation_id: format!("a{}", n % 3),
            automation_name: "test".to_string(),
            timestamp: Utc::now(),
            success: true,
            message: format!("run {n}"),
        }
    }

    #[tokio::test]
    async fn test_bounded_newest_first() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        let mut history = ExecutionHistory::load(store.clone(), "history", 50).await;

        for n in 1..=51 {
            history.append(record(n)).await.unwrap();
        }

        assert_eq!(history.len(), 50);
        let records = history.records();
        assert_eq!(records.first().unwrap().id, "r51");
        assert_eq!(records.last().unwrap().id, "r2");
        assert!(records.windows(2).all(|w| {
            w[0].id[1..].parse::<usize>().unwrap() > w[1].id[1..].parse::<usize>().unwrap()
        }));

        let reloaded = ExecutionHistory::load(store, "history", 50).await;
        assert_eq!(reloaded.records(), records);
    }

    #[tokio::test]
    async fn test_filter_and_clear() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        let mut history = ExecutionHistory::load(store.clone(), "history", 50).await;
        for n in 0..6 {
            history.append(record(n)).await.unwrap();
        }

        let ids: Vec<String> = history
            .for_automation("a1")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["r4", "r1"]);

        history.clear().await.unwrap();
        assert!(history.is_empty());
        assert!(ExecutionHistory::load(store, "history", 50)
            .await
            .is_empty());
    }
}
