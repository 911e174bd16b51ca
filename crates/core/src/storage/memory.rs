use crate::domain::snapshot::SentimentSnapshot;
use crate::storage::SnapshotStore;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Process-local store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    rows: Mutex<BTreeMap<NaiveDate, SentimentSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn find_by_date(&self, date: NaiveDate) -> anyhow::Result<Option<SentimentSnapshot>> {
        Ok(self.rows.lock().await.get(&date).cloned())
    }

    async fn insert_if_absent(
        &self,
        snapshot: &SentimentSnapshot,
    ) -> anyhow::Result<SentimentSnapshot> {
        snapshot.validate()?;
        let mut rows = self.rows.lock().await;
        Ok(rows
            .entry(snapshot.date)
            .or_insert_with(|| snapshot.clone())
            .clone())
    }

    async fn list_since(&self, from: NaiveDate) -> anyhow::Result<Vec<SentimentSnapshot>> {
        Ok(self
            .rows
            .lock()
            .await
            .range(from..)
            .map(|(_, s)| s.clone())
            .collect())
    }
}
