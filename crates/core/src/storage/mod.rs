pub mod memory;
pub mod snapshots;

use crate::domain::snapshot::SentimentSnapshot;
use anyhow::Context;
use chrono::NaiveDate;

pub use memory::MemorySnapshotStore;
pub use snapshots::PgSnapshotStore;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Durable home of daily snapshots. There is no update operation: a date, once written,
/// keeps its first record.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn find_by_date(&self, date: NaiveDate) -> anyhow::Result<Option<SentimentSnapshot>>;

    /// Stores `snapshot` unless its date already has one; returns whichever record is stored.
    async fn insert_if_absent(
        &self,
        snapshot: &SentimentSnapshot,
    ) -> anyhow::Result<SentimentSnapshot>;

    /// Snapshots dated on or after `from`, oldest first.
    async fn list_since(&self, from: NaiveDate) -> anyhow::Result<Vec<SentimentSnapshot>>;
}
