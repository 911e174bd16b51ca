use crate::domain::snapshot::SentimentSnapshot;
use crate::market::MarketDataService;
use crate::storage::SnapshotStore;
use crate::time::in_market::today_ist;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Computes and stores the one snapshot per date. Scheduled runs, the manual trigger and the
/// lazy read path all go through [`MoodJob::store_for`], so they share one existence check.
pub struct MoodJob {
    market: MarketDataService,
    store: Arc<dyn SnapshotStore>,
    deadline: Duration,

    // Serializes check-then-fill within this process; the store's unique date covers the rest.
    run_lock: Mutex<()>,
}

impl MoodJob {
    pub fn new(market: MarketDataService, store: Arc<dyn SnapshotStore>, deadline: Duration) -> Self {
        Self {
            market,
            store,
            deadline,
            run_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    pub async fn store_daily(&self) -> Result<SentimentSnapshot> {
        self.store_for(today_ist(Utc::now())?).await
    }

    /// Returns the stored snapshot for `date`, computing it from live data only if absent.
    pub async fn store_for(&self, date: NaiveDate) -> Result<SentimentSnapshot> {
        let _guard = self.run_lock.lock().await;

        if let Some(existing) = self.store.find_by_date(date).await? {
            tracing::debug!(%date, "snapshot already present");
            return Ok(existing);
        }

        let intel = self
            .market
            .intelligence(self.deadline)
            .await
            .context("build market intelligence for daily snapshot failed")?;

        let stored = self.store.insert_if_absent(&intel.snapshot(date)).await?;
        tracing::info!(
            %date,
            score = stored.sentiment_score,
            label = stored.sentiment_label.as_str(),
            "stored daily market mood snapshot"
        );
        Ok(stored)
    }
}
