use crate::config::Settings;
use crate::domain::snapshot::SentimentSnapshot;
use crate::mood::MoodJob;
use crate::time::in_market::{configured_holidays, next_run_after, parse_daily_at};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

/// Fires [`MoodJob::store_daily`] once per trading day at a fixed IST time.
pub struct DailyScheduler {
    job: Arc<MoodJob>,
    at: NaiveTime,
    holidays: HashSet<NaiveDate>,
    clock: fn() -> DateTime<Utc>,
}

impl DailyScheduler {
    pub fn new(job: Arc<MoodJob>, at: NaiveTime, holidays: HashSet<NaiveDate>) -> Self {
        Self {
            job,
            at,
            holidays,
            clock: Utc::now,
        }
    }

    /// Replaces the wall clock used to compute the next fire time.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn from_settings(job: Arc<MoodJob>, settings: &Settings) -> Result<Self> {
        let at = parse_daily_at(settings.daily_at.as_deref())?;
        Ok(Self::new(job, at, configured_holidays()))
    }

    /// Runs until `shutdown` resolves. A failed run is logged and the loop waits for the next
    /// trading day; there is no same-day retry.
    pub async fn run<S>(self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let now = (self.clock)();
            let next = next_run_after(now, self.at, &self.holidays)?;
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!(next_run = %next, wait_secs = wait.as_secs(), "daily snapshot scheduled");

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("daily scheduler stopping");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {}
            }

            self.run_once().await;
        }
    }

    pub async fn run_once(&self) -> Option<SentimentSnapshot> {
        match self.job.store_daily().await {
            Ok(snapshot) => {
                tracing::info!(date = %snapshot.date, score = snapshot.sentiment_score, "daily snapshot run finished");
                Some(snapshot)
            }
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "daily snapshot run failed");
                None
            }
        }
    }
}
