use crate::domain::snapshot::SentimentSnapshot;
use crate::mood::MoodJob;
use crate::storage::SnapshotStore;
use crate::time::in_market::today_ist;
use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HistoryRange {
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "5Y")]
    FiveYears,
}

impl HistoryRange {
    pub fn days(&self) -> i64 {
        match self {
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
            Self::SixMonths => 180,
            Self::OneYear => 365,
            Self::FiveYears => 1825,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::SixMonths => "6M",
            Self::OneYear => "1Y",
            Self::FiveYears => "5Y",
        }
    }

    /// Absent parameters take `default`; unrecognized ones fall back to one year.
    pub fn parse_or(s: Option<&str>, default: Self) -> Self {
        match s {
            None => default,
            Some(s) => s.parse().unwrap_or(Self::OneYear),
        }
    }

    pub fn cutoff(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.days())
    }
}

impl FromStr for HistoryRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "1M" => Self::OneMonth,
            "3M" => Self::ThreeMonths,
            "6M" => Self::SixMonths,
            "1Y" => Self::OneYear,
            "5Y" => Self::FiveYears,
            other => bail!("unknown history range: {other}"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MmiPoint {
    pub date: NaiveDate,
    pub value: i32,
}

/// Read side over stored snapshots. The only write it can cause is the lazy computation of
/// today's snapshot, delegated to [`MoodJob`].
pub struct HistoryService {
    store: Arc<dyn SnapshotStore>,
    job: Arc<MoodJob>,
}

impl HistoryService {
    pub fn new(job: Arc<MoodJob>) -> Self {
        Self {
            store: job.store().clone(),
            job,
        }
    }

    pub fn job(&self) -> &Arc<MoodJob> {
        &self.job
    }

    pub async fn history(&self, range: HistoryRange) -> Result<Vec<SentimentSnapshot>> {
        self.history_as_of(range, today_ist(Utc::now())?).await
    }

    pub async fn history_as_of(
        &self,
        range: HistoryRange,
        today: NaiveDate,
    ) -> Result<Vec<SentimentSnapshot>> {
        self.store.list_since(range.cutoff(today)).await
    }

    pub async fn mmi_series(&self, range: HistoryRange) -> Result<Vec<MmiPoint>> {
        Ok(self
            .history(range)
            .await?
            .into_iter()
            .map(|s| MmiPoint {
                date: s.date,
                value: s.sentiment_score,
            })
            .collect())
    }

    pub async fn today(&self) -> Result<SentimentSnapshot> {
        self.job.store_daily().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sentiment::assess;
    use crate::domain::snapshot::MoodInputs;
    use crate::market::MarketDataService;
    use crate::nse::testing::RoutedTransport;
    use crate::nse::{NseClient, NseClientConfig};
    use crate::storage::MemorySnapshotStore;

    fn snapshot(date: NaiveDate) -> SentimentSnapshot {
        let inputs = MoodInputs {
            nifty_change: 0.2,
            vix_value: 14.0,
            breadth_ratio: Some(1.1),
        };
        SentimentSnapshot::new(date, inputs, &assess(0.2, Some(1.1), 14.0))
    }

    async fn service_with(dates: &[NaiveDate]) -> HistoryService {
        let store = Arc::new(MemorySnapshotStore::new());
        for d in dates {
            store.insert_if_absent(&snapshot(*d)).await.unwrap();
        }
        let client = NseClient::new(Arc::new(RoutedTransport::new()), NseClientConfig::default());
        let job = MoodJob::new(
            MarketDataService::new(Arc::new(client)),
            store,
            std::time::Duration::from_secs(20),
        );
        HistoryService::new(Arc::new(job))
    }

    #[tokio::test]
    async fn three_month_range_keeps_only_recent_rows() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let dates = [400, 100, 10].map(|n| today - Duration::days(n));
        let svc = service_with(&dates).await;

        let rows = svc.history_as_of(HistoryRange::ThreeMonths, today).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, today - Duration::days(10));

        let rows = svc.history_as_of(HistoryRange::FiveYears, today).await.unwrap();
        let got: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(got, dates.to_vec());
    }

    #[tokio::test]
    async fn cutoff_day_is_included() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let svc = service_with(&[today - Duration::days(30), today - Duration::days(31)]).await;
        let rows = svc.history_as_of(HistoryRange::OneMonth, today).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn parses_ranges_with_fallbacks() {
        assert_eq!("3m".parse::<HistoryRange>().unwrap(), HistoryRange::ThreeMonths);
        assert_eq!(HistoryRange::parse_or(None, HistoryRange::OneMonth), HistoryRange::OneMonth);
        assert_eq!(HistoryRange::parse_or(Some("10Y"), HistoryRange::OneMonth), HistoryRange::OneYear);
        assert_eq!(HistoryRange::FiveYears.days(), 1825);
        assert_eq!(serde_json::to_value(HistoryRange::SixMonths).unwrap(), "6M");
    }
}
