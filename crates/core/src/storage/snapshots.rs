use crate::domain::snapshot::SentimentSnapshot;
use crate::storage::SnapshotStore;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

type SnapshotRow = (
    Uuid,
    NaiveDate,
    i32,
    String,
    String,
    String,
    String,
    f64,
    f64,
    Option<f64>,
    String,
    DateTime<Utc>,
);

#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: sqlx::PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn find_by_date(&self, date: NaiveDate) -> anyhow::Result<Option<SentimentSnapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "SELECT id, date, sentiment_score, sentiment_label, risk_level, primary_signal, \
                    investment_action, nifty_change, vix_value, breadth_ratio, trend_strength, created_at \
             FROM market_mood_snapshots \
             WHERE date = $1",
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select market_mood_snapshots for {date} failed"))?;

        row.map(from_row).transpose()
    }

    async fn insert_if_absent(
        &self,
        snapshot: &SentimentSnapshot,
    ) -> anyhow::Result<SentimentSnapshot> {
        snapshot.validate()?;

        let res = sqlx::query(
            "INSERT INTO market_mood_snapshots (id, date, sentiment_score, sentiment_label, risk_level, \
                 primary_signal, investment_action, nifty_change, vix_value, breadth_ratio, trend_strength, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (date) DO NOTHING",
        )
        .bind(snapshot.id)
        .bind(snapshot.date)
        .bind(snapshot.sentiment_score)
        .bind(snapshot.sentiment_label.as_str())
        .bind(snapshot.risk_level.as_str())
        .bind(&snapshot.primary_signal)
        .bind(&snapshot.investment_action)
        .bind(snapshot.nifty_change)
        .bind(snapshot.vix_value)
        .bind(snapshot.breadth_ratio)
        .bind(snapshot.trend_strength.as_str())
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await
        .context("insert market_mood_snapshots failed")?;

        if res.rows_affected() == 0 {
            tracing::info!(date = %snapshot.date, "snapshot already stored; keeping existing row");
        }

        self.find_by_date(snapshot.date)
            .await?
            .with_context(|| format!("snapshot for {} missing after insert", snapshot.date))
    }

    async fn list_since(&self, from: NaiveDate) -> anyhow::Result<Vec<SentimentSnapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            "SELECT id, date, sentiment_score, sentiment_label, risk_level, primary_signal, \
                    investment_action, nifty_change, vix_value, breadth_ratio, trend_strength, created_at \
             FROM market_mood_snapshots \
             WHERE date >= $1 \
             ORDER BY date ASC",
        )
        .bind(from)
        .fetch_all(&self.pool)
        .await
        .context("select market_mood_snapshots range failed")?;

        rows.into_iter().map(from_row).collect()
    }
}

fn from_row(row: SnapshotRow) -> anyhow::Result<SentimentSnapshot> {
    let (
        id,
        date,
        sentiment_score,
        sentiment_label,
        risk_level,
        primary_signal,
        investment_action,
        nifty_change,
        vix_value,
        breadth_ratio,
        trend_strength,
        created_at,
    ) = row;

    Ok(SentimentSnapshot {
        id,
        date,
        sentiment_score,
        sentiment_label: sentiment_label
            .parse()
            .with_context(|| format!("invalid sentiment_label in DB for {date}"))?,
        risk_level: risk_level
            .parse()
            .with_context(|| format!("invalid risk_level in DB for {date}"))?,
        primary_signal,
        investment_action,
        nifty_change,
        vix_value,
        breadth_ratio,
        trend_strength: trend_strength
            .parse()
            .with_context(|| format!("invalid trend_strength in DB for {date}"))?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sentiment::{RiskLevel, SentimentLabel, TrendStrength};

    fn row(label: &str) -> SnapshotRow {
        (
            Uuid::nil(),
            NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            85,
            label.to_string(),
            "Low".to_string(),
            "Consider profit booking & be cautious".to_string(),
            "Accumulate Quality Stocks / Hold".to_string(),
            0.5,
            10.0,
            Some(1.6),
            "Positive".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn maps_db_row_to_snapshot() {
        let snap = from_row(row("Very Bullish")).unwrap();
        assert_eq!(snap.sentiment_label, SentimentLabel::VeryBullish);
        assert_eq!(snap.risk_level, RiskLevel::Low);
        assert_eq!(snap.trend_strength, TrendStrength::Positive);
        assert_eq!(snap.breadth_ratio, Some(1.6));
    }

    #[test]
    fn rejects_unknown_enum_text() {
        let err = from_row(row("Panic")).unwrap_err();
        assert!(format!("{err:#}").contains("sentiment_label"));
    }
}
