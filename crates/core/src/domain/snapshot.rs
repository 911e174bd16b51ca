use crate::domain::sentiment::{MoodAssessment, RiskLevel, SentimentLabel, TrendStrength};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored market mood reading. At most one exists per date and it is never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSnapshot {
    pub id: Uuid,
    pub date: NaiveDate,
    pub sentiment_score: i32,
    pub sentiment_label: SentimentLabel,
    pub risk_level: RiskLevel,
    pub primary_signal: String,
    pub investment_action: String,
    pub nifty_change: f64,
    pub vix_value: f64,
    pub breadth_ratio: Option<f64>,
    pub trend_strength: TrendStrength,
    pub created_at: DateTime<Utc>,
}

/// Raw market values a snapshot was scored from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoodInputs {
    pub nifty_change: f64,
    pub vix_value: f64,
    pub breadth_ratio: Option<f64>,
}

impl SentimentSnapshot {
    pub fn new(date: NaiveDate, inputs: MoodInputs, assessment: &MoodAssessment) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            sentiment_score: assessment.score,
            sentiment_label: assessment.label,
            risk_level: assessment.volatility.risk,
            primary_signal: assessment.primary_signal.to_string(),
            investment_action: assessment.investment_action.to_string(),
            nifty_change: inputs.nifty_change,
            vix_value: inputs.vix_value,
            breadth_ratio: inputs.breadth_ratio,
            trend_strength: assessment.trend,
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (0..=100).contains(&self.sentiment_score),
            "sentiment_score out of range: {}",
            self.sentiment_score
        );
        anyhow::ensure!(
            self.nifty_change.is_finite() && self.vix_value.is_finite(),
            "snapshot inputs must be finite (nifty_change={}, vix_value={})",
            self.nifty_change,
            self.vix_value
        );
        Ok(())
    }
}
