//! Market mood scoring. Everything here is pure: inputs are already-fetched market values.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const BASELINE_SCORE: i32 = 50;

pub const SIGNAL_PROFIT_BOOKING: &str = "Consider profit booking & be cautious";
pub const SIGNAL_NEW_INVESTMENTS: &str = "Market are suitable for new investments";
pub const ACTION_ACCUMULATE: &str = "Accumulate Quality Stocks / Hold";
pub const ACTION_DEFENSIVE: &str = "Stay Defensive / Protect Capital";

/// Combines trend, breadth and volatility into a 0..=100 score.
///
/// A missing breadth ratio falls in the lowest breadth band.
pub fn sentiment_score(trend_pct: f64, breadth_ratio: Option<f64>, volatility: f64) -> i32 {
    let mut score = BASELINE_SCORE;

    if trend_pct > 0.0 {
        score += 10;
    } else if trend_pct < 0.0 {
        score -= 10;
    }

    let ratio = breadth_ratio.unwrap_or(0.0);
    if ratio >= 1.5 {
        score += 15;
    } else if ratio < 1.0 {
        score -= 15;
    }

    if volatility < 12.0 {
        score += 10;
    } else if volatility > 20.0 {
        score -= 15;
    }

    score.clamp(0, 100)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    #[serde(rename = "Very Bullish")]
    VeryBullish,
    Bullish,
    Neutral,
    Euphoric,
    Cautious,
}

impl SentimentLabel {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 80 => Self::VeryBullish,
            s if s >= 60 => Self::Bullish,
            s if s >= 40 => Self::Neutral,
            s if s >= 20 => Self::Euphoric,
            _ => Self::Cautious,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryBullish => "Very Bullish",
            Self::Bullish => "Bullish",
            Self::Neutral => "Neutral",
            Self::Euphoric => "Euphoric",
            Self::Cautious => "Cautious",
        }
    }
}

impl FromStr for SentimentLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "Very Bullish" => Self::VeryBullish,
            "Bullish" => Self::Bullish,
            "Neutral" => Self::Neutral,
            "Euphoric" => Self::Euphoric,
            "Cautious" => Self::Cautious,
            other => bail!("unknown sentiment label: {other}"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "Low" => Self::Low,
            "Moderate" => Self::Moderate,
            "High" => Self::High,
            other => bail!("unknown risk level: {other}"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendStrength {
    Positive,
    Negative,
    Neutral,
}

impl TrendStrength {
    pub fn from_change(percent_change: f64) -> Self {
        if percent_change > 0.3 {
            Self::Positive
        } else if percent_change < -0.3 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Neutral => "Neutral",
        }
    }
}

impl FromStr for TrendStrength {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "Positive" => Self::Positive,
            "Negative" => Self::Negative,
            "Neutral" => Self::Neutral,
            other => bail!("unknown trend strength: {other}"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreadthStatus {
    Bullish,
    Neutral,
    Bearish,
    Unavailable,
}

impl BreadthStatus {
    /// Buckets an advance/decline ratio. `None` (no declines) lands in the bottom bucket,
    /// consistent with [`sentiment_score`].
    pub fn from_ratio(ratio: Option<f64>) -> Self {
        let ratio = ratio.unwrap_or(0.0);
        if ratio >= 1.5 {
            Self::Bullish
        } else if ratio < 1.0 {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "Bullish",
            Self::Neutral => "Neutral",
            Self::Bearish => "Bearish",
            Self::Unavailable => "Unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolatilityInsight {
    pub label: &'static str,
    pub risk: RiskLevel,
}

pub fn interpret_volatility(volatility: f64) -> VolatilityInsight {
    if volatility < 12.0 {
        VolatilityInsight {
            label: "Complacent/Stable",
            risk: RiskLevel::Low,
        }
    } else if volatility < 18.0 {
        VolatilityInsight {
            label: "Normal",
            risk: RiskLevel::Moderate,
        }
    } else {
        VolatilityInsight {
            label: "Elevated",
            risk: RiskLevel::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoodAssessment {
    pub score: i32,
    pub label: SentimentLabel,
    pub volatility: VolatilityInsight,
    pub trend: TrendStrength,
    pub primary_signal: &'static str,
    pub investment_action: &'static str,
}

/// Score plus the derived classifications. Scores of 60 and above pair the profit-booking
/// signal with the accumulate action; this pairing is part of the stored record format.
pub fn assess(trend_pct: f64, breadth_ratio: Option<f64>, volatility: f64) -> MoodAssessment {
    let score = sentiment_score(trend_pct, breadth_ratio, volatility);
    let (primary_signal, investment_action) = if score >= 60 {
        (SIGNAL_PROFIT_BOOKING, ACTION_ACCUMULATE)
    } else {
        (SIGNAL_NEW_INVESTMENTS, ACTION_DEFENSIVE)
    };

    MoodAssessment {
        score,
        label: SentimentLabel::from_score(score),
        volatility: interpret_volatility(volatility),
        trend: TrendStrength::from_change(trend_pct),
        primary_signal,
        investment_action,
    }
}

/// Dashboard index weighting institutional flow (40%), volatility (30%) and direction (30%).
pub fn flow_mood_index(fii_net: f64, volatility: f64, percent_change: f64) -> i32 {
    let fii_score = (50.0 + fii_net / 100.0).clamp(0.0, 100.0);
    let vix_score = if volatility < 14.0 {
        80.0
    } else if volatility < 18.0 {
        60.0
    } else {
        30.0
    };
    let market_score = if percent_change > 0.0 {
        70.0
    } else if percent_change < 0.0 {
        40.0
    } else {
        50.0
    };

    (fii_score * 0.4 + vix_score * 0.3 + market_score * 0.3).round() as i32
}
