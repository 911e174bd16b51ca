use crate::domain::sentiment::{assess, BreadthStatus};
use crate::domain::snapshot::{MoodInputs, SentimentSnapshot};
use crate::market::service::BENCHMARK_INDEX;
use crate::market::types::{Breadth, IndexQuote};
use crate::market::MarketDataService;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::time::Duration;

pub const BROAD_INDEX: &str = "NIFTY 500";
pub const BANK_INDEX: &str = "NIFTY BANK";
pub const IT_INDEX: &str = "NIFTY IT";

#[derive(Debug, Clone, Serialize)]
pub struct MarketIntelligence {
    pub api_source_data: ApiSourceData,
    pub market_mood_indicator: MoodIndicator,
    #[serde(skip)]
    pub inputs: MoodInputs,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiSourceData {
    pub market_status: MarketStatusSummary,
    pub nifty_50_summary: BenchmarkSummary,
    pub nifty_500_summary: IndexQuote,
    pub nifty_bank_summary: IndexQuote,
    pub nifty_it_summary: IndexQuote,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketStatusSummary {
    pub status: String,
    pub trade_date: Option<String>,
    pub market_cap_status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkSummary {
    pub index: &'static str,
    pub last_price: f64,
    pub change: f64,
    #[serde(rename = "pChange")]
    pub p_change: f64,
    pub market_breadth: BreadthSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreadthSummary {
    pub advances: Option<u64>,
    pub declines: Option<u64>,
    pub unchanged: Option<u64>,
    pub ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoodIndicator {
    pub sentiment_score: i32,
    pub sentiment_label: crate::domain::sentiment::SentimentLabel,
    pub risk_level: crate::domain::sentiment::RiskLevel,
    pub primary_signal: &'static str,
    pub analysis_factors: AnalysisFactors,
    pub investment_action: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisFactors {
    pub trend_strength: Factor,
    pub market_breadth: Factor,
    pub volatility_vix: Factor,
}

#[derive(Debug, Clone, Serialize)]
pub struct Factor {
    pub status: &'static str,
    pub value: Option<f64>,
    pub reason: String,
}

impl MarketDataService {
    /// Fetches every input concurrently and scores the result. Any accessor failure fails the
    /// whole aggregate; `deadline` bounds the total wait.
    pub async fn intelligence(&self, deadline: Duration) -> Result<MarketIntelligence> {
        let fetch = async {
            tokio::try_join!(
                self.volatility_index(),
                self.market_direction(),
                self.index_snapshot(BROAD_INDEX),
                self.index_snapshot(BANK_INDEX),
                self.index_snapshot(IT_INDEX),
                self.advance_decline(BENCHMARK_INDEX),
            )
        };

        let (vix, market, broad, bank, it, breadth) = tokio::time::timeout(deadline, fetch)
            .await
            .context("market intelligence timed out")??;

        Ok(compose(vix, market, broad, bank, it, breadth))
    }
}

impl MarketIntelligence {
    pub fn snapshot(&self, date: NaiveDate) -> SentimentSnapshot {
        let i = self.inputs;
        SentimentSnapshot::new(date, i, &assess(i.nifty_change, i.breadth_ratio, i.vix_value))
    }
}

fn compose(
    vix: f64,
    market: IndexQuote,
    broad: IndexQuote,
    bank: IndexQuote,
    it: IndexQuote,
    breadth: Breadth,
) -> MarketIntelligence {
    let pct = market.percent_change;
    let mood = assess(pct, breadth.ratio, vix);

    let breadth_reason = match (breadth.status, breadth.ratio) {
        (BreadthStatus::Unavailable, _) => "Breadth data unavailable from NSE.".to_string(),
        (status, Some(ratio)) => format!(
            "Advance/Decline ratio is {ratio}, indicating {} participation in NIFTY 50.",
            status.as_str().to_lowercase()
        ),
        (status, None) => format!(
            "No declining stocks reported, breadth reads as {} for NIFTY 50.",
            status.as_str().to_lowercase()
        ),
    };

    let factors = AnalysisFactors {
        trend_strength: Factor {
            status: mood.trend.as_str(),
            value: Some(pct),
            reason: format!("NIFTY moved {pct}% today."),
        },
        market_breadth: Factor {
            status: breadth.status.as_str(),
            value: breadth.ratio,
            reason: breadth_reason,
        },
        volatility_vix: Factor {
            status: mood.volatility.label,
            value: Some(vix),
            reason: format!(
                "VIX at {vix} suggests {} risk.",
                mood.volatility.risk.as_str().to_lowercase()
            ),
        },
    };

    MarketIntelligence {
        api_source_data: ApiSourceData {
            market_status: MarketStatusSummary {
                status: market
                    .market_status
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
                trade_date: market.trade_date.clone(),
                market_cap_status: "Normal",
            },
            nifty_50_summary: BenchmarkSummary {
                index: BENCHMARK_INDEX,
                last_price: market.last,
                change: market.change,
                p_change: pct,
                market_breadth: BreadthSummary {
                    advances: breadth.advances,
                    declines: breadth.declines,
                    unchanged: breadth.unchanged,
                    ratio: breadth.ratio,
                },
            },
            nifty_500_summary: broad,
            nifty_bank_summary: bank,
            nifty_it_summary: it,
        },
        market_mood_indicator: MoodIndicator {
            sentiment_score: mood.score,
            sentiment_label: mood.label,
            risk_level: mood.volatility.risk,
            primary_signal: mood.primary_signal,
            analysis_factors: factors,
            investment_action: mood.investment_action,
        },
        inputs: MoodInputs {
            nifty_change: pct,
            vix_value: vix,
            breadth_ratio: breadth.ratio,
        },
    }
}
