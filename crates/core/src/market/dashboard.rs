use crate::domain::sentiment::{flow_mood_index, SentimentLabel};
use crate::market::MarketDataService;
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub fii_activity: FiiActivity,
    pub volatility: f64,
    pub market_direction: &'static str,
    pub risk_appetite: &'static str,
    pub mmi: MmiReading,
}

#[derive(Debug, Clone, Serialize)]
pub struct FiiActivity {
    pub date: String,
    pub current: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MmiReading {
    pub value: i32,
    pub zone: SentimentLabel,
}

impl MarketDataService {
    pub async fn dashboard(&self) -> Result<Dashboard> {
        let (flow, vix, market) = tokio::try_join!(
            self.fii_dii(),
            self.volatility_index(),
            self.market_direction(),
        )?;

        let fii_net = flow.fii.net;
        let value = flow_mood_index(fii_net, vix, market.percent_change);

        Ok(Dashboard {
            fii_activity: FiiActivity {
                date: flow.date,
                current: if fii_net >= 0.0 { "Net Buy" } else { "Net Sell" },
                value: fii_net,
            },
            volatility: vix,
            market_direction: if market.percent_change > 0.0 {
                "Positive"
            } else {
                "Negative"
            },
            risk_appetite: if vix < 15.0 && fii_net > 0.0 {
                "High"
            } else {
                "Moderate"
            },
            mmi: MmiReading {
                value,
                zone: SentimentLabel::from_score(value),
            },
        })
    }
}
