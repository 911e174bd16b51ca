use crate::market::types::{Breadth, FlowData, FlowLeg, FlowPoint, IndexQuote};
use crate::nse::types::{
    AdvanceCounts, AllIndicesResponse, FlowRow, IndexConstituentsResponse, MarketStatusResponse,
    PATH_ALL_INDICES, PATH_FII_DII, PATH_INDEX_CONSTITUENTS, PATH_MARKET_STATUS,
};
use crate::config::Settings;
use crate::nse::{NseClient, NseClientConfig, ReqwestTransport};
use anyhow::{Context, Result};
use std::sync::Arc;

pub const BENCHMARK_INDEX: &str = "NIFTY 50";
pub const VOLATILITY_INDEX: &str = "INDIA VIX";

const CATEGORY_FII: &str = "FII/FPI";
const CATEGORY_DII: &str = "DII";

/// Typed accessors over the upstream endpoints. Each call is one upstream request; callers
/// combine them concurrently.
#[derive(Clone)]
pub struct MarketDataService {
    client: Arc<NseClient>,
}

impl MarketDataService {
    pub fn new(client: Arc<NseClient>) -> Self {
        Self { client }
    }

    /// Live upstream over reqwest with fetcher tuning read from the environment.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let transport = ReqwestTransport::from_settings(settings)?;
        let client = NseClient::new(Arc::new(transport), NseClientConfig::from_env()?);
        Ok(Self::new(Arc::new(client)))
    }

    pub async fn fii_dii(&self) -> Result<FlowData> {
        let rows: Vec<FlowRow> = self.client.get(PATH_FII_DII, &[]).await?;

        let fii = rows
            .iter()
            .find(|r| r.category == CATEGORY_FII)
            .context("FII/FPI row missing from flow data")?;
        let dii = rows
            .iter()
            .find(|r| r.category == CATEGORY_DII)
            .context("DII row missing from flow data")?;

        Ok(FlowData {
            date: fii.date.clone(),
            fii: flow_leg(fii),
            dii: flow_leg(dii),
        })
    }

    /// Latest `days` FII net values, oldest first.
    pub async fn fii_series(&self, days: usize) -> Result<Vec<FlowPoint>> {
        let rows: Vec<FlowRow> = self.client.get(PATH_FII_DII, &[]).await?;
        let mut out: Vec<FlowPoint> = rows
            .into_iter()
            .filter(|r| r.category == CATEGORY_FII)
            .take(days)
            .map(|r| FlowPoint {
                date: r.date,
                value: r.net_value.unwrap_or(0.0),
            })
            .collect();
        out.reverse();
        Ok(out)
    }

    pub async fn all_indices(&self) -> Result<AllIndicesResponse> {
        self.client.get(PATH_ALL_INDICES, &[]).await
    }

    pub async fn volatility_index(&self) -> Result<f64> {
        let res = self.all_indices().await?;
        res.data
            .iter()
            .find(|i| i.index_symbol == VOLATILITY_INDEX || i.index == VOLATILITY_INDEX)
            .and_then(|i| i.last)
            .context("INDIA VIX missing from index list")
    }

    pub async fn market_status(&self) -> Result<MarketStatusResponse> {
        self.client.get(PATH_MARKET_STATUS, &[]).await
    }

    /// Benchmark last price and move, from the market status feed.
    pub async fn market_direction(&self) -> Result<IndexQuote> {
        let res = self.market_status().await?;
        let row = res
            .market_state
            .into_iter()
            .find(|m| m.index == BENCHMARK_INDEX)
            .context("NIFTY 50 missing from market status")?;

        Ok(IndexQuote {
            index: BENCHMARK_INDEX.to_string(),
            last: row.last.context("NIFTY 50 last price missing")?,
            change: row.variation.unwrap_or(0.0),
            percent_change: row.percent_change.context("NIFTY 50 percent change missing")?,
            trade_date: row.trade_date,
            market_status: row.market_status,
        })
    }

    pub async fn index_constituents(&self, index: &str) -> Result<IndexConstituentsResponse> {
        self.client
            .get(PATH_INDEX_CONSTITUENTS, &[("index", index)])
            .await
            .with_context(|| format!("fetch constituents for {index} failed"))
    }

    pub async fn index_snapshot(&self, index: &str) -> Result<IndexQuote> {
        let res = self.index_constituents(index).await?;
        let meta = res
            .metadata
            .with_context(|| format!("metadata missing for {index}"))?;

        Ok(IndexQuote {
            index: index.to_string(),
            last: meta.last.with_context(|| format!("last price missing for {index}"))?,
            change: meta.change.unwrap_or(0.0),
            percent_change: meta.perc_change.unwrap_or(0.0),
            trade_date: None,
            market_status: None,
        })
    }

    /// Advance/decline counts for an index. Breadth is optional enrichment: an absent block
    /// yields [`Breadth::unavailable`] instead of an error.
    pub async fn advance_decline(&self, index: &str) -> Result<Breadth> {
        let res = self.index_constituents(index).await?;
        Ok(breadth_from_advance(res.advance.as_ref()))
    }
}

pub fn breadth_from_advance(advance: Option<&serde_json::Value>) -> Breadth {
    let Some(advance) = advance.filter(|v| v.is_object()) else {
        return Breadth::unavailable();
    };
    match serde_json::from_value::<AdvanceCounts>(advance.clone()) {
        Ok(counts) => Breadth::from_counts(&counts),
        Err(err) => {
            tracing::warn!(error = %err, "unreadable advance/decline block");
            Breadth::unavailable()
        }
    }
}

fn flow_leg(row: &FlowRow) -> FlowLeg {
    FlowLeg {
        buy: row.buy_value.unwrap_or(0.0),
        sell: row.sell_value.unwrap_or(0.0),
        net: row.net_value.unwrap_or(0.0),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sentiment::BreadthStatus;
    use crate::nse::testing::RoutedTransport;
    use crate::nse::NseClientConfig;
    use serde_json::json;

    fn service(transport: RoutedTransport) -> MarketDataService {
        let client = NseClient::new(Arc::new(transport), NseClientConfig::default());
        MarketDataService::new(Arc::new(client))
    }

    #[tokio::test(start_paused = true)]
    async fn reads_flow_for_both_categories() {
        let svc = service(fixtures::market_transport());
        let flow = svc.fii_dii().await.unwrap();
        assert_eq!(flow.date, "17-Oct-2026");
        assert_eq!(flow.fii.net, -1500.5);
        assert_eq!(flow.dii.buy, 15000.1);
    }

    #[tokio::test(start_paused = true)]
    async fn fii_series_is_chronological_and_limited() {
        let svc = service(fixtures::market_transport());
        let series = svc.fii_series(2).await.unwrap();
        assert_eq!(
            series,
            vec![
                FlowPoint { date: "16-Oct-2026".into(), value: 1000.0 },
                FlowPoint { date: "17-Oct-2026".into(), value: -1500.5 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reads_volatility_and_direction() {
        let svc = service(fixtures::market_transport());
        assert_eq!(svc.volatility_index().await.unwrap(), 10.0);

        let dir = svc.market_direction().await.unwrap();
        assert_eq!(dir.last, 25100.0);
        assert_eq!(dir.change, 125.0);
        assert_eq!(dir.percent_change, 0.5);
        assert_eq!(dir.market_status.as_deref(), Some("Closed"));
    }

    #[tokio::test(start_paused = true)]
    async fn index_snapshot_uses_metadata() {
        let svc = service(fixtures::market_transport());
        let q = svc.index_snapshot("NIFTY BANK").await.unwrap();
        assert_eq!(q.index, "NIFTY BANK");
        assert_eq!(q.last, 56000.0);
        assert_eq!(q.percent_change, -1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn breadth_missing_upstream_is_unavailable() {
        let svc = service(fixtures::market_transport());
        let b = svc.advance_decline("NIFTY 500").await.unwrap();
        assert_eq!(b, Breadth::unavailable());

        let b = svc.advance_decline("NIFTY 50").await.unwrap();
        assert_eq!(b.ratio, Some(1.88));
        assert_eq!(b.status, BreadthStatus::Bullish);
    }

    #[test]
    fn non_object_advance_is_unavailable() {
        assert_eq!(breadth_from_advance(Some(&json!("n/a"))).status, BreadthStatus::Unavailable);
        assert_eq!(breadth_from_advance(Some(&json!(null))).status, BreadthStatus::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_vix_is_an_error() {
        let transport = RoutedTransport::new().route("/api/allIndices", json!({"data": []}));
        let svc = service(transport);
        assert!(svc.volatility_index().await.is_err());
    }
}
