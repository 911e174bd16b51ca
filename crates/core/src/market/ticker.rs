use crate::market::service::BENCHMARK_INDEX;
use crate::market::types::round2;
use crate::market::MarketDataService;
use crate::nse::types::IndexRow;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const TICKER_INDICES: [&str; 22] = [
    "NIFTY 50",
    "NIFTY NEXT 50",
    "NIFTY 100",
    "NIFTY MIDCAP 250",
    "NIFTY SMALLCAP 250",
    "NIFTY MICROCAP 250",
    "NIFTY 500",
    "NIFTY MID SMALLCAP 400",
    "NIFTY BANK",
    "NIFTY IT",
    "NIFTY FMCG",
    "NIFTY AUTO",
    "NIFTY PHARMA",
    "NIFTY REALTY",
    "NIFTY METAL",
    "NIFTY ENERGY",
    "NIFTY PSU BANK",
    "NIFTY MEDIA",
    "NIFTY PRIVATE BANK",
    "NIFTY CONSUMPTION",
    "NIFTY INFRASTRUCTURE",
    "NIFTY COMMODITIES",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerPayload {
    pub market_status: String,
    pub indices: Vec<TickerIndex>,
    pub stocks: Vec<Value>,
    pub advance_decline: BTreeMap<String, Value>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerIndex {
    pub id: &'static str,
    pub symbol: &'static str,
    pub name: String,
    pub price: f64,
    pub change_value: f64,
    pub change_percent: f64,
    pub category: &'static str,
    pub is_live: bool,
    pub range52: Range52,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range52 {
    pub high: Option<f64>,
    pub low: Option<f64>,
}

struct CachedTicker {
    payload: Arc<TickerPayload>,
    fetched_at: Instant,
}

/// Single-slot cache for the aggregated ticker.
///
/// The slot lock is held while a refresh runs, so callers arriving during a refresh wait for
/// it instead of starting their own upstream fetch.
pub struct TickerCache {
    ttl: Duration,
    slot: Mutex<Option<CachedTicker>>,
}

impl TickerCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Cached payload if younger than the TTL.
    pub async fn get(&self) -> Option<Arc<TickerPayload>> {
        let guard = self.slot.lock().await;
        guard
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .map(|c| c.payload.clone())
    }

    pub async fn get_or_refresh<F, Fut>(&self, fetch: F) -> Result<Arc<TickerPayload>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TickerPayload>>,
    {
        let mut guard = self.slot.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.payload.clone());
            }
        }

        // A failed refresh leaves the previous entry in place; it stays unservable once stale.
        let payload = Arc::new(fetch().await?);
        *guard = Some(CachedTicker {
            payload: payload.clone(),
            fetched_at: Instant::now(),
        });
        Ok(payload)
    }
}

/// Ticker endpoint backend: cache in front of a three-call upstream aggregation.
pub struct MarketTicker {
    market: MarketDataService,
    cache: TickerCache,
}

impl MarketTicker {
    pub fn new(market: MarketDataService, ttl: Duration) -> Self {
        Self {
            market,
            cache: TickerCache::new(ttl),
        }
    }

    pub async fn current(&self) -> Result<Arc<TickerPayload>> {
        self.cache.get_or_refresh(|| self.fetch()).await
    }

    async fn fetch(&self) -> Result<TickerPayload> {
        let (indices, status, constituents) = tokio::try_join!(
            self.market.all_indices(),
            self.market.market_status(),
            self.market.index_constituents(BENCHMARK_INDEX),
        )?;

        let market_status = status
            .market_state
            .first()
            .and_then(|m| m.market_status.clone())
            .unwrap_or_else(|| "UNKNOWN".to_string());

        let mut advance_decline = BTreeMap::new();
        advance_decline.insert(
            BENCHMARK_INDEX.to_string(),
            constituents
                .advance
                .unwrap_or_else(|| Value::Object(Default::default())),
        );

        tracing::debug!(
            indices = indices.data.len(),
            stocks = constituents.data.len(),
            %market_status,
            "ticker refreshed from upstream"
        );

        Ok(TickerPayload {
            indices: normalize_indices(&indices.data, market_status == "Open"),
            market_status,
            stocks: constituents.data,
            advance_decline,
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }
}

pub fn normalize_indices(rows: &[IndexRow], is_live: bool) -> Vec<TickerIndex> {
    let by_name: HashMap<&str, &IndexRow> = rows.iter().map(|r| (r.index.as_str(), r)).collect();

    TICKER_INDICES
        .iter()
        .filter_map(|key| {
            let row = by_name.get(key)?;
            let price = row.last?;
            let (change_value, change_percent) = match row.previous_close {
                Some(prev) if prev != 0.0 => {
                    (round2(price - prev), round2((price - prev) / prev * 100.0))
                }
                _ => (0.0, 0.0),
            };

            Some(TickerIndex {
                id: *key,
                symbol: *key,
                name: row.index.clone(),
                price,
                change_value,
                change_percent,
                category: "INDEX",
                is_live,
                range52: Range52 {
                    high: row.year_high,
                    low: row.year_low,
                },
            })
        })
        .collect()
}
