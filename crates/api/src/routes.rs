use crate::error::ApiError;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use marketmood_core::config::Settings;
use marketmood_core::market::dashboard::Dashboard;
use marketmood_core::market::ticker::MarketTicker;
use marketmood_core::market::MarketDataService;
use marketmood_core::mood::{HistoryRange, HistoryService, MoodJob};
use marketmood_core::storage::{PgSnapshotStore, SnapshotStore};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_FII_DAYS: usize = 30;

#[derive(Clone)]
pub struct AppState {
    pub market: MarketDataService,
    pub ticker: Arc<MarketTicker>,
    /// `None` when no database is configured; snapshot routes answer 503.
    pub history: Option<Arc<HistoryService>>,
    pub intelligence_timeout: Duration,
    pub request_timeout: Duration,
    pub expose_errors: bool,
}

impl AppState {
    pub fn new(
        market: MarketDataService,
        store: Option<Arc<dyn SnapshotStore>>,
        settings: &Settings,
    ) -> Self {
        let history = store.map(|store| {
            let job = MoodJob::new(market.clone(), store, settings.intelligence_timeout);
            Arc::new(HistoryService::new(Arc::new(job)))
        });

        Self {
            ticker: Arc::new(MarketTicker::new(market.clone(), settings.ticker_ttl)),
            market,
            history,
            intelligence_timeout: settings.intelligence_timeout,
            request_timeout: settings.request_timeout,
            expose_errors: settings.is_development(),
        }
    }

    pub fn from_settings(settings: &Settings, pool: Option<sqlx::PgPool>) -> anyhow::Result<Self> {
        let market = MarketDataService::from_settings(settings)?;
        let store = pool.map(|pool| Arc::new(PgSnapshotStore::new(pool)) as Arc<dyn SnapshotStore>);
        Ok(Self::new(market, store, settings))
    }

    /// Bounds a handler body by the request deadline and maps its error.
    async fn run<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ApiError::from_anyhow(err, self.expose_errors)),
            Err(_) => {
                tracing::warn!(timeout_secs = self.request_timeout.as_secs(), "request deadline expired");
                Err(ApiError::Timeout)
            }
        }
    }

    fn history(&self) -> Result<&HistoryService, ApiError> {
        self.history.as_deref().ok_or(ApiError::NoDatabase)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/market-ticker", get(market_ticker))
        .route("/market/dashboard", get(dashboard))
        .route("/market/intelligence", get(intelligence))
        .route("/market/mmi", get(mmi))
        .route("/market/fii-series", get(fii_series))
        .route("/market-mood/history", get(mood_history))
        .route("/market-mood/today", get(mood_today))
        .route("/market-mood/store-daily", post(store_daily))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct RangeParams {
    range: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DaysParams {
    days: Option<String>,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn market_ticker(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let payload = state
        .run(async {
            let ticker = state.ticker.current().await?;
            Ok::<_, anyhow::Error>(serde_json::to_value(ticker.as_ref())?)
        })
        .await?;
    Ok(Json(payload))
}

async fn dashboard(State(state): State<AppState>) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(state.run(state.market.dashboard()).await?))
}

async fn intelligence(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let intel = state
        .run(state.market.intelligence(state.intelligence_timeout))
        .await?;
    Ok(Json(json!({"success": true, "data": intel})))
}

async fn mmi(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Value>, ApiError> {
    let range = HistoryRange::parse_or(params.range.as_deref(), HistoryRange::OneYear);
    let history = state.history()?;
    let points = state.run(history.mmi_series(range)).await?;
    Ok(Json(json!({"range": range, "data": points})))
}

async fn fii_series(
    State(state): State<AppState>,
    Query(params): Query<DaysParams>,
) -> Result<Json<Value>, ApiError> {
    // Absent, empty or zero all mean the default window.
    let days = match params.days.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_FII_DAYS,
        Some(raw) => match raw.parse::<usize>() {
            Ok(0) => DEFAULT_FII_DAYS,
            Ok(n) => n,
            Err(_) => {
                return Err(ApiError::BadRequest(format!(
                    "days must be a non-negative integer (got {raw:?})"
                )))
            }
        },
    };
    let series = state.run(state.market.fii_series(days)).await?;
    Ok(Json(json!({"data": series})))
}

async fn mood_history(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Value>, ApiError> {
    let requested = params.range.unwrap_or_else(|| HistoryRange::OneMonth.as_str().to_string());
    let range = HistoryRange::parse_or(Some(requested.as_str()), HistoryRange::OneMonth);
    let history = state.history()?;
    let rows = state.run(history.history(range)).await?;
    Ok(Json(json!({
        "success": true,
        "range": requested,
        "count": rows.len(),
        "data": rows,
    })))
}

async fn mood_today(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let history = state.history()?;
    let snapshot = state.run(history.today()).await?;
    Ok(Json(json!({"success": true, "data": snapshot})))
}

async fn store_daily(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let history = state.history()?;
    let snapshot = state.run(history.job().store_daily()).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Market mood snapshot stored for {}", snapshot.date),
        "data": snapshot,
    })))
}
