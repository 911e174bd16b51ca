use anyhow::Context;
use clap::Parser;
use marketmood_core::market::MarketDataService;
use marketmood_core::mood::{DailyScheduler, MoodJob};
use marketmood_core::storage::{PgSnapshotStore, SnapshotStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "marketmood_worker")]
struct Args {
    /// Store today's snapshot (IST) once and exit instead of running the daily schedule.
    #[arg(long)]
    once: bool,

    /// Compute and print today's market mood without touching the database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = marketmood_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let market = MarketDataService::from_settings(&settings)?;

    if args.dry_run {
        let intel = market.intelligence(settings.intelligence_timeout).await?;
        let today = marketmood_core::time::in_market::today_ist(chrono::Utc::now())?;
        let snapshot = intel.snapshot(today);
        tracing::info!(
            date = %snapshot.date,
            score = snapshot.sentiment_score,
            label = snapshot.sentiment_label.as_str(),
            dry_run = true,
            "computed market mood"
        );
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    marketmood_core::storage::migrate(&pool).await?;

    let store: Arc<dyn SnapshotStore> = Arc::new(PgSnapshotStore::new(pool));
    let job = Arc::new(MoodJob::new(market, store, settings.intelligence_timeout));

    if args.once {
        match job.store_daily().await {
            Ok(snapshot) => {
                tracing::info!(date = %snapshot.date, id = %snapshot.id, "market mood snapshot stored");
            }
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                return Err(err);
            }
        }
        return Ok(());
    }

    DailyScheduler::from_settings(job, &settings)?
        .run(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &marketmood_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(settings.app_env.clone().into()),
            ..Default::default()
        },
    )))
}
