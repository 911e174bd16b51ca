pub mod domain;
pub mod market;
pub mod mood;
pub mod nse;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub app_env: String,
        pub nse_base_url: Option<String>,
        pub ticker_ttl: Duration,
        pub intelligence_timeout: Duration,
        pub request_timeout: Duration,
        pub daily_at: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                app_env: std::env::var("APP_ENV").unwrap_or_else(|_| "production".to_string()),
                nse_base_url: std::env::var("NSE_BASE_URL").ok(),
                ticker_ttl: Duration::from_secs(env_u64("MARKET_TICKER_TTL_SECS")?.unwrap_or(60)),
                intelligence_timeout: Duration::from_secs(
                    env_u64("MARKET_INTELLIGENCE_TIMEOUT_SECS")?.unwrap_or(20),
                ),
                request_timeout: Duration::from_secs(
                    env_u64("API_REQUEST_TIMEOUT_SECS")?.unwrap_or(25),
                ),
                daily_at: std::env::var("MARKET_MOOD_DAILY_AT")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn is_development(&self) -> bool {
            self.app_env.eq_ignore_ascii_case("development")
        }
    }

    /// Reads an optional numeric env var; a present but malformed value is an error.
    pub(crate) fn env_u64(key: &str) -> anyhow::Result<Option<u64>> {
        match std::env::var(key) {
            Ok(v) if !v.trim().is_empty() => v
                .trim()
                .parse::<u64>()
                .map(Some)
                .with_context(|| format!("{key} must be an unsigned integer (got {v:?})")),
            _ => Ok(None),
        }
    }
}
