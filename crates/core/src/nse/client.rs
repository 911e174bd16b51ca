use crate::config::env_u64;
use crate::nse::error::NseHttpError;
use crate::nse::{join_set_cookies, NseTransport};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const DEFAULT_THROTTLE_MS: u64 = 300;
const DEFAULT_COOKIE_REFRESH_SECS: u64 = 4 * 60;
const DEFAULT_RETRY_BASE_MS: u64 = 1500;
const DEFAULT_MAX_ATTEMPTS: u64 = 3;

#[derive(Debug, Clone)]
pub struct NseClientConfig {
    pub throttle: Duration,
    pub cookie_refresh: Duration,
    pub retry_base: Duration,
    pub max_attempts: u32,
}

impl Default for NseClientConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(DEFAULT_THROTTLE_MS),
            cookie_refresh: Duration::from_secs(DEFAULT_COOKIE_REFRESH_SECS),
            retry_base: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS as u32,
        }
    }
}

impl NseClientConfig {
    pub fn from_env() -> Result<Self> {
        let max_attempts = env_u64("NSE_MAX_ATTEMPTS")?.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        anyhow::ensure!(
            (1..=10).contains(&max_attempts),
            "NSE_MAX_ATTEMPTS must be 1..=10 (got {max_attempts})"
        );

        Ok(Self {
            throttle: Duration::from_millis(
                env_u64("NSE_THROTTLE_MS")?.unwrap_or(DEFAULT_THROTTLE_MS),
            ),
            cookie_refresh: Duration::from_secs(
                env_u64("NSE_COOKIE_REFRESH_SECS")?.unwrap_or(DEFAULT_COOKIE_REFRESH_SECS),
            ),
            retry_base: Duration::from_millis(
                env_u64("NSE_RETRY_BASE_MS")?.unwrap_or(DEFAULT_RETRY_BASE_MS),
            ),
            max_attempts: max_attempts as u32,
        })
    }
}

#[derive(Debug, Default)]
struct SessionState {
    cookie: String,
    captured_at: Option<Instant>,
}

impl SessionState {
    fn is_fresh(&self, refresh_every: Duration) -> bool {
        match self.captured_at {
            Some(at) => !self.cookie.is_empty() && at.elapsed() <= refresh_every,
            None => false,
        }
    }
}

/// Session-aware client for the exchange website.
///
/// One instance per process: it owns the session cookie and the request throttle, so every
/// caller must share it (wrap in `Arc`).
pub struct NseClient {
    transport: Arc<dyn NseTransport>,
    config: NseClientConfig,

    // Held across the homepage visit so concurrent refreshes collapse into one.
    session: Mutex<SessionState>,

    // Earliest instant the next request may leave.
    next_slot: Mutex<Option<Instant>>,
}

impl NseClient {
    pub fn new(transport: Arc<dyn NseTransport>, config: NseClientConfig) -> Self {
        Self {
            transport,
            config,
            session: Mutex::new(SessionState::default()),
            next_slot: Mutex::new(None),
        }
    }

    /// Returns a usable cookie header, visiting the homepage first if the held cookie is
    /// missing or older than the refresh interval. Refresh failures are logged, not raised:
    /// some endpoints answer without a session.
    pub async fn ensure_session(&self) -> String {
        let mut guard = self.session.lock().await;
        if guard.is_fresh(self.config.cookie_refresh) {
            return guard.cookie.clone();
        }

        match self.transport.visit_homepage().await {
            Ok(set_cookies) => {
                let cookie = join_set_cookies(&set_cookies);
                if cookie.is_empty() {
                    tracing::warn!("NSE homepage returned no cookies");
                } else {
                    guard.cookie = cookie;
                    guard.captured_at = Some(Instant::now());
                    tracing::info!(cookies = set_cookies.len(), "NSE session refreshed");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "NSE session refresh failed; continuing with held cookies");
            }
        }

        guard.cookie.clone()
    }

    /// Drops the held session, but only if it is still the one the caller used. A caller that
    /// was rejected with an old cookie must not discard a session another task just renewed.
    pub async fn invalidate_session(&self, used_cookie: &str) {
        let mut guard = self.session.lock().await;
        if guard.cookie == used_cookie {
            guard.cookie.clear();
            guard.captured_at = None;
        }
    }

    async fn throttle(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.config.throttle);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }

    /// Throttled GET returning the parsed JSON body.
    ///
    /// 403/429 invalidate the session, renew it and retry with exponential backoff up to
    /// `max_attempts` total. Every other failure is returned as-is on the first occurrence.
    pub async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let mut cookie = self.ensure_session().await;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.throttle().await;

            let res = self.transport.get(path, query, &cookie).await?;
            if res.status.is_success() {
                return serde_json::from_str(&res.body)
                    .with_context(|| format!("NSE {path} returned invalid JSON"));
            }

            let err = NseHttpError {
                status: res.status,
                path: path.to_string(),
                body: truncate(&res.body, 512),
            };
            if !err.is_blocked() || attempt >= self.config.max_attempts {
                return Err(err.into());
            }

            let backoff = self.config.retry_base * 2u32.pow(attempt - 1);
            tracing::warn!(
                attempt,
                max_attempts = self.config.max_attempts,
                ?backoff,
                http_status = %res.status,
                path,
                "NSE blocked request; renewing session and retrying"
            );

            self.invalidate_session(&cookie).await;
            cookie = self.ensure_session().await;
            tokio::time::sleep(backoff).await;
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let value = self.get_json(path, query).await?;
        serde_json::from_value(value).with_context(|| format!("unexpected NSE payload shape for {path}"))
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nse::TransportResponse;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct ScriptedTransport {
        statuses: std::sync::Mutex<VecDeque<u16>>,
        homepage_calls: AtomicUsize,
        homepage_fails: bool,
        homepage_delay: Duration,
        seen: std::sync::Mutex<Vec<(Instant, String)>>,
    }

    impl ScriptedTransport {
        fn with_statuses(statuses: &[u16]) -> Self {
            Self {
                statuses: std::sync::Mutex::new(statuses.iter().copied().collect()),
                ..Default::default()
            }
        }

        fn homepage_calls(&self) -> usize {
            self.homepage_calls.load(Ordering::SeqCst)
        }

        fn seen(&self) -> Vec<(Instant, String)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl NseTransport for ScriptedTransport {
        async fn visit_homepage(&self) -> anyhow::Result<Vec<String>> {
            let n = self.homepage_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.homepage_delay.is_zero() {
                tokio::time::sleep(self.homepage_delay).await;
            }
            if self.homepage_fails {
                anyhow::bail!("homepage unreachable");
            }
            Ok(vec![
                format!("nsit=session{n}; Path=/; HttpOnly"),
                "bm_sv=x; Path=/".to_string(),
            ])
        }

        async fn get(
            &self,
            _path: &str,
            _query: &[(&str, &str)],
            cookie: &str,
        ) -> anyhow::Result<TransportResponse> {
            self.seen
                .lock()
                .unwrap()
                .push((Instant::now(), cookie.to_string()));
            let status = self.statuses.lock().unwrap().pop_front().unwrap_or(200);
            Ok(TransportResponse {
                status: StatusCode::from_u16(status)?,
                body: r#"{"ok":true}"#.to_string(),
            })
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> NseClient {
        NseClient::new(transport, NseClientConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn retries_blocked_responses_with_fresh_session() {
        let transport = Arc::new(ScriptedTransport::with_statuses(&[403, 403, 200]));
        let client = client(transport.clone());

        let started = Instant::now();
        let body = client.get_json("/api/allIndices", &[]).await.unwrap();
        assert_eq!(body["ok"], true);

        let seen = transport.seen();
        assert_eq!(seen.len(), 3);
        assert_eq!(transport.homepage_calls(), 3);
        assert_eq!(seen[0].1, "nsit=session1; bm_sv=x");
        assert_eq!(seen[1].1, "nsit=session2; bm_sv=x");
        assert_eq!(seen[2].1, "nsit=session3; bm_sv=x");

        // 1.5s after the first rejection, 3s after the second.
        assert!(seen[1].0 - seen[0].0 >= Duration::from_millis(1500));
        assert!(seen[2].0 - seen[1].0 >= Duration::from_millis(3000));
        assert!(started.elapsed() >= Duration::from_millis(4500));
    }

    #[tokio::test(start_paused = true)]
    async fn surfaces_last_block_after_attempts_exhausted() {
        let transport = Arc::new(ScriptedTransport::with_statuses(&[429, 429, 429, 200]));
        let client = client(transport.clone());

        let err = client.get_json("/api/marketStatus", &[]).await.unwrap_err();
        let http = err.downcast_ref::<NseHttpError>().unwrap();
        assert_eq!(http.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(transport.seen().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_server_errors() {
        let transport = Arc::new(ScriptedTransport::with_statuses(&[503, 200]));
        let client = client(transport.clone());

        let err = client.get_json("/api/allIndices", &[]).await.unwrap_err();
        let http = err.downcast_ref::<NseHttpError>().unwrap();
        assert_eq!(http.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!http.is_blocked());
        assert_eq!(transport.seen().len(), 1);
        assert_eq!(transport.homepage_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reuses_session_until_refresh_interval() {
        let transport = Arc::new(ScriptedTransport::default());
        let client = client(transport.clone());

        client.get_json("/a", &[]).await.unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;
        client.get_json("/b", &[]).await.unwrap();
        assert_eq!(transport.homepage_calls(), 1);

        tokio::time::advance(Duration::from_secs(121)).await;
        client.get_json("/c", &[]).await.unwrap();
        assert_eq!(transport.homepage_calls(), 2);
        assert_eq!(transport.seen()[2].1, "nsit=session2; bm_sv=x");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_share_one_homepage_visit() {
        let transport = Arc::new(ScriptedTransport {
            homepage_delay: Duration::from_millis(500),
            ..Default::default()
        });
        let client = Arc::new(client(transport.clone()));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.ensure_session().await })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap(), "nsit=session1; bm_sv=x");
        }
        assert_eq!(transport.homepage_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_invalidation_keeps_renewed_session() {
        let transport = Arc::new(ScriptedTransport::default());
        let client = client(transport.clone());

        let old = client.ensure_session().await;
        client.invalidate_session(&old).await;
        let renewed = client.ensure_session().await;
        assert_ne!(old, renewed);

        client.invalidate_session(&old).await;
        assert_eq!(client.ensure_session().await, renewed);
        assert_eq!(transport.homepage_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn proceeds_without_cookie_when_refresh_fails() {
        let transport = Arc::new(ScriptedTransport {
            homepage_fails: true,
            ..Default::default()
        });
        let client = client(transport.clone());

        client.get_json("/api/allIndices", &[]).await.unwrap();
        assert_eq!(transport.seen()[0].1, "");
    }

    #[tokio::test(start_paused = true)]
    async fn spaces_requests_by_throttle_gap() {
        let transport = Arc::new(ScriptedTransport::default());
        let client = client(transport.clone());

        for _ in 0..3 {
            client.get_json("/api/allIndices", &[]).await.unwrap();
        }
        let seen = transport.seen();
        assert!(seen[1].0 - seen[0].0 >= Duration::from_millis(300));
        assert!(seen[2].0 - seen[1].0 >= Duration::from_millis(300));
    }
}
