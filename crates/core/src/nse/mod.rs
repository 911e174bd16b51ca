pub mod client;
pub mod error;
pub mod types;

use crate::config::Settings;
use crate::nse::error::NseHttpError;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use reqwest::StatusCode;
use std::time::Duration;

pub use client::{NseClient, NseClientConfig};

const DEFAULT_BASE_URL: &str = "https://www.nseindia.com";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Raw HTTP access to the upstream. Session, throttling and retry policy live in
/// [`NseClient`]; implementations only move bytes.
#[async_trait::async_trait]
pub trait NseTransport: Send + Sync {
    /// Loads the homepage and returns every `Set-Cookie` header value it sent.
    async fn visit_homepage(&self) -> anyhow::Result<Vec<String>>;

    /// Issues a GET for an API path. Network failures are `Err`; any HTTP status is `Ok`.
    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        cookie: &str,
    ) -> anyhow::Result<TransportResponse>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings
            .nse_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs =
            crate::config::env_u64("NSE_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let mut headers = HeaderMap::new();
        headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
        headers.insert("Pragma", HeaderValue::from_static("no-cache"));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("failed to build NSE http client")?;

        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait::async_trait]
impl NseTransport for ReqwestTransport {
    async fn visit_homepage(&self) -> anyhow::Result<Vec<String>> {
        let res = self
            .http
            .get(self.url("/"))
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Referer", "https://www.google.com/")
            .send()
            .await
            .context("NSE homepage request failed")?;

        let status = res.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(NseHttpError {
                status,
                path: "/".to_string(),
                body: String::new(),
            }
            .into());
        }

        Ok(res
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect())
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        cookie: &str,
    ) -> anyhow::Result<TransportResponse> {
        let mut req = self
            .http
            .get(self.url(path))
            .query(query)
            .header("Accept", "application/json, text/plain, */*")
            .header("Referer", "https://www.nseindia.com/")
            .header("Sec-Fetch-Dest", "empty")
            .header("Sec-Fetch-Mode", "cors")
            .header("Sec-Fetch-Site", "same-origin");
        if !cookie.is_empty() {
            req = req.header("Cookie", cookie);
        }

        let res = req
            .send()
            .await
            .with_context(|| format!("NSE request {path} failed"))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("failed to read NSE response for {path}"))?;
        Ok(TransportResponse { status, body })
    }
}

/// Joins `Set-Cookie` values into a single `Cookie` header, dropping attributes.
pub fn join_set_cookies(set_cookies: &[String]) -> String {
    set_cookies
        .iter()
        .filter_map(|c| c.split(';').next())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}
