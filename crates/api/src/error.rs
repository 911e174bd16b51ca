use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Handler failure, rendered as `{success: false, error, ...}`.
#[derive(Debug)]
pub enum ApiError {
    Timeout,
    NoDatabase,
    BadRequest(String),
    Internal { err: anyhow::Error, expose: bool },
}

impl ApiError {
    /// Upstream deadlines inside the core surface as timeouts too, not as generic failures.
    pub fn from_anyhow(err: anyhow::Error, expose: bool) -> Self {
        if err.chain().any(|e| e.is::<tokio::time::error::Elapsed>()) {
            tracing::warn!(error = %format!("{err:#}"), "request hit an upstream deadline");
            return Self::Timeout;
        }
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "request failed");
        Self::Internal { err, expose }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Timeout => (
                StatusCode::REQUEST_TIMEOUT,
                json!({"success": false, "error": "Request timed out"}),
            ),
            Self::NoDatabase => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({"success": false, "error": "Snapshot storage is not configured"}),
            ),
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({"success": false, "error": msg}),
            ),
            Self::Internal { err, expose } => {
                let mut body = json!({"success": false, "error": "Internal server error"});
                if expose {
                    body["details"] = json!(format!("{err:#}"));
                }
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn elapsed_anywhere_in_chain_is_a_timeout() {
        let res = tokio::time::timeout(Duration::from_millis(1), std::future::pending::<()>())
            .await
            .context("market intelligence timed out");
        let err = ApiError::from_anyhow(res.unwrap_err(), false);
        assert!(matches!(err, ApiError::Timeout));
        assert_eq!(err.into_response().status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn hides_details_outside_development() {
        let err = ApiError::from_anyhow(anyhow::anyhow!("db down"), false);
        assert!(matches!(err, ApiError::Internal { expose: false, .. }));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
