use reqwest::StatusCode;
use std::fmt;

/// Non-success HTTP status returned by the upstream exchange site.
#[derive(Debug, Clone)]
pub struct NseHttpError {
    pub status: StatusCode,
    pub path: String,
    pub body: String,
}

impl NseHttpError {
    /// 403/429 are what the upstream answers when it decides a caller looks like a bot.
    pub fn is_blocked(&self) -> bool {
        self.status == StatusCode::FORBIDDEN || self.status == StatusCode::TOO_MANY_REQUESTS
    }
}

impl fmt::Display for NseHttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NSE HTTP {} on {}", self.status, self.path)
    }
}

impl std::error::Error for NseHttpError {}
