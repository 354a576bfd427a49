use thiserror::Error;

use crate::AssetClass;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Insufficient data: need {needed} values, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Provider error{}: {message}", status_suffix(.status))]
    Provider { status: Option<u16>, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Upstream rate limit exceeded")]
    RateLimitExceeded,

    #[error("No market data provider configured for {0}")]
    NoProvider(AssetClass),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::Provider {
            status,
            message: message.into(),
        }
    }

    /// 429, 5xx and bare transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimitExceeded => true,
            Error::Provider { status: None, .. } => true,
            Error::Provider { status: Some(s), .. } => *s == 429 || (500..600).contains(s),
            _ => false,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            Error::RateLimitExceeded | Error::Provider { status: Some(429), .. }
        )
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
