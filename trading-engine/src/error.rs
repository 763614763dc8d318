//! Error types for the execution engine and its exchange clients.

use thiserror::Error;

/// Failure reported by an exchange client.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("query encoding error: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("exchange error {code}: {message}")]
    Api { code: i64, message: String },

    /// Non-success status without a decodable exchange error body.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("missing API credentials")]
    MissingCredentials,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid order intent: {0}")]
    InvalidIntent(String),

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Multi-order run finished with a mix of placed and failed orders.
    #[error("partial execution: {placed} of {total} orders placed, failed at {failed:?}")]
    PartialExecution {
        total: usize,
        placed: usize,
        failed: Vec<usize>,
    },
}

impl EngineError {
    pub fn invalid_intent(msg: impl Into<String>) -> Self {
        EngineError::InvalidIntent(msg.into())
    }

    pub fn invalid_plan(msg: impl Into<String>) -> Self {
        EngineError::InvalidPlan(msg.into())
    }

    /// Validation failures are raised before anything reaches the exchange.
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::InvalidIntent(_) | EngineError::InvalidPlan(_))
    }
}
