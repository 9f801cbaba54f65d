use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Rate limited by upstream API. Please wait a moment.")]
    RateLimited,

    #[error("Coin data not found: {0}")]
    NotFound(String),

    #[error("Upstream API returned HTTP {status}")]
    UpstreamStatus { status: u16 },

    #[error("Upstream transport error: {0}")]
    Transport(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Model not trained")]
    ModelUnavailable,

    #[error("Model storage error: {0}")]
    Storage(String),
}
