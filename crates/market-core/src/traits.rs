use async_trait::async_trait;

use crate::{CoinSummary, MarketChart, MarketError};

/// Seam over the upstream market-data API. One attempt per call; every
/// transport or status failure resolves to a typed `MarketError` rather
/// than escaping as a fault.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Top coins by market cap, 100 entries per page, first page.
    async fn fetch_markets(&self) -> Result<Vec<CoinSummary>, MarketError>;

    /// Daily price history for one coin over the given day window.
    async fn fetch_market_chart(&self, coin_id: &str, days: u32)
        -> Result<MarketChart, MarketError>;
}
