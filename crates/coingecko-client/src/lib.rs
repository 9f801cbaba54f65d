use async_trait::async_trait;
use market_core::{CoinSummary, MarketChart, MarketDataSource, MarketError, PricePoint};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Thin client over the CoinGecko REST API. Exactly one request per call,
/// no retry, no backoff; the caller's cache layer owns rate-limit policy.
#[derive(Clone)]
pub struct CoinGeckoClient {
    base_url: String,
    client: Client,
}

impl CoinGeckoClient {
    pub fn new() -> Self {
        let base_url =
            std::env::var("COINGECKO_BASE_URL").unwrap_or_else(|_| BASE_URL.to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { base_url, client }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }
}

impl Default for CoinGeckoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn fetch_markets(&self) -> Result<Vec<CoinSummary>, MarketError> {
        let url = format!("{}/coins/markets", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("vs_currency", "usd"),
                ("order", "market_cap_desc"),
                ("per_page", "100"),
                ("page", "1"),
                ("sparkline", "false"),
            ])
            .send()
            .await
            .map_err(|e| MarketError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 429 {
            tracing::warn!("CoinGecko rate limited the markets listing");
            return Err(MarketError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(MarketError::UpstreamStatus { status });
        }

        response
            .json::<Vec<CoinSummary>>()
            .await
            .map_err(|e| MarketError::Transport(e.to_string()))
    }

    async fn fetch_market_chart(
        &self,
        coin_id: &str,
        days: u32,
    ) -> Result<MarketChart, MarketError> {
        let url = format!("{}/coins/{}/market_chart", self.base_url, coin_id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("vs_currency", "usd"),
                ("days", days.to_string().as_str()),
                ("interval", "daily"),
            ])
            .send()
            .await
            .map_err(|e| MarketError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 429 {
            tracing::warn!("CoinGecko rate limited the chart request for {}", coin_id);
            return Err(MarketError::RateLimited);
        }
        if status == 404 {
            return Err(MarketError::NotFound(coin_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(MarketError::UpstreamStatus { status });
        }

        let chart: MarketChartResponse = response
            .json()
            .await
            .map_err(|e| MarketError::Transport(e.to_string()))?;

        Ok(MarketChart {
            prices: chart
                .prices
                .into_iter()
                .map(|(timestamp, price)| PricePoint { timestamp, price })
                .collect(),
        })
    }
}

// Response structures

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Vec<(i64, f64)>,
}
