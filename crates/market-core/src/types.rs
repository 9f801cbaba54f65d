use serde::{Deserialize, Serialize};

/// Single observation in a daily price series. Timestamps are epoch
/// milliseconds as delivered by the upstream API; insertion order is
/// chronological and duplicates pass through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
}

/// Daily price history for one coin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketChart {
    pub prices: Vec<PricePoint>,
}

impl MarketChart {
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Closing price of the most recent observation.
    pub fn latest_price(&self) -> Option<f64> {
        self.prices.last().map(|p| p.price)
    }
}

/// One entry of the top-100 market listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinSummary {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
}

/// Fully-derived training row. Rows that would carry an undefined value
/// (warm-up window, final observation) never leave the feature pipeline,
/// so every field here is populated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: i64,
    pub returns: f64,
    pub sma_ratio: f64,
    pub volatility: f64,
    pub target: u8,
}

impl FeatureRow {
    /// Classifier input vector, in training column order.
    pub fn features(&self) -> [f64; 3] {
        [self.returns, self.sma_ratio, self.volatility]
    }
}

/// Directional label for the next observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "Rise")]
    Rise,
    #[serde(rename = "Fall/Stable")]
    FallOrStable,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Rise => write!(f, "Rise"),
            Direction::FallOrStable => write!(f, "Fall/Stable"),
        }
    }
}

/// Result of a full analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinAnalysis {
    pub coin: String,
    pub current_price: f64,
    pub prediction: Direction,
    pub confidence: String,
    pub disclaimer: String,
}
