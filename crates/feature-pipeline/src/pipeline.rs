use market_core::{FeatureRow, MarketChart};

use crate::indicators::{rolling_std, simple_returns, sma};

/// Trailing window shared by the moving average and the volatility
/// estimate.
pub const WINDOW: usize = 7;

/// Derive training rows from a daily price series.
///
/// Each row carries the return, the price-to-SMA7 ratio, the rolling
/// standard deviation of the trailing 7 returns, and a binary next-day
/// target. Rows inside the warm-up window and the final observation
/// (whose target is unknowable) are dropped, so an n-point series yields
/// max(0, n - 8) rows. Callers must treat an empty result as unusable
/// for training.
pub fn derive_features(chart: &MarketChart) -> Vec<FeatureRow> {
    let prices: Vec<f64> = chart.prices.iter().map(|p| p.price).collect();
    let n = prices.len();

    let returns = simple_returns(&prices);
    let sma7 = sma(&prices, WINDOW);
    let volatility = rolling_std(&returns, WINDOW);

    if volatility.is_empty() || n < 2 {
        return vec![];
    }

    // Volatility is the tightest constraint: its first defined index is
    // t = WINDOW (the trailing returns window only fills one step after
    // the SMA does). The last row with a defined target is t = n - 2.
    let mut rows = Vec::new();
    for t in WINDOW..n.saturating_sub(1) {
        rows.push(FeatureRow {
            timestamp: chart.prices[t].timestamp,
            returns: returns[t - 1],
            sma_ratio: prices[t] / sma7[t + 1 - WINDOW],
            volatility: volatility[t - WINDOW],
            target: (prices[t + 1] > prices[t]) as u8,
        });
    }
    rows
}
