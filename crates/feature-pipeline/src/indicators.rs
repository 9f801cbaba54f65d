/// Period-over-period returns. Output is one element shorter than the
/// input: `result[i]` is the return at observation `i + 1`.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    if prices.len() < 2 {
        return vec![];
    }

    let mut result = Vec::with_capacity(prices.len() - 1);
    for i in 1..prices.len() {
        result.push(prices[i] / prices[i - 1] - 1.0);
    }
    result
}

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result.push(sum / period as f64);
    }
    result
}

/// Rolling sample standard deviation over each fully-populated window.
/// `result[i]` covers `data[i..i + period]`.
pub fn rolling_std(data: &[f64], period: usize) -> Vec<f64> {
    if period < 2 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in 0..=data.len() - period {
        let window = &data[i..i + period];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance =
            window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
        result.push(variance.sqrt());
    }
    result
}
