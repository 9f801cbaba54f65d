use super::indicators::*;

#[test]
fn test_simple_returns_basic() {
    let prices = vec![100.0, 110.0, 99.0];
    let result = simple_returns(&prices);

    assert_eq!(result.len(), 2);
    assert!((result[0] - 0.10).abs() < 1e-12);
    assert!((result[1] - (99.0 / 110.0 - 1.0)).abs() < 1e-12);
}

#[test]
fn test_simple_returns_too_short() {
    assert!(simple_returns(&[100.0]).is_empty());
    assert!(simple_returns(&[]).is_empty());
}

#[test]
fn test_sma_basic() {
    let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
    let result = sma(&data, 3);

    assert_eq!(result.len(), 3);
    assert!((result[0] - 2.0).abs() < 0.001); // (1+2+3)/3 = 2
    assert!((result[1] - 3.0).abs() < 0.001); // (2+3+4)/3 = 3
    assert!((result[2] - 4.0).abs() < 0.001); // (3+4+5)/3 = 4
}

#[test]
fn test_sma_insufficient_data() {
    let data = vec![1.0, 2.0];
    let result = sma(&data, 5);

    assert_eq!(result.len(), 0);
}

#[test]
fn test_rolling_std_constant_series_is_zero() {
    let data = vec![5.0; 10];
    let result = rolling_std(&data, 7);

    assert_eq!(result.len(), 4);
    assert!(result.iter().all(|v| v.abs() < 1e-12));
}

#[test]
fn test_rolling_std_known_window() {
    // Sample std of [2, 4, 4, 4, 5, 5, 7] is sqrt(16/7): the squared
    // deviations sum to 96/7 and the sample divisor is 6.
    let data = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0];
    let result = rolling_std(&data, 7);

    assert_eq!(result.len(), 1);
    assert!((result[0] - (16.0f64 / 7.0).sqrt()).abs() < 1e-12);
}

#[test]
fn test_rolling_std_insufficient_data() {
    assert!(rolling_std(&[1.0, 2.0, 3.0], 7).is_empty());
    assert!(rolling_std(&[1.0], 1).is_empty());
}
