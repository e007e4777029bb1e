//! Exponential moving average.

/// Exponential moving average of `prices` with smoothing `k = 2/(period+1)`.
///
/// Seeded with the first element, then `ema = price*k + ema*(1-k)` over the
/// rest of the series in order. Returns `0.0` when fewer than `period` prices
/// are available.
pub fn ema(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period {
        return 0.0;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = prices[0];
    for &price in &prices[1..] {
        ema = price * k + ema * (1.0 - k);
    }
    ema
}
