//! Relative strength index over a fixed trailing window.

/// RSI over the last `period` close-to-close deltas.
///
/// Only the trailing window is used, not the whole history. Returns `50.0`
/// when fewer than `period + 1` closes are available and `100.0` when the
/// window holds no losses. The result is always within `[0, 100]`.
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return 50.0;
    }

    let window = &closes[closes.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(gains, losses), change| {
            if change > 0.0 {
                (gains + change, losses)
            } else {
                (gains, losses + change.abs())
            }
        });

    if losses == 0.0 {
        return 100.0;
    }

    100.0 - 100.0 / (1.0 + gains / losses)
}
