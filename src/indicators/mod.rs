//! Trend and momentum indicators over closing prices.
//!
//! Both functions return a sentinel instead of failing when the history is too
//! short: `0.0` for [`ema`], `50.0` for [`rsi`]. Callers gate on a minimum
//! history length before reading either value as a signal.

mod ema;
mod rsi;

pub use ema::ema;
pub use rsi::rsi;
