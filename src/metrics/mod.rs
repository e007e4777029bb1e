//! Session statistics over realized trades.

mod calculator;

pub use calculator::{SessionCalculator, SessionStats};
