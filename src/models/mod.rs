//! Data models for assets, candles, and positions.

mod asset;
mod candle;
mod position;

pub use asset::AssetConfig;
pub use candle::Candle;
pub use position::{PositionSide, PositionState};
