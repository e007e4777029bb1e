//! Calculator for session performance: win rate, profit factor, drawdown,
//! return dispersion.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use statrs::statistics::Statistics;

use crate::trading::ClosedPosition;

/// Summary of the trades closed during a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub win_rate: f64,
    pub total_pnl: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub profit_factor: f64,
    /// Mean per-trade return as a fraction of entry notional
    pub mean_return: f64,
    /// Sample standard deviation of per-trade returns
    pub return_std_dev: f64,
    /// Largest peak-to-trough drop of cumulative realized PnL
    pub max_drawdown: Decimal,
}

/// Calculator for [`SessionStats`].
pub struct SessionCalculator;

impl SessionCalculator {
    /// Calculate statistics from closed positions in the order they closed.
    pub fn calculate(trades: &[ClosedPosition]) -> SessionStats {
        let mut stats = SessionStats::default();

        if trades.is_empty() {
            return stats;
        }

        let pnls: Vec<Decimal> = trades.iter().map(|t| t.realized_pnl).collect();
        Self::calculate_pnl_metrics(&mut stats, &pnls);
        Self::calculate_drawdown(&mut stats, &pnls);

        let returns: Vec<f64> = trades
            .iter()
            .filter_map(|t| t.return_pct().to_f64())
            .collect();
        Self::calculate_return_metrics(&mut stats, &returns);

        stats
    }

    fn calculate_pnl_metrics(stats: &mut SessionStats, pnls: &[Decimal]) {
        let (wins, losses): (Vec<Decimal>, Vec<Decimal>) =
            pnls.iter().partition(|&&p| p > Decimal::ZERO);

        stats.total_trades = pnls.len() as u32;
        stats.winning_trades = wins.len() as u32;
        stats.losing_trades = losses.len() as u32;
        stats.total_pnl = pnls.iter().copied().sum();
        stats.win_rate = wins.len() as f64 / pnls.len() as f64;

        if !wins.is_empty() {
            stats.avg_win = wins.iter().copied().sum::<Decimal>() / Decimal::from(wins.len() as u32);
        }
        if !losses.is_empty() {
            stats.avg_loss = losses.iter().map(|l| l.abs()).sum::<Decimal>()
                / Decimal::from(losses.len() as u32);
        }

        let gross_profit: Decimal = wins.iter().copied().sum();
        let gross_loss: Decimal = losses.iter().map(|l| l.abs()).sum();
        if gross_loss > Decimal::ZERO {
            stats.profit_factor =
                gross_profit.to_f64().unwrap_or(0.0) / gross_loss.to_f64().unwrap_or(1.0);
        }
    }

    /// Maximum drawdown of the cumulative PnL curve, starting from zero.
    fn calculate_drawdown(stats: &mut SessionStats, pnls: &[Decimal]) {
        let mut equity = Decimal::ZERO;
        let mut peak = Decimal::ZERO;
        let mut max_dd = Decimal::ZERO;

        for pnl in pnls {
            equity += pnl;
            if equity > peak {
                peak = equity;
            }
            max_dd = max_dd.max(peak - equity);
        }

        stats.max_drawdown = max_dd;
    }

    fn calculate_return_metrics(stats: &mut SessionStats, returns: &[f64]) {
        if returns.is_empty() {
            return;
        }

        stats.mean_return = returns.mean();

        // Sample std-dev is undefined for a single trade
        if returns.len() >= 2 {
            stats.return_std_dev = returns.std_dev();
        }
    }
}

impl std::fmt::Display for SessionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Session Statistics ===")?;
        writeln!(
            f,
            "Closed Trades:   {} (Wins: {}, Losses: {})",
            self.total_trades, self.winning_trades, self.losing_trades
        )?;
        writeln!(f, "Win Rate:        {:.1}%", self.win_rate * 100.0)?;
        writeln!(f, "Realized P&L:    ${:.2}", self.total_pnl)?;
        writeln!(f, "Avg Win:         ${:.2}", self.avg_win)?;
        writeln!(f, "Avg Loss:        ${:.2}", self.avg_loss)?;
        writeln!(f, "Profit Factor:   {:.2}", self.profit_factor)?;
        writeln!(f, "Mean Return:     {:.3}%", self.mean_return * 100.0)?;
        writeln!(f, "Return Std Dev:  {:.3}%", self.return_std_dev * 100.0)?;
        writeln!(f, "Max Drawdown:    ${:.2}", self.max_drawdown)?;
        Ok(())
    }
}
