//! Backtest run output: equity curve and result record.

use serde::{Deserialize, Serialize};

use super::analytics::Metrics;
use super::config::BacktestConfig;
use super::position::Position;

/// One equity observation, appended once per bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    /// Bar timestamp (Unix seconds)
    pub timestamp: i64,
    /// Mark-to-market equity: cash + reserved margin + unrealized PnL
    pub equity: f64,
    /// Free cash
    pub cash: f64,
    /// Margin reserved against open notionals
    pub reserved_margin: f64,
    /// Open positions at this bar
    pub open_positions: usize,
    /// Drawdown from peak equity, percent (never negative)
    pub drawdown_pct: f64,
}

/// Complete result of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Symbol the series belonged to
    pub symbol: String,
    /// Configuration used for the run
    pub config: BacktestConfig,
    /// First bar timestamp
    pub start_timestamp: i64,
    /// Last bar timestamp
    pub end_timestamp: i64,
    /// Starting capital
    pub initial_capital: f64,
    /// Capital after all realized PnL
    pub final_capital: f64,
    /// Computed performance metrics
    pub metrics: Metrics,
    /// All positions, every one closed (END force-close guarantees this),
    /// ordered by open time
    pub positions: Vec<Position>,
    /// One point per bar, strictly monotone in timestamp
    pub equity_curve: Vec<EquityPoint>,
    /// Whether a risk limit disabled trading during the run, with the reason
    pub risk_limit_hit: Option<String>,
}

impl BacktestResult {
    /// Net PnL of the run
    pub fn total_pnl(&self) -> f64 {
        self.final_capital - self.initial_capital
    }

    /// Whether the run ended above its starting capital
    pub fn is_profitable(&self) -> bool {
        self.final_capital > self.initial_capital
    }

    /// Number of bars simulated
    pub fn num_bars(&self) -> usize {
        self.equity_curve.len()
    }

    /// One-paragraph human summary
    pub fn summary(&self) -> String {
        format!(
            "Backtest {}: {} bars, {} trades\n\
             Initial: ${:.2} -> Final: ${:.2} ({:+.2}%)\n\
             Win rate: {:.1}% | Profit factor: {:.2} | Max DD: {:.2}%\n\
             Sharpe: {:.2} | Sortino: {:.2} | Expectancy: ${:.2}",
            self.symbol,
            self.num_bars(),
            self.metrics.total_trades,
            self.initial_capital,
            self.final_capital,
            self.metrics.total_return_pct,
            self.metrics.win_rate_pct,
            self.metrics.profit_factor,
            self.metrics.max_drawdown_pct,
            self.metrics.sharpe_ratio,
            self.metrics.sortino_ratio,
            self.metrics.expectancy,
        )
    }
}
