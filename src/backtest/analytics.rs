//! Post-run metric calculation.
//!
//! Everything is computed from the closed positions and the equity curve;
//! zero-trade runs produce a fully defined record (no NaN anywhere).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::position::Position;
use super::result::EquityPoint;

const HOURS_PER_DAY: f64 = 24.0;
const DAYS_PER_YEAR: f64 = 365.25;

/// Per-exit-reason breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitReasonStats {
    /// Positions that ended with this reason
    pub count: usize,
    /// Mean net PnL of those positions
    pub avg_pnl: f64,
    /// Share of them that were profitable, percent
    pub win_rate_pct: f64,
}

/// The complete metrics record. The serialized form of this struct is the
/// authoritative tearsheet schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    // --- basic ---
    /// Number of closed positions
    pub total_trades: usize,
    /// Positions with positive net PnL
    pub winning_trades: usize,
    /// Positions with negative net PnL
    pub losing_trades: usize,
    /// Winning / total, percent
    pub win_rate_pct: f64,
    /// Sum of net PnL
    pub total_pnl: f64,
    /// Final vs initial capital, percent
    pub total_return_pct: f64,
    /// Mean PnL of winners
    pub avg_win: f64,
    /// Mean PnL of losers (negative)
    pub avg_loss: f64,
    /// Gross profit / |gross loss| (0 with no losers)
    pub profit_factor: f64,
    /// Best single-position PnL
    pub best_trade: f64,
    /// Worst single-position PnL
    pub worst_trade: f64,

    // --- risk-adjusted ---
    /// Annualized Sharpe ratio over per-bar equity returns
    pub sharpe_ratio: f64,
    /// Annualized Sortino ratio (downside deviation denominator)
    pub sortino_ratio: f64,
    /// CAGR / |max drawdown| (0 when drawdown is zero)
    pub calmar_ratio: f64,
    /// Deepest equity drawdown, percent
    pub max_drawdown_pct: f64,
    /// Longest stretch below a prior peak, in days
    pub max_drawdown_duration_days: f64,
    /// Annualized volatility of equity returns, percent
    pub annualized_volatility_pct: f64,
    /// Annualized downside deviation, percent
    pub downside_deviation_pct: f64,

    // --- trade stats ---
    /// Mean holding time, hours
    pub avg_trade_duration_hours: f64,
    /// Median holding time, hours
    pub median_trade_duration_hours: f64,
    /// Positions that banked TP1, percent of all
    pub tp1_hit_rate_pct: f64,
    /// Positions that banked TP2, percent of all
    pub tp2_hit_rate_pct: f64,
    /// Final exit reason histogram
    pub exit_reasons: BTreeMap<String, usize>,
    /// Per-reason PnL breakdown
    pub exit_reason_stats: BTreeMap<String, ExitReasonStats>,
    /// Longest winning streak
    pub max_consecutive_wins: usize,
    /// Longest losing streak
    pub max_consecutive_losses: usize,
    /// `p·avg_win − (1−p)·|avg_loss|`
    pub expectancy: f64,
    /// Time with an open position over the run span, percent
    pub exposure_time_pct: f64,

    // --- advanced ---
    /// Compound annual growth rate, percent
    pub cagr_pct: f64,
    /// Closed positions per year
    pub turnover_per_year: f64,
    /// Net profit / (initial capital × max drawdown fraction)
    pub recovery_factor: f64,
    /// Run length in days
    pub trading_days: f64,
    /// Run length in years
    pub trading_years: f64,

    // --- costs ---
    /// All fees paid
    pub total_fees: f64,
    /// All recorded slippage (price differences, summed)
    pub total_slippage: f64,
    /// Fees + slippage
    pub total_costs: f64,
    /// Total costs as percent of initial capital
    pub cost_drag_pct: f64,
    /// Mean fee per position
    pub avg_fee_per_trade: f64,
    /// Mean slippage per position
    pub avg_slippage_per_trade: f64,

    // --- context ---
    /// Starting capital
    pub initial_capital: f64,
    /// Ending capital
    pub final_capital: f64,
}

impl Metrics {
    /// Compute the full record.
    pub fn calculate(
        positions: &[Position],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        start_timestamp: i64,
        end_timestamp: i64,
    ) -> Self {
        let trading_days =
            ((end_timestamp - start_timestamp).max(0) as f64 / 3600.0 / HOURS_PER_DAY).max(0.0);
        let trading_years = (trading_days / DAYS_PER_YEAR).max(1e-6);

        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);
        let total_return_pct = if initial_capital > 0.0 {
            (final_equity / initial_capital - 1.0) * 100.0
        } else {
            0.0
        };

        let (max_drawdown_pct, max_drawdown_duration_days) =
            drawdown_stats(equity_curve, trading_days);

        let returns = periodic_returns(equity_curve);
        let periods_per_year = if trading_years > 0.0 {
            (returns.len() as f64 / trading_years).max(1.0)
        } else {
            1.0
        };
        let (sharpe_ratio, annualized_volatility_pct) = sharpe(&returns, periods_per_year);
        let (sortino_ratio, downside_deviation_pct) = sortino(&returns, periods_per_year);

        let cagr_pct = cagr(initial_capital, final_equity, trading_years);
        let calmar_ratio = if max_drawdown_pct > 0.0 {
            (cagr_pct / max_drawdown_pct).abs()
        } else {
            0.0
        };

        let mut metrics = Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: 0.0,
            total_pnl: 0.0,
            total_return_pct,
            avg_win: 0.0,
            avg_loss: 0.0,
            profit_factor: 0.0,
            best_trade: 0.0,
            worst_trade: 0.0,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            max_drawdown_pct,
            max_drawdown_duration_days,
            annualized_volatility_pct,
            downside_deviation_pct,
            avg_trade_duration_hours: 0.0,
            median_trade_duration_hours: 0.0,
            tp1_hit_rate_pct: 0.0,
            tp2_hit_rate_pct: 0.0,
            exit_reasons: BTreeMap::new(),
            exit_reason_stats: BTreeMap::new(),
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
            expectancy: 0.0,
            exposure_time_pct: 0.0,
            cagr_pct,
            turnover_per_year: 0.0,
            recovery_factor: 0.0,
            trading_days,
            trading_years,
            total_fees: 0.0,
            total_slippage: 0.0,
            total_costs: 0.0,
            cost_drag_pct: 0.0,
            avg_fee_per_trade: 0.0,
            avg_slippage_per_trade: 0.0,
            initial_capital,
            final_capital: initial_capital,
        };

        if positions.is_empty() {
            metrics.final_capital = final_equity;
            return metrics;
        }

        let total = positions.len();
        let winners: Vec<&Position> = positions.iter().filter(|p| p.pnl > 0.0).collect();
        let losers: Vec<&Position> = positions.iter().filter(|p| p.pnl < 0.0).collect();

        let gross_profit: f64 = winners.iter().map(|p| p.pnl).sum();
        let gross_loss: f64 = losers.iter().map(|p| p.pnl).sum::<f64>().abs();
        let total_pnl: f64 = positions.iter().map(|p| p.pnl).sum();

        metrics.total_trades = total;
        metrics.winning_trades = winners.len();
        metrics.losing_trades = losers.len();
        metrics.win_rate_pct = winners.len() as f64 / total as f64 * 100.0;
        metrics.total_pnl = total_pnl;
        metrics.avg_win = mean(winners.iter().map(|p| p.pnl));
        metrics.avg_loss = mean(losers.iter().map(|p| p.pnl));
        metrics.profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else {
            0.0
        };
        metrics.best_trade = positions.iter().map(|p| p.pnl).fold(f64::MIN, f64::max);
        metrics.worst_trade = positions.iter().map(|p| p.pnl).fold(f64::MAX, f64::min);

        let mut durations: Vec<f64> = positions.iter().map(|p| p.duration_hours()).collect();
        durations.sort_by(|a, b| a.total_cmp(b));
        metrics.avg_trade_duration_hours = mean(durations.iter().copied());
        metrics.median_trade_duration_hours = median(&durations);

        metrics.tp1_hit_rate_pct =
            positions.iter().filter(|p| p.tp1_hit).count() as f64 / total as f64 * 100.0;
        metrics.tp2_hit_rate_pct =
            positions.iter().filter(|p| p.tp2_hit).count() as f64 / total as f64 * 100.0;

        for position in positions {
            if let Some(reason) = position.exit_reason {
                *metrics.exit_reasons.entry(reason.as_str().to_string()).or_insert(0) += 1;
            }
        }
        for (reason, &count) in &metrics.exit_reasons {
            let members: Vec<&Position> = positions
                .iter()
                .filter(|p| p.exit_reason.map(|r| r.as_str()) == Some(reason.as_str()))
                .collect();
            let wins = members.iter().filter(|p| p.pnl > 0.0).count();
            metrics.exit_reason_stats.insert(
                reason.clone(),
                ExitReasonStats {
                    count,
                    avg_pnl: mean(members.iter().map(|p| p.pnl)),
                    win_rate_pct: wins as f64 / count.max(1) as f64 * 100.0,
                },
            );
        }

        let (max_wins, max_losses) = consecutive(positions);
        metrics.max_consecutive_wins = max_wins;
        metrics.max_consecutive_losses = max_losses;

        let p = metrics.win_rate_pct / 100.0;
        metrics.expectancy = p * metrics.avg_win - (1.0 - p) * metrics.avg_loss.abs();

        let exposure_hours: f64 = positions.iter().map(|p| p.duration_hours()).sum();
        if trading_days > 0.0 {
            metrics.exposure_time_pct =
                (exposure_hours / (trading_days * HOURS_PER_DAY) * 100.0).min(100.0);
        }

        metrics.turnover_per_year = total as f64 / trading_years;
        if max_drawdown_pct > 0.0 && initial_capital > 0.0 {
            metrics.recovery_factor = total_pnl / (initial_capital * max_drawdown_pct / 100.0);
        }

        metrics.total_fees = positions.iter().map(|p| p.total_fees).sum();
        metrics.total_slippage = positions
            .iter()
            .map(|p| p.entry_slippage + p.exit_slippage)
            .sum();
        metrics.total_costs = metrics.total_fees + metrics.total_slippage;
        if initial_capital > 0.0 {
            metrics.cost_drag_pct = metrics.total_costs / initial_capital * 100.0;
        }
        metrics.avg_fee_per_trade = metrics.total_fees / total as f64;
        metrics.avg_slippage_per_trade = metrics.total_slippage / total as f64;

        metrics.final_capital = initial_capital + total_pnl;

        metrics
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        0.0
    } else {
        collected.iter().sum::<f64>() / collected.len() as f64
    }
}

fn median(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Per-bar simple returns of the equity curve.
fn periodic_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            if w[0].equity > 0.0 {
                w[1].equity / w[0].equity - 1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Annualized Sharpe ratio and volatility (percent).
fn sharpe(returns: &[f64], periods_per_year: f64) -> (f64, f64) {
    if returns.len() < 2 {
        return (0.0, 0.0);
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();
    let volatility_pct = std_dev * periods_per_year.sqrt() * 100.0;

    if std_dev > 0.0 {
        ((mean / std_dev) * periods_per_year.sqrt(), volatility_pct)
    } else {
        (0.0, volatility_pct)
    }
}

/// Annualized Sortino ratio and downside deviation (percent).
fn sortino(returns: &[f64], periods_per_year: f64) -> (f64, f64) {
    if returns.len() < 2 {
        return (0.0, 0.0);
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;

    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.is_empty() {
        return (0.0, 0.0);
    }
    let downside_mean = downside.iter().sum::<f64>() / downside.len() as f64;
    let downside_var = downside
        .iter()
        .map(|r| (r - downside_mean).powi(2))
        .sum::<f64>()
        / downside.len() as f64;
    let downside_dev = downside_var.sqrt();
    let downside_dev_pct = downside_dev * periods_per_year.sqrt() * 100.0;

    if downside_dev > 0.0 {
        ((mean / downside_dev) * periods_per_year.sqrt(), downside_dev_pct)
    } else {
        (0.0, downside_dev_pct)
    }
}

/// Deepest drawdown (percent) and the longest below-peak stretch (days).
fn drawdown_stats(equity_curve: &[EquityPoint], trading_days: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let max_dd_pct = equity_curve
        .iter()
        .map(|p| p.drawdown_pct)
        .fold(0.0, f64::max);

    let mut max_bars = 0_usize;
    let mut current_bars = 0_usize;
    let mut peak = equity_curve[0].equity;
    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            max_bars = max_bars.max(current_bars);
            current_bars = 0;
        } else {
            current_bars += 1;
        }
    }
    max_bars = max_bars.max(current_bars);

    let days_per_bar = trading_days / equity_curve.len() as f64;
    (max_dd_pct, max_bars as f64 * days_per_bar)
}

fn cagr(initial: f64, fin: f64, years: f64) -> f64 {
    if years <= 0.0 || initial <= 0.0 {
        return 0.0;
    }
    if fin <= 0.0 {
        return -100.0;
    }
    ((fin / initial).powf(1.0 / years) - 1.0) * 100.0
}

fn consecutive(positions: &[Position]) -> (usize, usize) {
    let mut max_wins = 0;
    let mut max_losses = 0;
    let mut wins = 0;
    let mut losses = 0;
    for position in positions {
        if position.pnl > 0.0 {
            wins += 1;
            losses = 0;
            max_wins = max_wins.max(wins);
        } else if position.pnl < 0.0 {
            losses += 1;
            wins = 0;
            max_losses = max_losses.max(losses);
        } else {
            wins = 0;
            losses = 0;
        }
    }
    (max_wins, max_losses)
}
