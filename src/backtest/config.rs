//! Backtest configuration and builder.

use serde::{Deserialize, Serialize};

use super::error::{BacktestError, Result};

/// How simultaneous exposure on one symbol is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionMode {
    /// One net direction per symbol; opposing signals are skipped
    Netting,
    /// Long and short positions may coexist on the same symbol
    Hedging,
}

/// Intra-bar event ordering when both stop and target are touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionPriority {
    /// Check stops before targets (conservative)
    StopLossFirst,
    /// Check targets before stops; a filled target suppresses the stop for
    /// the rest of the bar
    TakeProfitFirst,
    /// Process positions strictly by entry time, stop first within each
    Fifo,
}

/// Configuration for backtest execution.
///
/// Use `BacktestConfig::builder()` to construct with the builder pattern.
///
/// # Example
///
/// ```
/// use signal_forge::backtest::BacktestConfig;
///
/// let config = BacktestConfig::builder()
///     .initial_capital(10_000.0)
///     .risk_per_trade(0.01)
///     .max_daily_loss_pct(50.0)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Starting cash and capital
    pub initial_capital: f64,
    /// Fraction of capital risked per position
    pub risk_per_trade: f64,
    /// Baseline slippage as a fraction of price
    pub slippage_base: f64,
    /// Full quoted spread; half is applied on each side
    pub bid_ask_spread: f64,
    /// Entry-side fee fraction of notional
    pub fee_entry: f64,
    /// Exit-side fee fraction of notional
    pub fee_exit: f64,
    /// Bars used to estimate volatility for adaptive slippage
    pub volatility_lookback: usize,
    /// Portfolio-wide cap on open positions
    pub max_concurrent_trades: usize,
    /// Per-symbol cap on open positions
    pub max_positions_per_symbol: usize,
    /// Netting or hedging exposure model
    pub position_mode: PositionMode,
    /// Intra-bar stop/target ordering
    pub execution_priority: ExecutionPriority,
    /// Kill switch: day-cumulative realized loss as percent of initial capital
    pub max_daily_loss_pct: Option<f64>,
    /// Kill switch: drawdown from peak equity, percent
    pub max_drawdown_pct: Option<f64>,
    /// Cap on position notional versus capital
    pub max_leverage: Option<f64>,
    /// Cap on the risk budget per symbol, fraction of capital
    pub per_asset_cap_pct: Option<f64>,
    /// Size from ATR × factor instead of the signal's stop distance
    pub use_atr_sizing: bool,
    /// ATR period for ATR-based sizing
    pub atr_period: usize,
    /// ATR multiplier for ATR-based sizing
    pub atr_factor: f64,
    /// Recorded for reproducibility bookkeeping; the simulator itself is
    /// deterministic and consumes no randomness
    pub random_seed: Option<u64>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            risk_per_trade: 0.01,
            slippage_base: 0.0005,
            bid_ask_spread: 0.0002,
            fee_entry: 0.001,
            fee_exit: 0.001,
            volatility_lookback: 20,
            max_concurrent_trades: 1,
            max_positions_per_symbol: 1,
            position_mode: PositionMode::Netting,
            execution_priority: ExecutionPriority::StopLossFirst,
            max_daily_loss_pct: None,
            max_drawdown_pct: None,
            max_leverage: None,
            per_asset_cap_pct: None,
            use_atr_sizing: false,
            atr_period: 14,
            atr_factor: 1.0,
            random_seed: None,
        }
    }
}

impl BacktestConfig {
    /// Frictionless configuration: no slippage, spread, or fees. Unit tests
    /// and benchmark baselines.
    pub fn zero_cost() -> Self {
        Self {
            slippage_base: 0.0,
            bid_ask_spread: 0.0,
            fee_entry: 0.0,
            fee_exit: 0.0,
            ..Default::default()
        }
    }

    /// Create a new builder
    pub fn builder() -> BacktestConfigBuilder {
        BacktestConfigBuilder::default()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.initial_capital <= 0.0 {
            return Err(BacktestError::invalid_param(
                "initial_capital",
                "must be positive",
            ));
        }
        if self.risk_per_trade <= 0.0 || self.risk_per_trade > 1.0 {
            return Err(BacktestError::invalid_param(
                "risk_per_trade",
                "must be in (0.0, 1.0]",
            ));
        }
        for (name, value) in [
            ("slippage_base", self.slippage_base),
            ("bid_ask_spread", self.bid_ask_spread),
            ("fee_entry", self.fee_entry),
            ("fee_exit", self.fee_exit),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(BacktestError::invalid_param(name, "must be in [0.0, 1.0)"));
            }
        }
        if self.volatility_lookback < 2 {
            return Err(BacktestError::invalid_param(
                "volatility_lookback",
                "must be at least 2",
            ));
        }
        if self.max_concurrent_trades == 0 {
            return Err(BacktestError::invalid_param(
                "max_concurrent_trades",
                "must be at least 1",
            ));
        }
        if self.max_positions_per_symbol == 0 {
            return Err(BacktestError::invalid_param(
                "max_positions_per_symbol",
                "must be at least 1",
            ));
        }
        if let Some(pct) = self.max_daily_loss_pct {
            if pct <= 0.0 || pct > 100.0 {
                return Err(BacktestError::invalid_param(
                    "max_daily_loss_pct",
                    "must be in (0, 100]",
                ));
            }
        }
        if let Some(pct) = self.max_drawdown_pct {
            if pct <= 0.0 || pct > 100.0 {
                return Err(BacktestError::invalid_param(
                    "max_drawdown_pct",
                    "must be in (0, 100]",
                ));
            }
        }
        if let Some(lev) = self.max_leverage {
            if lev <= 0.0 {
                return Err(BacktestError::invalid_param(
                    "max_leverage",
                    "must be positive",
                ));
            }
        }
        if let Some(cap) = self.per_asset_cap_pct {
            if cap <= 0.0 || cap > 1.0 {
                return Err(BacktestError::invalid_param(
                    "per_asset_cap_pct",
                    "must be in (0.0, 1.0]",
                ));
            }
        }
        if self.use_atr_sizing && self.atr_period == 0 {
            return Err(BacktestError::invalid_param(
                "atr_period",
                "must be positive when ATR sizing is enabled",
            ));
        }
        if self.atr_factor <= 0.0 {
            return Err(BacktestError::invalid_param(
                "atr_factor",
                "must be positive",
            ));
        }
        Ok(())
    }

    /// Adaptive slippage fraction for one fill.
    ///
    /// `slippage_base · (1 + 10σ) · order_type_factor`, where market orders
    /// carry a 1.5× factor and resting limit orders 0.5×.
    pub fn adaptive_slippage(&self, volatility: f64, is_market_order: bool) -> f64 {
        let volatility_multiplier = 1.0 + volatility * 10.0;
        let order_type_factor = if is_market_order { 1.5 } else { 0.5 };
        self.slippage_base * volatility_multiplier * order_type_factor
    }

    /// Execution price and recorded slippage for a fill at `reference`.
    ///
    /// `buying` is the side of THIS fill (a long entry and a short cover both
    /// buy). The half-spread moves the price against the fill, then adaptive
    /// slippage is applied on top. The returned slippage amount is the price
    /// difference versus the reference.
    pub fn execution_price(
        &self,
        reference: f64,
        buying: bool,
        volatility: f64,
        is_market_order: bool,
    ) -> (f64, f64) {
        let half_spread = self.bid_ask_spread / 2.0;
        let slippage_pct = self.adaptive_slippage(volatility, is_market_order);

        let final_price = if buying {
            reference * (1.0 + half_spread) * (1.0 + slippage_pct)
        } else {
            reference * (1.0 - half_spread) * (1.0 - slippage_pct)
        };

        (final_price, (final_price - reference).abs())
    }

    /// Per-side fee on a notional value.
    pub fn fee(&self, notional: f64, is_entry: bool) -> f64 {
        let rate = if is_entry { self.fee_entry } else { self.fee_exit };
        notional.abs() * rate
    }
}

/// Builder for BacktestConfig
#[derive(Default)]
pub struct BacktestConfigBuilder {
    config: BacktestConfig,
}

impl BacktestConfigBuilder {
    /// Set starting capital
    pub fn initial_capital(mut self, capital: f64) -> Self {
        self.config.initial_capital = capital;
        self
    }

    /// Set the fraction of capital risked per position
    pub fn risk_per_trade(mut self, fraction: f64) -> Self {
        self.config.risk_per_trade = fraction;
        self
    }

    /// Set baseline slippage fraction
    pub fn slippage_base(mut self, fraction: f64) -> Self {
        self.config.slippage_base = fraction;
        self
    }

    /// Set the quoted bid/ask spread fraction
    pub fn bid_ask_spread(mut self, fraction: f64) -> Self {
        self.config.bid_ask_spread = fraction;
        self
    }

    /// Set the entry-side fee fraction
    pub fn fee_entry(mut self, fraction: f64) -> Self {
        self.config.fee_entry = fraction;
        self
    }

    /// Set the exit-side fee fraction
    pub fn fee_exit(mut self, fraction: f64) -> Self {
        self.config.fee_exit = fraction;
        self
    }

    /// Set both fee sides at once
    pub fn fee(mut self, fraction: f64) -> Self {
        self.config.fee_entry = fraction;
        self.config.fee_exit = fraction;
        self
    }

    /// Set the volatility estimation lookback
    pub fn volatility_lookback(mut self, bars: usize) -> Self {
        self.config.volatility_lookback = bars;
        self
    }

    /// Set the portfolio-wide open position cap
    pub fn max_concurrent_trades(mut self, count: usize) -> Self {
        self.config.max_concurrent_trades = count;
        self
    }

    /// Set the per-symbol open position cap
    pub fn max_positions_per_symbol(mut self, count: usize) -> Self {
        self.config.max_positions_per_symbol = count;
        self
    }

    /// Set the exposure model
    pub fn position_mode(mut self, mode: PositionMode) -> Self {
        self.config.position_mode = mode;
        self
    }

    /// Set intra-bar stop/target ordering
    pub fn execution_priority(mut self, priority: ExecutionPriority) -> Self {
        self.config.execution_priority = priority;
        self
    }

    /// Set the daily loss kill switch, percent of initial capital
    pub fn max_daily_loss_pct(mut self, pct: f64) -> Self {
        self.config.max_daily_loss_pct = Some(pct);
        self
    }

    /// Set the drawdown kill switch, percent from peak equity
    pub fn max_drawdown_pct(mut self, pct: f64) -> Self {
        self.config.max_drawdown_pct = Some(pct);
        self
    }

    /// Set the leverage cap
    pub fn max_leverage(mut self, leverage: f64) -> Self {
        self.config.max_leverage = Some(leverage);
        self
    }

    /// Set the per-symbol risk budget cap, fraction of capital
    pub fn per_asset_cap_pct(mut self, fraction: f64) -> Self {
        self.config.per_asset_cap_pct = Some(fraction);
        self
    }

    /// Enable ATR-based stop distance for sizing
    pub fn use_atr_sizing(mut self, enabled: bool) -> Self {
        self.config.use_atr_sizing = enabled;
        self
    }

    /// Set the ATR period for sizing
    pub fn atr_period(mut self, period: usize) -> Self {
        self.config.atr_period = period;
        self
    }

    /// Set the ATR multiplier for sizing
    pub fn atr_factor(mut self, factor: f64) -> Self {
        self.config.atr_factor = factor;
        self
    }

    /// Record a seed for reproducibility bookkeeping
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = Some(seed);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<BacktestConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
