//! Event-driven backtesting engine with realistic execution modeling.
//!
//! The simulator replays a candle series bar by bar against a user strategy:
//! position lifecycle with partial fills at TP1/TP2, stop-first execution
//! priority, adaptive slippage and spread, per-side fees, risk-based sizing,
//! and portfolio risk limits (daily loss, drawdown, leverage, per-asset cap).
//! Post-run analytics produce a full metrics record and a three-artifact
//! tearsheet (JSON, CSV, HTML).
//!
//! # Quick Start
//!
//! ```
//! use signal_forge::backtest::{
//!     BacktestConfig, BacktestEngine, StrategyContext, TradeIntent,
//! };
//! use signal_forge::models::{Candle, Direction};
//!
//! let candles: Vec<Candle> = (0..100)
//!     .map(|i| {
//!         let price = 100.0 + i as f64 * 0.5;
//!         Candle {
//!             timestamp: 1_700_000_000 + i as i64 * 3600,
//!             open: price,
//!             high: price + 1.0,
//!             low: price - 1.0,
//!             close: price,
//!             volume: 1_000.0,
//!         }
//!     })
//!     .collect();
//!
//! let engine = BacktestEngine::new(BacktestConfig::default());
//! let mut entered = false;
//! let result = engine
//!     .run("DEMO", &candles, move |ctx: &StrategyContext| {
//!         if !entered && ctx.index == 20 {
//!             entered = true;
//!             TradeIntent::entry(
//!                 Direction::Buy,
//!                 ctx.close(),
//!                 ctx.close() - 5.0,
//!                 ctx.close() + 10.0,
//!                 ctx.close() + 20.0,
//!             )
//!         } else {
//!             TradeIntent::hold()
//!         }
//!     })
//!     .unwrap();
//!
//! println!("{}", result.summary());
//! assert_eq!(result.equity_curve.len(), 100);
//! ```
//!
//! # Execution semantics
//!
//! Within one bar at most one stop event and one target event can execute,
//! and TP1/TP2 never both fire in the same bar. After TP1 banks half the
//! position, the stop moves to breakeven. Remaining positions are
//! force-closed at the last bar with reason `END`.

mod analytics;
mod config;
mod engine;
mod error;
mod export;
mod position;
mod result;
mod tearsheet;

pub use analytics::{ExitReasonStats, Metrics};
pub use config::{BacktestConfig, BacktestConfigBuilder, ExecutionPriority, PositionMode};
pub use engine::{Account, BacktestEngine, Strategy, StrategyContext, TradeIntent};
pub use error::{BacktestError, Result};
pub use export::{write_equity_csv, write_trades_csv};
pub use position::{ExitReason, Position, PositionStatus};
pub use result::{BacktestResult, EquityPoint};
pub use tearsheet::{Tearsheet, TearsheetArtifacts};
