//! # signal-forge
//!
//! A multi-asset trading signal engine and backtesting platform.
//!
//! The crate has three tightly coupled subsystems:
//!
//! - **Signal pipeline**: multi-timeframe indicator computation, a strict
//!   multi-criteria filter, a cross-asset regime adjuster, an ML validation
//!   layer, and an execution planner producing tranched entries with staged
//!   targets.
//! - **Backtest engine**: an event-driven bar-by-bar simulator with partial
//!   fills, stop-first execution priority, adaptive slippage/spread/fees,
//!   risk-based sizing, and portfolio risk limits.
//! - **Backtest analytics**: the post-run metric calculator and tearsheet
//!   generator (JSON, CSV, HTML).
//!
//! ## Generating a live signal
//!
//! ```no_run
//! use signal_forge::{DefaultSignalEngine, EngineConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DefaultSignalEngine::from_config(EngineConfig::default())?;
//! let signal = engine.generate_signal("BTCUSDT").await?;
//!
//! println!("{} {} ({:.0}% confidence)", signal.symbol, signal.direction, signal.confidence_pct);
//! for criterion in &signal.diagnostics.criteria {
//!     println!("  [{}] {}: {}", if criterion.passed { "OK" } else { "--" }, criterion.name, criterion.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Running a backtest
//!
//! See the [`backtest`] module for the engine, configuration, and tearsheet
//! APIs.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Backtesting engine, analytics, and tearsheets
pub mod backtest;
/// Engine configuration and per-symbol profiles
pub mod config;
/// Injected capabilities: clock, cache, rate limiting
pub mod context;
/// Error types and result definitions
pub mod error;
/// The multi-criteria signal filter
pub mod filter;
/// Technical indicators
pub mod indicators;
/// ML validation layer
pub mod ml;
/// Core data records
pub mod models;
/// Execution planning
pub mod planner;
/// The live signal pipeline
pub mod pipeline;
/// Market and auxiliary data providers
pub mod providers;
/// Token bucket rate limiting
pub mod rate_limiter;
/// Correlation regime analysis
pub mod regime;

// Re-export the main entry points
pub use config::{EngineConfig, SymbolProfile};
pub use error::{EngineError, Result};
pub use models::{Candle, Direction, FilterDecision, MtfView, Series, Signal, Timeframe};
pub use pipeline::{DefaultSignalEngine, Evaluation, SignalEngine};
