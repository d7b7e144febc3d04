//! Position lifecycle: open, partial closes, full close.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{BacktestError, Result};
use crate::models::Direction;

/// Lifecycle state of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    /// Full size still on
    Open,
    /// At least one tranche closed, remainder still on
    PartiallyClosed,
    /// Fully closed; `remaining_size == 0`
    Closed,
}

/// Why a tranche or position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Stop-loss hit
    StopLoss,
    /// First take-profit hit
    TakeProfit1,
    /// Second take-profit hit
    TakeProfit2,
    /// Explicit close by the strategy or host
    Manual,
    /// Force-closed at the end of the run
    End,
}

impl ExitReason {
    /// Canonical short code used in exports and histograms.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "SL",
            ExitReason::TakeProfit1 => "TP1",
            ExitReason::TakeProfit2 => "TP2",
            ExitReason::Manual => "MANUAL",
            ExitReason::End => "END",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A simulated position.
///
/// State machine `Open → PartiallyClosed → Closed`; mutation happens only
/// through [`close_partial`](Self::close_partial) /
/// [`close_full`](Self::close_full), and a closed position cannot reopen.
/// Invariant: `0 ≤ remaining_size ≤ lot_size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Instrument symbol
    pub symbol: String,
    /// Trade direction (never `Hold`)
    pub direction: Direction,
    /// Entry bar timestamp (Unix seconds)
    pub entry_time: i64,
    /// Entry price after spread and slippage
    pub entry_price: f64,
    /// Original size in instrument units
    pub lot_size: f64,
    /// Units still open
    pub remaining_size: f64,
    /// Active stop level (engine moves it to breakeven after TP1)
    pub stop_loss: f64,
    /// First take-profit level
    pub take_profit_1: f64,
    /// Second take-profit level
    pub take_profit_2: f64,
    /// Lifecycle state
    pub status: PositionStatus,
    /// Exit bar timestamp, once closed
    pub exit_time: Option<i64>,
    /// Last exit price, once closed
    pub exit_price: Option<f64>,
    /// Reason of the final close
    pub exit_reason: Option<ExitReason>,
    /// Net realized PnL so far: Σ gross tranche PnL − all fees accrued
    pub realized_pnl: f64,
    /// Mark-to-market PnL of the open remainder
    pub unrealized_pnl: f64,
    /// Net PnL for reporting (equals `realized_pnl` once closed)
    pub pnl: f64,
    /// Net PnL as percent of entry notional, set at final close
    pub pnl_pct: f64,
    /// Whether TP1 has filled
    pub tp1_hit: bool,
    /// Whether TP2 has filled
    pub tp2_hit: bool,
    /// Entry fee paid
    pub entry_fee: f64,
    /// Exit fees accrued across tranches
    pub exit_fee: f64,
    /// Entry + exit fees
    pub total_fees: f64,
    /// Entry slippage (price difference vs reference)
    pub entry_slippage: f64,
    /// Exit slippage accrued (price difference vs reference, summed)
    pub exit_slippage: f64,
    /// Scenario tags for attribution
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Position {
    /// Open a new position. `direction` must be Buy or Sell.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        symbol: impl Into<String>,
        direction: Direction,
        entry_time: i64,
        entry_price: f64,
        lot_size: f64,
        stop_loss: f64,
        take_profit_1: f64,
        take_profit_2: f64,
        entry_fee: f64,
        entry_slippage: f64,
        tags: BTreeMap<String, String>,
    ) -> Result<Self> {
        if direction.is_hold() {
            return Err(BacktestError::position("cannot open a HOLD position"));
        }
        if lot_size <= 0.0 {
            return Err(BacktestError::position(format!(
                "lot size must be positive, got {lot_size}"
            )));
        }
        Ok(Self {
            symbol: symbol.into(),
            direction,
            entry_time,
            entry_price,
            lot_size,
            remaining_size: lot_size,
            stop_loss,
            take_profit_1,
            take_profit_2,
            status: PositionStatus::Open,
            exit_time: None,
            exit_price: None,
            exit_reason: None,
            realized_pnl: -entry_fee,
            unrealized_pnl: 0.0,
            pnl: -entry_fee,
            pnl_pct: 0.0,
            tp1_hit: false,
            tp2_hit: false,
            entry_fee,
            exit_fee: 0.0,
            total_fees: entry_fee,
            entry_slippage,
            exit_slippage: 0.0,
            tags,
        })
    }

    /// Directional gross PnL of `size` units between entry and `price`.
    fn gross_pnl(&self, size: f64, price: f64) -> f64 {
        match self.direction {
            Direction::Buy => size * (price - self.entry_price),
            Direction::Sell => size * (self.entry_price - price),
            Direction::Hold => 0.0,
        }
    }

    /// Close a fraction of the ORIGINAL lot. Returns the tranche's net PnL
    /// (gross − exit fee), which is what flows back to account capital.
    pub fn close_partial(
        &mut self,
        exit_time: i64,
        exit_price: f64,
        close_fraction: f64,
        reason: ExitReason,
        exit_fee: f64,
        exit_slippage: f64,
    ) -> Result<f64> {
        if self.status == PositionStatus::Closed {
            return Err(BacktestError::position("position already closed"));
        }
        if !(0.0..=1.0).contains(&close_fraction) {
            return Err(BacktestError::position(format!(
                "close fraction {close_fraction} outside [0, 1]"
            )));
        }
        let close_size = self.lot_size * close_fraction;
        if close_size > self.remaining_size + 1e-12 {
            return Err(BacktestError::position(format!(
                "close size {close_size} exceeds remaining {}",
                self.remaining_size
            )));
        }

        let net = self.gross_pnl(close_size, exit_price) - exit_fee;
        self.remaining_size = (self.remaining_size - close_size).max(0.0);
        self.realized_pnl += net;
        self.pnl += net;
        self.exit_fee += exit_fee;
        self.total_fees += exit_fee;
        self.exit_slippage += exit_slippage;
        self.exit_time = Some(exit_time);
        self.exit_price = Some(exit_price);

        match reason {
            ExitReason::TakeProfit1 => self.tp1_hit = true,
            ExitReason::TakeProfit2 => self.tp2_hit = true,
            _ => {}
        }

        if self.remaining_size > 0.0 {
            self.status = PositionStatus::PartiallyClosed;
        } else {
            self.finalize(exit_time, exit_price, reason);
        }

        Ok(net)
    }

    /// Close whatever remains. Returns the tranche's net PnL.
    pub fn close_full(
        &mut self,
        exit_time: i64,
        exit_price: f64,
        reason: ExitReason,
        exit_fee: f64,
        exit_slippage: f64,
    ) -> Result<f64> {
        if self.status == PositionStatus::Closed {
            return Err(BacktestError::position("position already closed"));
        }

        let net = self.gross_pnl(self.remaining_size, exit_price) - exit_fee;
        self.realized_pnl += net;
        self.pnl += net;
        self.exit_fee += exit_fee;
        self.total_fees += exit_fee;
        self.exit_slippage += exit_slippage;
        self.remaining_size = 0.0;

        match reason {
            ExitReason::TakeProfit1 => self.tp1_hit = true,
            ExitReason::TakeProfit2 => self.tp2_hit = true,
            _ => {}
        }

        self.finalize(exit_time, exit_price, reason);
        Ok(net)
    }

    fn finalize(&mut self, exit_time: i64, exit_price: f64, reason: ExitReason) {
        self.status = PositionStatus::Closed;
        self.exit_time = Some(exit_time);
        self.exit_price = Some(exit_price);
        self.exit_reason = Some(reason);
        self.unrealized_pnl = 0.0;

        let entry_notional = self.entry_price * self.lot_size;
        if entry_notional > 0.0 {
            self.pnl_pct = self.pnl / entry_notional * 100.0;
        }
    }

    /// Mark the open remainder to `price`.
    pub fn update_unrealized(&mut self, price: f64) {
        if self.status == PositionStatus::Closed {
            self.unrealized_pnl = 0.0;
            return;
        }
        self.unrealized_pnl = self.gross_pnl(self.remaining_size, price);
    }

    /// Whether the position still has size on
    pub fn is_open(&self) -> bool {
        self.status != PositionStatus::Closed
    }

    /// Holding time in hours (0 while open)
    pub fn duration_hours(&self) -> f64 {
        match self.exit_time {
            Some(exit) => (exit - self.entry_time) as f64 / 3600.0,
            None => 0.0,
        }
    }

    /// Entry notional of the ORIGINAL lot
    pub fn entry_notional(&self) -> f64 {
        self.entry_price * self.lot_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long(entry_fee: f64) -> Position {
        Position::open(
            "BTCUSDT",
            Direction::Buy,
            1_000,
            100.0,
            10.0,
            95.0,
            105.0,
            110.0,
            entry_fee,
            0.0,
            BTreeMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_open_rejects_hold_and_zero_size() {
        assert!(
            Position::open(
                "X",
                Direction::Hold,
                0,
                100.0,
                1.0,
                95.0,
                105.0,
                110.0,
                0.0,
                0.0,
                BTreeMap::new()
            )
            .is_err()
        );
        assert!(
            Position::open(
                "X",
                Direction::Buy,
                0,
                100.0,
                0.0,
                95.0,
                105.0,
                110.0,
                0.0,
                0.0,
                BTreeMap::new()
            )
            .is_err()
        );
    }

    #[test]
    fn test_partial_then_full_close_lifecycle() {
        let mut pos = long(0.0);
        assert_eq!(pos.status, PositionStatus::Open);

        // TP1: close half at 105
        let net = pos
            .close_partial(2_000, 105.0, 0.5, ExitReason::TakeProfit1, 0.0, 0.0)
            .unwrap();
        assert!((net - 25.0).abs() < 1e-12); // 5 * (105-100)
        assert_eq!(pos.status, PositionStatus::PartiallyClosed);
        assert!(pos.tp1_hit);
        assert!(!pos.tp2_hit);
        assert_eq!(pos.remaining_size, 5.0);

        // END: close the remainder at 100
        let net = pos
            .close_full(3_000, 100.0, ExitReason::End, 0.0, 0.0)
            .unwrap();
        assert!((net - 0.0).abs() < 1e-12);
        assert_eq!(pos.status, PositionStatus::Closed);
        assert_eq!(pos.remaining_size, 0.0);
        assert_eq!(pos.exit_reason, Some(ExitReason::End));
        assert!((pos.pnl - 25.0).abs() < 1e-12);
        assert!((pos.duration_hours() - 2_000.0 / 3_600.0).abs() < 1e-12);
    }

    #[test]
    fn test_closed_position_cannot_reopen_or_reclose() {
        let mut pos = long(0.0);
        pos.close_full(2_000, 105.0, ExitReason::Manual, 0.0, 0.0)
            .unwrap();
        assert!(
            pos.close_full(3_000, 110.0, ExitReason::Manual, 0.0, 0.0)
                .is_err()
        );
        assert!(
            pos.close_partial(3_000, 110.0, 0.5, ExitReason::Manual, 0.0, 0.0)
                .is_err()
        );
    }

    #[test]
    fn test_realized_pnl_accounts_for_all_fees() {
        let mut pos = long(2.0);
        assert!((pos.realized_pnl + 2.0).abs() < 1e-12);

        pos.close_partial(2_000, 105.0, 0.5, ExitReason::TakeProfit1, 1.0, 0.0)
            .unwrap();
        pos.close_full(3_000, 110.0, ExitReason::TakeProfit2, 1.5, 0.0)
            .unwrap();

        // Gross: 5*(105-100) + 5*(110-100) = 75; fees: 2 + 1 + 1.5
        let gross = 75.0;
        assert!((pos.realized_pnl - (gross - pos.total_fees)).abs() < 1e-9);
        assert!((pos.total_fees - 4.5).abs() < 1e-12);
        assert!(pos.tp1_hit && pos.tp2_hit);
    }

    #[test]
    fn test_short_pnl_sign() {
        let mut pos = Position::open(
            "BTCUSDT",
            Direction::Sell,
            1_000,
            100.0,
            10.0,
            105.0,
            95.0,
            90.0,
            0.0,
            0.0,
            BTreeMap::new(),
        )
        .unwrap();

        pos.update_unrealized(90.0);
        assert!((pos.unrealized_pnl - 100.0).abs() < 1e-12);

        let net = pos
            .close_full(2_000, 95.0, ExitReason::TakeProfit1, 0.0, 0.0)
            .unwrap();
        assert!((net - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_oversized_partial_rejected() {
        let mut pos = long(0.0);
        pos.close_partial(2_000, 105.0, 0.8, ExitReason::TakeProfit1, 0.0, 0.0)
            .unwrap();
        // Only 20% of the original lot remains; closing another 50% is invalid
        assert!(
            pos.close_partial(3_000, 106.0, 0.5, ExitReason::TakeProfit2, 0.0, 0.0)
                .is_err()
        );
    }

    #[test]
    fn test_remaining_size_invariant() {
        let mut pos = long(0.0);
        assert!(pos.remaining_size <= pos.lot_size && pos.remaining_size >= 0.0);
        pos.close_partial(2_000, 105.0, 0.5, ExitReason::TakeProfit1, 0.0, 0.0)
            .unwrap();
        assert!(pos.remaining_size <= pos.lot_size && pos.remaining_size >= 0.0);
        pos.close_full(3_000, 104.0, ExitReason::End, 0.0, 0.0).unwrap();
        assert_eq!(pos.remaining_size, 0.0);
    }
}
