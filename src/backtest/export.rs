//! Canonical CSV exports for trades and equity curves.
//!
//! The trade export uses a fixed column order with `tag_*` columns appended
//! in sorted key order, so downstream tooling can rely on the layout.

use std::collections::BTreeSet;
use std::path::Path;

use super::error::Result;
use super::position::Position;
use super::result::EquityPoint;

const TRADE_COLUMNS: [&str; 18] = [
    "entry_time",
    "exit_time",
    "symbol",
    "direction",
    "entry_price",
    "exit_price",
    "lot_size",
    "pnl",
    "pnl_pct",
    "exit_reason",
    "duration_hours",
    "tp1_hit",
    "tp2_hit",
    "entry_fee",
    "exit_fee",
    "total_fees",
    "entry_slippage",
    "exit_slippage",
];

/// Write positions to CSV in the canonical column order.
pub fn write_trades_csv(positions: &[Position], path: impl AsRef<Path>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;

    // Union of tag keys across all positions, sorted for a stable layout
    let tag_keys: BTreeSet<&String> = positions.iter().flat_map(|p| p.tags.keys()).collect();

    let mut header: Vec<String> = TRADE_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(tag_keys.iter().map(|k| format!("tag_{k}")));
    writer.write_record(&header)?;

    for position in positions {
        let mut row = vec![
            position.entry_time.to_string(),
            position.exit_time.map(|t| t.to_string()).unwrap_or_default(),
            position.symbol.clone(),
            position.direction.to_string(),
            format!("{}", position.entry_price),
            position
                .exit_price
                .map(|p| format!("{p}"))
                .unwrap_or_default(),
            format!("{}", position.lot_size),
            format!("{}", position.pnl),
            format!("{}", position.pnl_pct),
            position
                .exit_reason
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
            format!("{}", position.duration_hours()),
            position.tp1_hit.to_string(),
            position.tp2_hit.to_string(),
            format!("{}", position.entry_fee),
            format!("{}", position.exit_fee),
            format!("{}", position.total_fees),
            format!("{}", position.entry_slippage),
            format!("{}", position.exit_slippage),
        ];
        for key in &tag_keys {
            row.push(position.tags.get(*key).cloned().unwrap_or_default());
        }
        writer.write_record(&row)?;
    }

    writer.flush().map_err(std::io::Error::from)?;
    Ok(())
}

/// Write the equity curve to CSV.
pub fn write_equity_csv(equity_curve: &[EquityPoint], path: impl AsRef<Path>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record([
        "timestamp",
        "equity",
        "cash",
        "reserved_margin",
        "open_positions",
        "drawdown_pct",
    ])?;

    for point in equity_curve {
        writer.write_record(&[
            point.timestamp.to_string(),
            format!("{}", point.equity),
            format!("{}", point.cash),
            format!("{}", point.reserved_margin),
            point.open_positions.to_string(),
            format!("{}", point.drawdown_pct),
        ])?;
    }

    writer.flush().map_err(std::io::Error::from)?;
    Ok(())
}
