//! Tearsheet generation: JSON (authoritative), CSV summary, and HTML.
//!
//! Three artifacts share one base name: `<base>.json`, `<base>.csv`,
//! `<base>.html`. The structured JSON record is the source of truth; the
//! other two are renderings of it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::analytics::Metrics;
use super::error::Result;
use super::position::Position;
use super::result::{BacktestResult, EquityPoint};

/// The packaged performance report for one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tearsheet {
    /// Full metrics record
    pub summary: Metrics,
    /// All closed positions, ordered by open time
    pub trades: Vec<Position>,
    /// One point per simulated bar
    pub equity_curve: Vec<EquityPoint>,
}

/// Paths of the three written artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TearsheetArtifacts {
    /// Canonical structured record
    pub json: PathBuf,
    /// Two-column Metric/Value table
    pub csv: PathBuf,
    /// Self-contained HTML document
    pub html: PathBuf,
}

impl Tearsheet {
    /// Build a tearsheet from a finished run.
    pub fn from_result(result: &BacktestResult) -> Self {
        Self {
            summary: result.metrics.clone(),
            trades: result.positions.clone(),
            equity_curve: result.equity_curve.clone(),
        }
    }

    /// The Metric/Value rows of the summary table, in presentation order.
    pub fn summary_rows(&self) -> Vec<(String, String)> {
        let m = &self.summary;
        let mut rows = vec![
            ("Total Trades".to_string(), m.total_trades.to_string()),
            ("Winning Trades".to_string(), m.winning_trades.to_string()),
            ("Losing Trades".to_string(), m.losing_trades.to_string()),
            ("Win Rate".to_string(), format!("{:.1}%", m.win_rate_pct)),
            ("Total PnL".to_string(), format!("${:.2}", m.total_pnl)),
            ("Total Return".to_string(), format!("{:.2}%", m.total_return_pct)),
            ("Average Win".to_string(), format!("${:.2}", m.avg_win)),
            ("Average Loss".to_string(), format!("${:.2}", m.avg_loss)),
            ("Profit Factor".to_string(), format!("{:.2}", m.profit_factor)),
            ("Best Trade".to_string(), format!("${:.2}", m.best_trade)),
            ("Worst Trade".to_string(), format!("${:.2}", m.worst_trade)),
            ("Sharpe Ratio".to_string(), format!("{:.2}", m.sharpe_ratio)),
            ("Sortino Ratio".to_string(), format!("{:.2}", m.sortino_ratio)),
            ("Calmar Ratio".to_string(), format!("{:.2}", m.calmar_ratio)),
            ("Max Drawdown".to_string(), format!("{:.2}%", m.max_drawdown_pct)),
            (
                "Max Drawdown Duration".to_string(),
                format!("{:.1} days", m.max_drawdown_duration_days),
            ),
            (
                "Annualized Volatility".to_string(),
                format!("{:.2}%", m.annualized_volatility_pct),
            ),
            ("CAGR".to_string(), format!("{:.2}%", m.cagr_pct)),
            ("Expectancy".to_string(), format!("${:.2}", m.expectancy)),
            ("TP1 Hit Rate".to_string(), format!("{:.1}%", m.tp1_hit_rate_pct)),
            ("TP2 Hit Rate".to_string(), format!("{:.1}%", m.tp2_hit_rate_pct)),
            (
                "Max Consecutive Wins".to_string(),
                m.max_consecutive_wins.to_string(),
            ),
            (
                "Max Consecutive Losses".to_string(),
                m.max_consecutive_losses.to_string(),
            ),
            ("Exposure Time".to_string(), format!("{:.1}%", m.exposure_time_pct)),
            ("Turnover".to_string(), format!("{:.1} trades/yr", m.turnover_per_year)),
            ("Recovery Factor".to_string(), format!("{:.2}", m.recovery_factor)),
            ("Total Fees".to_string(), format!("${:.2}", m.total_fees)),
            ("Total Slippage".to_string(), format!("${:.2}", m.total_slippage)),
            ("Cost Drag".to_string(), format!("{:.2}%", m.cost_drag_pct)),
            ("Initial Capital".to_string(), format!("${:.2}", m.initial_capital)),
            ("Final Capital".to_string(), format!("${:.2}", m.final_capital)),
        ];
        for (reason, count) in &m.exit_reasons {
            rows.push((format!("Exits: {reason}"), count.to_string()));
        }
        rows
    }

    /// Render the self-contained HTML document.
    pub fn to_html(&self) -> String {
        let mut rows_html = String::new();
        for (metric, value) in self.summary_rows() {
            rows_html.push_str(&format!(
                "      <tr><td>{}</td><td>{}</td></tr>\n",
                escape(&metric),
                escape(&value)
            ));
        }

        let mut trades_html = String::new();
        for trade in &self.trades {
            trades_html.push_str(&format!(
                "      <tr><td>{}</td><td>{}</td><td>{:.4}</td><td>{:.4}</td>\
                 <td>{:.4}</td><td>{:+.2}</td><td>{}</td></tr>\n",
                escape(&trade.symbol),
                trade.direction,
                trade.entry_price,
                trade.exit_price.unwrap_or(f64::NAN),
                trade.lot_size,
                trade.pnl,
                trade.exit_reason.map(|r| r.as_str()).unwrap_or("-"),
            ));
        }

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Backtest Tearsheet</title>
  <style>
    body {{ font-family: -apple-system, Segoe UI, sans-serif; margin: 2rem; color: #222; }}
    h1, h2 {{ color: #1a3c5e; }}
    table {{ border-collapse: collapse; margin-bottom: 2rem; }}
    td, th {{ border: 1px solid #ccc; padding: 0.35rem 0.8rem; text-align: left; }}
    th {{ background: #f0f4f8; }}
    tr:nth-child(even) {{ background: #fafafa; }}
  </style>
</head>
<body>
  <h1>Backtest Tearsheet</h1>
  <p>{trade_count} trades over {days:.1} days</p>
  <h2>Summary</h2>
  <table>
    <thead><tr><th>Metric</th><th>Value</th></tr></thead>
    <tbody>
{rows_html}    </tbody>
  </table>
  <h2>Trades</h2>
  <table>
    <thead><tr><th>Symbol</th><th>Direction</th><th>Entry</th><th>Exit</th>
    <th>Size</th><th>PnL</th><th>Reason</th></tr></thead>
    <tbody>
{trades_html}    </tbody>
  </table>
</body>
</html>
"#,
            trade_count = self.trades.len(),
            days = self.summary.trading_days,
        )
    }

    /// Write `<base>.json`, `<base>.csv`, and `<base>.html` into `dir`.
    pub fn write(&self, dir: impl AsRef<Path>, base_name: &str) -> Result<TearsheetArtifacts> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let json_path = dir.join(format!("{base_name}.json"));
        std::fs::write(&json_path, serde_json::to_string_pretty(self)?)?;

        let csv_path = dir.join(format!("{base_name}.csv"));
        let mut writer = csv::Writer::from_path(&csv_path)?;
        writer.write_record(["Metric", "Value"])?;
        for (metric, value) in self.summary_rows() {
            writer.write_record([metric.as_str(), value.as_str()])?;
        }
        writer.flush().map_err(std::io::Error::from)?;

        let html_path = dir.join(format!("{base_name}.html"));
        std::fs::write(&html_path, self.to_html())?;

        Ok(TearsheetArtifacts {
            json: json_path,
            csv: csv_path,
            html: html_path,
        })
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{BacktestConfig, BacktestEngine, StrategyContext, TradeIntent};
    use crate::models::{Candle, Direction};

    fn sample_result() -> BacktestResult {
        let candles: Vec<Candle> = (0..60)
            .map(|i| {
                let price = 100.0 + i as f64;
                Candle {
                    timestamp: 1_700_000_000 + i as i64 * 3600,
                    open: price,
                    high: price + 0.5,
                    low: price - 0.5,
                    close: price,
                    volume: 100.0,
                }
            })
            .collect();

        let engine = BacktestEngine::new(BacktestConfig::zero_cost());
        let mut entered = false;
        engine
            .run("TEST", &candles, move |ctx: &StrategyContext| {
                if !entered && ctx.index == 5 {
                    entered = true;
                    TradeIntent::entry(
                        Direction::Buy,
                        ctx.close(),
                        ctx.close() - 10.0,
                        ctx.close() + 20.0,
                        ctx.close() + 200.0,
                    )
                } else {
                    TradeIntent::hold()
                }
            })
            .unwrap()
    }

    #[test]
    fn test_tearsheet_counts_agree() {
        let result = sample_result();
        let tearsheet = Tearsheet::from_result(&result);

        assert_eq!(tearsheet.summary.total_trades, tearsheet.trades.len());
        assert_eq!(tearsheet.equity_curve.len(), result.equity_curve.len());

        let html = tearsheet.to_html();
        assert!(html.contains(&format!("{} trades", tearsheet.trades.len())));
    }

    #[test]
    fn test_tearsheet_json_roundtrip() {
        let tearsheet = Tearsheet::from_result(&sample_result());
        let json = serde_json::to_string(&tearsheet).unwrap();
        let back: Tearsheet = serde_json::from_str(&json).unwrap();
        assert_eq!(tearsheet, back);
    }

    #[test]
    fn test_write_three_artifacts() {
        let tearsheet = Tearsheet::from_result(&sample_result());
        let dir = tempfile::tempdir().unwrap();

        let artifacts = tearsheet.write(dir.path(), "run_001").unwrap();
        assert!(artifacts.json.exists());
        assert!(artifacts.csv.exists());
        assert!(artifacts.html.exists());

        let json_text = std::fs::read_to_string(&artifacts.json).unwrap();
        let parsed: Tearsheet = serde_json::from_str(&json_text).unwrap();
        assert_eq!(parsed.summary.total_trades, tearsheet.summary.total_trades);

        let csv_text = std::fs::read_to_string(&artifacts.csv).unwrap();
        assert!(csv_text.starts_with("Metric,Value"));
    }

    #[test]
    fn test_html_escaping() {
        assert_eq!(escape("a<b&c>d"), "a&lt;b&amp;c&gt;d");
    }
}
