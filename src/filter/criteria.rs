//! The individual filter criteria.
//!
//! Criteria are pure: they read a prepared [`FilterInputs`] view, the
//! auxiliary context, and the injected wall-clock hour. Price-derived
//! criteria fail when their indicator is indeterminate; auxiliary criteria
//! pass with an "unavailable" note when their input is absent.

use crate::config::SymbolProfile;
use crate::error::Result;
use crate::filter::FilterConfig;
use crate::indicators::{self, value_at};
use crate::models::{
    AuxiliaryContext, CriterionResult, Direction, IndicatorSnapshot, MtfView, Timeframe,
};

/// Pre-computed per-timeframe view handed to every criterion.
///
/// Snapshots cover all four timeframes; the H1 RSI and MACD histogram series
/// are kept in full because the divergence and momentum criteria look back
/// several bars.
pub struct FilterInputs<'a> {
    /// The validated four-timeframe view
    pub view: &'a MtfView,
    /// M15 snapshot
    pub m15: IndicatorSnapshot,
    /// H1 snapshot
    pub h1: IndicatorSnapshot,
    /// H4 snapshot
    pub h4: IndicatorSnapshot,
    /// D1 snapshot
    pub d1: IndicatorSnapshot,
    h1_rsi: Vec<Option<f64>>,
    h1_macd_hist: Vec<Option<f64>>,
}

impl<'a> FilterInputs<'a> {
    /// Compute snapshots and lookback series from a validated view.
    pub fn prepare(view: &'a MtfView) -> Result<Self> {
        let h1_series = view.series(Timeframe::H1);
        let h1_closes = h1_series.closes();

        let h1_rsi = indicators::rsi(&h1_closes, 14)?;
        let h1_macd_hist = indicators::macd(&h1_closes, 12, 26, 9)?.histogram;

        Ok(Self {
            view,
            m15: IndicatorSnapshot::compute(view.series(Timeframe::M15))?,
            h1: IndicatorSnapshot::compute(h1_series)?,
            h4: IndicatorSnapshot::compute(view.series(Timeframe::H4))?,
            d1: IndicatorSnapshot::compute(view.series(Timeframe::D1))?,
            h1_rsi,
            h1_macd_hist,
        })
    }

    fn snapshot(&self, tf: Timeframe) -> &IndicatorSnapshot {
        match tf {
            Timeframe::M15 => &self.m15,
            Timeframe::H1 => &self.h1,
            Timeframe::H4 => &self.h4,
            Timeframe::D1 => &self.d1,
        }
    }

    /// EMA21 above EMA50 on the timeframe; `None` while warming up
    fn bullish_trend(&self, tf: Timeframe) -> Option<bool> {
        let snap = self.snapshot(tf);
        Some(snap.ema_21? > snap.ema_50?)
    }
}

/// Local swing extrema: values that are strictly beyond every neighbour
/// within `window` bars on each side.
fn swing_points(values: &[f64], window: usize, lows: bool) -> Vec<f64> {
    let mut swings = Vec::new();
    if values.len() < 2 * window + 1 {
        return swings;
    }
    for i in window..values.len() - window {
        let v = values[i];
        let is_swing = (i - window..=i + window)
            .filter(|&j| j != i)
            .all(|j| if lows { v < values[j] } else { v > values[j] });
        if is_swing {
            swings.push(v);
        }
    }
    swings
}

/// One named filter criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Criterion {
    /// H1/H4/D1 trends agree with the tested direction
    MtfAlignment,
    /// M15 close on the trend side of EMA21
    PriceEma,
    /// H1 RSI inside the directional momentum band
    RsiMomentum,
    /// H1 MACD line on the trend side of its signal
    MacdConfirmation,
    /// H1 stochastic supports the direction
    Stochastic,
    /// Average of H1 and H4 ADX clears the floor
    AdxStrength,
    /// M15 volume ratio clears the floor
    Volume,
    /// M15 close on the trend side of the Bollinger middle band
    BbPosition,
    /// H1 ATR above the symbol's volatility floor
    AtrVolatility,
    /// H1 EMA21/EMA50 spacing above the symbol floor
    EmaSpacing,
    /// D1 close on the trend side of its EMA50
    HtfConfirmation,
    /// Recent H1 bars form a directional price-action pattern
    PriceAction,
    /// H1 MACD histogram accelerating in the trend direction
    MomentumAcceleration,
    /// Price within 2% of the nearest H4 swing level
    SrRespect,
    /// No price/RSI divergence over the last 10 H1 bars
    NoDivergence,
    /// Wall-clock hour inside the symbol's active session
    SessionTiming,
    /// Price near or beyond the 20-bar H4 range extreme
    BreakoutPotential,
    /// ATR-derived reward/risk clears the minimum
    RiskReward,
    /// At least 3 of 4 timeframes trend-aligned
    TrendConsistency,
    /// Higher lows (bullish) or lower highs (bearish) in recent H1 structure
    MarketStructure,
    /// (crypto) Funding rate contrarian to the direction
    FundingRate,
    /// (crypto) BTC dominance favours the direction
    BtcDominance,
    /// (crypto) Fear/greed at the contrarian extreme
    Sentiment,
}

impl Criterion {
    /// Stable criterion name used in decisions and tags.
    pub fn name(&self) -> &'static str {
        match self {
            Criterion::MtfAlignment => "mtf_alignment",
            Criterion::PriceEma => "price_ema",
            Criterion::RsiMomentum => "rsi_momentum",
            Criterion::MacdConfirmation => "macd_confirmation",
            Criterion::Stochastic => "stochastic",
            Criterion::AdxStrength => "adx_strength",
            Criterion::Volume => "volume",
            Criterion::BbPosition => "bb_position",
            Criterion::AtrVolatility => "atr_volatility",
            Criterion::EmaSpacing => "ema_spacing",
            Criterion::HtfConfirmation => "htf_confirmation",
            Criterion::PriceAction => "price_action",
            Criterion::MomentumAcceleration => "momentum_acceleration",
            Criterion::SrRespect => "sr_respect",
            Criterion::NoDivergence => "no_divergence",
            Criterion::SessionTiming => "session_timing",
            Criterion::BreakoutPotential => "breakout_potential",
            Criterion::RiskReward => "risk_reward",
            Criterion::TrendConsistency => "trend_consistency",
            Criterion::MarketStructure => "market_structure",
            Criterion::FundingRate => "funding_rate",
            Criterion::BtcDominance => "btc_dominance",
            Criterion::Sentiment => "sentiment",
        }
    }

    /// Evaluate against prepared inputs.
    pub fn evaluate(
        &self,
        inputs: &FilterInputs,
        aux: &AuxiliaryContext,
        direction: Direction,
        config: &FilterConfig,
        profile: &SymbolProfile,
        utc_hour: u32,
    ) -> CriterionResult {
        let name = self.name();
        if direction.is_hold() {
            return CriterionResult::fail(name, "direction under test is HOLD");
        }
        let bullish = direction.is_buy();

        match self {
            Criterion::MtfAlignment => {
                let trends = [
                    inputs.bullish_trend(Timeframe::H1),
                    inputs.bullish_trend(Timeframe::H4),
                    inputs.bullish_trend(Timeframe::D1),
                ];
                match (trends[0], trends[1], trends[2]) {
                    (Some(h1), Some(h4), Some(d1)) => {
                        if h1 == bullish && h4 == bullish && d1 == bullish {
                            CriterionResult::pass(
                                name,
                                format!("H1/H4/D1 aligned {}", trend_word(bullish)),
                            )
                        } else {
                            CriterionResult::fail(name, "timeframe trends disagree")
                        }
                    }
                    _ => CriterionResult::fail(name, "indeterminate: EMA history too short"),
                }
            }

            Criterion::PriceEma => match inputs.m15.ema_21 {
                Some(ema) => {
                    let close = inputs.m15.candle.close;
                    let ok = if bullish { close > ema } else { close < ema };
                    if ok {
                        CriterionResult::pass(
                            name,
                            format!("M15 close {close:.2} on trend side of EMA21 {ema:.2}"),
                        )
                    } else {
                        CriterionResult::fail(
                            name,
                            format!("M15 close {close:.2} on wrong side of EMA21 {ema:.2}"),
                        )
                    }
                }
                None => CriterionResult::fail(name, "indeterminate: M15 EMA21 unavailable"),
            },

            Criterion::RsiMomentum => match inputs.h1.rsi_14 {
                Some(rsi) => {
                    let (lo, hi) = if bullish { (40.0, 70.0) } else { (30.0, 60.0) };
                    if rsi > lo && rsi < hi {
                        CriterionResult::pass(name, format!("H1 RSI {rsi:.1} in ({lo}, {hi})"))
                    } else {
                        CriterionResult::fail(name, format!("H1 RSI {rsi:.1} outside ({lo}, {hi})"))
                    }
                }
                None => CriterionResult::fail(name, "indeterminate: H1 RSI unavailable"),
            },

            Criterion::MacdConfirmation => {
                match (inputs.h1.macd_line, inputs.h1.macd_signal) {
                    (Some(line), Some(signal)) => {
                        let ok = if bullish { line > signal } else { line < signal };
                        if ok {
                            CriterionResult::pass(name, "H1 MACD confirms direction")
                        } else {
                            CriterionResult::fail(name, "H1 MACD against direction")
                        }
                    }
                    _ => CriterionResult::fail(name, "indeterminate: H1 MACD unavailable"),
                }
            }

            Criterion::Stochastic => match (inputs.h1.stoch_k, inputs.h1.stoch_d) {
                (Some(k), Some(d)) => {
                    let ok = if bullish {
                        (k > d && k > 20.0 && k < 80.0) || (k > 50.0 && d > 50.0)
                    } else {
                        (k < d && k < 80.0 && k > 20.0) || (k < 50.0 && d < 50.0)
                    };
                    if ok {
                        CriterionResult::pass(name, format!("stochastic K {k:.1} / D {d:.1} supportive"))
                    } else {
                        CriterionResult::fail(name, format!("stochastic K {k:.1} / D {d:.1} adverse"))
                    }
                }
                _ => CriterionResult::fail(name, "indeterminate: stochastic range collapsed"),
            },

            Criterion::AdxStrength => {
                // Missing-history ADX defaults to 25 (neutral trend strength)
                let h1 = inputs.h1.adx_14.unwrap_or(25.0);
                let h4 = inputs.h4.adx_14.unwrap_or(25.0);
                let avg = (h1 + h4) / 2.0;
                if avg >= config.min_adx {
                    CriterionResult::pass(name, format!("avg ADX {avg:.1} >= {}", config.min_adx))
                } else {
                    CriterionResult::fail(name, format!("avg ADX {avg:.1} < {}", config.min_adx))
                }
            }

            Criterion::Volume => match inputs.m15.volume_ratio_20 {
                Some(ratio) => {
                    if ratio > config.min_volume_ratio {
                        CriterionResult::pass(name, format!("M15 volume ratio {ratio:.2}"))
                    } else {
                        CriterionResult::fail(
                            name,
                            format!("M15 volume ratio {ratio:.2} below {}", config.min_volume_ratio),
                        )
                    }
                }
                None => CriterionResult::fail(name, "indeterminate: volume average is zero"),
            },

            Criterion::BbPosition => match inputs.m15.bb_middle {
                Some(middle) => {
                    let close = inputs.m15.candle.close;
                    let ok = if bullish { close > middle } else { close < middle };
                    if ok {
                        CriterionResult::pass(name, "M15 close on trend side of BB middle")
                    } else {
                        CriterionResult::fail(name, "M15 close on wrong side of BB middle")
                    }
                }
                None => CriterionResult::fail(name, "indeterminate: Bollinger unavailable"),
            },

            Criterion::AtrVolatility => match inputs.h1.atr_14 {
                Some(atr) => {
                    if atr > profile.atr_floor {
                        CriterionResult::pass(name, format!("H1 ATR {atr:.2} above floor"))
                    } else {
                        CriterionResult::fail(
                            name,
                            format!("H1 ATR {atr:.2} below floor {}", profile.atr_floor),
                        )
                    }
                }
                None => CriterionResult::fail(name, "indeterminate: H1 ATR unavailable"),
            },

            Criterion::EmaSpacing => match (inputs.h1.ema_21, inputs.h1.ema_50) {
                (Some(e21), Some(e50)) => {
                    let spacing = (e21 - e50).abs();
                    if spacing > profile.ema_spacing_floor {
                        CriterionResult::pass(name, format!("EMA spacing {spacing:.2}"))
                    } else {
                        CriterionResult::fail(
                            name,
                            format!("EMA spacing {spacing:.2} below floor {}", profile.ema_spacing_floor),
                        )
                    }
                }
                _ => CriterionResult::fail(name, "indeterminate: H1 EMAs unavailable"),
            },

            Criterion::HtfConfirmation => match inputs.d1.ema_50 {
                Some(ema) => {
                    let close = inputs.d1.candle.close;
                    let ok = if bullish { close > ema } else { close < ema };
                    if ok {
                        CriterionResult::pass(name, "D1 close confirms higher-timeframe trend")
                    } else {
                        CriterionResult::fail(name, "D1 close against higher-timeframe trend")
                    }
                }
                None => CriterionResult::fail(name, "indeterminate: D1 EMA50 unavailable"),
            },

            Criterion::PriceAction => {
                let h1 = inputs.view.series(Timeframe::H1);
                let recent = h1.tail(3);
                if recent.len() < 3 {
                    return CriterionResult::fail(name, "indeterminate: fewer than 3 H1 bars");
                }
                let (a, b, c) = (&recent[0], &recent[1], &recent[2]);
                let ok = if bullish {
                    (c.high > b.high && b.high > a.high) || c.low > a.low
                } else {
                    (c.low < b.low && b.low < a.low) || c.high < a.high
                };
                if ok {
                    CriterionResult::pass(
                        name,
                        format!("{} H1 structure", if bullish { "ascending" } else { "descending" }),
                    )
                } else {
                    CriterionResult::fail(name, "no directional H1 price action")
                }
            }

            Criterion::MomentumAcceleration => {
                let hist = &inputs.h1_macd_hist;
                let n = hist.len();
                if n < 3 {
                    return CriterionResult::fail(name, "indeterminate: MACD history too short");
                }
                match (value_at(hist, n - 3), value_at(hist, n - 2), value_at(hist, n - 1)) {
                    (Some(h0), Some(h1v), Some(h2)) => {
                        let right_sign = if bullish {
                            h0 > 0.0 && h1v > 0.0 && h2 > 0.0
                        } else {
                            h0 < 0.0 && h1v < 0.0 && h2 < 0.0
                        };
                        if right_sign && h2.abs() > h1v.abs() {
                            CriterionResult::pass(name, "MACD histogram accelerating with trend")
                        } else {
                            CriterionResult::fail(name, "MACD histogram not accelerating")
                        }
                    }
                    _ => CriterionResult::fail(name, "indeterminate: MACD histogram unavailable"),
                }
            }

            Criterion::SrRespect => {
                let h4 = inputs.view.series(Timeframe::H4);
                let recent = h4.tail(50);
                let price = inputs.view.current_price();
                let tolerance = 0.02;

                if bullish {
                    let lows: Vec<f64> = recent.iter().map(|c| c.low).collect();
                    let swings = swing_points(&lows, 2, true);
                    if swings.is_empty() {
                        return CriterionResult::pass(name, "no swing support identified");
                    }
                    let nearest = swings
                        .iter()
                        .copied()
                        .filter(|&s| s < price)
                        .fold(f64::NEG_INFINITY, f64::max);
                    if nearest.is_finite() && (price - nearest) / price < tolerance {
                        CriterionResult::pass(name, format!("price near swing support {nearest:.2}"))
                    } else {
                        CriterionResult::fail(name, "price extended away from swing support")
                    }
                } else {
                    let highs: Vec<f64> = recent.iter().map(|c| c.high).collect();
                    let swings = swing_points(&highs, 2, false);
                    if swings.is_empty() {
                        return CriterionResult::pass(name, "no swing resistance identified");
                    }
                    let nearest = swings
                        .iter()
                        .copied()
                        .filter(|&s| s > price)
                        .fold(f64::INFINITY, f64::min);
                    if nearest.is_finite() && (nearest - price) / price < tolerance {
                        CriterionResult::pass(name, format!("price near swing resistance {nearest:.2}"))
                    } else {
                        CriterionResult::fail(name, "price extended away from swing resistance")
                    }
                }
            }

            Criterion::NoDivergence => {
                let h1 = inputs.view.series(Timeframe::H1);
                let closes = h1.closes();
                let n = closes.len();
                if n < 10 {
                    return CriterionResult::pass(name, "insufficient bars for divergence check");
                }
                let price_delta = closes[n - 1] - closes[n - 10];
                match (value_at(&inputs.h1_rsi, n - 1), value_at(&inputs.h1_rsi, n - 10)) {
                    (Some(rsi_now), Some(rsi_then)) => {
                        let rsi_delta = rsi_now - rsi_then;
                        let diverging = if bullish {
                            price_delta > 0.0 && rsi_delta < -5.0
                        } else {
                            price_delta < 0.0 && rsi_delta > 5.0
                        };
                        if diverging {
                            CriterionResult::fail(name, "price/RSI divergence over last 10 bars")
                        } else {
                            CriterionResult::pass(name, "no price/RSI divergence")
                        }
                    }
                    _ => CriterionResult::pass(name, "RSI lookback unavailable"),
                }
            }

            Criterion::SessionTiming => {
                if profile.in_session(utc_hour) {
                    CriterionResult::pass(name, format!("hour {utc_hour} UTC inside active session"))
                } else {
                    CriterionResult::fail(name, format!("hour {utc_hour} UTC outside active session"))
                }
            }

            Criterion::BreakoutPotential => {
                let h4 = inputs.view.series(Timeframe::H4);
                let recent = h4.tail(20);
                let price = inputs.view.current_price();
                let high = recent.iter().map(|c| c.high).fold(f64::MIN, f64::max);
                let low = recent.iter().map(|c| c.low).fold(f64::MAX, f64::min);
                let range = high - low;
                if range <= 0.0 {
                    return CriterionResult::fail(name, "indeterminate: flat H4 range");
                }
                let ok = if bullish {
                    high - price < range * 0.1 || price > high
                } else {
                    price - low < range * 0.1 || price < low
                };
                if ok {
                    CriterionResult::pass(name, "price pressing the 20-bar H4 range extreme")
                } else {
                    CriterionResult::fail(name, "price mid-range, no breakout pressure")
                }
            }

            Criterion::RiskReward => match inputs.h1.atr_14 {
                Some(atr) if atr > 0.0 => {
                    let risk = atr * config.sl_atr_multiple;
                    let reward = atr * config.tp_atr_multiple;
                    if risk <= 0.0 {
                        return CriterionResult::fail(name, "indeterminate: zero risk distance");
                    }
                    let ratio = reward / risk;
                    if ratio >= config.min_risk_reward {
                        CriterionResult::pass(
                            name,
                            format!("reward/risk {ratio:.2} >= {}", config.min_risk_reward),
                        )
                    } else {
                        CriterionResult::fail(
                            name,
                            format!("reward/risk {ratio:.2} < {}", config.min_risk_reward),
                        )
                    }
                }
                _ => CriterionResult::fail(name, "indeterminate: H1 ATR unavailable"),
            },

            Criterion::TrendConsistency => {
                let aligned = Timeframe::ALL
                    .iter()
                    .filter_map(|&tf| inputs.bullish_trend(tf))
                    .filter(|&up| up == bullish)
                    .count();
                if aligned >= 3 {
                    CriterionResult::pass(name, format!("{aligned}/4 timeframes aligned"))
                } else {
                    CriterionResult::fail(name, format!("only {aligned}/4 timeframes aligned"))
                }
            }

            Criterion::MarketStructure => {
                let h1 = inputs.view.series(Timeframe::H1);
                let recent = h1.tail(10);
                if bullish {
                    let lows: Vec<f64> = recent.iter().map(|c| c.low).collect();
                    let swings = swing_points(&lows, 1, true);
                    if swings.len() >= 2 {
                        if swings[swings.len() - 1] > swings[swings.len() - 2] {
                            CriterionResult::pass(name, "higher lows in recent structure")
                        } else {
                            CriterionResult::fail(name, "lower lows in recent structure")
                        }
                    } else {
                        CriterionResult::pass(name, "too few swing lows to judge structure")
                    }
                } else {
                    let highs: Vec<f64> = recent.iter().map(|c| c.high).collect();
                    let swings = swing_points(&highs, 1, false);
                    if swings.len() >= 2 {
                        if swings[swings.len() - 1] < swings[swings.len() - 2] {
                            CriterionResult::pass(name, "lower highs in recent structure")
                        } else {
                            CriterionResult::fail(name, "higher highs in recent structure")
                        }
                    } else {
                        CriterionResult::pass(name, "too few swing highs to judge structure")
                    }
                }
            }

            Criterion::FundingRate => match aux.funding_rate {
                None => CriterionResult::unavailable(name, "funding rate"),
                Some(rate) => {
                    let pct = rate * 100.0;
                    if bullish {
                        if rate < -0.0001 {
                            CriterionResult::pass(
                                name,
                                format!("favorable funding ({pct:.4}%), shorts paying"),
                            )
                        } else if rate > config.extreme_funding_rate {
                            CriterionResult::fail(
                                name,
                                format!("overleveraged longs ({pct:.4}%), risky for long"),
                            )
                        } else {
                            CriterionResult::fail(name, format!("neutral funding ({pct:.4}%)"))
                        }
                    } else if rate > config.extreme_funding_rate {
                        CriterionResult::pass(
                            name,
                            format!("overleveraged longs ({pct:.4}%), good for short"),
                        )
                    } else if rate < -0.0001 {
                        CriterionResult::fail(
                            name,
                            format!("overleveraged shorts ({pct:.4}%), risky for short"),
                        )
                    } else {
                        CriterionResult::fail(name, format!("neutral funding ({pct:.4}%)"))
                    }
                }
            },

            Criterion::BtcDominance => match aux.btc_dominance_pct {
                None => CriterionResult::unavailable(name, "BTC dominance"),
                Some(dom) => {
                    if bullish {
                        if dom > 55.0 {
                            CriterionResult::pass(name, format!("strong BTC dominance ({dom:.1}%)"))
                        } else if dom > 50.0 {
                            CriterionResult::pass(name, format!("good BTC dominance ({dom:.1}%)"))
                        } else {
                            CriterionResult::fail(
                                name,
                                format!("weak BTC dominance ({dom:.1}%), alt season risk"),
                            )
                        }
                    } else if dom < 45.0 {
                        CriterionResult::pass(name, format!("weak BTC dominance ({dom:.1}%)"))
                    } else if dom < 50.0 {
                        CriterionResult::pass(name, format!("declining BTC dominance ({dom:.1}%)"))
                    } else {
                        CriterionResult::fail(
                            name,
                            format!("strong BTC dominance ({dom:.1}%), risky for short"),
                        )
                    }
                }
            },

            Criterion::Sentiment => match aux.fear_greed_score {
                None => CriterionResult::unavailable(name, "fear/greed index"),
                Some(score) => {
                    let extreme = config.extreme_sentiment;
                    if bullish {
                        if score < extreme {
                            CriterionResult::pass(
                                name,
                                format!("extreme fear ({score}), contrarian long"),
                            )
                        } else {
                            CriterionResult::fail(name, format!("not fearful enough ({score})"))
                        }
                    } else if score > 100 - extreme {
                        CriterionResult::pass(
                            name,
                            format!("extreme greed ({score}), contrarian short"),
                        )
                    } else {
                        CriterionResult::fail(name, format!("not greedy enough ({score})"))
                    }
                }
            },
        }
    }
}

fn trend_word(bullish: bool) -> &'static str {
    if bullish { "bullish" } else { "bearish" }
}
