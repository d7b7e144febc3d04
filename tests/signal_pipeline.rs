//! Signal pipeline integration: filter determinism, regime adjustment, and
//! canonical serialization.

use std::collections::HashMap;

use signal_forge::config::SymbolProfile;
use signal_forge::filter::{CriterionSet, Filter, FilterConfig, FilterInputs, FilterTier};
use signal_forge::models::{
    AuxiliaryContext, Candle, CriterionResult, Direction, FilterDecision, MtfView, Series, Signal,
    Timeframe,
};
use signal_forge::regime::{Regime, RegimeAnalyzer};

fn synthetic_view(rising: bool) -> MtfView {
    let anchor = 1_700_000_000_i64;
    let mut all = Vec::new();
    for tf in Timeframe::ALL {
        let step = tf.duration_secs();
        let count = 250;
        let end = anchor - step;
        let start = end - (count as i64 - 1) * step;
        let candles: Vec<Candle> = (0..count)
            .map(|i| {
                let drift = i as f64 * 120.0;
                let price = if rising { 40_000.0 + drift } else { 80_000.0 - drift };
                Candle {
                    timestamp: start + i as i64 * step,
                    open: price,
                    high: price * 1.005,
                    low: price * 0.995,
                    close: price,
                    volume: 900.0 + (i % 5) as f64 * 60.0,
                }
            })
            .collect();
        all.push(Series::new("BTCUSDT", tf, candles).unwrap());
    }
    MtfView::new(all, 200).unwrap()
}

fn crypto_aux() -> AuxiliaryContext {
    AuxiliaryContext {
        funding_rate: Some(-0.0004),
        open_interest_usd: Some(5.0e9),
        btc_dominance_pct: Some(56.0),
        eth_btc_ratio: Some(0.055),
        fear_greed_score: Some(18),
        news: vec![],
    }
}

#[test]
fn filter_decision_is_bit_identical_across_runs() {
    let view = synthetic_view(true);
    let aux = crypto_aux();
    let filter = Filter::new(FilterConfig::default(), SymbolProfile::for_symbol("BTCUSDT"));

    let inputs = FilterInputs::prepare(&view).unwrap();
    let first = filter.evaluate(&inputs, &aux, Direction::Buy, 15);

    for _ in 0..5 {
        let inputs = FilterInputs::prepare(&view).unwrap();
        let decision = filter.evaluate(&inputs, &aux, Direction::Buy, 15);
        assert_eq!(first, decision);
    }
}

#[test]
fn filter_preserves_criterion_order() {
    let view = synthetic_view(true);
    let aux = crypto_aux();
    let filter = Filter::new(FilterConfig::default(), SymbolProfile::for_symbol("BTCUSDT"));
    let inputs = FilterInputs::prepare(&view).unwrap();
    let decision = filter.evaluate(&inputs, &aux, Direction::Buy, 15);

    let expected: Vec<&str> = CriterionSet::crypto_extended()
        .criteria()
        .iter()
        .map(|c| c.name())
        .collect();
    let actual: Vec<&str> = decision.criteria.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(expected, actual);
    assert_eq!(decision.total, 23);
    assert_eq!(
        decision.score,
        decision.criteria.iter().filter(|c| c.passed).count()
    );
}

#[test]
fn criterion_count_is_configurable() {
    let profile = SymbolProfile::for_symbol("BTCUSDT");

    let extended = Filter::new(FilterConfig::default(), profile.clone());
    assert_eq!(extended.set().len(), 23);

    let substituted = Filter::new(
        FilterConfig {
            extend_with_asset_criteria: false,
            ..FilterConfig::default()
        },
        profile,
    );
    assert_eq!(substituted.set().len(), 20);

    let forex = Filter::new(FilterConfig::default(), SymbolProfile::for_symbol("EURUSD"));
    assert_eq!(forex.set().len(), 20);
}

#[test]
fn ultra_tier_requires_every_criterion() {
    let view = synthetic_view(true);
    let aux = crypto_aux();
    let profile = SymbolProfile::for_symbol("BTCUSDT");

    let ultra = Filter::new(
        FilterConfig {
            tier: FilterTier::Ultra,
            ..FilterConfig::default()
        },
        profile.clone(),
    );
    let elite = Filter::new(FilterConfig::default(), profile);

    let inputs = FilterInputs::prepare(&view).unwrap();
    let ultra_decision = ultra.evaluate(&inputs, &aux, Direction::Buy, 15);
    let elite_decision = elite.evaluate(&inputs, &aux, Direction::Buy, 15);

    // The default risk/reward constants guarantee at least one recorded fail,
    // so Ultra cannot accept while Elite tolerates up to three
    assert!(!ultra_decision.accepted);
    assert_eq!(ultra_decision.score, elite_decision.score);
    assert!(elite_decision.score >= elite_decision.total - 3 || !elite_decision.accepted);
}

// --- Scenario 5: regime flips confidence --------------------------------

#[test]
fn regime_flip_changes_multipliers_on_identical_signals() {
    let decision = FilterDecision {
        accepted: true,
        criteria: vec![CriterionResult::pass("mtf_alignment", "aligned")],
        score: 1,
        total: 1,
        overall_message: "[A+] all 1 criteria met".to_string(),
    };
    let base_signal = Signal::entry(
        "BTCUSDT",
        Direction::Buy,
        50_000.0,
        49_250.0,
        51_500.0,
        52_250.0,
        None,
        80.0,
        1_700_000_000,
        decision,
    )
    .unwrap();

    let analyzer = RegimeAnalyzer::default();
    let rising: Vec<f64> = (0..120).map(|i| 100.0 + i as f64).collect();
    let falling: Vec<f64> = (0..120).map(|i| 100.0 - i as f64 * 0.5).collect();

    // Context A: the basket moves with the candidate
    let mut risk_on_prices = HashMap::new();
    risk_on_prices.insert("BTCUSDT".to_string(), rising.clone());
    risk_on_prices.insert("EURUSD".to_string(), rising.clone());
    risk_on_prices.insert("GBPUSD".to_string(), rising.clone());

    // Context B: the basket moves against the candidate
    let mut risk_off_prices = HashMap::new();
    risk_off_prices.insert("BTCUSDT".to_string(), rising);
    risk_off_prices.insert("EURUSD".to_string(), falling.clone());
    risk_off_prices.insert("GBPUSD".to_string(), falling);

    let risk_on = analyzer.classify("BTCUSDT", &risk_on_prices);
    let risk_off = analyzer.classify("BTCUSDT", &risk_off_prices);
    assert_eq!(risk_on.regime, Regime::RiskOn);
    assert_eq!(risk_off.regime, Regime::RiskOff);

    let mut signal_a = base_signal.clone();
    let mut signal_b = base_signal.clone();
    analyzer.apply(&mut signal_a, &risk_on);
    analyzer.apply(&mut signal_b, &risk_off);

    assert_eq!(signal_a.tags["regime"], "RISK_ON");
    assert_eq!(signal_b.tags["regime"], "RISK_OFF");
    assert_eq!(signal_a.tags["size_multiplier"], "1.20");
    assert_eq!(signal_b.tags["size_multiplier"], "0.80");
    assert_eq!(signal_a.tags["confidence_multiplier"], "1.20");
    assert_eq!(signal_b.tags["confidence_multiplier"], "0.80");

    // Confidence scaled by the configured factors: 80 × 1.2 vs 80 × 0.8
    assert!((signal_a.confidence_pct - 96.0).abs() < 1e-9);
    assert!((signal_b.confidence_pct - 64.0).abs() < 1e-9);
}

// --- Canonical serialization --------------------------------------------

#[test]
fn signal_roundtrips_through_canonical_json() {
    let view = synthetic_view(true);
    let aux = crypto_aux();
    let filter = Filter::new(FilterConfig::default(), SymbolProfile::for_symbol("BTCUSDT"));
    let inputs = FilterInputs::prepare(&view).unwrap();
    let decision = filter.evaluate(&inputs, &aux, Direction::Buy, 15);

    let signal = if decision.accepted {
        Signal::entry(
            "BTCUSDT",
            Direction::Buy,
            view.current_price(),
            view.current_price() * 0.985,
            view.current_price() * 1.03,
            view.current_price() * 1.045,
            Some(view.current_price() * 1.0525),
            decision.score as f64 / decision.total as f64 * 100.0,
            view.current_timestamp(),
            decision,
        )
        .unwrap()
        .with_tag("regime", "NEUTRAL")
    } else {
        Signal::hold("BTCUSDT", view.current_timestamp(), decision)
    };

    let json = serde_json::to_string(&signal).unwrap();
    let back: Signal = serde_json::from_str(&json).unwrap();
    assert_eq!(signal, back);

    // And the serialized form is stable across repeated encodings
    assert_eq!(json, serde_json::to_string(&back).unwrap());
}

#[test]
fn hold_signals_carry_no_exit_levels() {
    let view = synthetic_view(false);
    let aux = AuxiliaryContext::default();
    // The Ultra tier cannot be met under default criterion constants
    let filter = Filter::new(
        FilterConfig {
            tier: FilterTier::Ultra,
            ..FilterConfig::default()
        },
        SymbolProfile::for_symbol("BTCUSDT"),
    );
    let inputs = FilterInputs::prepare(&view).unwrap();
    let decision = filter.evaluate(&inputs, &aux, Direction::Sell, 3);
    assert!(!decision.accepted);

    let hold = Signal::hold("BTCUSDT", view.current_timestamp(), decision);
    assert!(hold.direction.is_hold());
    assert!(hold.entry_price.is_none());
    assert!(hold.stop_loss.is_none());
    assert!(hold.take_profit_1.is_none());
    assert!(!hold.diagnostics.criteria.is_empty());
}
