//! The live signal pipeline.
//!
//! Orchestrates loader → indicators → filter → (regime, ml) → planner under
//! one wall-clock budget. Filter rejection is not an error: the caller gets a
//! HOLD signal carrying full diagnostics. Only invalid input, network
//! failures, and deadline/cancellation surface as errors.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{EngineConfig, SymbolProfile};
use crate::context::{Context, SystemClock};
use crate::error::{EngineError, Result};
use crate::filter::{Filter, FilterInputs};
use crate::ml::{self, HeuristicPredictor, Predictor, SignalFeatures};
use crate::models::{Direction, MtfView, Signal, Timeframe};
use crate::planner::{ExecutionPlan, ExecutionPlanner};
use crate::providers::{AuxData, AuxDataClient, KlineClient, MarketData, MtfLoader};
use crate::regime::{RegimeAnalyzer, RegimeAssessment};

/// A produced signal together with its execution plan (entry signals only).
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The signal (HOLD when the filter or validator declined)
    pub signal: Signal,
    /// Execution plan for entry signals
    pub plan: Option<ExecutionPlan>,
    /// Regime assessment backing the signal tags
    pub regime: RegimeAssessment,
}

/// The signal engine: one instance serves many symbols; workers may call it
/// concurrently (each evaluation owns its view and signal state).
pub struct SignalEngine<M, A, P> {
    config: EngineConfig,
    ctx: Context,
    loader: MtfLoader<M>,
    aux_provider: A,
    predictor: P,
    planner: ExecutionPlanner,
    regime_analyzer: RegimeAnalyzer,
}

/// Engine wired to the default providers and the heuristic predictor.
pub type DefaultSignalEngine = SignalEngine<KlineClient, AuxDataClient, HeuristicPredictor>;

impl DefaultSignalEngine {
    /// Build an engine against the configured public endpoints.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let ctx = Context::new(&config);
        let market = KlineClient::new(
            config.market_base_url.clone(),
            config.request_timeout,
            ctx.clone(),
        )?;
        let aux = AuxDataClient::new(&config)?;
        Self::with_components(config, ctx, market, aux, HeuristicPredictor)
    }
}

impl<M: MarketData, A: AuxData, P: Predictor> SignalEngine<M, A, P> {
    /// Build an engine from explicit components (tests inject doubles here).
    pub fn with_components(
        config: EngineConfig,
        ctx: Context,
        market: M,
        aux_provider: A,
        predictor: P,
    ) -> Result<Self> {
        let planner = ExecutionPlanner::new(config.planner.clone());
        Ok(Self {
            loader: MtfLoader::new(market, config.min_bars),
            aux_provider,
            predictor,
            planner,
            regime_analyzer: RegimeAnalyzer::default(),
            ctx,
            config,
        })
    }

    /// Replace the regime analyzer (asset set, thresholds).
    pub fn with_regime_analyzer(mut self, analyzer: RegimeAnalyzer) -> Self {
        self.regime_analyzer = analyzer;
        self
    }

    /// Evaluate one symbol under the configured wall-clock budget.
    pub async fn generate_signal(&self, symbol: &str) -> Result<Signal> {
        Ok(self.evaluate(symbol).await?.signal)
    }

    /// Evaluate one symbol, returning the signal plus its execution plan.
    pub async fn evaluate(&self, symbol: &str) -> Result<Evaluation> {
        let budget = self.config.pipeline_budget;
        match tokio::time::timeout(budget, self.evaluate_inner(symbol)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Deadline {
                budget_ms: budget.as_millis() as u64,
            }),
        }
    }

    /// Like [`evaluate`](Self::evaluate), aborting at the next await point
    /// when `token` fires.
    pub async fn evaluate_cancellable(
        &self,
        symbol: &str,
        token: &CancellationToken,
    ) -> Result<Evaluation> {
        tokio::select! {
            _ = token.cancelled() => Err(EngineError::Cancelled),
            result = self.evaluate(symbol) => result,
        }
    }

    /// Re-run the filter for a previously emitted signal after the
    /// confirmation delay. Returns `true` when the decision still stands.
    pub async fn revalidate(&self, signal: &Signal) -> Result<bool> {
        if signal.direction.is_hold() {
            return Ok(true);
        }
        let evaluation = self.evaluate_inner(&signal.symbol).await?;
        Ok(evaluation.signal.direction == signal.direction)
    }

    async fn evaluate_inner(&self, symbol: &str) -> Result<Evaluation> {
        let profile = SymbolProfile::for_symbol(symbol);
        let view = self.loader.load_mtf(symbol).await?;
        let aux = self.aux_provider.get_aux(symbol).await;

        let inputs = FilterInputs::prepare(&view)?;
        let generated_at = view.current_timestamp();
        let utc_hour = self.ctx.clock.utc_hour();

        // Direction under test comes from the H1 trend; the filter then
        // demands full alignment before accepting it.
        let direction = match (inputs.h1.ema_21, inputs.h1.ema_50) {
            (Some(fast), Some(slow)) if fast > slow => Direction::Buy,
            (Some(_), Some(_)) => Direction::Sell,
            _ => {
                return Err(EngineError::input(format!(
                    "H1 EMA history too short for {symbol}"
                )));
            }
        };

        let filter = Filter::new(self.config.filter.clone(), profile.clone());
        let decision = filter.evaluate(&inputs, &aux, direction, utc_hour);
        debug!(symbol, %direction, score = decision.score, total = decision.total, "filter decision");

        if !decision.accepted {
            let signal = Signal::hold(symbol, generated_at, decision);
            return Ok(Evaluation {
                signal,
                plan: None,
                regime: RegimeAssessment::unknown(),
            });
        }

        let atr = inputs
            .h1
            .atr_14
            .filter(|a| *a > 0.0)
            .ok_or_else(|| EngineError::input("H1 ATR unavailable for level construction"))?;

        let entry = view.current_price();
        let sign = direction.sign();
        let risk = atr * self.config.filter.sl_atr_multiple;
        let stop_loss = entry - sign * risk;
        let tp1 = entry + sign * risk * self.config.tp1_r_multiple;
        let tp2 = entry + sign * risk * self.config.tp2_r_multiple;
        let confidence = decision.score as f64 / decision.total.max(1) as f64 * 100.0;

        let mut signal = Signal::entry(
            symbol,
            direction,
            entry,
            stop_loss,
            tp1,
            tp2,
            None,
            confidence,
            generated_at,
            decision,
        )?;

        // Regime pass: best-effort basket fetch through the shared cache
        let regime = self.assess_regime(symbol, &view).await;
        self.regime_analyzer.apply(&mut signal, &regime);

        // ML pass: approve-by-default when the oracle is down
        let features = SignalFeatures::extract(&signal, &view, &aux, &profile, utc_hour)?;
        let verdict = ml::validate(&self.predictor, &features, self.config.ml_threshold);
        ml::tag_signal(&mut signal, &verdict);
        if !verdict.approved {
            info!(symbol, probability = verdict.probability, "ml validator declined signal");
            let mut hold = Signal::hold(symbol, generated_at, signal.diagnostics.clone());
            hold.tags = signal.tags.clone();
            hold.tags
                .insert("ml_rejected".to_string(), "true".to_string());
            return Ok(Evaluation {
                signal: hold,
                plan: None,
                regime,
            });
        }

        let plan = self.planner.plan(&signal, atr)?;
        if let Some(tp3_target) = plan.targets.get(2) {
            signal.take_profit_3 = Some(tp3_target.price);
        }

        Ok(Evaluation {
            signal,
            plan: Some(plan),
            regime,
        })
    }

    async fn assess_regime(&self, symbol: &str, view: &MtfView) -> RegimeAssessment {
        let mut prices: HashMap<String, Vec<f64>> = HashMap::new();
        prices.insert(symbol.to_string(), view.series(Timeframe::H1).closes());

        let window = self.regime_analyzer.window;
        for basket_symbol in self.regime_analyzer.risk_basket.clone() {
            if basket_symbol == symbol {
                continue;
            }
            match self
                .loader
                .provider()
                .get_candles(&basket_symbol, Timeframe::H1, window)
                .await
            {
                Ok(series) => {
                    prices.insert(basket_symbol, series.closes());
                }
                Err(e) => debug!(symbol = %basket_symbol, error = %e, "basket series unavailable"),
            }
        }

        self.regime_analyzer.classify(symbol, &prices)
    }
}

/// Run one evaluation per symbol concurrently on a shared engine.
///
/// Each worker owns its own view and signal state; the engine's cache and
/// rate limiter are the only shared pieces. Failed symbols yield their error
/// in place.
pub async fn evaluate_many<M: MarketData, A: AuxData, P: Predictor>(
    engine: &SignalEngine<M, A, P>,
    symbols: &[&str],
) -> Vec<(String, Result<Evaluation>)> {
    let futures = symbols.iter().map(|&s| async move {
        let result = engine.evaluate(s).await;
        (s.to_string(), result)
    });
    futures::future::join_all(futures).await
}

/// Build a [`Context`] with the system clock (host convenience).
pub fn default_context(config: &EngineConfig) -> Context {
    Context::new(config).with_clock(Arc::new(SystemClock))
}
