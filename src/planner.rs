//! Execution planning: tranched entries, staged targets, stop management.
//!
//! The planner turns an accepted signal into an [`ExecutionPlan`]. The
//! optional confirmation delay is returned as scheduling intent
//! (`revalidate_after`) for the orchestrator to honour, never a sleep inside
//! the planning code.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::models::{Direction, Signal};

/// Planner parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Emit a third target at `tp3_r_multiple` (elite plans)
    pub include_tp3: bool,
    /// Confirmation delay before entry; `None` disables re-validation
    pub confirmation_delay: Option<Duration>,
    /// TP1 distance in risk units
    pub tp1_r_multiple: f64,
    /// TP2 distance in risk units
    pub tp2_r_multiple: f64,
    /// TP3 distance in risk units
    pub tp3_r_multiple: f64,
    /// ATR-trailing stop distance multiplier after TP2
    pub trailing_atr_multiple: f64,
    /// Pullback tranche offset, in ATRs against the direction
    pub pullback_atr_multiple: f64,
    /// Confirmation tranche offset, in ATRs with the direction
    pub confirmation_atr_multiple: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            include_tp3: true,
            confirmation_delay: Some(Duration::from_secs(300)),
            tp1_r_multiple: 1.0,
            tp2_r_multiple: 2.0,
            tp3_r_multiple: 3.5,
            trailing_atr_multiple: 1.5,
            pullback_atr_multiple: 0.5,
            confirmation_atr_multiple: 0.25,
        }
    }
}

impl PlannerConfig {
    /// Clamp the confirmation delay into its supported range (30 s – 300 s
    /// by default live).
    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = Some(delay.max(Duration::from_secs(30)));
        self
    }
}

/// One fractional entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tranche {
    /// Label: immediate / pullback / confirmation
    pub label: String,
    /// Fraction of the full position (shares sum to 1.0)
    pub share: f64,
    /// Price that triggers this tranche
    pub trigger: f64,
}

/// One staged exit target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Target price
    pub price: f64,
    /// Fraction of the position to close here
    pub share_to_close: f64,
    /// Distance from entry in risk units
    pub rr_multiple: f64,
}

/// Stop management schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopPlan {
    /// Initial stop (the signal's stop-loss)
    pub initial: f64,
    /// After this price trades (TP1), move the stop to breakeven
    pub breakeven_after: f64,
    /// After this price trades (TP2), trail the stop by ATR
    pub trailing_after: f64,
    /// Trailing distance, in ATRs
    pub trailing_atr_multiple: f64,
}

/// The complete execution plan for one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Entry after any optimization (currently the signal entry)
    pub optimized_entry: f64,
    /// Fractional entries; shares sum to 1.0
    pub tranches: Vec<Tranche>,
    /// Stop schedule
    pub stops: StopPlan,
    /// Staged targets in ascending risk-multiple order
    pub targets: Vec<Target>,
    /// Re-validation intent: the orchestrator should re-run the filter after
    /// this long and abort on a flipped decision
    #[serde(with = "humantime_opt", default)]
    pub revalidate_after: Option<Duration>,
}

// Serialize the optional delay as whole seconds for a stable wire form.
mod humantime_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        v.map(|d| d.as_secs()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

impl ExecutionPlan {
    /// Sum of tranche shares (1.0 up to rounding)
    pub fn total_share(&self) -> f64 {
        self.tranches.iter().map(|t| t.share).sum()
    }
}

/// Builds execution plans from accepted signals.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlanner {
    config: PlannerConfig,
}

impl ExecutionPlanner {
    /// Create a planner.
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Plan tranches, targets, and stops for an entry signal.
    ///
    /// `atr` is the H1 ATR backing the pullback/confirmation offsets and the
    /// trailing stop. HOLD signals cannot be planned.
    pub fn plan(&self, signal: &Signal, atr: f64) -> Result<ExecutionPlan> {
        let (entry, stop) = match (signal.entry_price, signal.stop_loss) {
            (Some(e), Some(s)) => (e, s),
            _ => return Err(EngineError::input("cannot plan a HOLD signal")),
        };
        if atr <= 0.0 || !atr.is_finite() {
            return Err(EngineError::input(format!("ATR must be positive, got {atr}")));
        }

        let sign = match signal.direction {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
            Direction::Hold => return Err(EngineError::input("cannot plan a HOLD signal")),
        };
        let risk = (entry - stop).abs();
        if risk <= 0.0 {
            return Err(EngineError::input("zero risk distance"));
        }

        let tranches = vec![
            Tranche {
                label: "immediate".to_string(),
                share: 0.5,
                trigger: entry,
            },
            Tranche {
                label: "pullback".to_string(),
                share: 0.3,
                trigger: entry - sign * atr * self.config.pullback_atr_multiple,
            },
            Tranche {
                label: "confirmation".to_string(),
                share: 0.2,
                trigger: entry + sign * atr * self.config.confirmation_atr_multiple,
            },
        ];

        let tp1 = entry + sign * risk * self.config.tp1_r_multiple;
        let tp2 = entry + sign * risk * self.config.tp2_r_multiple;

        let mut targets = vec![
            Target {
                price: tp1,
                share_to_close: 0.5,
                rr_multiple: self.config.tp1_r_multiple,
            },
            Target {
                price: tp2,
                share_to_close: 0.3,
                rr_multiple: self.config.tp2_r_multiple,
            },
        ];
        if self.config.include_tp3 {
            targets.push(Target {
                price: entry + sign * risk * self.config.tp3_r_multiple,
                share_to_close: 0.2,
                rr_multiple: self.config.tp3_r_multiple,
            });
        }

        Ok(ExecutionPlan {
            optimized_entry: entry,
            tranches,
            stops: StopPlan {
                initial: stop,
                breakeven_after: tp1,
                trailing_after: tp2,
                trailing_atr_multiple: self.config.trailing_atr_multiple,
            },
            targets,
            revalidate_after: self.config.confirmation_delay,
        })
    }
}
