//! Engine: per-pair orchestration shell
//!
//! The host runtime calls in once per closed candle per pair, synchronously;
//! each call runs to completion and returns at most one signal. All mutable
//! state is per pair (evaluator + position) or per trade (trailing stop),
//! held in explicit maps; nothing is shared across pairs, so a host that
//! shards pairs across threads simply gives each shard its own `Engine`.

use std::collections::HashMap;

use crate::config::{Config, ConfigError, StrategyParams};
use crate::indicators::IndicatorError;
use crate::risk::{RiskManager, RoiTable};
use crate::strategies::{EvalContext, PositionState, SignalEvaluator};
use crate::{Candle, Direction, Signal, Symbol, TradeSnapshot};

struct PairSlot {
    evaluator: Box<dyn SignalEvaluator>,
    position: PositionState,
}

pub struct Engine {
    params: StrategyParams,
    pairs: HashMap<Symbol, PairSlot>,
    risk: RiskManager,
}

impl Engine {
    /// Build an engine from validated strategy parameters
    pub fn new(params: StrategyParams) -> Result<Self, ConfigError> {
        params.validate()?;
        let risk = RiskManager::new(params.stoploss().clone());
        Ok(Self {
            params,
            pairs: HashMap::new(),
            risk,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(config.strategy.clone())
    }

    /// Evaluate the just-closed candle for one pair.
    ///
    /// `candles` is the pair's full history ending at the closed candle.
    /// Insufficient history is not an error at this boundary: the candle is
    /// skipped and `None` is returned, so the feed can run from its very
    /// first candle.
    pub fn on_candle(&mut self, symbol: &Symbol, candles: &[Candle]) -> Option<Signal> {
        let params = &self.params;
        let slot = self.pairs.entry(symbol.clone()).or_insert_with(|| PairSlot {
            evaluator: params.build_evaluator(),
            position: PositionState::Flat,
        });

        let ctx = EvalContext {
            symbol,
            candles,
            position: slot.position,
        };
        match slot.evaluator.evaluate(&ctx) {
            Ok(Some(signal)) => {
                slot.position = match signal.direction {
                    Direction::EnterLong => PositionState::InPosition,
                    Direction::ExitLong => PositionState::Flat,
                };
                Some(signal)
            }
            Ok(None) => None,
            Err(IndicatorError::InsufficientHistory { required, got }) => {
                tracing::trace!(
                    symbol = %symbol,
                    required = required,
                    got = got,
                    "insufficient history; skipping candle"
                );
                None
            }
            Err(err) => {
                // periods are validated at load, so this is unreachable in
                // practice; skip the candle rather than poison the pipeline
                tracing::warn!(symbol = %symbol, error = %err, "indicator error; skipping candle");
                None
            }
        }
    }

    /// Current stop-loss fraction for an open trade, re-evaluated every tick
    pub fn stoploss_for(&mut self, snapshot: &TradeSnapshot) -> f64 {
        self.risk.evaluate(snapshot)
    }

    /// The execution system reports a closed trade (our exit signal filled,
    /// or its own stop-loss/ROI exit triggered)
    pub fn on_trade_closed(&mut self, symbol: &Symbol) {
        if let Some(slot) = self.pairs.get_mut(symbol) {
            slot.position = PositionState::Flat;
        }
        self.risk.close_trade(symbol);
    }

    /// Position state the engine tracks for a pair
    pub fn position(&self, symbol: &Symbol) -> PositionState {
        self.pairs
            .get(symbol)
            .map(|slot| slot.position)
            .unwrap_or_default()
    }

    /// ROI table the execution collaborator should honor for this variant
    pub fn roi_table(&self) -> &RoiTable {
        self.params.roi()
    }

    pub fn variant_name(&self) -> &'static str {
        self.params.variant_name()
    }
}
