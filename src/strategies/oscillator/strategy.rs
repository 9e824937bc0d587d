//! Oscillator evaluator
//!
//! Entry buys an oversold dip: three RSI horizons below their thresholds,
//! close sufficiently under its SMA, and the correlation trend indicator
//! confirming a down-leg. Exit is a strict upward cross of the fast RSI
//! through the sell threshold, firing exactly once per crossing.

use crate::indicators::{cti, crossed_above_level, rsi, sma, IndicatorError};
use crate::strategies::{EvalContext, PositionState, SignalEvaluator};
use crate::{Direction, Signal, SignalTag};

use super::config::OscillatorConfig;

pub struct OscillatorStrategy {
    config: OscillatorConfig,
}

impl OscillatorStrategy {
    pub fn new(config: OscillatorConfig) -> Self {
        Self { config }
    }
}

impl SignalEvaluator for OscillatorStrategy {
    fn name(&self) -> &'static str {
        "oscillator"
    }

    fn startup_candles(&self) -> usize {
        let c = &self.config;
        (c.rsi_fast_period + 1)
            .max(c.rsi_slow_period + 1)
            .max(c.rsi_period + 1)
            .max(c.sma_period)
            .max(c.cti_period)
    }

    fn evaluate(&mut self, ctx: &EvalContext<'_>) -> Result<Option<Signal>, IndicatorError> {
        let required = self.startup_candles();
        if ctx.candles.len() < required {
            return Err(IndicatorError::InsufficientHistory {
                required,
                got: ctx.candles.len(),
            });
        }

        let closes: Vec<f64> = ctx.candles.iter().map(|c| c.close).collect();
        let idx = closes.len() - 1;
        let datetime = ctx.candles[idx].datetime;

        let rsi_fast = rsi(&closes, self.config.rsi_fast_period)?;

        match ctx.position {
            PositionState::Flat => {
                let rsi_slow = rsi(&closes, self.config.rsi_slow_period)?;
                let rsi_primary = rsi(&closes, self.config.rsi_period)?;
                let sma_values = sma(&closes, self.config.sma_period)?;
                let cti_values = cti(&closes, self.config.cti_period)?;

                let current = (
                    rsi_fast[idx],
                    rsi_slow[idx],
                    rsi_primary[idx],
                    sma_values[idx],
                    cti_values[idx],
                );
                if let (Some(fast), Some(slow), Some(primary), Some(sma_now), Some(cti_now)) =
                    current
                {
                    let close = closes[idx];
                    let entry = fast < self.config.buy_rsi_fast
                        && slow < self.config.buy_rsi_slow
                        && primary < self.config.buy_rsi
                        && close < sma_now * self.config.buy_closedelta
                        && cti_now < self.config.buy_cti;
                    if entry {
                        tracing::debug!(
                            symbol = %ctx.symbol,
                            rsi_fast = fast,
                            cti = cti_now,
                            "oscillator dip entry"
                        );
                        return Ok(Some(Signal {
                            symbol: ctx.symbol.clone(),
                            datetime,
                            direction: Direction::EnterLong,
                            tag: SignalTag::BuyNew,
                        }));
                    }
                }
            }
            PositionState::InPosition => {
                if crossed_above_level(&rsi_fast, self.config.sell_fastx, idx) {
                    tracing::debug!(
                        symbol = %ctx.symbol,
                        sell_fastx = self.config.sell_fastx,
                        "fast RSI crossed above sell threshold"
                    );
                    return Ok(Some(Signal {
                        symbol: ctx.symbol.clone(),
                        datetime,
                        direction: Direction::ExitLong,
                        tag: SignalTag::FastxExit,
                    }));
                }
            }
        }
        Ok(None)
    }
}
