//! Trend-following evaluator
//!
//! Entry requires the full conjunction: enough EMAs above the cloud, enough
//! bullish EMAs, fan magnitude above 1 and gaining. Exit is a strict cross
//! of close below the configured exit EMA, so it fires once per crossing
//! rather than on every candle spent under the line.

use crate::indicators::{crossed_below_at, IndicatorError};
use crate::strategies::{EvalContext, PositionState, SignalEvaluator};
use crate::trend::{TrendRung, TrendSeries};
use crate::{Direction, Signal, SignalTag};

use super::config::TrendFollowConfig;

pub struct TrendFollowStrategy {
    config: TrendFollowConfig,
}

impl TrendFollowStrategy {
    pub fn new(config: TrendFollowConfig) -> Self {
        Self { config }
    }

    fn entry_satisfied(&self, series: &TrendSeries, idx: usize) -> bool {
        let snap = series.snapshot(idx);
        if snap.above_cloud_count < self.config.buy_trend_above_senkou_level {
            return false;
        }
        if snap.bullish_count < self.config.buy_trend_bullish_level {
            return false;
        }
        match snap.fan_magnitude {
            Some(fm) if fm > 1.0 => {}
            _ => return false,
        }
        series.fan_magnitude_gaining(
            idx,
            self.config.buy_fan_magnitude_shift_value,
            self.config.buy_min_fan_magnitude_gain,
        )
    }

    fn exit_satisfied(&self, series: &TrendSeries, idx: usize) -> bool {
        let price = series.close_rung_series(TrendRung::M5);
        let exit_ema = series.close_rung_series(self.config.sell_trend_indicator);
        crossed_below_at(price, exit_ema, idx)
    }
}

impl SignalEvaluator for TrendFollowStrategy {
    fn name(&self) -> &'static str {
        "trend_follow"
    }

    fn startup_candles(&self) -> usize {
        TrendSeries::required_candles(&self.config.ichimoku)
            .max(self.config.buy_fan_magnitude_shift_value + 1)
    }

    fn evaluate(&mut self, ctx: &EvalContext<'_>) -> Result<Option<Signal>, IndicatorError> {
        let required = self.startup_candles();
        if ctx.candles.len() < required {
            return Err(IndicatorError::InsufficientHistory {
                required,
                got: ctx.candles.len(),
            });
        }

        let series = TrendSeries::compute(
            ctx.candles,
            &self.config.ichimoku,
            self.config.fan_fast,
            self.config.fan_slow,
        )?;
        let idx = ctx.candles.len() - 1;
        let datetime = ctx.candles[idx].datetime;

        match ctx.position {
            PositionState::Flat => {
                if self.entry_satisfied(&series, idx) {
                    tracing::debug!(symbol = %ctx.symbol, "trend entry conditions met");
                    return Ok(Some(Signal {
                        symbol: ctx.symbol.clone(),
                        datetime,
                        direction: Direction::EnterLong,
                        tag: SignalTag::TrendEntry,
                    }));
                }
            }
            PositionState::InPosition => {
                if self.exit_satisfied(&series, idx) {
                    tracing::debug!(
                        symbol = %ctx.symbol,
                        exit_ema = %self.config.sell_trend_indicator,
                        "close crossed below exit EMA"
                    );
                    return Ok(Some(Signal {
                        symbol: ctx.symbol.clone(),
                        datetime,
                        direction: Direction::ExitLong,
                        tag: SignalTag::TrendExit,
                    }));
                }
            }
        }
        Ok(None)
    }
}
