//! Grid evaluator
//!
//! Buys when price drops onto an empty ladder level while RSI confirms the
//! dip; exits at the mirrored level above, or globally once RSI is
//! overbought with price over the middle band. The ladder itself lives in
//! [`GridBook`] and re-centers whenever price escapes it.

use crate::grid::GridBook;
use crate::indicators::{bollinger_bands, rsi, volume_sma, IndicatorError};
use crate::strategies::{EvalContext, PositionState, SignalEvaluator};
use crate::types::Price;
use crate::{Direction, Signal, SignalTag};

use super::config::GridRangeConfig;

pub struct GridRangeStrategy {
    config: GridRangeConfig,
    book: GridBook,
    /// Ladder index of the level backing the open position
    active_fill: Option<i32>,
}

impl GridRangeStrategy {
    pub fn new(config: GridRangeConfig) -> Self {
        let book = GridBook::new(config.grid_spacing_pct, config.grid_levels, config.min_tick);
        Self {
            config,
            book,
            active_fill: None,
        }
    }

    pub fn book(&self) -> &GridBook {
        &self.book
    }

    fn volume_confirmed(&self, ctx: &EvalContext<'_>, idx: usize) -> Result<bool, IndicatorError> {
        if !self.config.require_volume {
            return Ok(true);
        }
        let vol_sma = volume_sma(ctx.candles, self.config.volume_sma_period)?;
        Ok(match vol_sma[idx] {
            Some(avg) => ctx.candles[idx].volume > avg,
            None => false,
        })
    }
}

impl SignalEvaluator for GridRangeStrategy {
    fn name(&self) -> &'static str {
        "grid_range"
    }

    fn startup_candles(&self) -> usize {
        (self.config.rsi_period + 1)
            .max(self.config.bb_period)
            .max(self.config.volume_sma_period)
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
        let close = closes[idx];
        let prev_close = closes[idx - 1];
        let datetime = ctx.candles[idx].datetime;

        let rsi_values = rsi(&closes, self.config.rsi_period)?;
        let rsi_now = rsi_values[idx];

        match ctx.position {
            PositionState::Flat => {
                // the ladder only moves while flat; an open position keeps
                // its fill anchored to the levels it entered on
                self.book.recenter_if_needed(close);
                self.book.release_recovered(close);

                let touched = self.book.touched_from_above(prev_close, close);
                let oversold = matches!(rsi_now, Some(r) if r < self.config.buy_rsi);
                if let Some(level_idx) = touched {
                    if oversold && self.volume_confirmed(ctx, idx)? {
                        self.book.mark_filled(level_idx);
                        self.active_fill = Some(level_idx);
                        tracing::debug!(
                            symbol = %ctx.symbol,
                            level = level_idx,
                            close = close,
                            "grid level entry"
                        );
                        return Ok(Some(Signal {
                            symbol: ctx.symbol.clone(),
                            datetime,
                            direction: Direction::EnterLong,
                            tag: SignalTag::GridBuy,
                        }));
                    }
                }
            }
            PositionState::InPosition => {
                let mirror_hit = self
                    .active_fill
                    .and_then(|fill| self.book.mirror_exit(fill))
                    .map(|target| Price::from_f64(close) >= target)
                    .unwrap_or(false);

                let (_, middle, _) =
                    bollinger_bands(&closes, self.config.bb_period, self.config.bb_std)?;
                let overbought = match (rsi_now, middle[idx]) {
                    (Some(r), Some(mid)) => r > self.config.sell_rsi && close > mid,
                    _ => false,
                };

                if mirror_hit || overbought {
                    tracing::debug!(
                        symbol = %ctx.symbol,
                        mirror_hit = mirror_hit,
                        overbought = overbought,
                        "grid exit"
                    );
                    self.active_fill = None;
                    return Ok(Some(Signal {
                        symbol: ctx.symbol.clone(),
                        datetime,
                        direction: Direction::ExitLong,
                        tag: SignalTag::GridExit,
                    }));
                }
            }
        }
        Ok(None)
    }
}
