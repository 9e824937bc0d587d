//! Multi-timeframe trend aggregation
//!
//! Builds the EMA "fan" of the trend strategy: eight EMAs of increasing
//! period over the base timeframe, approximating 5m through 8h horizons,
//! plus the Ichimoku cloud. Per candle the fan collapses into counts
//! (rungs above the cloud, bullish rungs) and the fan magnitude ratio.
//!
//! Close EMAs run over raw closes; open EMAs and the cloud run over
//! Heikin Ashi candles, which smooth the body and extremes without
//! touching the close.

use serde::{Deserialize, Serialize};

use crate::indicators::{ema, heikin_ashi, ichimoku, Ichimoku, IchimokuParams, IndicatorError, Series};
use crate::Candle;

/// Number of EMA rungs in the fan
pub const NUM_RUNGS: usize = 8;

/// One rung of the EMA fan, named by the timeframe it approximates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendRung {
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "8h")]
    H8,
}

impl TrendRung {
    pub const ALL: [TrendRung; NUM_RUNGS] = [
        TrendRung::M5,
        TrendRung::M15,
        TrendRung::M30,
        TrendRung::H1,
        TrendRung::H2,
        TrendRung::H4,
        TrendRung::H6,
        TrendRung::H8,
    ];

    /// EMA period on the base (5m) timeframe
    pub fn period(&self) -> usize {
        match self {
            TrendRung::M5 => 1,
            TrendRung::M15 => 3,
            TrendRung::M30 => 6,
            TrendRung::H1 => 12,
            TrendRung::H2 => 24,
            TrendRung::H4 => 48,
            TrendRung::H6 => 72,
            TrendRung::H8 => 96,
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|r| r == self).unwrap_or(0)
    }
}

impl std::fmt::Display for TrendRung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrendRung::M5 => "5m",
            TrendRung::M15 => "15m",
            TrendRung::M30 => "30m",
            TrendRung::H1 => "1h",
            TrendRung::H2 => "2h",
            TrendRung::H4 => "4h",
            TrendRung::H6 => "6h",
            TrendRung::H8 => "8h",
        };
        f.write_str(name)
    }
}

/// Per-candle aggregate of the fan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSnapshot {
    /// Rungs whose close EMA sits strictly above both cloud spans, in [0, 8]
    pub above_cloud_count: usize,
    /// Rungs whose close EMA sits strictly above their open EMA, in [0, 8]
    pub bullish_count: usize,
    /// Fast-over-slow EMA ratio; `None` during warm-up
    pub fan_magnitude: Option<f64>,
}

/// The computed fan for a candle history
#[derive(Debug, Clone)]
pub struct TrendSeries {
    close_ladder: Vec<Series>,
    open_ladder: Vec<Series>,
    cloud: Ichimoku,
    fan_magnitude: Series,
    len: usize,
}

impl TrendSeries {
    /// Longest lookback of the fan for the given cloud parameters
    pub fn required_candles(ichimoku_params: &IchimokuParams) -> usize {
        let slowest = TrendRung::H8.period();
        slowest.max(ichimoku_params.required_candles())
    }

    /// Compute the full fan over a candle history.
    ///
    /// `fan_fast` / `fan_slow` choose the rungs whose ratio forms the fan
    /// magnitude (1h over 8h in the reference configuration).
    pub fn compute(
        candles: &[Candle],
        ichimoku_params: &IchimokuParams,
        fan_fast: TrendRung,
        fan_slow: TrendRung,
    ) -> Result<Self, IndicatorError> {
        let required = Self::required_candles(ichimoku_params);
        if candles.len() < required {
            return Err(IndicatorError::InsufficientHistory {
                required,
                got: candles.len(),
            });
        }

        let smoothed = heikin_ashi(candles);
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let opens: Vec<f64> = smoothed.iter().map(|c| c.open).collect();
        let highs: Vec<f64> = smoothed.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = smoothed.iter().map(|c| c.low).collect();

        let mut close_ladder = Vec::with_capacity(NUM_RUNGS);
        let mut open_ladder = Vec::with_capacity(NUM_RUNGS);
        for rung in TrendRung::ALL {
            close_ladder.push(ema(&closes, rung.period())?);
            open_ladder.push(ema(&opens, rung.period())?);
        }

        let cloud = ichimoku(&highs, &lows, ichimoku_params)?;

        let fast = &close_ladder[fan_fast.index()];
        let slow = &close_ladder[fan_slow.index()];
        let fan_magnitude: Series = fast
            .iter()
            .zip(slow.iter())
            .map(|(f, s)| match (f, s) {
                (Some(f), Some(s)) if *s != 0.0 => Some(f / s),
                _ => None,
            })
            .collect();

        Ok(Self {
            close_ladder,
            open_ladder,
            cloud,
            fan_magnitude,
            len: candles.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Full close EMA series of a rung
    pub fn close_rung_series(&self, rung: TrendRung) -> &[Option<f64>] {
        &self.close_ladder[rung.index()]
    }

    /// Fan magnitude at a candle index
    pub fn fan_magnitude(&self, idx: usize) -> Option<f64> {
        self.fan_magnitude.get(idx).copied().flatten()
    }

    /// Aggregate counts at a candle index.
    ///
    /// Counts use strict inequality; equal values and warm-up `None`s do
    /// not count toward either side, so early candles read as zero rather
    /// than erroring.
    pub fn snapshot(&self, idx: usize) -> TrendSnapshot {
        let span_a = self.cloud.senkou_a.get(idx).copied().flatten();
        let span_b = self.cloud.senkou_b.get(idx).copied().flatten();

        let mut above_cloud_count = 0;
        let mut bullish_count = 0;
        for r in 0..NUM_RUNGS {
            let close = self.close_ladder[r].get(idx).copied().flatten();
            let open = self.open_ladder[r].get(idx).copied().flatten();

            if let (Some(close), Some(a), Some(b)) = (close, span_a, span_b) {
                if close > a && close > b {
                    above_cloud_count += 1;
                }
            }
            if let (Some(close), Some(open)) = (close, open) {
                if close > open {
                    bullish_count += 1;
                }
            }
        }

        TrendSnapshot {
            above_cloud_count,
            bullish_count,
            fan_magnitude: self.fan_magnitude(idx),
        }
    }

    /// Whether the fan magnitude is gaining at `idx`: the ratio to the
    /// previous candle is at least `min_gain`, and the current value
    /// strictly exceeds each of the previous `shift` values.
    ///
    /// Any warm-up `None` in the window reads as not gaining.
    pub fn fan_magnitude_gaining(&self, idx: usize, shift: usize, min_gain: f64) -> bool {
        if idx < shift || shift == 0 {
            return false;
        }
        let current = match self.fan_magnitude(idx) {
            Some(v) => v,
            None => return false,
        };
        let previous = match self.fan_magnitude(idx - 1) {
            Some(v) if v != 0.0 => v,
            _ => return false,
        };
        if current / previous < min_gain {
            return false;
        }
        for x in 1..=shift {
            match self.fan_magnitude(idx - x) {
                Some(earlier) if earlier < current => {}
                _ => return false,
            }
        }
        true
    }
}
