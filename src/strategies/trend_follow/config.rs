//! Trend-following configuration
//!
//! Defaults mirror the reference parameter bundle; every threshold is a
//! named, bounded knob for the host's optimizer.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::indicators::IchimokuParams;
use crate::risk::{RoiTable, StopLossConfig};
use crate::trend::TrendRung;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendFollowConfig {
    /// EMAs that must sit above the cloud for entry, in [1, 8]
    #[serde(default = "default_above_senkou_level")]
    pub buy_trend_above_senkou_level: usize,

    /// EMAs that must be bullish (close EMA > open EMA) for entry, in [1, 8]
    #[serde(default = "default_bullish_level")]
    pub buy_trend_bullish_level: usize,

    /// Candles the fan magnitude must have been rising over, in [1, 10]
    #[serde(default = "default_shift_value")]
    pub buy_fan_magnitude_shift_value: usize,

    /// Minimum candle-over-candle fan magnitude gain, in [1.001, 1.01]
    #[serde(default = "default_min_gain")]
    pub buy_min_fan_magnitude_gain: f64,

    /// Which close EMA the exit cross is measured against
    #[serde(default = "default_sell_indicator")]
    pub sell_trend_indicator: TrendRung,

    /// Fast rung of the fan magnitude ratio
    #[serde(default = "default_fan_fast")]
    pub fan_fast: TrendRung,

    /// Slow rung of the fan magnitude ratio
    #[serde(default = "default_fan_slow")]
    pub fan_slow: TrendRung,

    #[serde(default = "default_ichimoku")]
    pub ichimoku: IchimokuParams,

    #[serde(default)]
    pub stoploss: StopLossConfig,

    #[serde(default = "RoiTable::trend_default")]
    pub roi: RoiTable,
}

fn default_above_senkou_level() -> usize {
    1
}
fn default_bullish_level() -> usize {
    6
}
fn default_shift_value() -> usize {
    3
}
fn default_min_gain() -> f64 {
    1.002
}
fn default_sell_indicator() -> TrendRung {
    TrendRung::M30
}
fn default_fan_fast() -> TrendRung {
    TrendRung::H1
}
fn default_fan_slow() -> TrendRung {
    TrendRung::H8
}
fn default_ichimoku() -> IchimokuParams {
    IchimokuParams {
        conversion_period: 20,
        base_period: 60,
        span_b_period: 120,
        displacement: 30,
    }
}

impl Default for TrendFollowConfig {
    fn default() -> Self {
        Self {
            buy_trend_above_senkou_level: default_above_senkou_level(),
            buy_trend_bullish_level: default_bullish_level(),
            buy_fan_magnitude_shift_value: default_shift_value(),
            buy_min_fan_magnitude_gain: default_min_gain(),
            sell_trend_indicator: default_sell_indicator(),
            fan_fast: default_fan_fast(),
            fan_slow: default_fan_slow(),
            ichimoku: default_ichimoku(),
            stoploss: StopLossConfig::default(),
            roi: RoiTable::trend_default(),
        }
    }
}

impl TrendFollowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=8).contains(&self.buy_trend_above_senkou_level) {
            return Err(ConfigError::invalid(
                "buy_trend_above_senkou_level",
                self.buy_trend_above_senkou_level as f64,
                "[1, 8]",
            ));
        }
        if !(1..=8).contains(&self.buy_trend_bullish_level) {
            return Err(ConfigError::invalid(
                "buy_trend_bullish_level",
                self.buy_trend_bullish_level as f64,
                "[1, 8]",
            ));
        }
        if !(1..=10).contains(&self.buy_fan_magnitude_shift_value) {
            return Err(ConfigError::invalid(
                "buy_fan_magnitude_shift_value",
                self.buy_fan_magnitude_shift_value as f64,
                "[1, 10]",
            ));
        }
        if !(1.001..=1.01).contains(&self.buy_min_fan_magnitude_gain) {
            return Err(ConfigError::invalid(
                "buy_min_fan_magnitude_gain",
                self.buy_min_fan_magnitude_gain,
                "[1.001, 1.01]",
            ));
        }
        if self.fan_fast.period() >= self.fan_slow.period() {
            return Err(ConfigError::invalid(
                "fan_fast",
                self.fan_fast.period() as f64,
                "faster than fan_slow",
            ));
        }
        if self.ichimoku.displacement == 0 {
            return Err(ConfigError::invalid(
                "ichimoku.displacement",
                0.0,
                ">= 1",
            ));
        }
        self.stoploss.validate()?;
        self.roi.validate()?;
        Ok(())
    }
}
