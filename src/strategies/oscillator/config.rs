//! Oscillator configuration

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::risk::{RoiStep, RoiTable, StopLossConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OscillatorConfig {
    /// Fast RSI must sit below this for entry, in [20, 70]
    #[serde(default = "default_buy_rsi_fast")]
    pub buy_rsi_fast: f64,

    /// Slow RSI must sit below this for entry, in [15, 50]
    #[serde(default = "default_buy_rsi_slow")]
    pub buy_rsi_slow: f64,

    /// Primary RSI must sit below this for entry, in [15, 50]
    #[serde(default = "default_buy_rsi")]
    pub buy_rsi: f64,

    /// Close must sit below SMA(15) times this ratio, in [0.9, 1.0]
    #[serde(default = "default_buy_closedelta")]
    pub buy_closedelta: f64,

    /// Correlation trend indicator must sit below this, in [-1, 0]
    #[serde(default = "default_buy_cti")]
    pub buy_cti: f64,

    /// Fast RSI crossing above this triggers the exit, in [50, 100]
    #[serde(default = "default_sell_fastx")]
    pub sell_fastx: f64,

    #[serde(default = "default_rsi_fast_period")]
    pub rsi_fast_period: usize,

    #[serde(default = "default_rsi_slow_period")]
    pub rsi_slow_period: usize,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_sma_period")]
    pub sma_period: usize,

    #[serde(default = "default_cti_period")]
    pub cti_period: usize,

    #[serde(default = "default_stoploss")]
    pub stoploss: StopLossConfig,

    #[serde(default = "default_roi")]
    pub roi: RoiTable,
}

fn default_buy_rsi_fast() -> f64 {
    40.0
}
fn default_buy_rsi_slow() -> f64 {
    45.0
}
fn default_buy_rsi() -> f64 {
    42.0
}
fn default_buy_closedelta() -> f64 {
    0.973
}
fn default_buy_cti() -> f64 {
    -0.69
}
fn default_sell_fastx() -> f64 {
    84.0
}
fn default_rsi_fast_period() -> usize {
    4
}
fn default_rsi_slow_period() -> usize {
    20
}
fn default_rsi_period() -> usize {
    14
}
fn default_sma_period() -> usize {
    15
}
fn default_cti_period() -> usize {
    20
}
fn default_stoploss() -> StopLossConfig {
    StopLossConfig {
        baseline: -0.25,
        ..StopLossConfig::default()
    }
}
fn default_roi() -> RoiTable {
    RoiTable::new(vec![RoiStep {
        after_minutes: 0,
        profit: 0.1,
    }])
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        Self {
            buy_rsi_fast: default_buy_rsi_fast(),
            buy_rsi_slow: default_buy_rsi_slow(),
            buy_rsi: default_buy_rsi(),
            buy_closedelta: default_buy_closedelta(),
            buy_cti: default_buy_cti(),
            sell_fastx: default_sell_fastx(),
            rsi_fast_period: default_rsi_fast_period(),
            rsi_slow_period: default_rsi_slow_period(),
            rsi_period: default_rsi_period(),
            sma_period: default_sma_period(),
            cti_period: default_cti_period(),
            stoploss: default_stoploss(),
            roi: default_roi(),
        }
    }
}

impl OscillatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(20.0..=70.0).contains(&self.buy_rsi_fast) {
            return Err(ConfigError::invalid(
                "buy_rsi_fast",
                self.buy_rsi_fast,
                "[20, 70]",
            ));
        }
        if !(15.0..=50.0).contains(&self.buy_rsi_slow) {
            return Err(ConfigError::invalid(
                "buy_rsi_slow",
                self.buy_rsi_slow,
                "[15, 50]",
            ));
        }
        if !(15.0..=50.0).contains(&self.buy_rsi) {
            return Err(ConfigError::invalid("buy_rsi", self.buy_rsi, "[15, 50]"));
        }
        if !(0.9..=1.0).contains(&self.buy_closedelta) {
            return Err(ConfigError::invalid(
                "buy_closedelta",
                self.buy_closedelta,
                "[0.9, 1.0]",
            ));
        }
        if !(-1.0..=0.0).contains(&self.buy_cti) {
            return Err(ConfigError::invalid("buy_cti", self.buy_cti, "[-1, 0]"));
        }
        if !(50.0..=100.0).contains(&self.sell_fastx) {
            return Err(ConfigError::invalid(
                "sell_fastx",
                self.sell_fastx,
                "[50, 100]",
            ));
        }
        for (name, period) in [
            ("rsi_fast_period", self.rsi_fast_period),
            ("rsi_slow_period", self.rsi_slow_period),
            ("rsi_period", self.rsi_period),
            ("sma_period", self.sma_period),
            ("cti_period", self.cti_period),
        ] {
            if period < 2 {
                return Err(ConfigError::invalid(name, period as f64, ">= 2"));
            }
        }
        self.stoploss.validate()?;
        self.roi.validate()?;
        Ok(())
    }
}
