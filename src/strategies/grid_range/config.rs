//! Grid variant configuration

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::risk::{RoiTable, StopLossConfig, StopTier};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRangeConfig {
    /// Multiplicative spacing between adjacent levels, in (0, 0.2]
    #[serde(default = "default_grid_spacing_pct")]
    pub grid_spacing_pct: f64,

    /// Levels on each side of the reference price, in [1, 10]
    #[serde(default = "default_grid_levels")]
    pub grid_levels: usize,

    /// Smallest allowed distance between adjacent levels, in price units
    #[serde(default = "default_min_tick")]
    pub min_tick: f64,

    /// RSI must sit below this for a level entry, in [10, 50]
    #[serde(default = "default_buy_rsi")]
    pub buy_rsi: f64,

    /// RSI above this (with price over the middle band) forces the exit,
    /// in [50, 90]
    #[serde(default = "default_sell_rsi")]
    pub sell_rsi: f64,

    /// Require volume above its SMA to confirm a level entry
    #[serde(default)]
    pub require_volume: bool,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_bb_period")]
    pub bb_period: usize,

    #[serde(default = "default_bb_std")]
    pub bb_std: f64,

    #[serde(default = "default_volume_sma_period")]
    pub volume_sma_period: usize,

    #[serde(default = "default_stoploss")]
    pub stoploss: StopLossConfig,

    #[serde(default = "RoiTable::grid_default")]
    pub roi: RoiTable,
}

fn default_grid_spacing_pct() -> f64 {
    0.02
}
fn default_grid_levels() -> usize {
    4
}
fn default_min_tick() -> f64 {
    0.01
}
fn default_buy_rsi() -> f64 {
    30.0
}
fn default_sell_rsi() -> f64 {
    70.0
}
fn default_rsi_period() -> usize {
    14
}
fn default_bb_period() -> usize {
    20
}
fn default_bb_std() -> f64 {
    2.0
}
fn default_volume_sma_period() -> usize {
    20
}
fn default_stoploss() -> StopLossConfig {
    StopLossConfig {
        baseline: -0.06,
        tiers: vec![StopTier {
            min_profit: 0.01,
            stop: -0.02,
            entry_tag: None,
        }],
        trailing_enabled: true,
        trailing_activation: 0.015,
        trailing_offset: 0.01,
    }
}

impl Default for GridRangeConfig {
    fn default() -> Self {
        Self {
            grid_spacing_pct: default_grid_spacing_pct(),
            grid_levels: default_grid_levels(),
            min_tick: default_min_tick(),
            buy_rsi: default_buy_rsi(),
            sell_rsi: default_sell_rsi(),
            require_volume: false,
            rsi_period: default_rsi_period(),
            bb_period: default_bb_period(),
            bb_std: default_bb_std(),
            volume_sma_period: default_volume_sma_period(),
            stoploss: default_stoploss(),
            roi: RoiTable::grid_default(),
        }
    }
}

impl GridRangeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.grid_spacing_pct > 0.0 && self.grid_spacing_pct <= 0.2) {
            return Err(ConfigError::invalid(
                "grid_spacing_pct",
                self.grid_spacing_pct,
                "(0, 0.2]",
            ));
        }
        if !(1..=10).contains(&self.grid_levels) {
            return Err(ConfigError::invalid(
                "grid_levels",
                self.grid_levels as f64,
                "[1, 10]",
            ));
        }
        if self.min_tick <= 0.0 {
            return Err(ConfigError::invalid("min_tick", self.min_tick, "> 0"));
        }
        if !(10.0..=50.0).contains(&self.buy_rsi) {
            return Err(ConfigError::invalid("buy_rsi", self.buy_rsi, "[10, 50]"));
        }
        if !(50.0..=90.0).contains(&self.sell_rsi) {
            return Err(ConfigError::invalid("sell_rsi", self.sell_rsi, "[50, 90]"));
        }
        if self.bb_std <= 0.0 {
            return Err(ConfigError::invalid("bb_std", self.bb_std, "> 0"));
        }
        for (name, period) in [
            ("rsi_period", self.rsi_period),
            ("bb_period", self.bb_period),
            ("volume_sma_period", self.volume_sma_period),
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
