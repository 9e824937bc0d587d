//! Configuration management
//!
//! Loads the engine configuration from JSON and validates every parameter
//! against its declared bound before any evaluation begins. Out-of-range
//! values are fatal here, never mid-evaluation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::risk::{RoiTable, StopLossConfig};
use crate::strategies::grid_range::{GridRangeConfig, GridRangeStrategy};
use crate::strategies::oscillator::{OscillatorConfig, OscillatorStrategy};
use crate::strategies::trend_follow::{TrendFollowConfig, TrendFollowStrategy};
use crate::strategies::SignalEvaluator;
use crate::Symbol;

/// Fatal configuration errors, surfaced to the operator at load time
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid parameter {name}: {value} (expected {bound})")]
    InvalidParameter {
        name: String,
        value: f64,
        bound: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(name: &str, value: f64, bound: &str) -> Self {
        ConfigError::InvalidParameter {
            name: name.to_string(),
            value,
            bound: bound.to_string(),
        }
    }
}

/// Parameter bundle of one strategy variant
///
/// The `variant` field discriminates; unknown variants and unknown
/// categorical values fail at parse, before validation even runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum StrategyParams {
    TrendFollow(TrendFollowConfig),
    Oscillator(OscillatorConfig),
    GridRange(GridRangeConfig),
}

impl StrategyParams {
    pub fn variant_name(&self) -> &'static str {
        match self {
            StrategyParams::TrendFollow(_) => "trend_follow",
            StrategyParams::Oscillator(_) => "oscillator",
            StrategyParams::GridRange(_) => "grid_range",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            StrategyParams::TrendFollow(c) => c.validate(),
            StrategyParams::Oscillator(c) => c.validate(),
            StrategyParams::GridRange(c) => c.validate(),
        }
    }

    /// Build a fresh evaluator instance for one pair
    pub fn build_evaluator(&self) -> Box<dyn SignalEvaluator> {
        match self {
            StrategyParams::TrendFollow(c) => Box::new(TrendFollowStrategy::new(c.clone())),
            StrategyParams::Oscillator(c) => Box::new(OscillatorStrategy::new(c.clone())),
            StrategyParams::GridRange(c) => Box::new(GridRangeStrategy::new(c.clone())),
        }
    }

    pub fn stoploss(&self) -> &StopLossConfig {
        match self {
            StrategyParams::TrendFollow(c) => &c.stoploss,
            StrategyParams::Oscillator(c) => &c.stoploss,
            StrategyParams::GridRange(c) => &c.stoploss,
        }
    }

    pub fn roi(&self) -> &RoiTable {
        match self {
            StrategyParams::TrendFollow(c) => &c.roi,
            StrategyParams::Oscillator(c) => &c.roi,
            StrategyParams::GridRange(c) => &c.roi,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub symbols: Vec<String>,
    pub strategy: StrategyParams,
}

impl Config {
    /// Load configuration from a JSON file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config
            .strategy
            .validate()
            .context("Invalid strategy parameters")?;
        Ok(config)
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols.iter().map(Symbol::new).collect()
    }
}
