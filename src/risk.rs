//! Risk management: dynamic stop-loss and trailing floor per open trade
//!
//! The risk manager runs independently of signal evaluation. Every tick the
//! execution system hands it a read-only trade snapshot and receives back a
//! stop-loss fraction (relative to entry price, negative below entry). State
//! is one small record per open trade in an explicit arena keyed by symbol;
//! nothing is shared across trades.

use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::{Symbol, TradeSnapshot};

/// One tightening tier: once profit reaches `min_profit` (and the entry tag
/// matches, when one is required) the stop floor moves to `stop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopTier {
    pub min_profit: f64,
    pub stop: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_tag: Option<String>,
}

/// Stop-loss policy for one strategy variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLossConfig {
    /// Catastrophic backstop, a large negative fraction
    pub baseline: f64,
    /// Tightening tiers, descending by `min_profit`; the first match wins
    #[serde(default)]
    pub tiers: Vec<StopTier>,
    /// Whether the trailing floor is in play for this variant
    #[serde(default)]
    pub trailing_enabled: bool,
    /// Peak profit that latches the trailing stop on
    pub trailing_activation: f64,
    /// Distance the trailing floor keeps below peak profit
    pub trailing_offset: f64,
}

impl Default for StopLossConfig {
    fn default() -> Self {
        Self {
            baseline: -0.275,
            tiers: vec![
                StopTier {
                    min_profit: 0.05,
                    stop: -0.002,
                    entry_tag: None,
                },
                StopTier {
                    min_profit: 0.03,
                    stop: -0.003,
                    entry_tag: Some("buy_new".to_string()),
                },
            ],
            trailing_enabled: false,
            trailing_activation: 0.025,
            trailing_offset: 0.002,
        }
    }
}

impl StopLossConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baseline >= 0.0 {
            return Err(ConfigError::invalid("baseline", self.baseline, "< 0"));
        }
        if self.trailing_activation <= 0.0 {
            return Err(ConfigError::invalid(
                "trailing_activation",
                self.trailing_activation,
                "> 0",
            ));
        }
        if self.trailing_offset <= 0.0 {
            return Err(ConfigError::invalid(
                "trailing_offset",
                self.trailing_offset,
                "> 0",
            ));
        }
        let mut prev_profit = f64::INFINITY;
        for tier in &self.tiers {
            if tier.min_profit <= 0.0 {
                return Err(ConfigError::invalid("tiers.min_profit", tier.min_profit, "> 0"));
            }
            if tier.min_profit >= prev_profit {
                return Err(ConfigError::invalid(
                    "tiers.min_profit",
                    tier.min_profit,
                    "descending order",
                ));
            }
            prev_profit = tier.min_profit;
        }
        Ok(())
    }
}

/// Per-trade trailing state; created on first evaluation, dropped on close
#[derive(Debug, Clone)]
struct StopLossState {
    trailing_active: bool,
    peak_profit: f64,
    last_floor: f64,
}

/// Stop-loss evaluator over all open trades
#[derive(Debug)]
pub struct RiskManager {
    config: StopLossConfig,
    states: HashMap<Symbol, StopLossState>,
}

impl RiskManager {
    pub fn new(config: StopLossConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    /// Current stop-loss fraction for an open trade.
    ///
    /// Tiers are checked in descending profit order and the first match
    /// wins; they never stack. Once the trailing stop activates it stays
    /// active for the trade's lifetime, and the returned floor only ever
    /// ratchets tighter.
    pub fn evaluate(&mut self, snapshot: &TradeSnapshot) -> f64 {
        let state = self
            .states
            .entry(snapshot.symbol.clone())
            .or_insert_with(|| StopLossState {
                trailing_active: false,
                peak_profit: snapshot.current_profit,
                last_floor: f64::NEG_INFINITY,
            });
        state.peak_profit = state.peak_profit.max(snapshot.current_profit);

        let mut floor = self.config.baseline;
        for tier in &self.config.tiers {
            let tag_matches = tier
                .entry_tag
                .as_deref()
                .map_or(true, |tag| tag == snapshot.entry_tag);
            if snapshot.current_profit >= tier.min_profit && tag_matches {
                floor = tier.stop;
                break;
            }
        }

        if self.config.trailing_enabled {
            if !state.trailing_active && state.peak_profit >= self.config.trailing_activation {
                state.trailing_active = true;
                tracing::debug!(
                    symbol = %snapshot.symbol,
                    peak_profit = state.peak_profit,
                    "trailing stop activated"
                );
            }
            if state.trailing_active {
                floor = floor.max(state.peak_profit - self.config.trailing_offset);
            }
        }

        // never loosen a previously tightened stop
        floor = floor.max(state.last_floor);
        state.last_floor = floor;
        floor
    }

    /// Whether the trailing stop has latched for a trade
    pub fn trailing_active(&self, symbol: &Symbol) -> bool {
        self.states
            .get(symbol)
            .map(|s| s.trailing_active)
            .unwrap_or(false)
    }

    /// Drop per-trade state when the execution system reports a close
    pub fn close_trade(&mut self, symbol: &Symbol) {
        self.states.remove(symbol);
    }

    pub fn open_trades(&self) -> usize {
        self.states.len()
    }
}

// ============================================================================
// ROI table
// ============================================================================

/// One step of the ROI table: after `after_minutes` in the trade, the
/// execution system may take profit at `profit`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiStep {
    pub after_minutes: i64,
    pub profit: f64,
}

/// Time-decaying take-profit thresholds.
///
/// The engine only exposes the table; acting on it is the execution
/// collaborator's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoiTable {
    steps: Vec<RoiStep>,
}

impl RoiTable {
    pub fn new(steps: Vec<RoiStep>) -> Self {
        Self { steps }
    }

    /// Reference table of the trend variant: 3% immediately, decaying to
    /// break-even after 99 minutes
    pub fn trend_default() -> Self {
        Self::new(vec![
            RoiStep {
                after_minutes: 0,
                profit: 0.03,
            },
            RoiStep {
                after_minutes: 10,
                profit: 0.02,
            },
            RoiStep {
                after_minutes: 57,
                profit: 0.01,
            },
            RoiStep {
                after_minutes: 99,
                profit: 0.0,
            },
        ])
    }

    /// Reference table of the grid variant
    pub fn grid_default() -> Self {
        Self::new(vec![
            RoiStep {
                after_minutes: 0,
                profit: 0.025,
            },
            RoiStep {
                after_minutes: 60,
                profit: 0.015,
            },
            RoiStep {
                after_minutes: 180,
                profit: 0.01,
            },
        ])
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::invalid("roi", 0.0, "at least one step"));
        }
        if self.steps[0].after_minutes != 0 {
            return Err(ConfigError::invalid(
                "roi.after_minutes",
                self.steps[0].after_minutes as f64,
                "first step at 0",
            ));
        }
        for pair in self.steps.windows(2) {
            if pair[1].after_minutes <= pair[0].after_minutes {
                return Err(ConfigError::invalid(
                    "roi.after_minutes",
                    pair[1].after_minutes as f64,
                    "strictly increasing",
                ));
            }
            if pair[1].profit >= pair[0].profit {
                return Err(ConfigError::invalid(
                    "roi.profit",
                    pair[1].profit,
                    "strictly decreasing",
                ));
            }
        }
        Ok(())
    }

    /// Profit threshold in force after `elapsed` time in the trade
    pub fn threshold_at(&self, elapsed: Duration) -> f64 {
        let minutes = elapsed.num_minutes();
        self.steps
            .iter()
            .rev()
            .find(|step| step.after_minutes <= minutes)
            .map(|step| step.profit)
            .unwrap_or(self.steps[0].profit)
    }
}
