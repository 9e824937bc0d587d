//! Strategy variants and the common evaluator interface
//!
//! Each variant is one evaluator struct parameterized by a validated config
//! bundle; fixed and optimizable presets are just different bundles of the
//! same struct. The engine owns one evaluator instance per (variant, pair).

pub mod grid_range;
pub mod oscillator;
pub mod trend_follow;

use crate::indicators::IndicatorError;
use crate::{Candle, Signal, Symbol};

/// Position state of one pair, owned by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    InPosition,
}

/// Per-candle evaluation context
///
/// `candles` is the full history up to and including the just-closed candle;
/// the evaluator never sees anything past it.
#[derive(Debug)]
pub struct EvalContext<'a> {
    pub symbol: &'a Symbol,
    pub candles: &'a [Candle],
    pub position: PositionState,
}

/// A strategy variant's rule set
///
/// Deterministic: identical history and parameters produce the identical
/// signal sequence. Emits `EnterLong` only when flat and `ExitLong` only
/// when in position, so at most one signal per candle per direction.
pub trait SignalEvaluator: Send {
    fn name(&self) -> &'static str;

    /// Candles required before real signals can fire
    fn startup_candles(&self) -> usize;

    /// Evaluate the just-closed candle.
    ///
    /// `InsufficientHistory` means this candle is skipped, not that the
    /// pipeline failed; the engine maps it to "no signal".
    fn evaluate(&mut self, ctx: &EvalContext<'_>) -> Result<Option<Signal>, IndicatorError>;
}
