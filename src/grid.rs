//! Grid level allocation
//!
//! Maintains a ladder of price levels around a floating reference price for
//! range-bound trading. Levels are spaced multiplicatively by a fixed
//! percentage; the ladder re-centers when price closes outside the outermost
//! level. Level prices use decimal arithmetic so the strict-spacing
//! invariant survives repeated rebuilds.

use rust_decimal::Decimal;

use crate::types::Price;

/// Upper bound on spacing-widening rounds before the ladder gives up;
/// each round doubles the spacing, so this is never reached with a sane
/// reference price.
const MAX_WIDENING_ROUNDS: u32 = 32;

/// Fill state of a single grid level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelState {
    Empty,
    Filled,
}

/// One rung of the price ladder
#[derive(Debug, Clone)]
pub struct GridLevel {
    pub index: i32,
    pub price: Price,
    pub state: LevelState,
}

/// Dynamic price ladder for one trading pair
///
/// Owned exclusively by that pair's evaluator; the engine serializes calls
/// per pair, so no interior locking is needed.
#[derive(Debug, Clone)]
pub struct GridBook {
    base_spacing: Decimal,
    spacing: Decimal,
    levels_per_side: i32,
    min_tick: Decimal,
    reference: Price,
    levels: Vec<GridLevel>,
    widened: bool,
}

impl GridBook {
    /// Create an empty ladder. `spacing_pct` and `levels_per_side` come from
    /// a validated configuration (spacing > 0, at least one level per side).
    pub fn new(spacing_pct: f64, levels_per_side: usize, min_tick: f64) -> Self {
        Self {
            base_spacing: Price::from_f64(spacing_pct).inner(),
            spacing: Price::from_f64(spacing_pct).inner(),
            levels_per_side: levels_per_side as i32,
            min_tick: Price::from_f64(min_tick).inner(),
            reference: Price::ZERO,
            levels: Vec::new(),
            widened: false,
        }
    }

    pub fn reference(&self) -> Price {
        self.reference
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    /// Effective spacing after any degenerate-grid widening
    pub fn spacing(&self) -> f64 {
        Price::from_decimal(self.spacing).to_f64()
    }

    /// Whether the last rebuild had to widen spacing to honor the tick floor
    pub fn widened(&self) -> bool {
        self.widened
    }

    pub fn is_built(&self) -> bool {
        !self.levels.is_empty()
    }

    /// Rebuild the ladder around a new reference price. All levels reset to
    /// `Empty`. Spacing restarts from the configured value and doubles until
    /// every adjacent gap clears the minimum tick distance; collapsing
    /// volatility therefore widens the grid instead of producing degenerate
    /// levels. Multiplicative spacing means widening eventually stops
    /// helping the lowest gap, so any level still inside the tick floor
    /// after widening is dropped outright.
    pub fn rebuild(&mut self, reference: Price) {
        self.reference = reference;
        self.spacing = self.base_spacing;
        self.widened = false;

        let mut rounds = 0;
        while rounds < MAX_WIDENING_ROUNDS {
            let gap = self.smallest_gap(reference);
            if gap >= self.min_tick {
                break;
            }
            let current = self.spacing;
            self.spacing *= Decimal::TWO;
            if self.smallest_gap(reference) <= gap {
                // past the turning point of (factor - 1) / factor^n; fall
                // back to pruning instead
                self.spacing = current;
                break;
            }
            self.widened = true;
            rounds += 1;
        }
        if self.widened {
            tracing::warn!(
                reference = %reference,
                spacing = %self.spacing,
                min_tick = %self.min_tick,
                "degenerate grid spacing; widened to honor tick floor"
            );
        }

        let factor = Decimal::ONE + self.spacing;
        let mut below = Vec::new();
        let mut above = Vec::new();
        for index in 1..=self.levels_per_side {
            above.push(GridLevel {
                index,
                price: Price::from_decimal(Self::level_price(reference.inner(), factor, index)),
                state: LevelState::Empty,
            });
            below.push(GridLevel {
                index: -index,
                price: Price::from_decimal(Self::level_price(reference.inner(), factor, -index)),
                state: LevelState::Empty,
            });
        }

        // prune outward from the reference: a level closer than the tick
        // floor to its kept neighbor is dropped
        let mut levels = Vec::with_capacity(self.levels_per_side as usize * 2 + 1);
        let mut kept_below = Vec::new();
        let mut last = reference;
        for level in below {
            if (last - level.price).inner() >= self.min_tick {
                last = level.price;
                kept_below.push(level);
            }
        }
        let mut dropped = self.levels_per_side as usize - kept_below.len();
        levels.extend(kept_below.into_iter().rev());
        levels.push(GridLevel {
            index: 0,
            price: reference,
            state: LevelState::Empty,
        });
        let mut last = reference;
        for level in above {
            if (level.price - last).inner() >= self.min_tick {
                last = level.price;
                levels.push(level);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            self.widened = true;
            tracing::warn!(
                reference = %reference,
                dropped = dropped,
                "tick floor unreachable by widening; dropped degenerate levels"
            );
        }
        self.levels = levels;
    }

    /// Smallest adjacent gap the ladder would have at the current spacing;
    /// the gap between the two lowest levels, since spacing is multiplicative.
    fn smallest_gap(&self, reference: Price) -> Decimal {
        let factor = Decimal::ONE + self.spacing;
        let lowest = Self::level_price(reference.inner(), factor, -self.levels_per_side);
        let next = Self::level_price(reference.inner(), factor, -self.levels_per_side + 1);
        next - lowest
    }

    fn level_price(reference: Decimal, factor: Decimal, index: i32) -> Decimal {
        let mut price = reference;
        if index >= 0 {
            for _ in 0..index {
                price *= factor;
            }
        } else {
            for _ in 0..(-index) {
                price /= factor;
            }
        }
        price
    }

    /// Rebuild around `close` when the ladder is unbuilt or price has closed
    /// outside the outermost level. Returns true when a rebuild happened.
    pub fn recenter_if_needed(&mut self, close: f64) -> bool {
        let close_price = Price::from_f64(close);
        if !self.is_built() {
            self.rebuild(close_price);
            return true;
        }
        let lowest = self.levels.first().map(|l| l.price).unwrap_or(Price::ZERO);
        let highest = self.levels.last().map(|l| l.price).unwrap_or(Price::ZERO);
        if close_price < lowest || close_price > highest {
            tracing::debug!(close = close, "price left the ladder; re-centering");
            self.rebuild(close_price);
            return true;
        }
        false
    }

    /// Highest empty level that price touched from above this candle:
    /// previous close strictly above the level, current close at or below it.
    pub fn touched_from_above(&self, prev_close: f64, close: f64) -> Option<i32> {
        let prev = Price::from_f64(prev_close);
        let cur = Price::from_f64(close);
        self.levels
            .iter()
            .rev()
            .filter(|l| l.state == LevelState::Empty)
            .find(|l| prev > l.price && cur <= l.price)
            .map(|l| l.index)
    }

    /// Record an executed entry at a level
    pub fn mark_filled(&mut self, index: i32) {
        if let Some(level) = self.levels.iter_mut().find(|l| l.index == index) {
            level.state = LevelState::Filled;
        }
    }

    /// Release filled levels that price has recovered past: a level is empty
    /// again once price closes above the level directly above it.
    pub fn release_recovered(&mut self, close: f64) {
        let close_price = Price::from_f64(close);
        // positional neighbor, not index arithmetic: pruning can leave holes
        for i in 0..self.levels.len().saturating_sub(1) {
            let above = self.levels[i + 1].price;
            let level = &mut self.levels[i];
            if level.state == LevelState::Filled && close_price > above {
                level.state = LevelState::Empty;
            }
        }
    }

    /// Exit target for a fill at `index`: the mirrored level on the other
    /// side of the reference, or the next level up when the fill sat at the
    /// reference itself. When pruning removed the exact mirror, the nearest
    /// level above it stands in.
    pub fn mirror_exit(&self, index: i32) -> Option<Price> {
        let exit_index = if index < 0 { -index } else { index + 1 };
        self.levels
            .iter()
            .find(|l| l.index >= exit_index)
            .map(|l| l.price)
    }
}
