//! Integration tests for the signal engine
//!
//! Scenario tests drive the engine the way the host runtime does: one call
//! per closed candle per pair, plus risk-manager ticks per open trade.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use crypto_signals::config::StrategyParams;
use crypto_signals::grid::GridBook;
use crypto_signals::indicators::{self, IchimokuParams, IndicatorError};
use crypto_signals::risk::{RiskManager, StopLossConfig};
use crypto_signals::strategies::trend_follow::TrendFollowConfig;
use crypto_signals::strategies::oscillator::OscillatorConfig;
use crypto_signals::strategies::PositionState;
use crypto_signals::trend::{TrendRung, TrendSeries, NUM_RUNGS};
use crypto_signals::{
    Candle, Direction, Engine, Price, Signal, SignalTag, Symbol, TradeSnapshot,
};

// =============================================================================
// Test Utilities
// =============================================================================

fn start_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

/// Build 5m candles from a close series, with a small symmetric range
fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            Candle::new_unchecked(
                start_time() + Duration::minutes(5 * i as i64),
                close,
                close + close * 0.001,
                close - close * 0.001,
                close,
                1000.0 + i as f64,
            )
        })
        .collect()
}

/// Steady climb followed by a sharp rally: establishes the cloud well below
/// price, then accelerates the fan magnitude hard enough to satisfy the
/// minimum gain threshold
fn rally_after_climb(climb: usize, rally: usize) -> Vec<f64> {
    let mut closes = Vec::with_capacity(climb + rally);
    let mut price = 100.0;
    for _ in 0..climb {
        price *= 1.0005;
        closes.push(price);
    }
    for _ in 0..rally {
        price *= 1.02;
        closes.push(price);
    }
    closes
}

/// Gentle rise into a steep sell-off, ending deeply oversold
fn dip_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + 0.05 * i as f64).collect();
    for i in 0..25 {
        closes.push(102.0 - 1.2 * i as f64 - 0.3 * (i % 2) as f64);
    }
    closes
}

fn snapshot(tag: &str, profit: f64) -> TradeSnapshot {
    TradeSnapshot {
        symbol: Symbol::new("BTCUSDT"),
        entry_price: 100.0,
        entry_time: start_time(),
        entry_tag: tag.to_string(),
        current_profit: profit,
        current_time: start_time() + Duration::minutes(30),
    }
}

/// Walk a candle feed through the engine, collecting emitted signals
fn walk(engine: &mut Engine, symbol: &Symbol, candles: &[Candle]) -> Vec<Signal> {
    let mut signals = Vec::new();
    for end in 1..=candles.len() {
        if let Some(signal) = engine.on_candle(symbol, &candles[..end]) {
            signals.push(signal);
        }
    }
    signals
}

// =============================================================================
// Insufficient history
// =============================================================================

#[test]
fn test_indicators_reject_short_sequences() {
    let short = vec![100.0, 101.0, 102.0];
    assert!(matches!(
        indicators::sma(&short, 10),
        Err(IndicatorError::InsufficientHistory { .. })
    ));
    assert!(matches!(
        indicators::ema(&short, 10),
        Err(IndicatorError::InsufficientHistory { .. })
    ));
    assert!(matches!(
        indicators::rsi(&short, 14),
        Err(IndicatorError::InsufficientHistory { .. })
    ));
    assert!(matches!(
        indicators::cti(&short, 20),
        Err(IndicatorError::InsufficientHistory { .. })
    ));

    let candles = candles_from_closes(&short);
    let high: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let low: Vec<f64> = candles.iter().map(|c| c.low).collect();
    assert!(matches!(
        indicators::ichimoku(&high, &low, &IchimokuParams::default()),
        Err(IndicatorError::InsufficientHistory { .. })
    ));
}

#[test]
fn test_engine_skips_short_history_for_every_variant() {
    let variants = [
        StrategyParams::TrendFollow(TrendFollowConfig::default()),
        StrategyParams::Oscillator(OscillatorConfig::default()),
        StrategyParams::GridRange(Default::default()),
    ];
    let symbol = Symbol::new("BTCUSDT");
    let candles = candles_from_closes(&[100.0, 100.5, 101.0]);
    for params in variants {
        let mut engine = Engine::new(params).unwrap();
        // a three-candle feed can never satisfy any startup window
        assert_eq!(engine.on_candle(&symbol, &candles), None);
        assert_eq!(engine.position(&symbol), PositionState::Flat);
    }
}

// =============================================================================
// Trend variant scenario
// =============================================================================

#[test]
fn test_trend_entry_fires_in_accelerating_uptrend() {
    // cloud and fan thresholds from the scenario: at least 5 rungs above the
    // cloud, 4 bullish, fan magnitude above 1 and gaining by >= 0.2%
    let config = TrendFollowConfig {
        buy_trend_above_senkou_level: 5,
        buy_trend_bullish_level: 4,
        buy_fan_magnitude_shift_value: 3,
        buy_min_fan_magnitude_gain: 1.002,
        ..TrendFollowConfig::default()
    };
    let mut engine = Engine::new(StrategyParams::TrendFollow(config.clone())).unwrap();
    let symbol = Symbol::new("BTCUSDT");
    let candles = candles_from_closes(&rally_after_climb(180, 10));

    let signals = walk(&mut engine, &symbol, &candles);
    let entry = signals
        .iter()
        .find(|s| s.direction == Direction::EnterLong)
        .expect("accelerating uptrend should fire a trend entry");
    assert_eq!(entry.tag, SignalTag::TrendEntry);

    // the aggregate the entry was based on satisfies the scenario counts
    let series = TrendSeries::compute(
        &candles,
        &config.ichimoku,
        TrendRung::H1,
        TrendRung::H8,
    )
    .unwrap();
    let snap = series.snapshot(candles.len() - 1);
    assert!(snap.above_cloud_count >= 5);
    assert!(snap.bullish_count >= 4);
    assert!(snap.fan_magnitude.unwrap() > 1.0);
}

#[test]
fn test_trend_entry_suppressed_when_counts_short() {
    // same market, but demanding all 8 rungs above the cloud and all 8
    // bullish plus an unreachable acceleration bound suppresses entry
    let config = TrendFollowConfig {
        buy_trend_above_senkou_level: 8,
        buy_trend_bullish_level: 8,
        buy_fan_magnitude_shift_value: 10,
        buy_min_fan_magnitude_gain: 1.01,
        ..TrendFollowConfig::default()
    };
    let mut engine = Engine::new(StrategyParams::TrendFollow(config)).unwrap();
    let symbol = Symbol::new("BTCUSDT");
    // gentle climb only: no acceleration burst
    let candles = candles_from_closes(&rally_after_climb(200, 0));
    let signals = walk(&mut engine, &symbol, &candles);
    assert!(signals.is_empty());
}

// =============================================================================
// Oscillator variant scenarios
// =============================================================================

#[test]
fn test_oscillator_entry_and_single_fire_exit() {
    let config = OscillatorConfig {
        sell_fastx: 80.0,
        ..OscillatorConfig::default()
    };
    let mut engine = Engine::new(StrategyParams::Oscillator(config)).unwrap();
    let symbol = Symbol::new("ETHUSDT");

    // dip to trigger the entry, then a sharp rally sweeping fast RSI
    // through the sell threshold
    let mut closes = dip_closes();
    let floor = *closes.last().unwrap();
    for i in 0..8 {
        closes.push(floor + 6.0 * (i + 1) as f64);
    }
    let candles = candles_from_closes(&closes);
    let signals = walk(&mut engine, &symbol, &candles);

    let entries: Vec<_> = signals
        .iter()
        .filter(|s| s.direction == Direction::EnterLong)
        .collect();
    let exits: Vec<_> = signals
        .iter()
        .filter(|s| s.direction == Direction::ExitLong)
        .collect();
    assert!(!entries.is_empty());
    assert_eq!(entries[0].tag, SignalTag::BuyNew);
    // the upward cross through sell_fastx fires exactly once
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].tag, SignalTag::FastxExit);
}

#[test]
fn test_signal_sequence_is_deterministic() {
    let candles = candles_from_closes(&dip_closes());
    let symbol = Symbol::new("ETHUSDT");

    let run = || {
        let mut engine =
            Engine::new(StrategyParams::Oscillator(OscillatorConfig::default())).unwrap();
        walk(&mut engine, &symbol, &candles)
    };
    assert_eq!(run(), run());
}

// =============================================================================
// Risk manager scenarios
// =============================================================================

#[test]
fn test_stoploss_tightens_at_five_percent_regardless_of_tag() {
    let mut engine = Engine::new(StrategyParams::Oscillator(OscillatorConfig::default())).unwrap();
    assert_eq!(engine.stoploss_for(&snapshot("buy_new", 0.06)), -0.002);

    let mut engine = Engine::new(StrategyParams::Oscillator(OscillatorConfig::default())).unwrap();
    assert_eq!(engine.stoploss_for(&snapshot("trend_entry", 0.06)), -0.002);
}

#[test]
fn test_stoploss_tagged_tier_and_baseline_fallthrough() {
    let mut engine = Engine::new(StrategyParams::Oscillator(OscillatorConfig::default())).unwrap();
    assert_eq!(engine.stoploss_for(&snapshot("buy_new", 0.035)), -0.003);

    // same profit, different tag: the oscillator baseline applies
    let mut engine = Engine::new(StrategyParams::Oscillator(OscillatorConfig::default())).unwrap();
    assert_eq!(engine.stoploss_for(&snapshot("grid_buy", 0.035)), -0.25);
}

#[test]
fn test_trade_close_resets_risk_state() {
    let mut engine = Engine::new(StrategyParams::Oscillator(OscillatorConfig::default())).unwrap();
    let symbol = Symbol::new("BTCUSDT");

    // run profit up so the trailing floor ratchets
    engine.stoploss_for(&snapshot("buy_new", 0.06));
    let tightened = engine.stoploss_for(&snapshot("buy_new", 0.01));
    assert!(tightened > -0.25);

    // after the trade closes, a fresh trade starts from baseline again
    engine.on_trade_closed(&symbol);
    assert_eq!(engine.stoploss_for(&snapshot("buy_new", 0.01)), -0.25);
}

// =============================================================================
// Property tests
// =============================================================================

proptest! {
    /// The stop floor never loosens within one trade, whatever the profit path
    #[test]
    fn prop_stop_floor_monotone(profits in proptest::collection::vec(-0.2f64..0.2, 1..50)) {
        let mut rm = RiskManager::new(StopLossConfig::default());
        let mut last = f64::NEG_INFINITY;
        for profit in profits {
            let floor = rm.evaluate(&snapshot("buy_new", profit));
            prop_assert!(floor >= last);
            last = floor;
        }
    }

    /// Fan counts stay within [0, number of rungs] on arbitrary price paths
    #[test]
    fn prop_trend_counts_bounded(steps in proptest::collection::vec(-0.02f64..0.02, 160..200)) {
        let mut price = 100.0;
        let closes: Vec<f64> = steps
            .iter()
            .map(|step| {
                price *= 1.0 + step;
                price
            })
            .collect();
        let candles = candles_from_closes(&closes);
        let params = IchimokuParams {
            conversion_period: 20,
            base_period: 60,
            span_b_period: 120,
            displacement: 30,
        };
        if let Ok(series) = TrendSeries::compute(&candles, &params, TrendRung::H1, TrendRung::H8) {
            for idx in 0..series.len() {
                let snap = series.snapshot(idx);
                prop_assert!(snap.above_cloud_count <= NUM_RUNGS);
                prop_assert!(snap.bullish_count <= NUM_RUNGS);
                if let Some(fm) = snap.fan_magnitude {
                    prop_assert!(fm > 0.0);
                }
            }
        }
    }

    /// Ladder prices strictly increase and honor the tick floor after any
    /// re-centering, including degenerate spacing
    #[test]
    fn prop_grid_ladder_invariants(
        spacing in 0.0005f64..0.2,
        levels in 1usize..=10,
        reference in 0.5f64..50_000.0,
        min_tick in 0.0001f64..2.0,
    ) {
        let mut book = GridBook::new(spacing, levels, min_tick);
        book.rebuild(Price::from_f64(reference));
        let ladder = book.levels();
        prop_assert!(ladder.iter().any(|l| l.index == 0));
        for pair in ladder.windows(2) {
            prop_assert!(pair[0].price < pair[1].price);
            prop_assert!((pair[1].price - pair[0].price) >= Price::from_f64(min_tick));
        }
    }
}
