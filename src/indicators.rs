//! Technical indicators
//!
//! Pure functions from value/candle slices to timestamp-aligned series.
//! Every function returns `Err(InsufficientHistory)` when the input is
//! shorter than the indicator's lookback; within a long-enough input, slots
//! inside the warm-up window are `None`. Zero denominators also produce
//! `None`, never NaN or infinity.

use itertools::Itertools;
use thiserror::Error;

use crate::Candle;

/// Errors from indicator computation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    #[error("insufficient history: need {required} candles, got {got}")]
    InsufficientHistory { required: usize, got: usize },

    #[error("indicator period must be >= 1")]
    InvalidPeriod,
}

/// A timestamp-aligned series of indicator values; `None` during warm-up
pub type Series = Vec<Option<f64>>;

fn check(len: usize, required: usize) -> Result<(), IndicatorError> {
    if len < required {
        return Err(IndicatorError::InsufficientHistory { required, got: len });
    }
    Ok(())
}

fn check_period(period: usize) -> Result<(), IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod);
    }
    Ok(())
}

/// Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Result<Series, IndicatorError> {
    check_period(period)?;
    check(values.len(), period)?;

    let mut result = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i + 1 < period {
            result.push(None);
        } else {
            let sum: f64 = values[i + 1 - period..=i].iter().sum();
            result.push(Some(sum / period as f64));
        }
    }
    Ok(result)
}

/// Exponential Moving Average, seeded with the SMA of the first `period` values
pub fn ema(values: &[f64], period: usize) -> Result<Series, IndicatorError> {
    check_period(period)?;
    check(values.len(), period)?;

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;

    for (i, &value) in values.iter().enumerate() {
        let next = if i + 1 < period {
            None
        } else if i + 1 == period {
            let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
            Some(seed)
        } else {
            // prev is always set once the seed index has passed
            prev.map(|p| (value - p) * multiplier + p)
        };
        if next.is_some() {
            prev = next;
        }
        result.push(next);
    }
    Ok(result)
}

/// Wilder's smoothing: SMA seed, then `s = (prev * (period - 1) + value) / period`
fn wilder_smooth(values: &[f64], period: usize) -> Series {
    let mut result = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;

    for (i, &value) in values.iter().enumerate() {
        let next = if i + 1 < period {
            None
        } else if i + 1 == period {
            Some(values[..period].iter().sum::<f64>() / period as f64)
        } else {
            prev.map(|p| (p * (period as f64 - 1.0) + value) / period as f64)
        };
        if next.is_some() {
            prev = next;
        }
        result.push(next);
    }
    result
}

/// Relative Strength Index with Wilder's smoothing
///
/// `avg_loss == 0` maps to RSI 100 rather than a division by zero.
pub fn rsi(values: &[f64], period: usize) -> Result<Series, IndicatorError> {
    check_period(period)?;
    check(values.len(), period + 1)?;

    let mut gains = Vec::with_capacity(values.len() - 1);
    let mut losses = Vec::with_capacity(values.len() - 1);
    for (prev, cur) in values.iter().tuple_windows() {
        let change = cur - prev;
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let avg_gains = wilder_smooth(&gains, period);
    let avg_losses = wilder_smooth(&losses, period);

    let mut result = Vec::with_capacity(values.len());
    result.push(None); // no delta exists for the first value
    for i in 0..gains.len() {
        match (avg_gains[i], avg_losses[i]) {
            (Some(avg_gain), Some(avg_loss)) => {
                if avg_loss == 0.0 {
                    result.push(Some(100.0));
                } else {
                    let rs = avg_gain / avg_loss;
                    result.push(Some(100.0 - (100.0 / (1.0 + rs))));
                }
            }
            _ => result.push(None),
        }
    }
    Ok(result)
}

/// Bollinger Bands: (upper, middle, lower) with population standard deviation
pub fn bollinger_bands(
    values: &[f64],
    period: usize,
    num_std: f64,
) -> Result<(Series, Series, Series), IndicatorError> {
    let middle = sma(values, period)?;
    let mut upper = Vec::with_capacity(values.len());
    let mut lower = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        match middle[i] {
            Some(mid) => {
                let window = &values[i + 1 - period..=i];
                let variance: f64 = window
                    .iter()
                    .map(|&x| {
                        let diff = x - mid;
                        diff * diff
                    })
                    .sum::<f64>()
                    / period as f64;
                let std_dev = variance.sqrt();
                upper.push(Some(mid + num_std * std_dev));
                lower.push(Some(mid - num_std * std_dev));
            }
            None => {
                upper.push(None);
                lower.push(None);
            }
        }
    }
    Ok((upper, middle, lower))
}

/// True Range per candle; the first candle falls back to high - low
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(high.len());
    for i in 0..high.len() {
        let tr_value = if i == 0 {
            high[i] - low[i]
        } else {
            let hl = high[i] - low[i];
            let hc = (high[i] - close[i - 1]).abs();
            let lc = (low[i] - close[i - 1]).abs();
            hl.max(hc).max(lc)
        };
        tr.push(tr_value);
    }
    tr
}

/// Average True Range (Wilder-smoothed True Range)
pub fn atr(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
) -> Result<Series, IndicatorError> {
    check_period(period)?;
    check(high.len(), period)?;
    let tr = true_range(high, low, close);
    Ok(wilder_smooth(&tr, period))
}

/// SMA of candle volume
pub fn volume_sma(candles: &[Candle], period: usize) -> Result<Series, IndicatorError> {
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    sma(&volumes, period)
}

/// Correlation Trend Indicator: Pearson correlation of the window values
/// against their ordinal position, in [-1, 1]
///
/// A flat window (zero variance) yields `None` for that slot.
pub fn cti(values: &[f64], period: usize) -> Result<Series, IndicatorError> {
    check_period(period)?;
    check(values.len(), period)?;
    if period == 1 {
        // a single point has no trend
        return Ok(vec![None; values.len()]);
    }

    let n = period as f64;
    // ordinals 0..period have mean (n-1)/2 and a fixed sum of squared deviations
    let x_mean = (n - 1.0) / 2.0;
    let x_ss: f64 = (0..period)
        .map(|k| {
            let d = k as f64 - x_mean;
            d * d
        })
        .sum();

    let mut result = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i + 1 < period {
            result.push(None);
            continue;
        }
        let window = &values[i + 1 - period..=i];
        let y_mean: f64 = window.iter().sum::<f64>() / n;
        let mut xy = 0.0;
        let mut y_ss = 0.0;
        for (k, &y) in window.iter().enumerate() {
            let dx = k as f64 - x_mean;
            let dy = y - y_mean;
            xy += dx * dy;
            y_ss += dy * dy;
        }
        let denom = (x_ss * y_ss).sqrt();
        if denom == 0.0 {
            result.push(None);
        } else {
            result.push(Some(xy / denom));
        }
    }
    Ok(result)
}

// ============================================================================
// Ichimoku cloud
// ============================================================================

/// Ichimoku cloud parameters
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IchimokuParams {
    pub conversion_period: usize,
    pub base_period: usize,
    pub span_b_period: usize,
    pub displacement: usize,
}

impl Default for IchimokuParams {
    fn default() -> Self {
        Self {
            conversion_period: 9,
            base_period: 26,
            span_b_period: 52,
            displacement: 26,
        }
    }
}

impl IchimokuParams {
    /// Candles required before the displaced spans carry a value
    pub fn required_candles(&self) -> usize {
        self.conversion_period
            .max(self.base_period)
            .max(self.span_b_period)
            + self.displacement
    }
}

/// Ichimoku cloud series
///
/// `senkou_a` / `senkou_b` are the spans as seen at each candle: the value
/// visible at candle T was computed from data at T - displacement. The
/// forward shift is display convention only; no slot ever reads data past
/// its own timestamp. `leading_*` are the same spans without the shift.
#[derive(Debug, Clone)]
pub struct Ichimoku {
    pub tenkan: Series,
    pub kijun: Series,
    pub senkou_a: Series,
    pub senkou_b: Series,
    pub leading_senkou_a: Series,
    pub leading_senkou_b: Series,
}

fn rolling_midpoint(high: &[f64], low: &[f64], period: usize) -> Series {
    let mut result = Vec::with_capacity(high.len());
    for i in 0..high.len() {
        if i + 1 < period {
            result.push(None);
        } else {
            let h = high[i + 1 - period..=i]
                .iter()
                .fold(f64::MIN, |a, &b| a.max(b));
            let l = low[i + 1 - period..=i]
                .iter()
                .fold(f64::MAX, |a, &b| a.min(b));
            result.push(Some((h + l) / 2.0));
        }
    }
    result
}

fn displace_forward(series: &Series, displacement: usize) -> Series {
    let mut shifted = vec![None; series.len()];
    for i in 0..series.len() {
        if i >= displacement {
            shifted[i] = series[i - displacement];
        }
    }
    shifted
}

/// Ichimoku cloud over high/low slices
pub fn ichimoku(
    high: &[f64],
    low: &[f64],
    params: &IchimokuParams,
) -> Result<Ichimoku, IndicatorError> {
    check_period(params.conversion_period)?;
    check_period(params.base_period)?;
    check_period(params.span_b_period)?;
    check(high.len(), params.required_candles())?;

    let tenkan = rolling_midpoint(high, low, params.conversion_period);
    let kijun = rolling_midpoint(high, low, params.base_period);

    let leading_senkou_a: Series = tenkan
        .iter()
        .zip(kijun.iter())
        .map(|(t, k)| match (t, k) {
            (Some(t), Some(k)) => Some((t + k) / 2.0),
            _ => None,
        })
        .collect();
    let leading_senkou_b = rolling_midpoint(high, low, params.span_b_period);

    let senkou_a = displace_forward(&leading_senkou_a, params.displacement);
    let senkou_b = displace_forward(&leading_senkou_b, params.displacement);

    Ok(Ichimoku {
        tenkan,
        kijun,
        senkou_a,
        senkou_b,
        leading_senkou_a,
        leading_senkou_b,
    })
}

// ============================================================================
// Heikin Ashi
// ============================================================================

/// Heikin Ashi smoothed candles
///
/// ha_close = (o+h+l+c)/4, ha_open = midpoint of the previous HA body,
/// ha_high/ha_low bracket the raw extremes and the HA body.
pub fn heikin_ashi(candles: &[Candle]) -> Vec<Candle> {
    let mut result: Vec<Candle> = Vec::with_capacity(candles.len());
    for (i, c) in candles.iter().enumerate() {
        let ha_close = (c.open + c.high + c.low + c.close) / 4.0;
        let ha_open = if i == 0 {
            (c.open + c.close) / 2.0
        } else {
            let prev = &result[i - 1];
            (prev.open + prev.close) / 2.0
        };
        let ha_high = c.high.max(ha_open).max(ha_close);
        let ha_low = c.low.min(ha_open).min(ha_close);
        result.push(Candle::new_unchecked(
            c.datetime, ha_open, ha_high, ha_low, ha_close, c.volume,
        ));
    }
    result
}

// ============================================================================
// Crossing helpers
// ============================================================================

/// True when series `a` crossed below series `b` at `idx`:
/// previous value at or above, current value strictly below.
/// Warm-up `None`s on either side suppress the cross.
pub fn crossed_below_at(a: &[Option<f64>], b: &[Option<f64>], idx: usize) -> bool {
    if idx == 0 || idx >= a.len() || idx >= b.len() {
        return false;
    }
    match (a[idx - 1], b[idx - 1], a[idx], b[idx]) {
        (Some(pa), Some(pb), Some(ca), Some(cb)) => pa >= pb && ca < cb,
        _ => false,
    }
}

/// True when `series` crossed above the constant `level` at `idx`:
/// previous value at or below, current value strictly above.
pub fn crossed_above_level(series: &[Option<f64>], level: f64, idx: usize) -> bool {
    if idx == 0 || idx >= series.len() {
        return false;
    }
    match (series[idx - 1], series[idx]) {
        (Some(prev), Some(cur)) => prev <= level && cur > level,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Candle::new_unchecked(
                    start + Duration::minutes(5 * i as i64),
                    c,
                    c + 0.5,
                    c - 0.5,
                    c,
                    1000.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_sma() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&values, 3).unwrap();
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_eq!(result[2], Some(2.0));
        assert_eq!(result[3], Some(3.0));
        assert_eq!(result[4], Some(4.0));
    }

    #[test]
    fn test_sma_insufficient_history() {
        let values = vec![1.0, 2.0];
        let err = sma(&values, 3).unwrap_err();
        assert_eq!(
            err,
            IndicatorError::InsufficientHistory {
                required: 3,
                got: 2
            }
        );
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = ema(&values, 3).unwrap();
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        // seed = SMA(1, 2, 3) = 2
        assert_eq!(result[2], Some(2.0));
        // multiplier = 0.5: (4 - 2) * 0.5 + 2 = 3
        assert_eq!(result[3], Some(3.0));
        assert_eq!(result[4], Some(4.0));
    }

    #[test]
    fn test_ema_period_one_tracks_values() {
        let values = vec![3.0, 7.0, 5.0];
        let result = ema(&values, 1).unwrap();
        assert_eq!(result, vec![Some(3.0), Some(7.0), Some(5.0)]);
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let result = rsi(&values, 14).unwrap();
        assert_eq!(result.last().copied().flatten(), Some(100.0));
    }

    #[test]
    fn test_rsi_all_losses_is_0() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let result = rsi(&values, 14).unwrap();
        assert_eq!(result.last().copied().flatten(), Some(0.0));
    }

    #[test]
    fn test_rsi_warm_up_is_none() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + (i % 3) as f64).collect();
        let result = rsi(&values, 14).unwrap();
        for slot in result.iter().take(14) {
            assert_eq!(*slot, None);
        }
        assert!(result[14].is_some());
    }

    #[test]
    fn test_rsi_insufficient_history() {
        let values = vec![1.0; 14];
        assert!(rsi(&values, 14).is_err());
    }

    #[test]
    fn test_bollinger_bands_symmetric() {
        let values: Vec<f64> = (0..25).map(|i| 100.0 + (i % 5) as f64).collect();
        let (upper, middle, lower) = bollinger_bands(&values, 20, 2.0).unwrap();
        let (u, m, l) = (
            upper.last().copied().flatten().unwrap(),
            middle.last().copied().flatten().unwrap(),
            lower.last().copied().flatten().unwrap(),
        );
        assert!(u > m && m > l);
        approx::assert_relative_eq!(u - m, m - l, epsilon = 1e-9);
    }

    #[test]
    fn test_atr_positive() {
        let candles = candles_from_closes(&(0..30).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let high: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let low: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let close: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let result = atr(&high, &low, &close, 14).unwrap();
        assert!(result.last().copied().flatten().unwrap() > 0.0);
    }

    #[test]
    fn test_cti_uptrend_is_one() {
        let values: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let result = cti(&values, 20).unwrap();
        approx::assert_relative_eq!(
            result.last().copied().flatten().unwrap(),
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_cti_downtrend_is_minus_one() {
        let values: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let result = cti(&values, 20).unwrap();
        approx::assert_relative_eq!(
            result.last().copied().flatten().unwrap(),
            -1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_cti_flat_window_is_none() {
        let values = vec![100.0; 30];
        let result = cti(&values, 20).unwrap();
        assert_eq!(result.last().copied().flatten(), None);
    }

    #[test]
    fn test_ichimoku_displacement_no_lookahead() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64).collect();
        let candles = candles_from_closes(&closes);
        let high: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let low: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let params = IchimokuParams::default();
        let cloud = ichimoku(&high, &low, &params).unwrap();

        // the displaced span at T equals the leading span at T - displacement
        let t = 79;
        assert_eq!(
            cloud.senkou_a[t],
            cloud.leading_senkou_a[t - params.displacement]
        );
        assert_eq!(
            cloud.senkou_b[t],
            cloud.leading_senkou_b[t - params.displacement]
        );
        // nothing is defined before the displacement window has passed
        assert_eq!(cloud.senkou_a[params.displacement - 1], None);
    }

    #[test]
    fn test_ichimoku_insufficient_history() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let candles = candles_from_closes(&closes);
        let high: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let low: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let err = ichimoku(&high, &low, &IchimokuParams::default()).unwrap_err();
        assert!(matches!(err, IndicatorError::InsufficientHistory { .. }));
    }

    #[test]
    fn test_heikin_ashi_first_candle() {
        let candles = candles_from_closes(&[100.0, 102.0, 104.0]);
        let ha = heikin_ashi(&candles);
        // first HA open is the midpoint of the raw body
        assert_eq!(ha[0].open, (candles[0].open + candles[0].close) / 2.0);
        // HA close averages all four raw prices
        let c = &candles[1];
        assert_eq!(ha[1].close, (c.open + c.high + c.low + c.close) / 4.0);
    }

    #[test]
    fn test_crossed_below_fires_once() {
        let a = vec![Some(10.0), Some(9.0), Some(8.0)];
        let b = vec![Some(9.5), Some(9.5), Some(9.5)];
        assert!(crossed_below_at(&a, &b, 1));
        // still below but no new cross
        assert!(!crossed_below_at(&a, &b, 2));
    }

    #[test]
    fn test_crossed_above_level() {
        let series = vec![Some(78.0), Some(82.0), Some(85.0)];
        assert!(crossed_above_level(&series, 80.0, 1));
        assert!(!crossed_above_level(&series, 80.0, 2));
    }

    #[test]
    fn test_crossed_helpers_ignore_warm_up() {
        let a = vec![None, Some(8.0)];
        let b = vec![Some(9.0), Some(9.0)];
        assert!(!crossed_below_at(&a, &b, 1));
    }
}
