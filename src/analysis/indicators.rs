//! Price indicators over chronological closing prices.
//!
//! Every function returns `None` when the series is shorter than the
//! indicator's lookback, so callers can omit the indicator instead of
//! inventing a value.

/// Simple moving average of the last `period` prices.
pub fn sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// EMA value at every index from `period - 1` onward.
///
/// Seeded with the SMA of the first `period` values.
pub fn ema_series(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = prices[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(prices.len() - period + 1);
    out.push(seed);
    for price in &prices[period..] {
        let prev = out[out.len() - 1];
        out.push((price - prev) * multiplier + prev);
    }
    out
}

/// Relative Strength Index using Wilder's smoothing (0-100).
pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    // period changes need period + 1 prices
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();

    let (mut avg_gain, mut avg_loss) = changes.iter().take(period).fold((0.0, 0.0), |(g, l), &c| {
        if c > 0.0 {
            (g + c, l)
        } else {
            (g, l - c)
        }
    });
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    for &change in changes.iter().skip(period) {
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return Some(50.0); // Flat series
        }
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdOutput {
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
}

/// MACD line, signal line and histogram at the last bar.
pub fn macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdOutput> {
    if fast == 0 || fast >= slow || signal == 0 || prices.len() < slow + signal - 1 {
        return None;
    }

    let fast_ema = ema_series(prices, fast);
    let slow_ema = ema_series(prices, slow);

    // Align both series on the bars where the slow EMA exists
    let offset = slow - fast;
    let macd_values: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, slow_v)| fast_ema[i + offset] - slow_v)
        .collect();

    let signal_series = ema_series(&macd_values, signal);
    let signal_line = *signal_series.last()?;
    let macd_line = *macd_values.last()?;

    Some(MacdOutput {
        macd_line,
        signal_line,
        histogram: macd_line - signal_line,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerOutput {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// Where the last price sits between the bands (0 = lower, 1 = upper)
    pub percent_b: f64,
}

/// Bollinger Bands over the last `period` prices.
pub fn bollinger(prices: &[f64], period: usize, std_dev_multiplier: f64) -> Option<BollingerOutput> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let upper = mean + std_dev * std_dev_multiplier;
    let lower = mean - std_dev * std_dev_multiplier;
    let last = *prices.last()?;
    let percent_b = if upper != lower {
        (last - lower) / (upper - lower)
    } else {
        0.5
    };

    Some(BollingerOutput {
        upper,
        middle: mean,
        lower,
        percent_b,
    })
}

/// Bars since the short SMA last crossed the long SMA, with the direction
/// (+1 upward, -1 downward). A cross exactly `within` bars ago still counts.
/// `None` when no cross happened inside that window or the series is too short.
pub fn bars_since_cross(prices: &[f64], short: usize, long: usize, within: usize) -> Option<(usize, i8)> {
    if short == 0 || short >= long || prices.len() < long + 1 {
        return None;
    }

    let spread = |end: usize| -> Option<f64> {
        let slice = &prices[..end];
        Some(sma(slice, short)? - sma(slice, long)?)
    };

    let mut current = spread(prices.len())?;
    for bars_ago in 0..=within {
        let end = prices.len() - bars_ago;
        if end <= long {
            break;
        }
        let previous = spread(end - 1)?;
        if previous <= 0.0 && current > 0.0 {
            return Some((bars_ago, 1));
        }
        if previous >= 0.0 && current < 0.0 {
            return Some((bars_ago, -1));
        }
        current = previous;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&prices, 5), Some(3.0));
        assert_eq!(sma(&prices, 2), Some(4.5));
        assert_eq!(sma(&prices, 6), None);
        assert_eq!(sma(&prices, 0), None);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let prices = [2.0, 4.0, 6.0, 8.0];
        let series = ema_series(&prices, 3);
        // seed = 4.0, multiplier = 0.5, next = (8 - 4) * 0.5 + 4 = 6
        assert_eq!(series, vec![4.0, 6.0]);
    }

    #[test]
    fn test_rsi_bounds() {
        let rising: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        let flat = vec![10.0; 20];

        assert_eq!(rsi(&rising, 14), Some(100.0));
        assert_eq!(rsi(&falling, 14), Some(0.0));
        assert_eq!(rsi(&flat, 14), Some(50.0));
        assert_eq!(rsi(&rising[..14], 14), None); // Needs period + 1
    }

    #[test]
    fn test_macd_rising_series_is_above_signal() {
        // Decline then a sharp recovery
        let mut prices: Vec<f64> = (0..30).map(|i| 130.0 - i as f64).collect();
        prices.extend((1..=10).map(|i| 101.0 + 3.0 * i as f64));

        let out = macd(&prices, 12, 26, 9).unwrap();
        assert!(out.macd_line > out.signal_line);
        assert!(out.histogram > 0.0);
        assert!(macd(&prices[..33], 12, 26, 9).is_none());
    }

    #[test]
    fn test_bollinger_flat_series() {
        let prices = vec![50.0; 20];
        let out = bollinger(&prices, 20, 2.0).unwrap();
        assert_eq!(out.upper, 50.0);
        assert_eq!(out.lower, 50.0);
        assert_eq!(out.percent_b, 0.5);
    }

    #[test]
    fn test_bollinger_breakout() {
        let mut prices = vec![100.0, 101.0, 99.0, 100.0, 100.5, 99.5, 100.0, 100.2, 99.8, 100.0];
        prices.push(110.0);
        let out = bollinger(&prices, 10, 2.0).unwrap();
        assert!(out.percent_b > 1.0);
    }

    #[test]
    fn test_recent_upward_cross() {
        let mut prices: Vec<f64> = (0..30).map(|i| 130.0 - i as f64).collect();
        prices.extend((1..=10).map(|i| 101.0 + 3.0 * i as f64));

        // Short SMA(5) crosses SMA(20) five bars before the end
        assert_eq!(bars_since_cross(&prices, 5, 20, 10), Some((5, 1)));
        assert_eq!(bars_since_cross(&prices, 5, 20, 3), None);
    }

    #[test]
    fn test_cross_on_window_edge_counts() {
        let mut prices: Vec<f64> = (0..30).map(|i| 130.0 - i as f64).collect();
        prices.extend((1..=10).map(|i| 101.0 + 3.0 * i as f64));

        assert_eq!(bars_since_cross(&prices, 5, 20, 5), Some((5, 1)));
        assert_eq!(bars_since_cross(&prices, 5, 20, 4), None);
    }
}
