//! 📈 Technical Scorer
//!
//! Computes 0-100 price score from four indicators, each mapped to a signed
//! contribution (+1 bullish, -1 bearish, 0 neutral):
//! - 40% Moving-average crossover (short SMA vs long SMA)
//! - 30% MACD line vs signal line
//! - 15% RSI (overbought bearish, oversold bullish)
//! - 15% Bollinger band position (above upper bearish, below lower bullish)
//!
//! Indicators without enough bars are omitted and the remaining weights are
//! renormalized. With no computable indicator the scorer refuses to score.

use super::indicators::{self, BollingerOutput, MacdOutput};
use super::DomainScorer;
use crate::error::BranchError;
use crate::types::score::RawFeatures;
use crate::types::{Domain, LabelThresholds, PriceSeries, ScoreResult};
use log::debug;

/// Indicator periods and weights
#[derive(Debug, Clone)]
pub struct TechnicalScorerConfig {
    pub short_ma_period: usize,
    pub long_ma_period: usize,
    /// A crossover within this many bars is reported as "recent"
    pub crossover_recent_bars: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,

    pub crossover_weight: f64,
    pub macd_weight: f64,
    pub rsi_weight: f64,
    pub bollinger_weight: f64,
}

impl Default for TechnicalScorerConfig {
    fn default() -> Self {
        Self {
            short_ma_period: 5,
            long_ma_period: 20,
            crossover_recent_bars: 5,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
            crossover_weight: 0.4,
            macd_weight: 0.3,
            rsi_weight: 0.15,
            bollinger_weight: 0.15,
        }
    }
}

/// One computed indicator and its vote
struct Vote {
    name: &'static str,
    weight: f64,
    contribution: i8,
    note: String,
}

pub struct TechnicalScorer {
    config: TechnicalScorerConfig,
    thresholds: LabelThresholds,
}

impl TechnicalScorer {
    pub fn new(config: TechnicalScorerConfig, thresholds: LabelThresholds) -> Self {
        Self { config, thresholds }
    }

    pub fn score_series(&self, series: &PriceSeries) -> Result<ScoreResult, BranchError> {
        let mut bars = series.bars.clone();
        bars.sort_by_key(|b| b.date);
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        if closes.iter().any(|c| !c.is_finite() || *c <= 0.0) {
            return Err(BranchError::InsufficientData(
                "price series contains non-positive closes".to_string(),
            ));
        }

        let cfg = &self.config;
        let mut features = RawFeatures::new();
        let mut votes: Vec<Vote> = Vec::new();
        let mut omitted: Vec<String> = Vec::new();

        features.insert("bar_count".to_string(), closes.len().into());
        if let Some(last) = closes.last() {
            features.insert("last_close".to_string(), (*last).into());
        }

        // Moving-average crossover
        match (
            indicators::sma(&closes, cfg.short_ma_period),
            indicators::sma(&closes, cfg.long_ma_period),
        ) {
            (Some(short), Some(long)) => {
                let contribution = signum(short - long);
                let cross = indicators::bars_since_cross(
                    &closes,
                    cfg.short_ma_period,
                    cfg.long_ma_period,
                    cfg.crossover_recent_bars,
                );
                features.insert("sma_short".to_string(), short.into());
                features.insert("sma_long".to_string(), long.into());
                features.insert("ma_cross_recent".to_string(), cross.is_some().into());
                let mut note = format!(
                    "SMA{} {} SMA{}",
                    cfg.short_ma_period,
                    match contribution {
                        1 => "above",
                        -1 => "below",
                        _ => "at",
                    },
                    cfg.long_ma_period
                );
                if let Some((bars_ago, direction)) = cross {
                    features.insert("ma_cross_bars_ago".to_string(), bars_ago.into());
                    let dir = if direction > 0 { "upward" } else { "downward" };
                    features.insert("ma_cross_direction".to_string(), dir.into());
                    note.push_str(&format!(" (recent {} crossover {} bars ago)", dir, bars_ago));
                }
                votes.push(Vote { name: "ma_crossover", weight: cfg.crossover_weight, contribution, note });
            }
            _ => omitted.push("ma_crossover".to_string()),
        }

        // MACD
        match indicators::macd(&closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal) {
            Some(MacdOutput { macd_line, signal_line, histogram }) => {
                let contribution = signum(histogram);
                features.insert("macd_line".to_string(), macd_line.into());
                features.insert("macd_signal".to_string(), signal_line.into());
                features.insert("macd_histogram".to_string(), histogram.into());
                let note = format!(
                    "MACD {}",
                    match contribution {
                        1 => "bullish",
                        -1 => "bearish",
                        _ => "flat",
                    }
                );
                votes.push(Vote { name: "macd", weight: cfg.macd_weight, contribution, note });
            }
            None => omitted.push("macd".to_string()),
        }

        // RSI
        match indicators::rsi(&closes, cfg.rsi_period) {
            Some(rsi) => {
                let (contribution, zone) = if rsi > cfg.rsi_overbought {
                    (-1, "overbought")
                } else if rsi < cfg.rsi_oversold {
                    (1, "oversold")
                } else {
                    (0, "neutral")
                };
                features.insert("rsi".to_string(), rsi.into());
                features.insert("rsi_zone".to_string(), zone.into());
                let note = format!("RSI {:.1} {}", rsi, zone);
                votes.push(Vote { name: "rsi", weight: cfg.rsi_weight, contribution, note });
            }
            None => omitted.push("rsi".to_string()),
        }

        // Bollinger position
        match indicators::bollinger(&closes, cfg.bollinger_period, cfg.bollinger_std_dev) {
            Some(BollingerOutput { upper, lower, percent_b, .. }) => {
                let (contribution, position) = if percent_b > 1.0 {
                    (-1, "breakout")
                } else if percent_b < 0.0 {
                    (1, "breakdown")
                } else {
                    (0, "inside")
                };
                features.insert("bb_upper".to_string(), upper.into());
                features.insert("bb_lower".to_string(), lower.into());
                features.insert("bb_percent_b".to_string(), percent_b.into());
                features.insert("bb_position".to_string(), position.into());
                let note = format!("price {} Bollinger bands (%B {:.2})", position, percent_b);
                votes.push(Vote { name: "bollinger", weight: cfg.bollinger_weight, contribution, note });
            }
            None => omitted.push("bollinger".to_string()),
        }

        if votes.is_empty() {
            return Err(BranchError::InsufficientData(format!(
                "{} bars is too few for any indicator",
                closes.len()
            )));
        }

        let total_weight: f64 = votes.iter().map(|v| v.weight).sum();
        let weighted: f64 = votes.iter().map(|v| v.weight * v.contribution as f64).sum();
        // Zero total weight yields NaN, which ScoreResult::new refuses
        let normalized = weighted / total_weight;
        let score = 50.0 + 50.0 * normalized;

        for vote in &votes {
            features.insert(format!("contrib_{}", vote.name), (vote.contribution as i64).into());
        }
        features.insert(
            "computed_indicators".to_string(),
            votes.iter().map(|v| v.name.to_string()).collect::<Vec<_>>().into(),
        );
        features.insert("omitted_indicators".to_string(), omitted.clone().into());

        let mut rationale = votes.iter().map(|v| v.note.as_str()).collect::<Vec<_>>().join("; ");
        if !omitted.is_empty() {
            rationale.push_str(&format!("; omitted (short history): {}", omitted.join(", ")));
        }

        debug!(
            "📈 Technical {}: score={:.1} from {} indicators ({} omitted)",
            series.ticker,
            score,
            votes.len(),
            omitted.len()
        );

        ScoreResult::new(Domain::Technical, score, &self.thresholds, rationale, features)
    }
}

impl DomainScorer for TechnicalScorer {
    type Input = PriceSeries;

    fn domain(&self) -> Domain {
        Domain::Technical
    }

    fn score(&self, input: &PriceSeries) -> Result<ScoreResult, BranchError> {
        self.score_series(input)
    }
}

fn signum(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureValue, PriceBar, SignalLabel};
    use chrono::{Duration, NaiveDate};

    fn series_from(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        PriceSeries {
            ticker: "AAPL".to_string(),
            as_of: start + Duration::days(closes.len() as i64),
            bars: closes
                .iter()
                .enumerate()
                .map(|(i, c)| PriceBar {
                    date: start + Duration::days(i as i64),
                    open: *c,
                    high: *c,
                    low: *c,
                    close: *c,
                    volume: 1_000_000,
                })
                .collect(),
        }
    }

    /// 30 bars sliding from 130 to 101, then 10 bars climbing to 131
    fn recovering_closes() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..30).map(|i| 130.0 - i as f64).collect();
        closes.extend((1..=10).map(|i| 101.0 + 3.0 * i as f64));
        closes
    }

    #[test]
    fn test_recent_upward_crossover_scores_bullish() {
        let scorer = TechnicalScorer::new(TechnicalScorerConfig::default(), LabelThresholds::default());
        let result = scorer.score_series(&series_from(&recovering_closes())).unwrap();

        // crossover +0.4, MACD +0.3, RSI overbought -0.15, breakout -0.15 → 50 + 50 * 0.4
        assert_eq!(result.score(), 70.0);
        assert_eq!(result.label(), SignalLabel::Bullish);
        assert_eq!(result.feature("ma_cross_recent"), Some(&FeatureValue::Bool(true)));
        assert_eq!(result.feature("ma_cross_direction"), Some(&FeatureValue::Text("upward".to_string())));
        assert_eq!(result.feature("omitted_indicators"), Some(&FeatureValue::List(vec![])));
        assert!(result.rationale().contains("upward crossover"));
    }

    #[test]
    fn test_flat_prices_vote_neutral_everywhere() {
        let scorer = TechnicalScorer::new(TechnicalScorerConfig::default(), LabelThresholds::default());
        let result = scorer.score_series(&series_from(&[100.0; 40])).unwrap();

        assert_eq!(result.score(), 50.0);
        assert_eq!(result.label(), SignalLabel::Neutral);
        assert_eq!(result.feature("contrib_macd"), Some(&FeatureValue::Int(0)));
        assert!(result.rationale().contains("MACD flat"), "{}", result.rationale());
        assert!(result.rationale().contains("SMA5 at SMA20"));
    }

    #[test]
    fn test_short_history_omits_indicators() {
        let scorer = TechnicalScorer::new(TechnicalScorerConfig::default(), LabelThresholds::default());
        // 21 bars: enough for SMA20, RSI14 and Bollinger20, not for MACD (needs 34)
        let closes: Vec<f64> = (0..21).map(|i| 100.0 + i as f64 * 0.1).collect();
        let result = scorer.score_series(&series_from(&closes)).unwrap();

        assert_eq!(
            result.feature("omitted_indicators"),
            Some(&FeatureValue::List(vec!["macd".to_string()]))
        );
        assert!(result.feature("contrib_macd").is_none());
        assert!(result.rationale().contains("omitted"));
    }

    #[test]
    fn test_no_computable_indicator_is_insufficient_data() {
        let scorer = TechnicalScorer::new(TechnicalScorerConfig::default(), LabelThresholds::default());
        let err = scorer.score_series(&series_from(&[100.0, 101.0, 102.0])).unwrap_err();
        assert!(matches!(err, BranchError::InsufficientData(_)));

        let empty = scorer.score_series(&series_from(&[])).unwrap_err();
        assert!(matches!(empty, BranchError::InsufficientData(_)));
    }

    #[test]
    fn test_downtrend_scores_bearish() {
        let scorer = TechnicalScorer::new(TechnicalScorerConfig::default(), LabelThresholds::default());
        // Gentle rise then a choppy slide; RSI ends oversold (+0.15) but cannot outvote SMA and MACD
        let mut closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64 * 0.5).collect();
        closes.extend((1..=20).map(|i| 109.5 - i as f64 * 0.6 + if i % 2 == 0 { 0.4 } else { 0.0 }));
        let result = scorer.score_series(&series_from(&closes)).unwrap();

        assert_eq!(result.feature("contrib_ma_crossover"), Some(&FeatureValue::Int(-1)));
        assert_eq!(result.feature("contrib_macd"), Some(&FeatureValue::Int(-1)));
        assert_eq!(result.label(), SignalLabel::Bearish);
    }

    #[test]
    fn test_rescoring_is_idempotent() {
        let scorer = TechnicalScorer::new(TechnicalScorerConfig::default(), LabelThresholds::default());
        let series = series_from(&recovering_closes());
        let a = scorer.score_series(&series).unwrap();
        let b = scorer.score_series(&series).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_positive_close_rejected() {
        let scorer = TechnicalScorer::new(TechnicalScorerConfig::default(), LabelThresholds::default());
        let mut closes = recovering_closes();
        closes[10] = 0.0;
        assert!(scorer.score_series(&series_from(&closes)).is_err());
    }
}
