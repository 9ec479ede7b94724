//! 📰 Sentiment Scorer
//!
//! Aggregates per-article polarity into a 0-100 score with an exponentially
//! decayed average: an article `half_life_days` older than the as-of date
//! counts half as much as one published on it. Articles without provider
//! polarity fall back to a small finance lexicon over title + summary.
//!
//! No articles in the window means no score at all, which keeps "balanced
//! news" (a real 50) distinguishable from "no news".

use super::DomainScorer;
use crate::error::BranchError;
use crate::types::score::RawFeatures;
use crate::types::{Domain, LabelThresholds, NewsItem, NewsItems, ScoreResult};
use chrono::NaiveTime;
use log::debug;

const POSITIVE_WORDS: &[&str] = &[
    "beat", "beats", "surge", "surges", "soar", "soars", "record", "upgrade", "upgraded", "growth",
    "profit", "profits", "rally", "rallies", "outperform", "strong", "gain", "gains", "bullish",
    "raises", "raised", "boost", "jumps", "tops", "buyback",
];

const NEGATIVE_WORDS: &[&str] = &[
    "miss", "misses", "plunge", "plunges", "drop", "drops", "downgrade", "downgraded", "loss",
    "losses", "lawsuit", "probe", "recall", "weak", "falls", "slump", "bearish", "cuts", "warning",
    "layoffs", "decline", "declines", "fraud", "sinks",
];

/// Polarity beyond which an article counts as positive / negative
const POLARITY_BAND: f64 = 0.15;

#[derive(Debug, Clone)]
pub struct SentimentScorerConfig {
    /// Articles older than this (relative to the as-of date) are ignored
    pub lookback_days: i64,
    pub half_life_days: f64,
    /// More articles than this in the window marks the news flow as urgent
    pub urgency_item_count: usize,
    pub headline_summary_count: usize,
}

impl Default for SentimentScorerConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            half_life_days: 3.0,
            urgency_item_count: 30,
            headline_summary_count: 3,
        }
    }
}

pub struct SentimentScorer {
    config: SentimentScorerConfig,
    thresholds: LabelThresholds,
}

impl SentimentScorer {
    pub fn new(config: SentimentScorerConfig, thresholds: LabelThresholds) -> Self {
        Self { config, thresholds }
    }

    pub fn score_news(&self, news: &NewsItems) -> Result<ScoreResult, BranchError> {
        let cfg = &self.config;
        let end_of_day = news.as_of.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default());

        // (age_days, polarity, from_lexicon, item)
        let mut scored: Vec<(f64, f64, bool, &NewsItem)> = news
            .items
            .iter()
            .filter_map(|item| {
                let age_days = (end_of_day - item.published_at).num_seconds() as f64 / 86_400.0;
                if age_days < 0.0 || age_days > cfg.lookback_days as f64 {
                    return None;
                }
                let (polarity, from_lexicon) = match item.polarity {
                    Some(p) if p.is_finite() => (p.clamp(-1.0, 1.0), false),
                    _ => (lexicon_polarity(&format!("{} {}", item.title, item.summary)), true),
                };
                Some((age_days, polarity, from_lexicon, item))
            })
            .collect();

        if scored.is_empty() {
            return Err(BranchError::InsufficientData(format!(
                "no news within {} days of {}",
                cfg.lookback_days, news.as_of
            )));
        }

        // Newest first
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let (weighted_sum, weight_total) = scored.iter().fold((0.0, 0.0), |(s, w), (age, p, _, _)| {
            let weight = decay_weight(*age, cfg.half_life_days);
            (s + weight * p, w + weight)
        });
        let weighted_polarity = weighted_sum / weight_total;
        if !weighted_polarity.is_finite() {
            return Err(BranchError::InsufficientData(format!(
                "decay weights degenerate (half-life {} days)",
                cfg.half_life_days
            )));
        }
        let average_polarity = scored.iter().map(|s| s.1).sum::<f64>() / scored.len() as f64;

        let positive = scored.iter().filter(|s| s.1 > POLARITY_BAND).count();
        let negative = scored.iter().filter(|s| s.1 < -POLARITY_BAND).count();
        let neutral = scored.len() - positive - negative;
        let lexicon_scored = scored.iter().filter(|s| s.2).count();

        let trend = match (scored.first(), scored.last()) {
            (Some(newest), Some(oldest)) if scored.len() >= 2 => {
                if newest.1 > oldest.1 {
                    "up"
                } else if newest.1 < oldest.1 {
                    "down"
                } else {
                    "flat"
                }
            }
            _ => "flat",
        };
        let urgency = if scored.len() > cfg.urgency_item_count { "high" } else { "normal" };
        let headlines: Vec<&str> = scored
            .iter()
            .take(cfg.headline_summary_count)
            .map(|s| s.3.title.as_str())
            .collect();

        let score = 50.0 + 50.0 * weighted_polarity;

        let mut features = RawFeatures::new();
        features.insert("item_count".to_string(), scored.len().into());
        features.insert("weighted_polarity".to_string(), weighted_polarity.into());
        features.insert("average_polarity".to_string(), average_polarity.into());
        features.insert("positive_count".to_string(), positive.into());
        features.insert("negative_count".to_string(), negative.into());
        features.insert("neutral_count".to_string(), neutral.into());
        features.insert("lexicon_scored".to_string(), lexicon_scored.into());
        features.insert("trend".to_string(), trend.into());
        features.insert("urgency".to_string(), urgency.into());
        features.insert("headline_summary".to_string(), headlines.join(" | ").into());
        features.insert("newest_age_days".to_string(), scored[0].0.into());

        let rationale = format!(
            "{} articles in {}d window ({} positive, {} negative, {} neutral); decay-weighted polarity {:+.2}, trend {}",
            scored.len(),
            cfg.lookback_days,
            positive,
            negative,
            neutral,
            weighted_polarity,
            trend
        );

        debug!(
            "📰 Sentiment {}: {} items, weighted polarity {:+.3}",
            news.ticker,
            scored.len(),
            weighted_polarity
        );

        ScoreResult::new(Domain::Sentiment, score, &self.thresholds, rationale, features)
    }
}

impl DomainScorer for SentimentScorer {
    type Input = NewsItems;

    fn domain(&self) -> Domain {
        Domain::Sentiment
    }

    fn score(&self, input: &NewsItems) -> Result<ScoreResult, BranchError> {
        self.score_news(input)
    }
}

/// 0.5^(age / half_life)
fn decay_weight(age_days: f64, half_life_days: f64) -> f64 {
    0.5f64.powf(age_days.max(0.0) / half_life_days)
}

/// Net share of positive lexicon hits in [-1, 1]; 0 when nothing matches
fn lexicon_polarity(text: &str) -> f64 {
    let mut pos = 0usize;
    let mut neg = 0usize;
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
    {
        if POSITIVE_WORDS.contains(&word.as_str()) {
            pos += 1;
        } else if NEGATIVE_WORDS.contains(&word.as_str()) {
            neg += 1;
        }
    }
    if pos + neg == 0 {
        return 0.0;
    }
    (pos as f64 - neg as f64) / (pos + neg) as f64
}
