//! 📊 Domain scores
//!
//! Every domain scores on the same 0-100 scale (50 = neutral). The label is
//! never chosen independently: `ScoreResult::new` derives it from the score
//! through `LabelThresholds`, so identical scores always carry identical labels.

use super::Domain;
use crate::error::BranchError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalLabel {
    Bullish,
    Bearish,
    Neutral,
}

impl SignalLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalLabel::Bullish => "Bullish",
            SignalLabel::Bearish => "Bearish",
            SignalLabel::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for SignalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score cut-offs shared by all domains
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelThresholds {
    /// Scores strictly above this are Bullish
    pub bullish_above: f64,
    /// Scores strictly below this are Bearish
    pub bearish_below: f64,
}

impl Default for LabelThresholds {
    fn default() -> Self {
        Self {
            bullish_above: 60.0,
            bearish_below: 40.0,
        }
    }
}

impl LabelThresholds {
    pub fn label_for(&self, score: f64) -> SignalLabel {
        if score > self.bullish_above {
            SignalLabel::Bullish
        } else if score < self.bearish_below {
            SignalLabel::Bearish
        } else {
            SignalLabel::Neutral
        }
    }
}

/// Intermediate quantity recorded for auditability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Bool(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Int(v)
    }
}

impl From<usize> for FeatureValue {
    fn from(v: usize) -> Self {
        FeatureValue::Int(v as i64)
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Float(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        FeatureValue::Text(v)
    }
}

impl From<Vec<String>> for FeatureValue {
    fn from(v: Vec<String>) -> Self {
        FeatureValue::List(v)
    }
}

pub type RawFeatures = BTreeMap<String, FeatureValue>;

/// Normalized score for one domain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    domain: Domain,
    score: f64,
    label: SignalLabel,
    rationale: String,
    raw_features: RawFeatures,
}

impl ScoreResult {
    /// Build a result, clamping the score into range and deriving the label.
    /// A non-finite score is refused rather than reported as neutral.
    pub fn new(
        domain: Domain,
        score: f64,
        thresholds: &LabelThresholds,
        rationale: impl Into<String>,
        raw_features: RawFeatures,
    ) -> Result<Self, BranchError> {
        if !score.is_finite() {
            return Err(BranchError::InsufficientData(format!(
                "{} score is not a finite number ({})",
                domain, score
            )));
        }
        // One decimal keeps the prompt readable and the label stable
        let score = (score.clamp(SCORE_MIN, SCORE_MAX) * 10.0).round() / 10.0;

        Ok(Self {
            domain,
            score,
            label: thresholds.label_for(score),
            rationale: rationale.into(),
            raw_features,
        })
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn label(&self) -> SignalLabel {
        self.label
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    pub fn raw_features(&self) -> &RawFeatures {
        &self.raw_features
    }

    pub fn feature(&self, key: &str) -> Option<&FeatureValue> {
        self.raw_features.get(key)
    }

    /// One-line summary for logs
    pub fn breakdown(&self) -> String {
        format!(
            "{}={:.1} ({}) | {}",
            self.domain, self.score, self.label, self.rationale
        )
    }
}
