//! 📝 Decision request sent to the reasoning oracle
//!
//! Missing domains are carried as explicit `unavailable` entries with the
//! reason, never as a zero or neutral score.

use crate::pipeline::{DomainSlot, PipelineState};
use crate::types::score::RawFeatures;
use crate::types::{Domain, SignalLabel};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DomainInput {
    Available {
        label: SignalLabel,
        score: f64,
        rationale: String,
        raw_features: RawFeatures,
    },
    Unavailable {
        reason: String,
    },
}

impl DomainInput {
    pub fn is_available(&self) -> bool {
        matches!(self, DomainInput::Available { .. })
    }

    pub fn label(&self) -> Option<SignalLabel> {
        match self {
            DomainInput::Available { label, .. } => Some(*label),
            DomainInput::Unavailable { .. } => None,
        }
    }
}

impl From<&DomainSlot> for DomainInput {
    fn from(slot: &DomainSlot) -> Self {
        match slot {
            DomainSlot::Available { score, .. } => DomainInput::Available {
                label: score.label(),
                score: score.score(),
                rationale: score.rationale().to_string(),
                raw_features: score.raw_features().clone(),
            },
            DomainSlot::Unavailable { error } => DomainInput::Unavailable {
                reason: error.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRequest {
    pub ticker: String,
    pub as_of: NaiveDate,
    /// Scale shared by every available score
    pub score_scale: &'static str,
    pub technical: DomainInput,
    pub sentiment: DomainInput,
    pub insider: DomainInput,
}

impl DecisionRequest {
    pub fn from_state(state: &PipelineState) -> Self {
        Self {
            ticker: state.ticker().to_string(),
            as_of: state.as_of(),
            score_scale: "0-100, 50 = neutral",
            technical: state.slot(Domain::Technical).into(),
            sentiment: state.slot(Domain::Sentiment).into(),
            insider: state.slot(Domain::Insider).into(),
        }
    }

    pub fn input(&self, domain: Domain) -> &DomainInput {
        match domain {
            Domain::Technical => &self.technical,
            Domain::Sentiment => &self.sentiment,
            Domain::Insider => &self.insider,
        }
    }

    pub fn unavailable_domains(&self) -> Vec<Domain> {
        Domain::ALL
            .iter()
            .copied()
            .filter(|d| !self.input(*d).is_available())
            .collect()
    }

    /// Instruction prompt with the request embedded as JSON
    pub fn to_prompt(&self) -> serde_json::Result<String> {
        let payload = serde_json::to_string_pretty(self)?;
        Ok(format!(
            "You are an equity analyst. Decide whether to Buy, Sell or Hold {ticker} as of {as_of}, \
             using only the signals below. Each domain is either \"available\" with a score on a \
             0-100 scale (50 = neutral), a label, a rationale and the raw features behind it, or \
             \"unavailable\" with the reason. Do not assume anything about unavailable domains.\n\n\
             Signals:\n{payload}\n\n\
             Reply with strictly valid JSON and nothing else:\n\
             {{\"action\": \"Buy\" | \"Sell\" | \"Hold\", \"confidence\": <number between 0 and 1>, \
             \"explanation\": \"<two or three sentences>\"}}",
            ticker = self.ticker,
            as_of = self.as_of,
            payload = payload
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BranchError, SourceError};
    use crate::pipeline::{BranchReport, BranchState};
    use crate::types::{LabelThresholds, ScoreResult};
    use std::time::Duration;

    fn state() -> PipelineState {
        let mut features = RawFeatures::new();
        features.insert("total_buys".to_string(), 1usize.into());
        let insider = BranchReport {
            domain: Domain::Insider,
            state: BranchState::Scored,
            raw: None,
            outcome: ScoreResult::new(
                Domain::Insider,
                85.0,
                &LabelThresholds::default(),
                "Executives involved: CEO",
                features,
            ),
            stripped_records: 0,
            elapsed: Duration::ZERO,
        };
        let failed = |domain| BranchReport {
            domain,
            state: BranchState::SourceFailed,
            raw: None,
            outcome: Err(BranchError::SourceUnavailable {
                source_name: "alpha_vantage_news".to_string(),
                cause: SourceError::Api("rate limited".to_string()),
            }),
            stripped_records: 0,
            elapsed: Duration::ZERO,
        };
        PipelineState::merge(
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            vec![failed(Domain::Technical), failed(Domain::Sentiment), insider],
        )
        .unwrap()
    }

    #[test]
    fn test_unavailable_domains_are_explicit() {
        let request = DecisionRequest::from_state(&state());

        assert_eq!(request.unavailable_domains(), vec![Domain::Technical, Domain::Sentiment]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["technical"]["status"], "unavailable");
        assert!(json["technical"]["reason"].as_str().unwrap().contains("rate limited"));
        assert!(json["technical"].get("score").is_none());

        assert_eq!(json["insider"]["status"], "available");
        assert_eq!(json["insider"]["label"], "Bullish");
        assert_eq!(json["insider"]["score"], 85.0);
        assert_eq!(json["insider"]["raw_features"]["total_buys"], 1);
        assert_eq!(json["as_of"], "2024-05-01");
    }

    #[test]
    fn test_prompt_embeds_request() {
        let prompt = DecisionRequest::from_state(&state()).to_prompt().unwrap();
        assert!(prompt.contains("AAPL as of 2024-05-01"));
        assert!(prompt.contains("\"status\": \"unavailable\""));
        assert!(prompt.contains("\"action\""));
    }
}
