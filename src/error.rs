//! ❌ Error taxonomy
//!
//! Domain-level errors (`SourceError`, `BranchError`) are absorbed by the
//! orchestrator and turned into "unavailable" markers. Only `PipelineError`
//! ever reaches the caller.

use crate::types::Domain;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a source adapter
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("provider rejected the request: {0}")]
    Api(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("no records on or before the as-of date")]
    NoData,
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Malformed(e.to_string())
        } else {
            SourceError::Request(e.to_string())
        }
    }
}

/// Which step of a branch ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchStage {
    Fetch,
    Score,
}

impl fmt::Display for BranchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchStage::Fetch => f.write_str("fetch"),
            BranchStage::Score => f.write_str("score"),
        }
    }
}

/// Failure of one fetch-then-score branch
#[derive(Debug, Clone, Error)]
pub enum BranchError {
    #[error("source {source_name} unavailable: {cause}")]
    SourceUnavailable {
        source_name: String,
        cause: SourceError,
    },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("{stage} timed out after {}ms", .after.as_millis())]
    Timeout { stage: BranchStage, after: Duration },

    /// The scorer task died before returning
    #[error("scorer aborted: {0}")]
    ScorerAborted(String),
}

/// Failure reported by the reasoning oracle client
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// Transient: network, quota, timeout, 5xx
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle answered but the envelope has no usable reply
    #[error("oracle reply malformed: {0}")]
    Malformed(String),
}

/// Errors surfaced to the caller of `evaluate`
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid ticker: {0:?}")]
    InvalidTicker(String),

    #[error("no signal available: {}", describe_failures(.failures))]
    NoSignalAvailable { failures: Vec<(Domain, BranchError)> },

    #[error("oracle unavailable after {attempts} attempt(s): {reason}")]
    OracleUnavailable { attempts: u32, reason: String },

    #[error("could not parse oracle decision: {reason}")]
    DecisionParseError { reason: String, reply: String },

    #[error("evaluation cancelled")]
    Cancelled,
}

fn describe_failures(failures: &[(Domain, BranchError)]) -> String {
    failures
        .iter()
        .map(|(domain, err)| format!("{} ({})", domain, err))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_signal_message_names_every_domain() {
        let err = PipelineError::NoSignalAvailable {
            failures: vec![
                (
                    Domain::Technical,
                    BranchError::SourceUnavailable {
                        source_name: "alpha_vantage_daily".to_string(),
                        cause: SourceError::NoData,
                    },
                ),
                (Domain::Sentiment, BranchError::InsufficientData("no news".to_string())),
                (
                    Domain::Insider,
                    BranchError::Timeout { stage: BranchStage::Fetch, after: Duration::from_millis(1500) },
                ),
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("technical (source alpha_vantage_daily unavailable"));
        assert!(msg.contains("sentiment (insufficient data: no news)"));
        assert!(msg.contains("insider (fetch timed out after 1500ms)"));
    }
}
