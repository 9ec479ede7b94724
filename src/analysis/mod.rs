pub mod indicators;
pub mod insider;
pub mod sentiment;
pub mod technical;

pub use insider::{InsiderScorer, InsiderScorerConfig};
pub use sentiment::{SentimentScorer, SentimentScorerConfig};
pub use technical::{TechnicalScorer, TechnicalScorerConfig};

use crate::error::BranchError;
use crate::types::{Domain, ScoreResult};

/// Turns one domain's raw payload into a normalized score.
///
/// Scorers are pure: the same input always yields the same result. A
/// scorer that cannot produce a meaningful score returns
/// `BranchError::InsufficientData` instead of a neutral placeholder.
pub trait DomainScorer: Send + Sync + 'static {
    type Input: Send + 'static;

    fn domain(&self) -> Domain;

    fn score(&self, input: &Self::Input) -> Result<ScoreResult, BranchError>;
}
