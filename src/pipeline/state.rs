//! 🎯 Branch state machine and merged pipeline state
//!
//! Each domain branch walks:
//! Pending → Fetching → Fetched | SourceFailed, then Fetched → Scoring → Scored | ScoringFailed
//!
//! Branches never share memory. Each one hands back a `BranchReport`, and
//! `PipelineState::merge` is the single merge step that places every report
//! in its own domain slot.

use crate::error::{BranchError, PipelineError};
use crate::types::{Domain, RawSignal, ScoreResult};
use chrono::NaiveDate;
use log::{debug, warn};
use std::fmt;
use std::time::Duration;

/// Lifecycle of one fetch-then-score branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    Pending,
    Fetching,
    Fetched,
    SourceFailed,
    Scoring,
    Scored,
    ScoringFailed,
}

impl BranchState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: BranchState) -> bool {
        use BranchState::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Fetching, Fetched)
                | (Fetching, SourceFailed)
                | (Fetched, Scoring)
                | (Scoring, Scored)
                | (Scoring, ScoringFailed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BranchState::SourceFailed | BranchState::Scored | BranchState::ScoringFailed
        )
    }
}

impl fmt::Display for BranchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks one branch's current state, logging every transition
#[derive(Debug)]
pub struct BranchTracker {
    domain: Domain,
    state: BranchState,
}

impl BranchTracker {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            state: BranchState::Pending,
        }
    }

    pub fn state(&self) -> BranchState {
        self.state
    }

    /// Move to `next`; illegal transitions are logged and ignored
    pub fn advance(&mut self, next: BranchState) {
        if !self.state.can_transition_to(next) {
            warn!(
                "⚠️  Illegal branch transition {} → {} for {}",
                self.state, next, self.domain
            );
            return;
        }
        debug!("🔀 {}: {} → {}", self.domain, self.state, next);
        self.state = next;
    }
}

/// What a finished branch hands back to the merge step
#[derive(Debug)]
pub struct BranchReport {
    pub domain: Domain,
    /// Terminal state reached
    pub state: BranchState,
    /// Fetched payload after the point-in-time strip, if the fetch succeeded
    pub raw: Option<RawSignal>,
    pub outcome: Result<ScoreResult, BranchError>,
    /// Records the adapter returned dated after the as-of date
    pub stripped_records: usize,
    pub elapsed: Duration,
}

/// One domain's slot after the merge
#[derive(Debug, Clone)]
pub enum DomainSlot {
    Available { score: ScoreResult, raw: Option<RawSignal> },
    Unavailable { error: BranchError },
}

impl DomainSlot {
    pub fn score(&self) -> Option<&ScoreResult> {
        match self {
            DomainSlot::Available { score, .. } => Some(score),
            DomainSlot::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, DomainSlot::Available { .. })
    }
}

/// Immutable record built once from the three branch reports
#[derive(Debug, Clone)]
pub struct PipelineState {
    ticker: String,
    as_of: NaiveDate,
    technical: DomainSlot,
    sentiment: DomainSlot,
    insider: DomainSlot,
}

impl PipelineState {
    /// Merge barrier output into one state.
    ///
    /// Fails with `NoSignalAvailable` when no branch produced a score.
    pub fn merge(
        ticker: &str,
        as_of: NaiveDate,
        reports: Vec<BranchReport>,
    ) -> Result<Self, PipelineError> {
        let mut technical = None;
        let mut sentiment = None;
        let mut insider = None;

        for report in reports {
            let slot = match report.outcome {
                Ok(score) => DomainSlot::Available { score, raw: report.raw },
                Err(error) => DomainSlot::Unavailable { error },
            };
            let target = match report.domain {
                Domain::Technical => &mut technical,
                Domain::Sentiment => &mut sentiment,
                Domain::Insider => &mut insider,
            };
            if target.is_some() {
                warn!("⚠️  Duplicate report for {} ignored", report.domain);
                continue;
            }
            *target = Some(slot);
        }

        let missing = |domain: Domain| DomainSlot::Unavailable {
            error: BranchError::InsufficientData(format!("{} branch never reported", domain)),
        };
        let state = Self {
            ticker: ticker.to_string(),
            as_of,
            technical: technical.unwrap_or_else(|| missing(Domain::Technical)),
            sentiment: sentiment.unwrap_or_else(|| missing(Domain::Sentiment)),
            insider: insider.unwrap_or_else(|| missing(Domain::Insider)),
        };

        if state.available_count() == 0 {
            let failures = Domain::ALL
                .iter()
                .filter_map(|d| match state.slot(*d) {
                    DomainSlot::Unavailable { error } => Some((*d, error.clone())),
                    DomainSlot::Available { .. } => None,
                })
                .collect();
            return Err(PipelineError::NoSignalAvailable { failures });
        }

        Ok(state)
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn slot(&self, domain: Domain) -> &DomainSlot {
        match domain {
            Domain::Technical => &self.technical,
            Domain::Sentiment => &self.sentiment,
            Domain::Insider => &self.insider,
        }
    }

    pub fn available_count(&self) -> usize {
        Domain::ALL.iter().filter(|d| self.slot(**d).is_available()).count()
    }

    pub fn unavailable_domains(&self) -> Vec<Domain> {
        Domain::ALL
            .iter()
            .copied()
            .filter(|d| !self.slot(*d).is_available())
            .collect()
    }
}
