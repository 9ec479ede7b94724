//! 🚦 Orchestrator
//!
//! Runs the three fetch-then-score branches concurrently and waits for all of
//! them (the merge barrier) before building `PipelineState`. Every adapter
//! call and every scorer run is bounded by its own timeout; a timed out step
//! fails only its branch.

use super::state::{BranchReport, BranchState, BranchTracker, PipelineState};
use crate::analysis::DomainScorer;
use crate::config::PipelineConfig;
use crate::error::{BranchError, BranchStage, PipelineError};
use crate::sources::SourceAdapter;
use crate::types::{InsiderActivity, NewsItems, PointInTime, PriceSeries, RawSignal};
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;

/// A source adapter paired with the scorer that consumes its payload
pub struct Branch<T> {
    pub adapter: Arc<dyn SourceAdapter<Signal = T>>,
    pub scorer: Arc<dyn DomainScorer<Input = T>>,
}

impl<T> Branch<T> {
    pub fn new(
        adapter: Arc<dyn SourceAdapter<Signal = T>>,
        scorer: Arc<dyn DomainScorer<Input = T>>,
    ) -> Self {
        Self { adapter, scorer }
    }
}

pub struct Orchestrator {
    technical: Branch<PriceSeries>,
    sentiment: Branch<NewsItems>,
    insider: Branch<InsiderActivity>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        technical: Branch<PriceSeries>,
        sentiment: Branch<NewsItems>,
        insider: Branch<InsiderActivity>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            technical,
            sentiment,
            insider,
            config,
        }
    }

    /// Run all branches and merge their results
    pub async fn run(&self, ticker: &str, as_of: NaiveDate) -> Result<PipelineState, PipelineError> {
        info!("🚦 Evaluating {} as of {}", ticker, as_of);
        let started = Instant::now();

        let (technical, sentiment, insider) = tokio::join!(
            run_branch(&self.technical, ticker, as_of, &self.config),
            run_branch(&self.sentiment, ticker, as_of, &self.config),
            run_branch(&self.insider, ticker, as_of, &self.config),
        );

        for report in [&technical, &sentiment, &insider] {
            match &report.outcome {
                Ok(score) => info!("   ✅ {} in {:?}", score.breakdown(), report.elapsed),
                Err(e) => warn!(
                    "   ⚠️  {} unavailable ({}): {}",
                    report.domain, report.state, e
                ),
            }
        }

        let state = PipelineState::merge(ticker, as_of, vec![technical, sentiment, insider])?;
        info!(
            "🧩 Merged {}/3 domains for {} in {:?}",
            state.available_count(),
            ticker,
            started.elapsed()
        );
        Ok(state)
    }
}

/// Fetch, strip anything dated after `as_of`, then score on the blocking pool
async fn run_branch<T>(
    branch: &Branch<T>,
    ticker: &str,
    as_of: NaiveDate,
    config: &PipelineConfig,
) -> BranchReport
where
    T: PointInTime + Into<RawSignal> + Send + 'static,
{
    let domain = branch.scorer.domain();
    let started = Instant::now();
    let mut tracker = BranchTracker::new(domain);

    let finish = |tracker: &BranchTracker,
                  raw: Option<RawSignal>,
                  outcome: Result<_, BranchError>,
                  stripped_records: usize| BranchReport {
        domain,
        state: tracker.state(),
        raw,
        outcome,
        stripped_records,
        elapsed: started.elapsed(),
    };

    // Fetch
    tracker.advance(BranchState::Fetching);
    let fetched = timeout(config.fetch_timeout, branch.adapter.fetch(ticker, as_of)).await;
    let mut signal = match fetched {
        Ok(Ok(signal)) => signal,
        Ok(Err(cause)) => {
            tracker.advance(BranchState::SourceFailed);
            let err = BranchError::SourceUnavailable {
                source_name: branch.adapter.name().to_string(),
                cause,
            };
            return finish(&tracker, None, Err(err), 0);
        }
        Err(_) => {
            tracker.advance(BranchState::SourceFailed);
            let err = BranchError::Timeout {
                stage: BranchStage::Fetch,
                after: config.fetch_timeout,
            };
            return finish(&tracker, None, Err(err), 0);
        }
    };

    let stripped = signal.retain_as_of(as_of);
    if stripped > 0 {
        warn!(
            "⚠️  {} returned {} record(s) dated after {}; dropped before scoring",
            branch.adapter.name(),
            stripped,
            as_of
        );
    }
    tracker.advance(BranchState::Fetched);

    // Score
    tracker.advance(BranchState::Scoring);
    let scorer = Arc::clone(&branch.scorer);
    let task = tokio::task::spawn_blocking(move || {
        let outcome = scorer.score(&signal);
        (signal, outcome)
    });

    // A timed out scorer keeps running on the blocking pool; its result is dropped
    match timeout(config.score_timeout, task).await {
        Ok(Ok((signal, Ok(score)))) => {
            tracker.advance(BranchState::Scored);
            debug!("📊 {} scored {:.1}", domain, score.score());
            finish(&tracker, Some(signal.into()), Ok(score), stripped)
        }
        Ok(Ok((signal, Err(e)))) => {
            tracker.advance(BranchState::ScoringFailed);
            finish(&tracker, Some(signal.into()), Err(e), stripped)
        }
        Ok(Err(join_err)) => {
            tracker.advance(BranchState::ScoringFailed);
            finish(&tracker, None, Err(BranchError::ScorerAborted(join_err.to_string())), stripped)
        }
        Err(_) => {
            tracker.advance(BranchState::ScoringFailed);
            let err = BranchError::Timeout {
                stage: BranchStage::Score,
                after: config.score_timeout,
            };
            finish(&tracker, None, Err(err), stripped)
        }
    }
}
