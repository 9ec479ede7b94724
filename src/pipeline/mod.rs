//! 🚀 Signal pipeline facade
//!
//! `SignalPipeline::evaluate` is the one entry point: normalize the ticker,
//! run the orchestrator, build the `DecisionRequest`, consult the oracle.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{Branch, Orchestrator};
pub use state::{BranchReport, BranchState, BranchTracker, DomainSlot, PipelineState};

use crate::analysis::{InsiderScorer, SentimentScorer, TechnicalScorer};
use crate::config::Config;
use crate::decision::{DecisionAssembler, DecisionRecord, DecisionRequest, GeminiOracle, RetryPolicy};
use crate::error::PipelineError;
use crate::sources::http::build_client;
use crate::sources::{AlphaVantageNews, AlphaVantagePrices, FinnhubInsider};
use crate::types::{InsiderActivity, NewsItems, PriceSeries};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use log::info;
use std::future::Future;
use std::sync::Arc;

/// Trim and upper-case a ticker symbol
pub fn normalize_ticker(raw: &str) -> Result<String, PipelineError> {
    let ticker = raw.trim().to_uppercase();
    let valid = !ticker.is_empty()
        && ticker.len() <= 12
        && ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !valid {
        return Err(PipelineError::InvalidTicker(raw.to_string()));
    }
    Ok(ticker)
}

pub struct SignalPipeline {
    orchestrator: Orchestrator,
    assembler: DecisionAssembler,
}

impl SignalPipeline {
    pub fn new(orchestrator: Orchestrator, assembler: DecisionAssembler) -> Self {
        Self {
            orchestrator,
            assembler,
        }
    }

    /// Wire the live adapters, scorers and Gemini oracle from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_client(config.pipeline.fetch_timeout)?;
        let keys = &config.credentials;
        let sources = &config.sources;

        let technical: Branch<PriceSeries> = Branch::new(
            Arc::new(AlphaVantagePrices::new(
                client.clone(),
                keys.alphavantage_api_key.clone(),
                sources.price_lookback_days,
            )),
            Arc::new(TechnicalScorer::new(config.technical.clone(), config.thresholds)),
        );
        let sentiment: Branch<NewsItems> = Branch::new(
            Arc::new(AlphaVantageNews::new(
                client.clone(),
                keys.alphavantage_api_key.clone(),
                sources.news_lookback_days,
                sources.news_limit,
            )),
            Arc::new(SentimentScorer::new(config.sentiment.clone(), config.thresholds)),
        );
        let insider: Branch<InsiderActivity> = Branch::new(
            Arc::new(FinnhubInsider::new(
                client,
                keys.finnhub_api_key.clone(),
                sources.insider_lookback_days,
            )),
            Arc::new(InsiderScorer::new(config.insider.clone(), config.thresholds)),
        );

        let oracle = GeminiOracle::new(keys.gemini_api_key.clone(), &config.oracle)?;
        info!("🧠 Oracle: Gemini {}", config.oracle.model);

        Ok(Self::new(
            Orchestrator::new(technical, sentiment, insider, config.pipeline.clone()),
            DecisionAssembler::new(Arc::new(oracle), RetryPolicy::from(&config.oracle)),
        ))
    }

    /// Run every branch and build the oracle request without consulting it
    pub async fn assemble(
        &self,
        ticker: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<DecisionRequest, PipelineError> {
        let ticker = normalize_ticker(ticker)?;
        let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());

        let state = self.orchestrator.run(&ticker, as_of).await?;
        Ok(DecisionRequest::from_state(&state))
    }

    /// Evaluate `ticker` as of `as_of` (today, UTC, when omitted)
    pub async fn evaluate(
        &self,
        ticker: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<DecisionRecord, PipelineError> {
        let request = self.assemble(ticker, as_of).await?;
        self.assembler.decide(&request).await
    }

    /// `evaluate`, abandoned as soon as `cancel` resolves
    pub async fn evaluate_with_cancel<F>(
        &self,
        ticker: &str,
        as_of: Option<NaiveDate>,
        cancel: F,
    ) -> Result<DecisionRecord, PipelineError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.evaluate(ticker, as_of) => result,
            _ = cancel => {
                info!("🛑 Evaluation of {} cancelled", ticker.trim());
                Err(PipelineError::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::orchestrator::tests::*;
    use super::*;
    use crate::decision::assembler::tests::{quick_policy, ScriptedOracle};
    use crate::decision::{Action, DomainInput};
    use crate::error::SourceError;
    use crate::types::{Domain, FeatureValue, SignalLabel};
    use std::time::Duration;

    fn pipeline_with(
        technical: Branch<crate::types::PriceSeries>,
        oracle: Arc<ScriptedOracle>,
    ) -> SignalPipeline {
        SignalPipeline::new(
            Orchestrator::new(
                technical,
                Branch::new(StubAdapter::ok(bullish_news()), sentiment_scorer()),
                Branch::new(StubAdapter::ok(ceo_buy()), insider_scorer()),
                fast_config(),
            ),
            DecisionAssembler::new(oracle, quick_policy()),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_bullish() {
        let oracle = ScriptedOracle::replying(
            r#"{"action": "Buy", "confidence": 0.8, "explanation": "Momentum, news and insiders agree."}"#,
        );
        let pipeline = pipeline_with(
            Branch::new(StubAdapter::ok(recovering_prices()), technical_scorer()),
            oracle.clone(),
        );

        let record = pipeline.evaluate(" aapl ", Some(as_of())).await.unwrap();

        assert_eq!(record.action, Action::Buy);
        assert_eq!(record.confidence, Some(0.8));
        assert_eq!(record.ticker, "AAPL");
        assert!(record.unavailable_domains.is_empty());

        let request = oracle.last_request.lock().unwrap().clone().unwrap();
        for domain in Domain::ALL {
            assert_eq!(request.input(domain).label(), Some(SignalLabel::Bullish), "{}", domain);
        }
        match &request.technical {
            DomainInput::Available { raw_features, .. } => {
                assert_eq!(raw_features.get("ma_cross_recent"), Some(&FeatureValue::Bool(true)));
            }
            other => panic!("technical unavailable: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_signal_skips_oracle() {
        let oracle = ScriptedOracle::replying(r#"{"action": "Hold"}"#);
        let pipeline = SignalPipeline::new(
            Orchestrator::new(
                Branch::new(StubAdapter::<PriceSeries>::failing(SourceError::NoData), technical_scorer()),
                Branch::new(StubAdapter::<NewsItems>::failing(SourceError::NoData), sentiment_scorer()),
                Branch::new(StubAdapter::<InsiderActivity>::failing(SourceError::NoData), insider_scorer()),
                fast_config(),
            ),
            DecisionAssembler::new(oracle.clone(), quick_policy()),
        );

        let err = pipeline.evaluate("AAPL", Some(as_of())).await.unwrap_err();

        assert!(matches!(err, PipelineError::NoSignalAvailable { .. }));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_domain_reaches_oracle_as_unavailable() {
        let oracle = ScriptedOracle::replying(r#"{"action": "hold", "confidence": 0.4, "explanation": "Partial data."}"#);
        let pipeline = pipeline_with(
            Branch::new(
                StubAdapter::<PriceSeries>::failing(SourceError::Api("rate limited".to_string())),
                technical_scorer(),
            ),
            oracle.clone(),
        );

        let record = pipeline.evaluate("AAPL", Some(as_of())).await.unwrap();

        assert_eq!(record.action, Action::Hold);
        assert_eq!(record.unavailable_domains, vec![Domain::Technical]);
        let request = oracle.last_request.lock().unwrap().clone().unwrap();
        assert!(matches!(request.technical, DomainInput::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_invalid_ticker() {
        let oracle = ScriptedOracle::replying(r#"{"action": "Hold"}"#);
        let pipeline = pipeline_with(
            Branch::new(StubAdapter::ok(recovering_prices()), technical_scorer()),
            oracle,
        );

        let err = pipeline.evaluate("   ", None).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTicker(_)));
    }

    #[tokio::test]
    async fn test_cancel_abandons_branches() {
        let oracle = ScriptedOracle::replying(r#"{"action": "Hold"}"#);
        let pipeline = pipeline_with(
            Branch::new(
                StubAdapter::slow(recovering_prices(), Duration::from_millis(150)),
                technical_scorer(),
            ),
            oracle.clone(),
        );

        let err = pipeline
            .evaluate_with_cancel("AAPL", Some(as_of()), tokio::time::sleep(Duration::from_millis(20)))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_assemble_does_not_consult_oracle() {
        let oracle = ScriptedOracle::replying(r#"{"action": "Hold"}"#);
        let pipeline = pipeline_with(
            Branch::new(StubAdapter::ok(recovering_prices()), technical_scorer()),
            oracle.clone(),
        );

        let request = pipeline.assemble("msft", Some(as_of())).await.unwrap();

        assert_eq!(request.ticker, "MSFT");
        assert!(request.unavailable_domains().is_empty());
        assert_eq!(oracle.calls(), 0);
    }

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker(" brk.b ").unwrap(), "BRK.B");
        assert!(normalize_ticker("").is_err());
        assert!(normalize_ticker("AA PL").is_err());
    }
}
