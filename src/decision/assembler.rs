//! ⚖️ Decision Assembler
//!
//! Sends the `DecisionRequest` to the oracle and turns the reply into a
//! `DecisionRecord`. Transient oracle failures are retried with exponential
//! backoff; a reply that does not parse is surfaced at once.

use super::oracle::ReasoningOracle;
use super::request::DecisionRequest;
use crate::config::OracleConfig;
use crate::error::{OracleError, PipelineError};
use crate::types::Domain;
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "Buy",
            Action::Sell => "Sell",
            Action::Hold => "Hold",
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Action::Buy),
            "sell" => Ok(Action::Sell),
            "hold" => Ok(Action::Hold),
            other => Err(format!("unknown action {:?}", other)),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of one evaluation, owned by the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub ticker: String,
    pub as_of: NaiveDate,
    pub action: Action,
    pub confidence: Option<f64>,
    pub explanation: String,
    /// Domains the oracle was told were missing
    pub unavailable_domains: Vec<Domain>,
}

impl fmt::Display for DecisionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = match self.action {
            Action::Buy => "🟢",
            Action::Sell => "🔴",
            Action::Hold => "🟡",
        };
        write!(f, "{} {} @ {} → {}", icon, self.ticker, self.as_of, self.action.as_str().to_uppercase())?;
        if let Some(confidence) = self.confidence {
            write!(f, " (confidence {:.2})", confidence)?;
        }
        write!(f, "\n   {}", self.explanation)?;
        if !self.unavailable_domains.is_empty() {
            let names: Vec<&str> = self.unavailable_domains.iter().map(|d| d.as_str()).collect();
            write!(f, "\n   ⚠️  Decided without: {}", names.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct OracleReply {
    action: String,
    confidence: Option<f64>,
    #[serde(alias = "reasoning", alias = "rationale")]
    explanation: String,
}

/// Parsed oracle reply
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub action: Action,
    pub confidence: Option<f64>,
    pub explanation: String,
}

/// Parse the oracle's JSON reply. A markdown code fence around the object is
/// tolerated; anything else outside it is not.
pub fn parse_reply(reply: &str) -> Result<ParsedReply, String> {
    let trimmed = reply.trim();
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();

    let raw: OracleReply =
        serde_json::from_str(json).map_err(|e| format!("reply is not the expected JSON: {}", e))?;
    let action = raw.action.parse::<Action>()?;
    if raw.explanation.trim().is_empty() {
        return Err("reply has an empty explanation".to_string());
    }

    if let Some(confidence) = raw.confidence {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(format!("confidence {} outside [0, 1]", confidence));
        }
    }

    Ok(ParsedReply {
        action,
        confidence: raw.confidence,
        explanation: raw.explanation.trim().to_string(),
    })
}

/// Retry policy for transient oracle failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Bound on a single oracle call
    pub attempt_timeout: Duration,
}

impl From<&OracleConfig> for RetryPolicy {
    fn from(config: &OracleConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            attempt_timeout: config.request_timeout,
        }
    }
}

/// Exponential backoff with cap
fn next_backoff(delay: Duration, max: Duration) -> Duration {
    delay.saturating_mul(2).min(max)
}

pub struct DecisionAssembler {
    oracle: Arc<dyn ReasoningOracle>,
    policy: RetryPolicy,
}

impl DecisionAssembler {
    pub fn new(oracle: Arc<dyn ReasoningOracle>, policy: RetryPolicy) -> Self {
        Self { oracle, policy }
    }

    /// Consult the oracle and parse its reply into a `DecisionRecord`
    pub async fn decide(&self, request: &DecisionRequest) -> Result<DecisionRecord, PipelineError> {
        let reply = self.consult_with_retry(request).await?;
        debug!("🧠 Oracle reply: {}", reply);

        let parsed = parse_reply(&reply).map_err(|reason| PipelineError::DecisionParseError {
            reason,
            reply: reply.clone(),
        })?;

        let record = DecisionRecord {
            ticker: request.ticker.clone(),
            as_of: request.as_of,
            action: parsed.action,
            confidence: parsed.confidence,
            explanation: parsed.explanation,
            unavailable_domains: request.unavailable_domains(),
        };
        info!(
            "⚖️ {} {} → {} (confidence {:?})",
            record.ticker, record.as_of, record.action, record.confidence
        );
        Ok(record)
    }

    /// Exponential backoff on `OracleError::Unavailable` only
    async fn consult_with_retry(&self, request: &DecisionRequest) -> Result<String, PipelineError> {
        let policy = &self.policy;
        let mut attempt = 0;
        let mut delay = policy.initial_backoff;

        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(policy.attempt_timeout, self.oracle.consult(request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(OracleError::Unavailable(format!(
                    "no reply within {}ms",
                    policy.attempt_timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(reply) => return Ok(reply),
                Err(OracleError::Malformed(reason)) => {
                    return Err(PipelineError::DecisionParseError {
                        reason,
                        reply: String::new(),
                    });
                }
                Err(OracleError::Unavailable(reason)) => {
                    if attempt >= policy.max_attempts {
                        return Err(PipelineError::OracleUnavailable {
                            attempts: attempt,
                            reason,
                        });
                    }
                    warn!(
                        "Retry {}/{} for {}: {} (waiting {}ms)",
                        attempt,
                        policy.max_attempts,
                        self.oracle.name(),
                        reason,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;

                    delay = next_backoff(delay, policy.max_backoff);
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Oracle that plays back scripted outcomes, repeating the last one
    pub(crate) struct ScriptedOracle {
        script: Mutex<Vec<Result<String, OracleError>>>,
        /// Time taken before every answer
        delay: Duration,
        pub calls: AtomicU32,
        pub last_request: Mutex<Option<DecisionRequest>>,
    }

    impl ScriptedOracle {
        pub(crate) fn new(script: Vec<Result<String, OracleError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
                last_request: Mutex::new(None),
            })
        }

        pub(crate) fn stalling(reply: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(vec![Ok(reply.to_string())]),
                delay,
                calls: AtomicU32::new(0),
                last_request: Mutex::new(None),
            })
        }

        pub(crate) fn replying(reply: &str) -> Arc<Self> {
            Self::new(vec![Ok(reply.to_string())])
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReasoningOracle for ScriptedOracle {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn consult(&self, request: &DecisionRequest) -> Result<String, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }

    pub(crate) fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            attempt_timeout: Duration::from_millis(500),
        }
    }

    fn request() -> DecisionRequest {
        use super::super::request::DomainInput;
        let unavailable = || DomainInput::Unavailable {
            reason: "source stub unavailable".to_string(),
        };
        DecisionRequest {
            ticker: "AAPL".to_string(),
            as_of: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            score_scale: "0-100, 50 = neutral",
            technical: unavailable(),
            sentiment: unavailable(),
            insider: DomainInput::Available {
                label: crate::types::SignalLabel::Bullish,
                score: 85.0,
                rationale: "CEO buy".to_string(),
                raw_features: Default::default(),
            },
        }
    }

    #[test]
    fn test_parse_plain_reply() {
        let parsed =
            parse_reply(r#"{"action": "Buy", "confidence": 0.8, "explanation": "All signals bullish."}"#).unwrap();
        assert_eq!(parsed.action, Action::Buy);
        assert_eq!(parsed.confidence, Some(0.8));
        assert_eq!(parsed.explanation, "All signals bullish.");
    }

    #[test]
    fn test_parse_fenced_reply_case_insensitive() {
        let reply = "```json\n{\"action\": \"HOLD\", \"reasoning\": \"Mixed.\"}\n```";
        let parsed = parse_reply(reply).unwrap();
        assert_eq!(parsed.action, Action::Hold);
        assert_eq!(parsed.confidence, None);
        assert_eq!(parsed.explanation, "Mixed.");
    }

    #[test]
    fn test_parse_rejects_unknown_action() {
        let err = parse_reply(r#"{"action": "Accumulate", "confidence": 0.6, "explanation": "x"}"#).unwrap_err();
        assert!(err.contains("Accumulate") || err.contains("accumulate"));
    }

    #[test]
    fn test_parse_rejects_out_of_range_confidence() {
        assert!(parse_reply(r#"{"action": "Sell", "confidence": 1.7, "explanation": "x"}"#).is_err());
        assert!(parse_reply("I think you should buy.").is_err());
    }

    #[test]
    fn test_parse_requires_explanation() {
        assert!(parse_reply(r#"{"action": "Buy", "confidence": 0.8}"#).is_err());
        assert!(parse_reply(r#"{"action": "Buy", "explanation": "  "}"#).is_err());
    }

    #[test]
    fn test_parse_does_not_dig_json_out_of_prose() {
        let reply = r#"Sure! Here is my answer: {"action": "Buy", "explanation": "ok"} Hope that helps."#;
        assert!(parse_reply(reply).is_err());
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let cap = Duration::from_millis(4000);
        assert_eq!(next_backoff(Duration::from_millis(500), cap), Duration::from_millis(1000));
        assert_eq!(next_backoff(Duration::from_millis(3000), cap), cap);
        assert_eq!(next_backoff(Duration::MAX, cap), cap);
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let oracle = ScriptedOracle::new(vec![
            Err(OracleError::Unavailable("HTTP 503".to_string())),
            Err(OracleError::Unavailable("HTTP 429".to_string())),
            Ok(r#"{"action": "Buy", "confidence": 0.7, "explanation": "ok"}"#.to_string()),
        ]);
        let assembler = DecisionAssembler::new(oracle.clone(), quick_policy());

        let record = assembler.decide(&request()).await.unwrap();

        assert_eq!(oracle.calls(), 3);
        assert_eq!(record.action, Action::Buy);
        assert_eq!(record.unavailable_domains, vec![Domain::Technical, Domain::Sentiment]);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let oracle = ScriptedOracle::new(vec![Err(OracleError::Unavailable("quota".to_string()))]);
        let assembler = DecisionAssembler::new(oracle.clone(), quick_policy());

        let err = assembler.decide(&request()).await.unwrap_err();

        assert_eq!(oracle.calls(), 3);
        assert!(matches!(err, PipelineError::OracleUnavailable { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_slow_oracle_times_out_per_attempt() {
        let oracle = ScriptedOracle::stalling(
            r#"{"action": "Buy", "explanation": "too late"}"#,
            Duration::from_secs(5),
        );
        let policy = RetryPolicy {
            attempt_timeout: Duration::from_millis(30),
            ..quick_policy()
        };
        let assembler = DecisionAssembler::new(oracle.clone(), policy);

        let err = assembler.decide(&request()).await.unwrap_err();

        assert_eq!(oracle.calls(), 3);
        match err {
            PipelineError::OracleUnavailable { attempts, reason } => {
                assert_eq!(attempts, 3);
                assert!(reason.contains("no reply within 30ms"), "{}", reason);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_parse_error_is_not_retried() {
        let oracle = ScriptedOracle::replying(r#"{"action": "Maybe"}"#);
        let assembler = DecisionAssembler::new(oracle.clone(), quick_policy());

        let err = assembler.decide(&request()).await.unwrap_err();

        assert_eq!(oracle.calls(), 1);
        match err {
            PipelineError::DecisionParseError { reply, .. } => assert!(reply.contains("Maybe")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_record_display() {
        let record = DecisionRecord {
            ticker: "AAPL".to_string(),
            as_of: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            action: Action::Sell,
            confidence: Some(0.55),
            explanation: "Insiders are selling.".to_string(),
            unavailable_domains: vec![Domain::Sentiment],
        };
        let text = record.to_string();
        assert!(text.contains("AAPL @ 2024-05-01 → SELL (confidence 0.55)"));
        assert!(text.contains("Decided without: sentiment"));
    }
}
