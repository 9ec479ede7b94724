//! Configuration management for the signal pipeline
//!
//! Loads configuration from environment variables (via .env file) and provides
//! validated, type-safe access to credentials, timeouts and scorer tuning.
//! Missing credentials fail here, at startup, never in the middle of a run.

use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

use crate::analysis::{InsiderScorerConfig, SentimentScorerConfig, TechnicalScorerConfig};
use crate::types::LabelThresholds;

/// Complete configuration for one process
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub pipeline: PipelineConfig,
    pub oracle: OracleConfig,
    pub sources: SourceConfig,
    pub technical: TechnicalScorerConfig,
    pub sentiment: SentimentScorerConfig,
    pub insider: InsiderScorerConfig,
    pub thresholds: LabelThresholds,
    pub logging: LoggingConfig,
}

/// API credentials, all required
#[derive(Clone)]
pub struct Credentials {
    pub gemini_api_key: String,
    pub alphavantage_api_key: String,
    pub finnhub_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_api_key", &"<redacted>")
            .field("alphavantage_api_key", &"<redacted>")
            .field("finnhub_api_key", &"<redacted>")
            .finish()
    }
}

/// Per-branch time bounds
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound for one adapter fetch
    pub fetch_timeout: Duration,
    /// Upper bound for one scorer run
    pub score_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(15),
            score_timeout: Duration::from_secs(5),
        }
    }
}

/// Reasoning oracle call policy
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub model: String,
    /// Timeout for a single oracle request
    pub request_timeout: Duration,
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            request_timeout: Duration::from_secs(30),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(4000),
        }
    }
}

/// How far back each adapter requests data, relative to the as-of date
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub price_lookback_days: i64,
    pub news_lookback_days: i64,
    pub news_limit: usize,
    pub insider_lookback_days: i64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            price_lookback_days: 90,
            news_lookback_days: 7,
            news_limit: 50,
            insider_lookback_days: 90,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Reads a .env file from the working directory if present.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (ignoring error if not found)
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup: &lookup };

        let sources = SourceConfig {
            price_lookback_days: vars.parse("PRICE_LOOKBACK_DAYS", 90)?,
            news_lookback_days: vars.parse("NEWS_LOOKBACK_DAYS", 7)?,
            news_limit: vars.parse("NEWS_LIMIT", 50)?,
            insider_lookback_days: vars.parse("INSIDER_LOOKBACK_DAYS", 90)?,
        };

        let config = Config {
            credentials: Credentials {
                gemini_api_key: vars.required("GEMINI_API_KEY")?,
                alphavantage_api_key: vars.required("ALPHAVANTAGE_API_KEY")?,
                finnhub_api_key: vars.required("FINNHUB_API_KEY")?,
            },
            pipeline: PipelineConfig {
                fetch_timeout: Duration::from_secs(vars.parse("FETCH_TIMEOUT_SECS", 15)?),
                score_timeout: Duration::from_secs(vars.parse("SCORE_TIMEOUT_SECS", 5)?),
            },
            oracle: OracleConfig {
                model: vars.string("GEMINI_MODEL", "gemini-2.5-flash"),
                request_timeout: Duration::from_secs(vars.parse("ORACLE_TIMEOUT_SECS", 30)?),
                max_attempts: vars.parse("ORACLE_MAX_ATTEMPTS", 3)?,
                initial_backoff: Duration::from_millis(vars.parse("ORACLE_INITIAL_BACKOFF_MS", 500)?),
                max_backoff: Duration::from_millis(vars.parse("ORACLE_MAX_BACKOFF_MS", 4000)?),
            },
            technical: TechnicalScorerConfig {
                short_ma_period: vars.parse("SHORT_MA_PERIOD", 5)?,
                long_ma_period: vars.parse("LONG_MA_PERIOD", 20)?,
                rsi_period: vars.parse("RSI_PERIOD", 14)?,
                bollinger_period: vars.parse("BOLLINGER_PERIOD", 20)?,
                bollinger_std_dev: vars.parse("BOLLINGER_STD_DEV", 2.0)?,
                crossover_recent_bars: vars.parse("CROSSOVER_RECENT_BARS", 5)?,
                ..TechnicalScorerConfig::default()
            },
            sentiment: SentimentScorerConfig {
                lookback_days: sources.news_lookback_days,
                half_life_days: vars.parse("NEWS_HALF_LIFE_DAYS", 3.0)?,
                ..SentimentScorerConfig::default()
            },
            insider: InsiderScorerConfig {
                cluster_window_days: vars.parse("CLUSTER_WINDOW_DAYS", 7)?,
                cluster_min_insiders: vars.parse("CLUSTER_MIN_INSIDERS", 2)?,
                ..InsiderScorerConfig::default()
            },
            thresholds: LabelThresholds {
                bullish_above: vars.parse("BULLISH_THRESHOLD", 60.0)?,
                bearish_below: vars.parse("BEARISH_THRESHOLD", 40.0)?,
            },
            sources,
            logging: LoggingConfig {
                log_level: vars.string("LOG_LEVEL", "info"),
            },
        };

        Ok(config)
    }

    /// Validate configuration values are within acceptable ranges
    pub fn validate(&self) -> Result<()> {
        // "NaN" and "inf" parse as f64 but slip past every range check below
        let t = &self.thresholds;
        let floats = [
            ("BULLISH_THRESHOLD", t.bullish_above),
            ("BEARISH_THRESHOLD", t.bearish_below),
            ("BOLLINGER_STD_DEV", self.technical.bollinger_std_dev),
            ("NEWS_HALF_LIFE_DAYS", self.sentiment.half_life_days),
        ];
        if let Some((key, value)) = floats.iter().find(|(_, v)| !v.is_finite()) {
            bail!("{} must be a finite number, got {}", key, value);
        }

        // Thresholds
        if !(0.0..=100.0).contains(&t.bullish_above) || !(0.0..=100.0).contains(&t.bearish_below) {
            bail!("BULLISH_THRESHOLD and BEARISH_THRESHOLD must be within 0-100");
        }
        if t.bearish_below > t.bullish_above {
            bail!("BEARISH_THRESHOLD must not exceed BULLISH_THRESHOLD");
        }

        // Timeouts
        if self.pipeline.fetch_timeout.is_zero() || self.pipeline.score_timeout.is_zero() {
            bail!("FETCH_TIMEOUT_SECS and SCORE_TIMEOUT_SECS must be > 0");
        }
        if self.oracle.request_timeout.is_zero() {
            bail!("ORACLE_TIMEOUT_SECS must be > 0");
        }
        if self.oracle.max_attempts == 0 {
            bail!("ORACLE_MAX_ATTEMPTS must be ≥ 1");
        }
        if self.oracle.initial_backoff > self.oracle.max_backoff {
            bail!("ORACLE_INITIAL_BACKOFF_MS cannot exceed ORACLE_MAX_BACKOFF_MS");
        }

        // Lookbacks
        if self.sources.price_lookback_days <= 0
            || self.sources.news_lookback_days <= 0
            || self.sources.insider_lookback_days <= 0
        {
            bail!("lookback windows must be > 0 days");
        }
        if self.sources.news_limit == 0 {
            bail!("NEWS_LIMIT must be > 0");
        }

        // Scorers
        let tech = &self.technical;
        if tech.short_ma_period == 0 || tech.rsi_period == 0 || tech.bollinger_period == 0 {
            bail!("indicator periods must be > 0");
        }
        if tech.short_ma_period >= tech.long_ma_period {
            bail!("SHORT_MA_PERIOD must be below LONG_MA_PERIOD");
        }
        if tech.bollinger_std_dev <= 0.0 {
            bail!("BOLLINGER_STD_DEV must be > 0");
        }
        if self.sentiment.half_life_days <= 0.0 {
            bail!("NEWS_HALF_LIFE_DAYS must be > 0");
        }
        if self.insider.cluster_min_insiders < 2 {
            bail!("CLUSTER_MIN_INSIDERS must be ≥ 2");
        }
        if self.insider.cluster_window_days <= 0 {
            bail!("CLUSTER_WINDOW_DAYS must be > 0");
        }

        Ok(())
    }
}

// Helper for environment variable parsing

struct Vars<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<'a, F: Fn(&str) -> Option<String>> Vars<'a, F> {
    fn string(&self, key: &str, default: &str) -> String {
        (self.lookup)(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> Result<String> {
        match (self.lookup)(key) {
            Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
            _ => bail!("{} not found in environment", key),
        }
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.lookup)(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("Invalid {} value: {:?}", key, raw)),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn with_keys(extra: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let mut pairs = vec![
            ("GEMINI_API_KEY", "g-key"),
            ("ALPHAVANTAGE_API_KEY", "av-key"),
            ("FINNHUB_API_KEY", "fh-key"),
        ];
        pairs.extend_from_slice(extra);
        lookup_from(&pairs)
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(with_keys(&[])).expect("Failed to load config");

        assert_eq!(config.pipeline.fetch_timeout, Duration::from_secs(15));
        assert_eq!(config.oracle.max_attempts, 3);
        assert_eq!(config.oracle.model, "gemini-2.5-flash");
        assert_eq!(config.sources.price_lookback_days, 90);
        assert_eq!(config.technical.long_ma_period, 20);
        assert_eq!(config.sentiment.lookback_days, 7);
        assert_eq!(config.insider.cluster_window_days, 7);
        assert_eq!(config.thresholds, LabelThresholds::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_credential_is_startup_failure() {
        let lookup = lookup_from(&[("GEMINI_API_KEY", "g"), ("ALPHAVANTAGE_API_KEY", "a")]);
        let err = Config::from_lookup(lookup).unwrap_err();
        assert!(err.to_string().contains("FINNHUB_API_KEY"));
    }

    #[test]
    fn test_blank_credential_rejected() {
        let lookup = lookup_from(&[
            ("GEMINI_API_KEY", "   "),
            ("ALPHAVANTAGE_API_KEY", "a"),
            ("FINNHUB_API_KEY", "f"),
        ]);
        assert!(Config::from_lookup(lookup).is_err());
    }

    #[test]
    fn test_env_override() {
        let config = Config::from_lookup(with_keys(&[
            ("FETCH_TIMEOUT_SECS", "3"),
            ("NEWS_LOOKBACK_DAYS", "14"),
            ("BULLISH_THRESHOLD", "65"),
        ]))
        .unwrap();

        assert_eq!(config.pipeline.fetch_timeout, Duration::from_secs(3));
        assert_eq!(config.sources.news_lookback_days, 14);
        assert_eq!(config.sentiment.lookback_days, 14);
        assert_eq!(config.thresholds.bullish_above, 65.0);
    }

    #[test]
    fn test_unparseable_value_is_error() {
        let err = Config::from_lookup(with_keys(&[("RSI_PERIOD", "fourteen")])).unwrap_err();
        assert!(format!("{:#}", err).contains("RSI_PERIOD"));
    }

    #[test]
    fn test_validation_inverted_thresholds() {
        let mut config = Config::from_lookup(with_keys(&[])).unwrap();
        config.thresholds.bearish_below = 70.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_ma_periods() {
        let mut config = Config::from_lookup(with_keys(&[])).unwrap();
        config.technical.short_ma_period = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_cluster_size() {
        let mut config = Config::from_lookup(with_keys(&[])).unwrap();
        config.insider.cluster_min_insiders = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_finite_floats() {
        for (key, raw) in [("NEWS_HALF_LIFE_DAYS", "NaN"), ("BOLLINGER_STD_DEV", "inf")] {
            let config = Config::from_lookup(with_keys(&[(key, raw)])).unwrap();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let config = Config::from_lookup(with_keys(&[])).unwrap();
        let debug = format!("{:?}", config.credentials);
        assert!(!debug.contains("g-key"));
        assert!(debug.contains("redacted"));
    }
}
