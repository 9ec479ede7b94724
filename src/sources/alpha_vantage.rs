//! 📈 Alpha Vantage adapters
//!
//! - `AlphaVantagePrices`: TIME_SERIES_DAILY bars for the technical branch
//! - `AlphaVantageNews`: NEWS_SENTIMENT feed for the sentiment branch
//!
//! Alpha Vantage answers throttling and bad keys with HTTP 200 and a
//! "Note" / "Information" / "Error Message" envelope instead of data.

use super::http::{decode, get_text};
use super::SourceAdapter;
use crate::error::SourceError;
use crate::types::{NewsItem, NewsItems, PriceBar, PriceSeries};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use log::{debug, info};
use serde::Deserialize;
use std::collections::BTreeMap;

const ALPHA_VANTAGE_API: &str = "https://www.alphavantage.co/query";

/// Calendar days covered by `outputsize=compact` (100 trading days)
const COMPACT_WINDOW_DAYS: i64 = 140;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

impl Envelope {
    /// Provider-side rejection, if the body carries one
    fn rejection(&self, has_data: bool) -> Option<SourceError> {
        if let Some(msg) = &self.error_message {
            return Some(SourceError::Api(msg.clone()));
        }
        if has_data {
            return None;
        }
        self.note
            .as_ref()
            .or(self.information.as_ref())
            .map(|msg| SourceError::Api(msg.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(flatten)]
    envelope: Envelope,
    #[serde(rename = "Time Series (Daily)")]
    series: Option<BTreeMap<String, DailyBar>>,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(flatten)]
    envelope: Envelope,
    feed: Option<Vec<FeedItem>>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    title: String,
    #[serde(default)]
    summary: String,
    source: Option<String>,
    time_published: String,
    overall_sentiment_score: Option<Number>,
    #[serde(default)]
    ticker_sentiment: Vec<TickerSentiment>,
}

#[derive(Debug, Deserialize)]
struct TickerSentiment {
    ticker: String,
    ticker_sentiment_score: Number,
}

/// Alpha Vantage mixes JSON numbers and numeric strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Number {
    Float(f64),
    Text(String),
}

impl Number {
    fn value(&self) -> Option<f64> {
        match self {
            Number::Float(v) => Some(*v),
            Number::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn parse_field<T: std::str::FromStr>(raw: &str, field: &str, date: &str) -> Result<T, SourceError> {
    raw.trim()
        .parse()
        .map_err(|_| SourceError::Malformed(format!("bad {} {:?} on {}", field, raw, date)))
}

/// Parse a TIME_SERIES_DAILY body into bars within `[as_of - lookback, as_of]`
pub fn parse_daily_series(
    body: &str,
    ticker: &str,
    as_of: NaiveDate,
    lookback_days: i64,
) -> Result<PriceSeries, SourceError> {
    let response: DailyResponse = decode(body)?;
    if let Some(err) = response.envelope.rejection(response.series.is_some()) {
        return Err(err);
    }
    let series = response
        .series
        .ok_or_else(|| SourceError::Malformed("missing \"Time Series (Daily)\"".to_string()))?;

    let window_start = as_of - Duration::days(lookback_days);
    let mut bars = Vec::with_capacity(series.len());
    for (day, raw) in &series {
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map_err(|_| SourceError::Malformed(format!("bad bar date {:?}", day)))?;
        let bar = PriceBar {
            date,
            open: parse_field(&raw.open, "open", day)?,
            high: parse_field(&raw.high, "high", day)?,
            low: parse_field(&raw.low, "low", day)?,
            close: parse_field(&raw.close, "close", day)?,
            volume: parse_field(&raw.volume, "volume", day)?,
        };
        if date >= window_start && date <= as_of {
            bars.push(bar);
        }
    }
    bars.sort_by_key(|b| b.date);

    if bars.is_empty() {
        return Err(SourceError::NoData);
    }

    Ok(PriceSeries {
        ticker: ticker.to_string(),
        as_of,
        bars,
    })
}

/// Parse a NEWS_SENTIMENT body into newest-first items within the lookback
pub fn parse_news_feed(
    body: &str,
    ticker: &str,
    as_of: NaiveDate,
    lookback_days: i64,
    limit: usize,
) -> Result<NewsItems, SourceError> {
    let response: NewsResponse = decode(body)?;
    if let Some(err) = response.envelope.rejection(response.feed.is_some()) {
        return Err(err);
    }
    let feed = response
        .feed
        .ok_or_else(|| SourceError::Malformed("missing \"feed\"".to_string()))?;

    let window_start = as_of - Duration::days(lookback_days);
    let mut items = Vec::with_capacity(feed.len());
    for entry in feed {
        let published_at = NaiveDateTime::parse_from_str(&entry.time_published, "%Y%m%dT%H%M%S")
            .map_err(|_| {
                SourceError::Malformed(format!("bad time_published {:?}", entry.time_published))
            })?;
        let day = published_at.date();
        if day < window_start || day > as_of {
            continue;
        }

        // Ticker-specific score beats the article-wide one
        let polarity = entry
            .ticker_sentiment
            .iter()
            .find(|t| t.ticker.eq_ignore_ascii_case(ticker))
            .and_then(|t| t.ticker_sentiment_score.value())
            .or_else(|| entry.overall_sentiment_score.as_ref().and_then(Number::value));

        items.push(NewsItem {
            title: entry.title,
            summary: entry.summary,
            source: entry.source,
            published_at,
            polarity,
        });
    }
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items.truncate(limit);

    Ok(NewsItems {
        ticker: ticker.to_string(),
        as_of,
        items,
    })
}

pub struct AlphaVantagePrices {
    client: reqwest::Client,
    api_key: String,
    lookback_days: i64,
    base_url: String,
}

impl AlphaVantagePrices {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, lookback_days: i64) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            lookback_days,
            base_url: ALPHA_VANTAGE_API.to_string(),
        }
    }

    /// Full history is only needed when the window reaches past the compact range
    fn output_size(&self, as_of: NaiveDate, today: NaiveDate) -> &'static str {
        if (today - as_of).num_days() + self.lookback_days > COMPACT_WINDOW_DAYS {
            "full"
        } else {
            "compact"
        }
    }
}

#[async_trait]
impl SourceAdapter for AlphaVantagePrices {
    type Signal = PriceSeries;

    fn name(&self) -> &str {
        "alpha_vantage_daily"
    }

    async fn fetch(&self, ticker: &str, as_of: NaiveDate) -> Result<PriceSeries, SourceError> {
        let output_size = self.output_size(as_of, Utc::now().date_naive());
        debug!("📈 Fetching daily bars for {} (outputsize={})", ticker, output_size);

        let query = [
            ("function", "TIME_SERIES_DAILY".to_string()),
            ("symbol", ticker.to_string()),
            ("outputsize", output_size.to_string()),
            ("apikey", self.api_key.clone()),
        ];
        let body = get_text(&self.client, &self.base_url, &query).await?;
        let series = parse_daily_series(&body, ticker, as_of, self.lookback_days)?;

        info!("📈 {}: {} daily bars up to {}", ticker, series.bars.len(), as_of);
        Ok(series)
    }
}

pub struct AlphaVantageNews {
    client: reqwest::Client,
    api_key: String,
    lookback_days: i64,
    limit: usize,
    base_url: String,
}

impl AlphaVantageNews {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, lookback_days: i64, limit: usize) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            lookback_days,
            limit,
            base_url: ALPHA_VANTAGE_API.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for AlphaVantageNews {
    type Signal = NewsItems;

    fn name(&self) -> &str {
        "alpha_vantage_news"
    }

    async fn fetch(&self, ticker: &str, as_of: NaiveDate) -> Result<NewsItems, SourceError> {
        let time_from = as_of - Duration::days(self.lookback_days);
        let query = [
            ("function", "NEWS_SENTIMENT".to_string()),
            ("tickers", ticker.to_string()),
            ("sort", "LATEST".to_string()),
            ("limit", self.limit.to_string()),
            ("time_from", time_from.format("%Y%m%dT0000").to_string()),
            ("time_to", as_of.format("%Y%m%dT2359").to_string()),
            ("apikey", self.api_key.clone()),
        ];
        let body = get_text(&self.client, &self.base_url, &query).await?;
        let news = parse_news_feed(&body, ticker, as_of, self.lookback_days, self.limit)?;

        info!("📰 {}: {} articles since {}", ticker, news.items.len(), time_from);
        Ok(news)
    }
}
