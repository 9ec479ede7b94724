//! 📦 Raw signal payloads
//!
//! One payload per domain, exactly as a source adapter hands it over.
//! Every payload carries the as-of date it was fetched for and can strip
//! records dated after it (`retain_as_of`).

pub mod score;

pub use score::{FeatureValue, LabelThresholds, ScoreResult, SignalLabel};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three signal domains fused by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Technical,
    Sentiment,
    Insider,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Technical, Domain::Sentiment, Domain::Insider];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Technical => "technical",
            Domain::Sentiment => "sentiment",
            Domain::Insider => "insider",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Chronological price history ending on or before `as_of`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub as_of: NaiveDate,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// A single news article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub summary: String,
    pub source: Option<String>,
    pub published_at: NaiveDateTime,
    /// Polarity in [-1, 1] when the provider scores articles itself
    pub polarity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItems {
    pub ticker: String,
    pub as_of: NaiveDate,
    pub items: Vec<NewsItem>,
}

/// Direction of an insider trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InsiderAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderTransaction {
    pub insider: String,
    /// Free-form position string ("CEO", "Director", "Chief Financial Officer", ...)
    pub role: String,
    pub action: InsiderAction,
    pub shares: f64,
    pub value: Option<f64>,
    /// Trade date
    pub date: NaiveDate,
    /// Date the trade was made public, when the provider reports it
    #[serde(default)]
    pub filed: Option<NaiveDate>,
}

impl InsiderTransaction {
    /// First date the trade was public knowledge
    pub fn disclosed_on(&self) -> NaiveDate {
        self.filed.map_or(self.date, |filed| filed.max(self.date))
    }
}

/// Insider transactions plus the provider's monthly pressure ratio, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderActivity {
    pub ticker: String,
    pub as_of: NaiveDate,
    pub transactions: Vec<InsiderTransaction>,
    /// Monthly share purchase ratio normalized to [-1, 1]
    pub mspr: Option<f64>,
}

/// Closed set of raw payloads, one variant per domain
#[derive(Debug, Clone, PartialEq)]
pub enum RawSignal {
    Price(PriceSeries),
    News(NewsItems),
    Insider(InsiderActivity),
}

impl RawSignal {
    pub fn domain(&self) -> Domain {
        match self {
            RawSignal::Price(_) => Domain::Technical,
            RawSignal::News(_) => Domain::Sentiment,
            RawSignal::Insider(_) => Domain::Insider,
        }
    }

    pub fn record_count(&self) -> usize {
        match self {
            RawSignal::Price(s) => s.bars.len(),
            RawSignal::News(n) => n.items.len(),
            RawSignal::Insider(i) => i.transactions.len(),
        }
    }

    /// Latest record date in the payload, if any records exist
    pub fn latest_record_date(&self) -> Option<NaiveDate> {
        match self {
            RawSignal::Price(s) => s.bars.iter().map(|b| b.date).max(),
            RawSignal::News(n) => n.items.iter().map(|i| i.published_at.date()).max(),
            RawSignal::Insider(i) => i.transactions.iter().map(|t| t.disclosed_on()).max(),
        }
    }
}

impl From<PriceSeries> for RawSignal {
    fn from(series: PriceSeries) -> Self {
        RawSignal::Price(series)
    }
}

impl From<NewsItems> for RawSignal {
    fn from(news: NewsItems) -> Self {
        RawSignal::News(news)
    }
}

impl From<InsiderActivity> for RawSignal {
    fn from(activity: InsiderActivity) -> Self {
        RawSignal::Insider(activity)
    }
}

/// Point-in-time filtering shared by all payloads
pub trait PointInTime {
    /// Drop every record dated after `as_of`, returning how many were dropped
    fn retain_as_of(&mut self, as_of: NaiveDate) -> usize;
}

impl PointInTime for PriceSeries {
    fn retain_as_of(&mut self, as_of: NaiveDate) -> usize {
        let before = self.bars.len();
        self.bars.retain(|b| b.date <= as_of);
        before - self.bars.len()
    }
}

impl PointInTime for NewsItems {
    fn retain_as_of(&mut self, as_of: NaiveDate) -> usize {
        let before = self.items.len();
        self.items.retain(|i| i.published_at.date() <= as_of);
        before - self.items.len()
    }
}

impl PointInTime for InsiderActivity {
    fn retain_as_of(&mut self, as_of: NaiveDate) -> usize {
        let before = self.transactions.len();
        self.transactions.retain(|t| t.disclosed_on() <= as_of);
        before - self.transactions.len()
    }
}

impl PointInTime for RawSignal {
    fn retain_as_of(&mut self, as_of: NaiveDate) -> usize {
        match self {
            RawSignal::Price(s) => s.retain_as_of(as_of),
            RawSignal::News(n) => n.retain_as_of(as_of),
            RawSignal::Insider(i) => i.retain_as_of(as_of),
        }
    }
}
