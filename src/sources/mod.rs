//! 📡 Source adapters
//!
//! One adapter per provider endpoint, all behind `SourceAdapter`. An adapter
//! returns its domain payload bounded to records dated on or before the
//! as-of date, or a `SourceError`. Structurally incomplete payloads are
//! rejected whole (`SourceError::Malformed`); no partial payload is returned.

pub mod alpha_vantage;
pub mod finnhub;
pub mod http;

pub use alpha_vantage::{AlphaVantageNews, AlphaVantagePrices};
pub use finnhub::FinnhubInsider;

use crate::error::SourceError;
use crate::types::PointInTime;
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    type Signal: PointInTime + Send + 'static;

    /// Short identifier used in logs and failure reasons
    fn name(&self) -> &str;

    async fn fetch(&self, ticker: &str, as_of: NaiveDate) -> Result<Self::Signal, SourceError>;
}
