//! 🕵️ Finnhub insider adapter
//!
//! Combines `/stock/insider-transactions` (open-market trades) with
//! `/stock/insider-sentiment` (monthly share purchase ratio). The sentiment
//! call is auxiliary: when it fails the transactions still go through with
//! no MSPR attached.

use super::http::{decode, get_text};
use super::SourceAdapter;
use crate::error::SourceError;
use crate::types::{InsiderAction, InsiderActivity, InsiderTransaction};
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use log::{debug, info, warn};
use serde::Deserialize;

const FINNHUB_API: &str = "https://finnhub.io/api/v1";

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    data: Vec<RawTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransaction {
    name: String,
    /// Signed share delta
    change: f64,
    transaction_date: String,
    /// Public disclosure date; a trade is unknown to the market before it
    #[serde(default)]
    filing_date: Option<String>,
    transaction_code: String,
    transaction_price: Option<f64>,
    /// Not part of every plan's payload
    #[serde(default)]
    position: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    data: Vec<MonthlySentiment>,
}

#[derive(Debug, Deserialize)]
struct MonthlySentiment {
    year: i32,
    month: u32,
    mspr: f64,
}

/// Parse insider transactions, keeping open-market buys (P) and sells (S)
/// traded within `[as_of - lookback, as_of]` and filed no later than `as_of`
pub fn parse_transactions(
    body: &str,
    as_of: NaiveDate,
    lookback_days: i64,
) -> Result<Vec<InsiderTransaction>, SourceError> {
    let response: TransactionsResponse = decode(body)?;
    let window_start = as_of - Duration::days(lookback_days);

    let mut transactions = Vec::new();
    for raw in response.data {
        let date = NaiveDate::parse_from_str(&raw.transaction_date, "%Y-%m-%d").map_err(|_| {
            SourceError::Malformed(format!("bad transactionDate {:?}", raw.transaction_date))
        })?;

        let action = match raw.transaction_code.as_str() {
            "P" => InsiderAction::Buy,
            "S" => InsiderAction::Sell,
            _ => continue, // Grants, exercises, gifts
        };
        if date < window_start || date > as_of {
            continue;
        }
        let filed = match raw.filing_date.as_deref().filter(|d| !d.is_empty()) {
            Some(d) => Some(NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|_| {
                SourceError::Malformed(format!("bad filingDate {:?}", d))
            })?),
            None => None,
        };
        if filed.is_some_and(|f| f > as_of) {
            debug!("🕵️ {} trade on {} filed after {}; skipped", raw.name, date, as_of);
            continue;
        }

        let shares = raw.change.abs();
        let value = raw
            .transaction_price
            .filter(|p| *p > 0.0)
            .map(|price| shares * price);

        transactions.push(InsiderTransaction {
            insider: raw.name,
            role: raw.position.unwrap_or_default(),
            action,
            shares,
            value,
            date,
            filed,
        });
    }
    transactions.sort_by_key(|t| t.date);
    Ok(transactions)
}

/// MSPR of the latest month that had fully ended by `as_of`, scaled to [-1, 1]
pub fn parse_mspr(body: &str, as_of: NaiveDate) -> Result<Option<f64>, SourceError> {
    let response: SentimentResponse = decode(body)?;

    let latest = response
        .data
        .iter()
        .filter_map(|m| month_end(m.year, m.month).map(|end| (end, m.mspr)))
        .filter(|(end, _)| *end <= as_of)
        .max_by_key(|(end, _)| *end);

    Ok(latest.map(|(_, mspr)| (mspr / 100.0).clamp(-1.0, 1.0)))
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|d| d.pred_opt())
}

pub struct FinnhubInsider {
    client: reqwest::Client,
    api_key: String,
    lookback_days: i64,
    base_url: String,
}

impl FinnhubInsider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, lookback_days: i64) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            lookback_days,
            base_url: FINNHUB_API.to_string(),
        }
    }

    fn query(&self, ticker: &str, from: NaiveDate, to: NaiveDate) -> [(&'static str, String); 4] {
        [
            ("symbol", ticker.to_string()),
            ("from", from.to_string()),
            ("to", to.to_string()),
            ("token", self.api_key.clone()),
        ]
    }

    async fn fetch_mspr(&self, ticker: &str, as_of: NaiveDate) -> Result<Option<f64>, SourceError> {
        // Monthly buckets: reach back far enough to cover the last completed month
        let from = NaiveDate::from_ymd_opt(as_of.year(), as_of.month(), 1)
            .unwrap_or(as_of)
            - Duration::days(self.lookback_days.max(62));
        let url = format!("{}/stock/insider-sentiment", self.base_url);
        let body = get_text(&self.client, &url, &self.query(ticker, from, as_of)).await?;
        parse_mspr(&body, as_of)
    }
}

#[async_trait]
impl SourceAdapter for FinnhubInsider {
    type Signal = InsiderActivity;

    fn name(&self) -> &str {
        "finnhub_insider"
    }

    async fn fetch(&self, ticker: &str, as_of: NaiveDate) -> Result<InsiderActivity, SourceError> {
        let from = as_of - Duration::days(self.lookback_days);
        let url = format!("{}/stock/insider-transactions", self.base_url);
        let body = get_text(&self.client, &url, &self.query(ticker, from, as_of)).await?;
        let transactions = parse_transactions(&body, as_of, self.lookback_days)?;

        let mspr = match self.fetch_mspr(ticker, as_of).await {
            Ok(mspr) => mspr,
            Err(e) => {
                warn!("⚠️  Insider sentiment for {} unavailable: {}", ticker, e);
                None
            }
        };
        debug!("🕵️ {} MSPR: {:?}", ticker, mspr);

        info!(
            "🕵️ {}: {} open-market insider trades since {}",
            ticker,
            transactions.len(),
            from
        );
        Ok(InsiderActivity {
            ticker: ticker.to_string(),
            as_of,
            transactions,
            mspr,
        })
    }
}
