//! Tradier market data client.
//!
//! API quirks handled here:
//! - single-element lists come back as a bare object, not an array
//! - empty results come back as `null`
//! - greeks are only present when requested and may be missing per contract
//!
//! Requests are spaced through a shared [`Throttle`]; the default 600ms
//! keeps a full watchlist scan inside the market data rate limit.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::{MarketDataProvider, ProviderError};
use super::throttle::Throttle;
use super::types::{ExpirationChain, OptionQuote, OptionType};

/// Tradier production API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.tradier.com/v1";

/// Client settings that are safe to keep in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradierConfig {
    pub base_url: String,
    /// Minimum spacing between requests.
    pub request_interval_ms: u64,
}

impl Default for TradierConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_interval_ms: 600,
        }
    }
}

/// A list the API may send as one object, many objects or nothing.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

fn flatten<T>(value: Option<OneOrMany<T>>) -> Vec<T> {
    value.map(OneOrMany::into_vec).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    quotes: Option<QuotesBody>,
}

#[derive(Debug, Deserialize)]
struct QuotesBody {
    #[serde(default)]
    quote: Option<OneOrMany<RawQuote>>,
}

/// Raw underlying quote.
#[derive(Debug, Clone, Deserialize)]
struct RawQuote {
    symbol: String,
    #[serde(default)]
    last: Option<f64>,
    #[serde(default)]
    close: Option<f64>,
    #[serde(default)]
    prevclose: Option<f64>,
}

impl RawQuote {
    /// Last trade, falling back to today's close, then the previous close.
    fn price(&self) -> Option<Decimal> {
        [self.last, self.close, self.prevclose]
            .into_iter()
            .flatten()
            .find(|p| *p > 0.0)
            .and_then(to_decimal)
    }
}

#[derive(Debug, Deserialize)]
struct ExpirationsResponse {
    expirations: Option<ExpirationsBody>,
}

#[derive(Debug, Deserialize)]
struct ExpirationsBody {
    #[serde(default)]
    date: Option<OneOrMany<String>>,
}

#[derive(Debug, Deserialize)]
struct ChainResponse {
    options: Option<ChainBody>,
}

/// Contracts are kept as raw JSON so one bad record can be skipped without
/// failing the whole chain.
#[derive(Debug, Deserialize)]
struct ChainBody {
    #[serde(default)]
    option: Option<OneOrMany<serde_json::Value>>,
}

/// Raw option contract from the chains endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOption {
    #[serde(default)]
    pub strike: Option<f64>,
    #[serde(default)]
    pub option_type: Option<String>,
    #[serde(default)]
    pub expiration_date: Option<String>,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub last: Option<f64>,
    #[serde(default)]
    pub greeks: Option<RawGreeks>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGreeks {
    #[serde(default)]
    pub delta: Option<f64>,
    #[serde(default)]
    pub mid_iv: Option<f64>,
    #[serde(default)]
    pub smv_vol: Option<f64>,
}

impl RawOption {
    /// Convert to an `OptionQuote`; `None` if the contract is unparseable.
    pub fn to_quote(&self) -> Option<OptionQuote> {
        let option_type = OptionType::from_str(self.option_type.as_deref()?)?;
        let strike = to_decimal(self.strike?).filter(|s| *s > Decimal::ZERO)?;

        let price = |value: Option<f64>| to_decimal(value.unwrap_or(0.0).max(0.0));

        let (delta, implied_volatility) = match &self.greeks {
            Some(g) => (
                g.delta,
                g.mid_iv.or(g.smv_vol).filter(|v| v.is_finite()).unwrap_or(0.0),
            ),
            None => (None, 0.0),
        };

        Some(OptionQuote {
            strike,
            option_type,
            bid: price(self.bid)?,
            ask: price(self.ask)?,
            last: price(self.last)?,
            implied_volatility,
            delta,
        })
    }
}

/// Convert a JSON float to a decimal through its shortest round-trip text.
fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}

/// Tradier API client.
pub struct TradierClient {
    client: Client,
    token: String,
    base_url: String,
    throttle: Throttle,
    request_count: AtomicU64,
}

impl TradierClient {
    /// Create a new client with default settings.
    pub fn new(token: String) -> Self {
        Self::with_config(token, &TradierConfig::default())
    }

    pub fn with_config(token: String, config: &TradierConfig) -> Self {
        Self {
            client: Client::new(),
            token,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            throttle: Throttle::new(Duration::from_millis(config.request_interval_ms)),
            request_count: AtomicU64::new(0),
        }
    }

    /// Get request count for monitoring.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Rate-limited request helper.
    async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        self.throttle.acquire().await;

        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .query(params)
            .send()
            .await?;

        self.request_count.fetch_add(1, Ordering::Relaxed);

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("Failed to parse {}: {}", endpoint, e)))
    }
}

#[async_trait]
impl MarketDataProvider for TradierClient {
    async fn underlying_price(&self, ticker: &str) -> Result<Decimal, ProviderError> {
        let response: QuotesResponse = self
            .request("markets/quotes", &[("symbols", ticker)])
            .await?;

        let quotes = flatten(response.quotes.and_then(|q| q.quote));
        let quote = quotes
            .iter()
            .find(|q| q.symbol.eq_ignore_ascii_case(ticker))
            .ok_or_else(|| ProviderError::no_data(ticker))?;

        quote.price().ok_or_else(|| ProviderError::no_data(ticker))
    }

    async fn expirations(&self, ticker: &str) -> Result<Vec<NaiveDate>, ProviderError> {
        let response: ExpirationsResponse = self
            .request(
                "markets/options/expirations",
                &[("symbol", ticker), ("includeAllRoots", "true")],
            )
            .await?;

        let dates = flatten(response.expirations.and_then(|e| e.date));
        if dates.is_empty() {
            return Err(ProviderError::no_data(ticker));
        }

        dates
            .iter()
            .map(|d| {
                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map_err(|e| ProviderError::Malformed(format!("expiration {:?}: {}", d, e)))
            })
            .collect()
    }

    async fn option_chain(
        &self,
        ticker: &str,
        expiration: NaiveDate,
    ) -> Result<ExpirationChain, ProviderError> {
        let date_str = expiration.format("%Y-%m-%d").to_string();
        let response: ChainResponse = self
            .request(
                "markets/options/chains",
                &[("symbol", ticker), ("expiration", &date_str), ("greeks", "true")],
            )
            .await?;

        let records = flatten(response.options.and_then(|o| o.option));
        if records.is_empty() {
            return Err(ProviderError::no_data(ticker));
        }

        let mut chain = ExpirationChain::new(ticker, expiration);
        let mut dropped = 0usize;
        for value in records {
            let record = match serde_json::from_value::<RawOption>(value) {
                Ok(record) => record,
                Err(_) => {
                    dropped += 1;
                    continue;
                }
            };
            // Keep the chain to a single expiration
            if record
                .expiration_date
                .as_deref()
                .is_some_and(|d| d != date_str)
            {
                dropped += 1;
                continue;
            }
            match record.to_quote() {
                Some(quote) => chain.add_quote(quote),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            debug!("{} {}: dropped {} unparseable contracts", ticker, expiration, dropped);
        }

        if chain.is_empty() {
            return Err(ProviderError::Malformed(format!(
                "no usable contracts in {} {} chain",
                ticker, expiration
            )));
        }

        Ok(chain)
    }
}
