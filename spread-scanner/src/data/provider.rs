//! Market data provider interface.
//!
//! The scanner only needs three things from a provider: the underlying
//! price, the listed expirations, and one expiration's chain. Failures are
//! typed so the caller can tell missing data from malformed data from a
//! transient outage.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::ExpirationChain;

/// Market data provider errors.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("No data available for {ticker}")]
    NoData { ticker: String },

    #[error("Invalid response format: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn no_data(ticker: impl Into<String>) -> Self {
        Self::NoData {
            ticker: ticker.into(),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_decode() && !e.is_builder(),
            Self::RateLimited => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NoData { .. } | Self::Malformed(_) => false,
        }
    }
}

/// Source of prices, expirations and option chains.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Latest trade (or close) price of the underlying.
    async fn underlying_price(&self, ticker: &str) -> Result<Decimal, ProviderError>;

    /// Listed expiration dates, in provider order.
    async fn expirations(&self, ticker: &str) -> Result<Vec<NaiveDate>, ProviderError>;

    /// Every quote for one expiration.
    async fn option_chain(
        &self,
        ticker: &str,
        expiration: NaiveDate,
    ) -> Result<ExpirationChain, ProviderError>;
}
