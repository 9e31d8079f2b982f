//! Core data types for spread scanning.
//!
//! A scan works on one expiration at a time: an [`ExpirationChain`] holds
//! every quote for a ticker at one expiration date, and an
//! [`OptionsSnapshot`] bundles the chains of one ticker with its underlying
//! price for offline screening.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }
}

/// A single tradable option contract at fetch time.
///
/// Quotes are built fresh for every chain fetch and never mutated. Prices
/// that the provider did not report are stored as zero; an unknown delta
/// is `None` rather than zero so it cannot be mistaken for a reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    /// Strike price
    pub strike: Decimal,

    /// Option type (call or put)
    pub option_type: OptionType,

    /// Bid price, zero when the book is empty
    #[serde(default)]
    pub bid: Decimal,

    /// Ask price, zero when the book is empty
    #[serde(default)]
    pub ask: Decimal,

    /// Last trade price, zero when unknown
    #[serde(default)]
    pub last: Decimal,

    /// Implied volatility (annualized, decimal). Zero marks the contract unusable.
    #[serde(default)]
    pub implied_volatility: f64,

    /// Provider delta, signed (negative for puts)
    #[serde(default)]
    pub delta: Option<f64>,
}

impl OptionQuote {
    /// Create a quote with only strike and type set.
    pub fn new(strike: Decimal, option_type: OptionType) -> Self {
        Self {
            strike,
            option_type,
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            last: Decimal::ZERO,
            implied_volatility: 0.0,
            delta: None,
        }
    }

    pub fn with_prices(mut self, bid: Decimal, ask: Decimal) -> Self {
        self.bid = bid;
        self.ask = ask;
        self
    }

    pub fn with_last(mut self, last: Decimal) -> Self {
        self.last = last;
        self
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = Some(delta);
        self
    }

    pub fn with_iv(mut self, implied_volatility: f64) -> Self {
        self.implied_volatility = implied_volatility;
        self
    }

    pub fn is_put(&self) -> bool {
        self.option_type == OptionType::Put
    }

    /// Midpoint of bid and ask, or `None` if the sum overflows.
    pub fn mid(&self) -> Option<Decimal> {
        self.bid
            .checked_add(self.ask)
            .map(|sum| sum / Decimal::from(2))
    }
}

/// All options for one ticker at a single expiration date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpirationChain {
    /// Underlying symbol
    pub ticker: String,

    /// Expiration date shared by every quote in the chain
    pub expiration: NaiveDate,

    #[serde(default)]
    pub calls: Vec<OptionQuote>,

    #[serde(default)]
    pub puts: Vec<OptionQuote>,
}

impl ExpirationChain {
    /// Create a new empty chain.
    pub fn new(ticker: impl Into<String>, expiration: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            expiration,
            calls: Vec::new(),
            puts: Vec::new(),
        }
    }

    /// Add a quote to the appropriate side.
    pub fn add_quote(&mut self, quote: OptionQuote) {
        match quote.option_type {
            OptionType::Call => self.calls.push(quote),
            OptionType::Put => self.puts.push(quote),
        }
    }

    /// Calendar days from `today` to expiration (negative once expired).
    pub fn days_to_expiration(&self, today: NaiveDate) -> i64 {
        (self.expiration - today).num_days()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.puts.is_empty()
    }
}

/// Complete options snapshot for one underlying.
///
/// Used by the offline screener; a live scan fetches chains one expiration
/// at a time instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsSnapshot {
    /// Underlying symbol
    pub ticker: String,

    /// Underlying price
    pub underlying_price: Decimal,

    /// Option chains, one per expiration
    #[serde(default)]
    pub chains: Vec<ExpirationChain>,
}

impl OptionsSnapshot {
    pub fn new(ticker: impl Into<String>, underlying_price: Decimal) -> Self {
        Self {
            ticker: ticker.into(),
            underlying_price,
            chains: Vec::new(),
        }
    }

    /// Expiration dates present in the snapshot, ascending.
    pub fn expirations(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<_> = self.chains.iter().map(|c| c.expiration).collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// Total number of option quotes in this snapshot.
    pub fn total_quotes(&self) -> usize {
        self.chains
            .iter()
            .map(|c| c.calls.len() + c.puts.len())
            .sum()
    }
}
