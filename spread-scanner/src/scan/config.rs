//! Scan configuration.
//!
//! Loaded from TOML; every field has a default so a config file only needs
//! the values it changes:
//!
//! ```toml
//! watchlist = ["SPY", "QQQ", "IWM"]
//! min_underlying_price = "20"
//!
//! [expirations]
//! kind = "dte_range"
//! min_dte = 21
//! max_dte = 50
//!
//! [screener]
//! target_delta = 0.25
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::{ExpirationWindow, SpreadScreenerConfig, WidthPolicy};
use crate::data::TradierConfig;

/// Liquid optionable names scanned when no watchlist is configured.
pub const DEFAULT_WATCHLIST: &[&str] = &[
    "SPY", "QQQ", "IWM", "DIA", "AAPL", "AMD", "NVDA", "TSLA", "AMZN", "MSFT", "GOOGL", "META",
    "NFLX", "JPM", "BAC", "WFC", "C", "GS", "MS", "BA", "DIS", "XOM", "CVX", "INTC", "CSCO", "VZ",
    "T", "PFE", "MRK", "JNJ", "PG", "KO", "PEP", "WMT", "TGT", "HD", "LOW", "NKE", "SBUX", "MCD",
    "V", "MA", "PYPL", "SQ", "UBER", "ABNB", "PLTR", "SOFI", "COIN", "MARA", "RIOT", "DKNG",
    "HOOD", "ROKU", "SHOP", "SNOW", "CRM", "ADBE", "ORCL", "IBM", "CAT", "DE", "GE", "F", "GM",
    "LULU", "CROX", "AFRM", "UPST", "NET", "CRWD", "ZS", "PANW", "FTNT", "NOW", "TEAM", "DDOG",
    "SPOT", "PINS", "SNAP", "ZM", "DOCU", "TWLO", "OKTA", "MDB", "TTD", "RBLX", "U", "GME", "AMC",
    "OXY", "SLB", "HAL", "DVN", "EOG", "COP", "MSTR", "CLSK", "HUT", "WULF",
];

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Retry policy for transient provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt `attempt` (zero-based); doubles each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

/// Everything a scan needs besides credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Tickers to scan, in order.
    pub watchlist: Vec<String>,
    /// Only the first `max_tickers` watchlist entries are scanned.
    pub max_tickers: usize,
    /// Underlyings trading below this are skipped.
    pub min_underlying_price: Decimal,
    /// Which expirations of each ticker to evaluate.
    pub expirations: ExpirationWindow,
    /// Tickers in flight at once.
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    pub screener: SpreadScreenerConfig,
    pub provider: TradierConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            watchlist: DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect(),
            max_tickers: 60,
            min_underlying_price: Decimal::from(15),
            expirations: ExpirationWindow::default(),
            max_concurrency: 4,
            retry: RetryPolicy::default(),
            screener: SpreadScreenerConfig::default(),
            provider: TradierConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Tickers a full scan will visit.
    pub fn tickers(&self) -> Vec<String> {
        self.watchlist
            .iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .take(self.max_tickers)
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::invalid("max_concurrency", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.min_underlying_price < Decimal::ZERO {
            return Err(ConfigError::invalid("min_underlying_price", "must not be negative"));
        }

        match self.expirations {
            ExpirationWindow::FirstN { count: 0 } => {
                return Err(ConfigError::invalid("expirations.count", "must be at least 1"));
            }
            ExpirationWindow::DteRange { min_dte, max_dte } if min_dte > max_dte => {
                return Err(ConfigError::invalid(
                    "expirations",
                    format!("min_dte {} exceeds max_dte {}", min_dte, max_dte),
                ));
            }
            _ => {}
        }

        let screener = &self.screener;
        if !(screener.target_delta > 0.0 && screener.target_delta < 1.0) {
            return Err(ConfigError::invalid(
                "screener.target_delta",
                format!("{} is outside (0, 1)", screener.target_delta),
            ));
        }
        if screener.width_tolerance < Decimal::ZERO {
            return Err(ConfigError::invalid("screener.width_tolerance", "must not be negative"));
        }
        if let Some((min, max)) = screener.short_delta_range {
            if min > max {
                return Err(ConfigError::invalid(
                    "screener.short_delta_range",
                    format!("{} exceeds {}", min, max),
                ));
            }
        }

        let widths_positive = match &screener.width {
            WidthPolicy::Fixed { width } => *width > Decimal::ZERO,
            WidthPolicy::Tiered { tiers, max_width } => {
                *max_width > Decimal::ZERO && tiers.iter().all(|t| t.width > Decimal::ZERO)
            }
        };
        if !widths_positive {
            return Err(ConfigError::invalid("screener.width", "widths must be positive"));
        }
        if let WidthPolicy::Tiered { tiers, .. } = &screener.width {
            // First matching tier wins, so thresholds must increase
            if !tiers.windows(2).all(|w| w[0].below_price < w[1].below_price) {
                return Err(ConfigError::invalid(
                    "screener.width",
                    "tiers must be in ascending below_price order",
                ));
            }
        }

        Ok(())
    }
}
