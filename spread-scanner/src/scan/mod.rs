//! Watchlist scanning on top of a market data provider.

mod config;
mod scanner;

pub use config::{ConfigError, RetryPolicy, ScanConfig, DEFAULT_WATCHLIST};
pub use scanner::{ScanIssue, ScanReport, Scanner};
