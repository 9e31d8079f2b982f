//! Watchlist scan.
//!
//! Each ticker is one unit of work: price, expirations, then one chain per
//! selected expiration. Tickers run with bounded concurrency and any
//! provider failure is recorded as a [`ScanIssue`] for that unit only.

use std::fmt::Write as _;
use std::future::Future;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::ScanConfig;
use crate::analytics::{rank_candidates, top_candidates, SpreadCandidate, SpreadScreener};
use crate::data::{MarketDataProvider, ProviderError};
use crate::pricing::years_to_expiration;

/// A provider failure that was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanIssue {
    pub ticker: String,
    /// Set when the failure was for a single chain.
    pub expiration: Option<NaiveDate>,
    pub error: String,
}

/// Result of a scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Accepted candidates, best expected value first.
    pub candidates: Vec<SpreadCandidate>,
    pub issues: Vec<ScanIssue>,
    pub tickers_scanned: usize,
    pub chains_evaluated: usize,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Short alert text listing the top `n` trades.
    pub fn summary(&self, n: usize) -> String {
        if self.candidates.is_empty() {
            return format!(
                "Scan complete: no trades found ({} tickers, {} chains).",
                self.tickers_scanned, self.chains_evaluated
            );
        }

        let mut text = format!(
            "Scan complete! Found {} opportunities.\n",
            self.candidates.len()
        );
        let top = top_candidates(&self.candidates, n);
        let _ = writeln!(text, "Top {} trades:", top.len());
        for candidate in top {
            let _ = writeln!(
                text,
                "- {} {}: {} | Win: {:.1}% | Credit: ${:.2}",
                candidate.ticker,
                candidate.expiration_date,
                candidate,
                candidate.win_probability * 100.0,
                candidate.net_credit
            );
        }
        if !self.issues.is_empty() {
            let _ = writeln!(text, "{} provider errors skipped.", self.issues.len());
        }
        text
    }
}

/// Everything one ticker produced.
#[derive(Debug, Default)]
struct TickerOutcome {
    candidates: Vec<SpreadCandidate>,
    issues: Vec<ScanIssue>,
    chains_evaluated: usize,
}

/// Scans tickers against a market data provider.
pub struct Scanner<P> {
    provider: P,
    screener: SpreadScreener,
    config: ScanConfig,
}

impl<P: MarketDataProvider> Scanner<P> {
    pub fn new(provider: P, config: ScanConfig) -> Self {
        let screener = SpreadScreener::new(config.screener.clone());
        Self {
            provider,
            screener,
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Scan the configured watchlist.
    pub async fn scan(&self, today: NaiveDate) -> ScanReport {
        let tickers = self.config.tickers();
        self.scan_tickers(&tickers, today).await
    }

    pub async fn scan_tickers(&self, tickers: &[String], today: NaiveDate) -> ScanReport {
        self.scan_tickers_with(tickers, today, |_| {}).await
    }

    /// Scan `tickers`, calling `on_done` with each ticker as it finishes.
    pub async fn scan_tickers_with<F>(
        &self,
        tickers: &[String],
        today: NaiveDate,
        mut on_done: F,
    ) -> ScanReport
    where
        F: FnMut(&str),
    {
        info!("Scanning {} tickers", tickers.len());

        let mut outcomes = stream::iter(tickers.iter().map(|ticker| async move {
            let outcome = self.scan_ticker(ticker, today).await;
            (ticker, outcome)
        }))
        .buffer_unordered(self.config.max_concurrency.max(1));

        let mut report = ScanReport::default();
        while let Some((ticker, outcome)) = outcomes.next().await {
            on_done(ticker.as_str());
            report.tickers_scanned += 1;
            report.chains_evaluated += outcome.chains_evaluated;
            report.candidates.extend(outcome.candidates);
            report.issues.extend(outcome.issues);
        }

        rank_candidates(&mut report.candidates);
        info!(
            "Scan finished: {} candidates, {} issues",
            report.candidates.len(),
            report.issues.len()
        );
        report
    }

    async fn scan_ticker(&self, ticker: &str, today: NaiveDate) -> TickerOutcome {
        let mut outcome = TickerOutcome::default();

        let price = match self
            .with_retry(ticker, || self.provider.underlying_price(ticker))
            .await
        {
            Ok(price) => price,
            Err(e) => {
                outcome.issues.push(issue(ticker, None, e));
                return outcome;
            }
        };

        if price < self.config.min_underlying_price {
            debug!(
                "{}: price {} below minimum {}",
                ticker, price, self.config.min_underlying_price
            );
            return outcome;
        }

        let expirations = match self
            .with_retry(ticker, || self.provider.expirations(ticker))
            .await
        {
            Ok(dates) => dates,
            Err(e) => {
                outcome.issues.push(issue(ticker, None, e));
                return outcome;
            }
        };

        let selected = self.config.expirations.select(&expirations, today);
        info!("{} (${:.2}): {} expirations", ticker, price, selected.len());

        for expiration in selected {
            let chain = match self
                .with_retry(ticker, || self.provider.option_chain(ticker, expiration))
                .await
            {
                Ok(chain) => chain,
                Err(e) => {
                    outcome.issues.push(issue(ticker, Some(expiration), e));
                    continue;
                }
            };

            outcome.chains_evaluated += 1;
            let time = years_to_expiration((expiration - today).num_days());
            if let Some(candidate) = self.screener.select_spread(&chain, price, time) {
                info!(
                    "{} {}: found {} EV ${:.2}",
                    ticker, expiration, candidate, candidate.expected_value
                );
                outcome.candidates.push(candidate);
            }
        }

        outcome
    }

    /// Run `op`, retrying transient failures with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, ticker: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let retry = self.config.retry;
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < retry.max_attempts => {
                    let delay = retry.backoff(attempt);
                    debug!(
                        "{}: attempt {} failed ({}), retrying in {:?}",
                        ticker,
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn issue(ticker: &str, expiration: Option<NaiveDate>, error: ProviderError) -> ScanIssue {
    match (&error, expiration) {
        (ProviderError::NoData { .. }, _) => debug!("Skipping {}: {}", ticker, error),
        (_, Some(exp)) => warn!("Skipping {} {}: {}", ticker, exp, error),
        (_, None) => warn!("Skipping {}: {}", ticker, error),
    }
    ScanIssue {
        ticker: ticker.to_string(),
        expiration,
        error: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn candidate(ticker: &str, ev: f64) -> SpreadCandidate {
        SpreadCandidate {
            ticker: ticker.to_string(),
            underlying_price: Decimal::from(100),
            expiration_date: NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
            short_strike: Decimal::from(95),
            long_strike: Decimal::from(94),
            width: Decimal::ONE,
            short_delta: 0.29,
            short_premium: Decimal::new(120, 2),
            long_premium: Decimal::new(70, 2),
            net_credit: Decimal::new(50, 2),
            max_risk: Decimal::new(50, 2),
            win_probability: 0.71,
            roi: 1.0,
            expected_value: ev,
        }
    }

    #[test]
    fn test_summary_lists_top_trades() {
        let report = ScanReport {
            candidates: vec![candidate("AAPL", 0.3), candidate("MSFT", 0.2), candidate("F", 0.1)],
            issues: vec![ScanIssue {
                ticker: "XYZ".into(),
                expiration: None,
                error: "Rate limit exceeded".into(),
            }],
            tickers_scanned: 4,
            chains_evaluated: 10,
        };

        let summary = report.summary(2);
        assert!(summary.contains("Found 3 opportunities"));
        assert!(summary.contains("- AAPL 2026-11-20: 95 / 94 | Win: 71.0% | Credit: $0.50"));
        assert!(summary.contains("MSFT"));
        assert!(!summary.contains("- F "));
        assert!(summary.contains("1 provider errors skipped"));
    }

    #[test]
    fn test_summary_without_trades() {
        let report = ScanReport {
            tickers_scanned: 3,
            ..ScanReport::default()
        };
        assert!(report.is_empty());
        assert_eq!(
            report.summary(3),
            "Scan complete: no trades found (3 tickers, 0 chains)."
        );
    }
}
