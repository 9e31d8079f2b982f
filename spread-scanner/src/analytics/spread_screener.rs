//! Put credit spread selection and scoring.
//!
//! For one expiration chain the screener:
//! - keeps puts with a usable delta (quoted by the provider or computed
//!   from implied volatility)
//! - picks the short leg whose |delta| is closest to the target
//! - picks the long leg whose strike is closest to `short - width`
//! - prices the spread, then scores win probability, ROI and expected value
//!
//! Every step that finds unusable data rejects the candidate with a
//! [`Rejection`]; nothing here panics or aborts a wider scan.

use std::fmt;

use chrono::NaiveDate;
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::expiration_window::ExpirationWindow;
use super::ranking::rank_candidates;
use crate::data::{ExpirationChain, OptionQuote, OptionType, OptionsSnapshot};
use crate::pricing::{years_to_expiration, BlackScholes};

/// Where the short-leg delta comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaSource {
    /// Use the delta reported with the quote; quotes without one are skipped.
    Quoted,
    /// Compute delta from implied volatility; quotes with zero IV are skipped.
    Computed,
}

/// How each leg's premium is taken from the quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumPolicy {
    /// Sell at the bid, buy at the ask, falling back to the last trade
    /// price when that side of the book is zero.
    BidAskWithLastFallback,
    /// Both legs at the bid/ask midpoint.
    Midpoint,
}

impl PremiumPolicy {
    /// Premium received for the sold leg.
    pub fn short_premium(&self, quote: &OptionQuote) -> Option<Decimal> {
        match self {
            Self::BidAskWithLastFallback => {
                if quote.bid.is_zero() {
                    Some(quote.last)
                } else {
                    Some(quote.bid)
                }
            }
            Self::Midpoint => quote.mid(),
        }
    }

    /// Premium paid for the bought leg.
    pub fn long_premium(&self, quote: &OptionQuote) -> Option<Decimal> {
        match self {
            Self::BidAskWithLastFallback => {
                if quote.ask.is_zero() {
                    Some(quote.last)
                } else {
                    Some(quote.ask)
                }
            }
            Self::Midpoint => quote.mid(),
        }
    }
}

/// Width used for underlyings priced below `below_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidthTier {
    pub below_price: Decimal,
    pub width: Decimal,
}

/// Target distance between short and long strikes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WidthPolicy {
    /// Width scales with the underlying price. Tiers are checked in order;
    /// the first tier whose `below_price` exceeds the price wins, otherwise
    /// `max_width` applies.
    Tiered {
        tiers: Vec<WidthTier>,
        max_width: Decimal,
    },
    /// The same width for every underlying.
    Fixed { width: Decimal },
}

impl Default for WidthPolicy {
    fn default() -> Self {
        Self::Tiered {
            tiers: vec![
                WidthTier {
                    below_price: Decimal::from(50),
                    width: Decimal::ONE,
                },
                WidthTier {
                    below_price: Decimal::from(150),
                    width: Decimal::new(25, 1),
                },
            ],
            max_width: Decimal::from(5),
        }
    }
}

impl WidthPolicy {
    pub fn fixed(width: Decimal) -> Self {
        Self::Fixed { width }
    }

    /// Target width for an underlying trading at `price`.
    pub fn target_width(&self, price: Decimal) -> Decimal {
        match self {
            Self::Tiered { tiers, max_width } => tiers
                .iter()
                .find(|tier| price < tier.below_price)
                .map(|tier| tier.width)
                .unwrap_or(*max_width),
            Self::Fixed { width } => *width,
        }
    }
}

/// Configuration for spread selection and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadScreenerConfig {
    /// Target absolute delta for the short strike.
    pub target_delta: f64,
    /// Target strike width.
    pub width: WidthPolicy,
    /// Maximum deviation of the long strike from its target, as a fraction
    /// of the target width.
    pub width_tolerance: Decimal,
    /// Premium methodology.
    pub premium: PremiumPolicy,
    /// Minimum net credit per share.
    pub min_credit: Decimal,
    /// Candidates need an expected value strictly above this.
    pub min_expected_value: f64,
    /// Optional minimum credit / max risk.
    pub min_roi: Option<f64>,
    /// Delta source for leg selection.
    pub delta_source: DeltaSource,
    /// Annual risk-free rate for computed deltas.
    pub risk_free_rate: f64,
    /// Only sell puts struck below the underlying price.
    pub otm_only: bool,
    /// Optional inclusive band of absolute delta for the short leg.
    pub short_delta_range: Option<(f64, f64)>,
}

impl Default for SpreadScreenerConfig {
    fn default() -> Self {
        Self::nearest_match()
    }
}

impl SpreadScreenerConfig {
    /// Nearest-match selection on provider greeks with price-tiered widths.
    ///
    /// The EV minimum of -10 admits nearly everything so the ranking, not
    /// the filter, decides what gets shown.
    pub fn nearest_match() -> Self {
        Self {
            target_delta: 0.30,
            width: WidthPolicy::default(),
            width_tolerance: Decimal::new(6, 1),
            premium: PremiumPolicy::BidAskWithLastFallback,
            min_credit: Decimal::new(5, 2),
            min_expected_value: -10.0,
            min_roi: None,
            delta_source: DeltaSource::Quoted,
            risk_free_rate: 0.045,
            otm_only: false,
            short_delta_range: None,
        }
    }

    /// Fixed $5 width, midpoint pricing, computed deltas, positive EV only.
    pub fn fixed_width() -> Self {
        Self {
            target_delta: 0.30,
            width: WidthPolicy::fixed(Decimal::from(5)),
            width_tolerance: Decimal::new(6, 1),
            premium: PremiumPolicy::Midpoint,
            min_credit: Decimal::new(10, 2),
            min_expected_value: 0.05,
            min_roi: None,
            delta_source: DeltaSource::Computed,
            risk_free_rate: 0.045,
            otm_only: true,
            short_delta_range: Some((0.15, 0.35)),
        }
    }
}

/// Why a chain produced no candidate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("no put with a usable delta")]
    NoShortLeg,

    #[error("no put struck below short strike {short_strike}")]
    NoLongLeg { short_strike: Decimal },

    #[error("closest long strike {found} is too far from target {target}")]
    StrikeMismatch { target: Decimal, found: Decimal },

    #[error("net credit {credit} below floor {floor}")]
    CreditBelowFloor { credit: Decimal, floor: Decimal },

    #[error("max risk {max_risk} is not positive")]
    NonPositiveRisk { max_risk: Decimal },

    #[error("roi {roi:.3} below floor {floor:.3}")]
    RoiBelowFloor { roi: f64, floor: f64 },

    #[error("expected value {ev:.2} does not exceed minimum {min:.2}")]
    ExpectedValueBelowMinimum { ev: f64, min: f64 },

    #[error("arithmetic failure: {0}")]
    Arithmetic(&'static str),
}

/// A scored put credit spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadCandidate {
    /// Underlying ticker.
    pub ticker: String,
    /// Underlying price.
    pub underlying_price: Decimal,
    /// Expiration date.
    pub expiration_date: NaiveDate,
    /// Sold strike.
    pub short_strike: Decimal,
    /// Bought strike, always below the short strike.
    pub long_strike: Decimal,
    /// Actual strike distance.
    pub width: Decimal,
    /// Short strike delta (absolute value).
    pub short_delta: f64,
    /// Premium received for the short leg.
    pub short_premium: Decimal,
    /// Premium paid for the long leg.
    pub long_premium: Decimal,
    /// Net credit (short premium - long premium).
    pub net_credit: Decimal,
    /// Maximum loss per share (width - credit).
    pub max_risk: Decimal,
    /// 1 - |short delta|.
    pub win_probability: f64,
    /// Net credit / max risk.
    pub roi: f64,
    /// win * credit - loss * max risk.
    pub expected_value: f64,
}

impl SpreadCandidate {
    pub fn days_to_expiration(&self, today: NaiveDate) -> i64 {
        (self.expiration_date - today).num_days()
    }

    /// Distance from current price to short strike as percentage.
    pub fn distance_pct(&self) -> f64 {
        let price = self.underlying_price.to_f64().unwrap_or(0.0);
        let short = self.short_strike.to_f64().unwrap_or(0.0);
        if price > 0.0 {
            (price - short).abs() / price * 100.0
        } else {
            0.0
        }
    }
}

impl fmt::Display for SpreadCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {}",
            self.short_strike.normalize(),
            self.long_strike.normalize()
        )
    }
}

/// A put that passed the usability filter, with its absolute delta.
#[derive(Debug, Clone, Copy)]
struct UsablePut<'a> {
    quote: &'a OptionQuote,
    abs_delta: f64,
}

/// Spread screener for selecting and scoring put credit spreads.
#[derive(Debug, Clone)]
pub struct SpreadScreener {
    config: SpreadScreenerConfig,
    pricing: BlackScholes,
}

impl Default for SpreadScreener {
    fn default() -> Self {
        Self::new(SpreadScreenerConfig::default())
    }
}

impl SpreadScreener {
    pub fn new(config: SpreadScreenerConfig) -> Self {
        let pricing = BlackScholes::new(config.risk_free_rate);
        Self { config, pricing }
    }

    pub fn config(&self) -> &SpreadScreenerConfig {
        &self.config
    }

    /// Select and score the best spread in `chain`, or `None`.
    pub fn select_spread(
        &self,
        chain: &ExpirationChain,
        underlying_price: Decimal,
        time_to_expiration: f64,
    ) -> Option<SpreadCandidate> {
        match self.evaluate(chain, underlying_price, time_to_expiration) {
            Ok(candidate) => Some(candidate),
            Err(reason) => {
                debug!("{} {}: rejected, {}", chain.ticker, chain.expiration, reason);
                None
            }
        }
    }

    /// Like [`select_spread`](Self::select_spread) but reports why a chain
    /// was rejected.
    pub fn evaluate(
        &self,
        chain: &ExpirationChain,
        underlying_price: Decimal,
        time_to_expiration: f64,
    ) -> Result<SpreadCandidate, Rejection> {
        let spot = underlying_price
            .to_f64()
            .ok_or(Rejection::Arithmetic("underlying price not representable"))?;

        let usable = self.usable_puts(chain, spot, time_to_expiration);

        let short = self.select_short_leg(&usable, underlying_price)?;
        let width = self.config.width.target_width(underlying_price);
        let long = self.select_long_leg(&usable, short.quote.strike, width)?;

        let short_premium = self
            .config
            .premium
            .short_premium(short.quote)
            .ok_or(Rejection::Arithmetic("short premium overflow"))?;
        let long_premium = self
            .config
            .premium
            .long_premium(long)
            .ok_or(Rejection::Arithmetic("long premium overflow"))?;
        let net_credit = short_premium
            .checked_sub(long_premium)
            .ok_or(Rejection::Arithmetic("net credit overflow"))?;
        if net_credit < self.config.min_credit {
            return Err(Rejection::CreditBelowFloor {
                credit: net_credit,
                floor: self.config.min_credit,
            });
        }

        let actual_width = short
            .quote
            .strike
            .checked_sub(long.strike)
            .ok_or(Rejection::Arithmetic("spread width overflow"))?;
        let max_risk = actual_width
            .checked_sub(net_credit)
            .ok_or(Rejection::Arithmetic("max risk overflow"))?;
        if max_risk <= Decimal::ZERO {
            return Err(Rejection::NonPositiveRisk { max_risk });
        }

        let credit_f64 = net_credit
            .to_f64()
            .ok_or(Rejection::Arithmetic("net credit not representable"))?;
        let risk_f64 = max_risk
            .to_f64()
            .ok_or(Rejection::Arithmetic("max risk not representable"))?;

        let loss_probability = short.abs_delta;
        let win_probability = 1.0 - loss_probability;
        let expected_value = win_probability * credit_f64 - loss_probability * risk_f64;
        let roi = credit_f64 / risk_f64;

        if !expected_value.is_finite() || !roi.is_finite() {
            return Err(Rejection::Arithmetic("non-finite score"));
        }

        if let Some(floor) = self.config.min_roi {
            if roi < floor {
                return Err(Rejection::RoiBelowFloor { roi, floor });
            }
        }

        if expected_value <= self.config.min_expected_value {
            return Err(Rejection::ExpectedValueBelowMinimum {
                ev: expected_value,
                min: self.config.min_expected_value,
            });
        }

        Ok(SpreadCandidate {
            ticker: chain.ticker.clone(),
            underlying_price,
            expiration_date: chain.expiration,
            short_strike: short.quote.strike,
            long_strike: long.strike,
            width: actual_width,
            short_delta: short.abs_delta,
            short_premium,
            long_premium,
            net_credit,
            max_risk,
            win_probability,
            roi,
            expected_value,
        })
    }

    /// Screen every chain of an offline snapshot inside `window`, in
    /// parallel, and return the accepted candidates ranked by EV.
    pub fn screen_snapshot(
        &self,
        snapshot: &OptionsSnapshot,
        window: &ExpirationWindow,
        today: NaiveDate,
    ) -> Vec<SpreadCandidate> {
        let selected = window.select(&snapshot.expirations(), today);

        let mut candidates: Vec<SpreadCandidate> = snapshot
            .chains
            .par_iter()
            .filter(|chain| selected.contains(&chain.expiration))
            .filter_map(|chain| {
                let time = years_to_expiration(chain.days_to_expiration(today));
                self.select_spread(chain, snapshot.underlying_price, time)
            })
            .collect();

        rank_candidates(&mut candidates);
        candidates
    }

    /// Puts with a usable delta signal. Quotes without one are dropped,
    /// never scored as zero.
    fn usable_puts<'a>(
        &self,
        chain: &'a ExpirationChain,
        spot: f64,
        time: f64,
    ) -> Vec<UsablePut<'a>> {
        chain
            .puts
            .iter()
            .filter(|q| q.is_put())
            .filter_map(|quote| {
                let delta = match self.config.delta_source {
                    DeltaSource::Quoted => quote.delta?,
                    DeltaSource::Computed => {
                        if quote.implied_volatility <= 0.0 {
                            return None;
                        }
                        let strike = quote.strike.to_f64()?;
                        let d = self.pricing.delta(
                            spot,
                            strike,
                            time,
                            quote.implied_volatility,
                            OptionType::Put,
                        );
                        if d == 0.0 {
                            return None;
                        }
                        d
                    }
                };

                if !delta.is_finite() || delta.abs() > 1.0 {
                    return None;
                }

                Some(UsablePut {
                    quote,
                    abs_delta: delta.abs(),
                })
            })
            .collect()
    }

    /// Short leg: |delta| closest to the target, lowest strike on ties.
    fn select_short_leg<'a>(
        &self,
        usable: &[UsablePut<'a>],
        underlying_price: Decimal,
    ) -> Result<UsablePut<'a>, Rejection> {
        let target = self.config.target_delta;

        usable
            .iter()
            .filter(|p| !self.config.otm_only || p.quote.strike < underlying_price)
            .filter(|p| match self.config.short_delta_range {
                Some((min, max)) => p.abs_delta >= min && p.abs_delta <= max,
                None => true,
            })
            .min_by(|a, b| {
                let da = (a.abs_delta - target).abs();
                let db = (b.abs_delta - target).abs();
                da.total_cmp(&db)
                    .then_with(|| a.quote.strike.cmp(&b.quote.strike))
            })
            .copied()
            .ok_or(Rejection::NoShortLeg)
    }

    /// Long leg: strike closest to `short - width` among lower strikes,
    /// lowest strike on ties.
    fn select_long_leg<'a>(
        &self,
        usable: &[UsablePut<'a>],
        short_strike: Decimal,
        width: Decimal,
    ) -> Result<&'a OptionQuote, Rejection> {
        let target = short_strike
            .checked_sub(width)
            .ok_or(Rejection::Arithmetic("long strike target overflow"))?;
        let distance = |strike: Decimal| strike.checked_sub(target).map(|d| d.abs());

        let (long, deviation) = usable
            .iter()
            .map(|p| p.quote)
            .filter(|q| q.strike < short_strike)
            .filter_map(|q| distance(q.strike).map(|d| (q, d)))
            .min_by(|(a, da), (b, db)| da.cmp(db).then_with(|| a.strike.cmp(&b.strike)))
            .ok_or(Rejection::NoLongLeg { short_strike })?;

        let max_deviation = self
            .config
            .width_tolerance
            .checked_mul(width)
            .ok_or(Rejection::Arithmetic("width tolerance overflow"))?;
        if deviation > max_deviation {
            return Err(Rejection::StrikeMismatch {
                target,
                found: long.strike,
            });
        }

        Ok(long)
    }
}
