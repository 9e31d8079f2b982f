//! Option pricing model.
//!
//! Provides the Black-Scholes delta approximation used to rank short-leg
//! candidates when a provider does not supply greeks.

pub mod black_scholes;

pub use black_scholes::{delta, years_to_expiration, BlackScholes, DAYS_PER_YEAR};
