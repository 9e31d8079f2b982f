//! Options analytics module.
//!
//! Provides:
//! - Put credit spread selection and scoring
//! - Expiration horizon filtering
//! - Candidate ranking

pub mod expiration_window;
pub mod ranking;
pub mod spread_screener;

pub use expiration_window::ExpirationWindow;
pub use ranking::{best_by_expiration, rank_candidates, top_candidates};
pub use spread_screener::{
    DeltaSource, PremiumPolicy, Rejection, SpreadCandidate, SpreadScreener, SpreadScreenerConfig,
    WidthPolicy, WidthTier,
};
