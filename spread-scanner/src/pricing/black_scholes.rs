//! Black-Scholes delta approximation.
//!
//! Only delta is needed to pick short legs. Degenerate inputs (expired
//! contract, zero or negative volatility, non-positive spot or strike) and
//! any non-finite intermediate produce a delta of exactly `0.0`, which
//! callers treat as "unusable" rather than as a low-sensitivity reading.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::data::OptionType;

/// Calendar days per year used to annualize days-to-expiration.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Black-Scholes calculator carrying the risk-free rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackScholes {
    /// Annual risk-free interest rate
    pub rate: f64,
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self { rate: 0.045 }
    }
}

impl BlackScholes {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    /// Calculate d1 parameter.
    fn d1(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let numerator = (spot / strike).ln() + (self.rate + 0.5 * vol * vol) * time;
        numerator / (vol * time.sqrt())
    }

    /// Standard normal CDF.
    fn norm_cdf(x: f64) -> f64 {
        Normal::standard().cdf(x)
    }

    /// Calculate delta, or `0.0` when the inputs give no usable signal.
    pub fn delta(&self, spot: f64, strike: f64, time: f64, vol: f64, opt_type: OptionType) -> f64 {
        // NaN inputs fail these comparisons too
        if !(time > 0.0 && vol > 0.0 && spot > 0.0 && strike > 0.0) {
            return 0.0;
        }

        let d1 = self.d1(spot, strike, time, vol);
        if !d1.is_finite() {
            return 0.0;
        }

        let delta = match opt_type {
            OptionType::Call => Self::norm_cdf(d1),
            OptionType::Put => Self::norm_cdf(d1) - 1.0,
        };

        if delta.is_finite() {
            delta
        } else {
            0.0
        }
    }
}

/// Approximate delta of a European option.
///
/// `spot` and `strike` in currency units, `time` in years, `rate` and `vol`
/// annualized decimals. Returns `0.0` for degenerate inputs.
pub fn delta(spot: f64, strike: f64, time: f64, rate: f64, vol: f64, opt_type: OptionType) -> f64 {
    BlackScholes::new(rate).delta(spot, strike, time, vol, opt_type)
}

/// Convert days to expiration into years.
pub fn years_to_expiration(dte: i64) -> f64 {
    dte as f64 / DAYS_PER_YEAR
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_degenerate_inputs_return_zero() {
        for time in [0.0, -0.5] {
            assert_eq!(delta(100.0, 95.0, time, 0.045, 0.3, OptionType::Put), 0.0);
            assert_eq!(delta(100.0, 95.0, time, 0.045, 0.3, OptionType::Call), 0.0);
        }
        for vol in [0.0, -0.2] {
            assert_eq!(delta(100.0, 95.0, 0.1, 0.045, vol, OptionType::Put), 0.0);
        }
    }

    #[test]
    fn test_numerical_failure_returns_zero() {
        // ln of a non-positive ratio
        assert_eq!(delta(100.0, 0.0, 0.1, 0.045, 0.3, OptionType::Put), 0.0);
        assert_eq!(delta(-5.0, 95.0, 0.1, 0.045, 0.3, OptionType::Put), 0.0);
        assert_eq!(delta(f64::NAN, 95.0, 0.1, 0.045, 0.3, OptionType::Put), 0.0);
        assert_eq!(delta(100.0, 95.0, f64::INFINITY, 0.045, f64::INFINITY, OptionType::Put), 0.0);
    }

    #[test]
    fn test_delta_bounds() {
        let bs = BlackScholes::default();
        let call_delta = bs.delta(100.0, 100.0, 0.5, 0.25, OptionType::Call);
        let put_delta = bs.delta(100.0, 100.0, 0.5, 0.25, OptionType::Put);

        assert!(call_delta > 0.0 && call_delta < 1.0);
        assert!(put_delta > -1.0 && put_delta < 0.0);
        // No dividend term: call - put = 1
        assert_relative_eq!(call_delta - put_delta, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_known_value() {
        // S=100, K=100, T=1, r=5%, vol=20%: d1 = 0.35, N(d1) = 0.63683
        let call = delta(100.0, 100.0, 1.0, 0.05, 0.20, OptionType::Call);
        assert_relative_eq!(call, 0.636_830_6, epsilon = 1e-6);
        let put = delta(100.0, 100.0, 1.0, 0.05, 0.20, OptionType::Put);
        assert_relative_eq!(put, 0.636_830_6 - 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_put_delta_magnitude_grows_with_strike() {
        let bs = BlackScholes::new(0.045);
        let mut previous = 0.0_f64;
        for strike in [60.0, 70.0, 80.0, 90.0, 100.0, 110.0] {
            let d = bs.delta(100.0, strike, 30.0 / 365.0, 0.35, OptionType::Put);
            assert!(d <= 0.0);
            assert!(d.abs() >= previous, "strike {strike}: {d}");
            previous = d.abs();
        }
        // At the money magnitude is near one half
        let atm = bs.delta(100.0, 100.0, 30.0 / 365.0, 0.35, OptionType::Put);
        assert!(atm.abs() > 0.4 && atm.abs() < 0.55);
    }

    #[test]
    fn test_years_to_expiration() {
        assert_relative_eq!(years_to_expiration(365), 1.0);
        assert_relative_eq!(years_to_expiration(73), 0.2);
        assert_eq!(years_to_expiration(0), 0.0);
    }
}
