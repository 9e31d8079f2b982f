//! Expiration horizon filtering.
//!
//! Two horizons are supported: the first N listed expirations, or every
//! expiration whose days-to-expiration falls inside an inclusive range.
//! Expirations on or before `today` are always dropped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which expirations of a ticker get scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpirationWindow {
    /// The first `count` future expirations in calendar order.
    FirstN { count: usize },
    /// Expirations with `min_dte <= dte <= max_dte`.
    DteRange { min_dte: i64, max_dte: i64 },
}

impl Default for ExpirationWindow {
    fn default() -> Self {
        // Eight weekly expirations
        Self::FirstN { count: 8 }
    }
}

impl ExpirationWindow {
    /// Filter `expirations` down to the ones inside the window, ascending.
    pub fn select(&self, expirations: &[NaiveDate], today: NaiveDate) -> Vec<NaiveDate> {
        let mut future: Vec<NaiveDate> = expirations
            .iter()
            .copied()
            .filter(|exp| *exp > today)
            .collect();
        future.sort();
        future.dedup();

        match *self {
            Self::FirstN { count } => {
                future.truncate(count);
                future
            }
            Self::DteRange { min_dte, max_dte } => future
                .into_iter()
                .filter(|exp| {
                    let dte = (*exp - today).num_days();
                    dte >= min_dte && dte <= max_dte
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_n_skips_past_and_today() {
        let today = date(2026, 10, 19);
        let exps = vec![
            date(2026, 10, 16),
            date(2026, 10, 19),
            date(2026, 10, 23),
            date(2026, 10, 30),
            date(2026, 11, 6),
        ];
        let window = ExpirationWindow::FirstN { count: 2 };
        assert_eq!(
            window.select(&exps, today),
            vec![date(2026, 10, 23), date(2026, 10, 30)]
        );
    }

    #[test]
    fn test_first_n_sorts_unordered_input() {
        let today = date(2026, 10, 19);
        let exps = vec![date(2026, 11, 6), date(2026, 10, 23), date(2026, 10, 23)];
        let window = ExpirationWindow::FirstN { count: 8 };
        assert_eq!(
            window.select(&exps, today),
            vec![date(2026, 10, 23), date(2026, 11, 6)]
        );
    }

    #[test]
    fn test_dte_range_is_inclusive() {
        let today = date(2026, 10, 19);
        let exps = vec![
            date(2026, 11, 8),  // 20 days
            date(2026, 11, 9),  // 21 days
            date(2026, 12, 8),  // 50 days
            date(2026, 12, 9),  // 51 days
        ];
        let window = ExpirationWindow::DteRange { min_dte: 21, max_dte: 50 };
        assert_eq!(
            window.select(&exps, today),
            vec![date(2026, 11, 9), date(2026, 12, 8)]
        );
    }

    #[test]
    fn test_first_n_excludes_later_listed_dates() {
        let today = date(2026, 10, 19);
        let window = ExpirationWindow::FirstN { count: 1 };
        let selected = window.select(&[date(2026, 10, 30), date(2026, 10, 23)], today);
        assert_eq!(selected, vec![date(2026, 10, 23)]);
        assert!(!selected.contains(&date(2026, 10, 30)));
    }

    #[test]
    fn test_empty_input() {
        let window = ExpirationWindow::default();
        assert!(window.select(&[], date(2026, 10, 19)).is_empty());
    }
}
