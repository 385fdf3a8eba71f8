//! Rolling window period resolution
//!
//! CMS publishes monthly files with a delay, so the most recent period we ask
//! for is shifted back by a publication lag. No I/O happens here.

use super::Period;
use chrono::{DateTime, NaiveDate, Utc};

/// Default rolling window length in months
pub const DEFAULT_WINDOW_MONTHS: usize = 24;

/// Default publication lag in months
pub const DEFAULT_PUBLICATION_LAG: u32 = 2;

/// Resolves the eligible periods for a rolling window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodResolver {
    pub window_months: usize,
    pub lag_months: u32,
}

impl Default for PeriodResolver {
    fn default() -> Self {
        Self {
            window_months: DEFAULT_WINDOW_MONTHS,
            lag_months: DEFAULT_PUBLICATION_LAG,
        }
    }
}

impl PeriodResolver {
    pub fn new(window_months: usize, lag_months: u32) -> Self {
        Self {
            window_months,
            lag_months,
        }
    }

    /// Periods for the window ending at `now`, most recent first
    pub fn resolve(&self, now: DateTime<Utc>) -> Vec<Period> {
        rolling_periods(now.date_naive(), self.window_months, self.lag_months)
    }
}

/// `window` consecutive periods, most recent first, the first being
/// `lag` months before the month of `today`
pub fn rolling_periods(today: NaiveDate, window: usize, lag: u32) -> Vec<Period> {
    let base = Period::from_date(today).minus_months(lag);
    (0..window as u32).map(|i| base.minus_months(i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_lag_applied_to_first_period() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let periods = rolling_periods(today, 3, 2);

        assert_eq!(
            periods,
            vec![
                Period::new(2024, 1).unwrap(),
                Period::new(2023, 12).unwrap(),
                Period::new(2023, 11).unwrap(),
            ]
        );
    }

    #[test]
    fn test_periods_distinct_consecutive_descending() {
        let starts = [
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        ];

        for today in starts {
            for window in [1usize, 12, 18, 24, 37] {
                for lag in [0u32, 2, 14] {
                    let periods = rolling_periods(today, window, lag);
                    assert_eq!(periods.len(), window);
                    assert_eq!(periods[0], Period::from_date(today).minus_months(lag));
                    for pair in periods.windows(2) {
                        assert_eq!(pair[0].months_since(&pair[1]), 1);
                    }
                }
            }
        }
    }

    #[test]
    fn test_resolver_uses_utc_date() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 23, 59, 0).unwrap();
        let periods = PeriodResolver::default().resolve(now);

        assert_eq!(periods.len(), DEFAULT_WINDOW_MONTHS);
        assert_eq!(periods[0], Period::new(2026, 8).unwrap());
        assert_eq!(periods[23], Period::new(2024, 9).unwrap());
    }

    #[test]
    fn test_zero_window_is_empty() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(rolling_periods(today, 0, 2).is_empty());
    }
}
