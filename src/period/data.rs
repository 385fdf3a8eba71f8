//! Calendar month used as cache key and dataset join key

use crate::error::{PipelineError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lower-case month names, indexed by `month - 1`
pub const MONTH_NAMES: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

/// A (month, year) pair, ordered by calendar time
///
/// Fields are public so callers can build arbitrary values; anything that
/// turns a period into an external identifier validates it first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Period {
    // Field order matters: derived Ord compares year first
    pub year: i32,
    pub month: u32,
}

impl Period {
    /// Create a validated period
    pub fn new(year: i32, month: u32) -> Result<Self> {
        let period = Self { year, month };
        period.validate()?;
        Ok(period)
    }

    /// Period containing the given date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Month in 1..=12 and a four-digit year
    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month) && (1000..=9999).contains(&self.year)
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(PipelineError::InvalidPeriod {
                year: self.year,
                month: self.month,
            })
        }
    }

    /// Months since year 0, used for calendar arithmetic
    fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: (ordinal.rem_euclid(12) + 1) as u32,
        }
    }

    pub fn minus_months(&self, months: u32) -> Self {
        Self::from_ordinal(self.ordinal() - i64::from(months))
    }

    pub fn plus_months(&self, months: u32) -> Self {
        Self::from_ordinal(self.ordinal() + i64::from(months))
    }

    pub fn previous(&self) -> Self {
        self.minus_months(1)
    }

    /// Same month one year earlier
    pub fn year_ago(&self) -> Self {
        self.minus_months(12)
    }

    /// Signed number of months from `earlier` to `self`
    pub fn months_since(&self, earlier: &Period) -> i64 {
        self.ordinal() - earlier.ordinal()
    }

    /// Lower-case full month name, e.g. "january"
    pub fn month_name(&self) -> Option<&'static str> {
        MONTH_NAMES.get((self.month as usize).checked_sub(1)?).copied()
    }

    /// Display label such as "Jan 2024"
    pub fn label(&self) -> String {
        match self.month_name() {
            Some(name) => {
                let mut short: String = name.chars().take(3).collect();
                if let Some(first) = short.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                format!("{} {}", short, self.year)
            }
            None => self.to_string(),
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = PipelineError;

    /// Parse `YYYY-MM`
    fn from_str(s: &str) -> Result<Self> {
        let bad = || PipelineError::Config(format!("expected YYYY-MM period, got {:?}", s));
        let (year, month) = s.trim().split_once('-').ok_or_else(bad)?;
        let year: i32 = year.parse().map_err(|_| bad())?;
        let month: u32 = month.parse().map_err(|_| bad())?;
        Period::new(year, month)
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

impl TryFrom<String> for Period {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_calendar_order() {
        let dec_2023 = Period::new(2023, 12).unwrap();
        let jan_2024 = Period::new(2024, 1).unwrap();
        let feb_2024 = Period::new(2024, 2).unwrap();

        assert!(dec_2023 < jan_2024);
        assert!(jan_2024 < feb_2024);
    }

    #[test]
    fn test_month_arithmetic_crosses_years() {
        let jan_2024 = Period::new(2024, 1).unwrap();

        assert_eq!(jan_2024.previous(), Period::new(2023, 12).unwrap());
        assert_eq!(jan_2024.minus_months(13), Period::new(2022, 12).unwrap());
        assert_eq!(jan_2024.plus_months(12), Period::new(2025, 1).unwrap());
        assert_eq!(jan_2024.year_ago(), Period::new(2023, 1).unwrap());
        assert_eq!(jan_2024.months_since(&Period::new(2023, 1).unwrap()), 12);
    }

    #[test]
    fn test_invalid_periods_rejected() {
        assert!(Period::new(2024, 0).is_err());
        assert!(Period::new(2024, 13).is_err());
        assert!(Period::new(999, 5).is_err());
        assert!(Period::new(10000, 5).is_err());
    }

    #[test]
    fn test_labels_and_names() {
        let p = Period::new(2024, 9).unwrap();
        assert_eq!(p.month_name(), Some("september"));
        assert_eq!(p.label(), "Sep 2024");
        assert_eq!(p.to_string(), "2024-09");
        assert_eq!("2024-09".parse::<Period>().unwrap(), p);
        assert!("2024/09".parse::<Period>().is_err());
    }

    #[test]
    fn test_serde_uses_year_month_string() {
        let p = Period::new(2025, 3).unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"2025-03\"");
        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
