//! Deterministic CMS download locations

use super::Period;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

const CMS_ZIP_BASE: &str = "https://www.cms.gov/files/zip";

/// The two source file families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFamily {
    /// Monthly contract/plan/state/county (CPSC) enrollment snapshot
    Enrollment,
    /// MA plan directory (contract to parent organization)
    Directory,
}

impl FileFamily {
    fn file_stem(&self) -> &'static str {
        match self {
            FileFamily::Enrollment => "monthly-enrollment-cpsc",
            FileFamily::Directory => "plan-directory",
        }
    }

    /// Substring preferred when choosing a member inside the archive
    pub fn member_hint(&self) -> &'static str {
        match self {
            FileFamily::Enrollment => "cpsc",
            FileFamily::Directory => "directory",
        }
    }
}

impl fmt::Display for FileFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFamily::Enrollment => write!(f, "enrollment"),
            FileFamily::Directory => write!(f, "directory"),
        }
    }
}

/// Build the download URL for a period and family
///
/// Fails with `InvalidPeriod` when the month or year is out of range.
pub fn resource_url(period: Period, family: FileFamily) -> Result<String> {
    period.validate()?;
    let month = period.month_name().unwrap_or_default();
    Ok(format!(
        "{}/{}-{}-{:04}.zip",
        CMS_ZIP_BASE,
        family.file_stem(),
        month,
        period.year
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_enrollment_url() {
        let url = resource_url(Period::new(2024, 1).unwrap(), FileFamily::Enrollment).unwrap();
        assert_eq!(
            url,
            "https://www.cms.gov/files/zip/monthly-enrollment-cpsc-january-2024.zip"
        );
    }

    #[test]
    fn test_directory_url() {
        let url = resource_url(Period::new(2025, 11).unwrap(), FileFamily::Directory).unwrap();
        assert_eq!(url, "https://www.cms.gov/files/zip/plan-directory-november-2025.zip");
    }

    #[test]
    fn test_invalid_period_rejected() {
        let bad = Period { year: 2024, month: 13 };
        assert!(matches!(
            resource_url(bad, FileFamily::Enrollment),
            Err(crate::PipelineError::InvalidPeriod { year: 2024, month: 13 })
        ));

        let bad_year = Period { year: 24, month: 1 };
        assert!(resource_url(bad_year, FileFamily::Directory).is_err());
    }

    #[test]
    fn test_urls_are_injective() {
        let mut seen = HashSet::new();
        for year in 2019..=2026 {
            for month in 1..=12 {
                let period = Period::new(year, month).unwrap();
                for family in [FileFamily::Enrollment, FileFamily::Directory] {
                    let url = resource_url(period, family).unwrap();
                    assert!(seen.insert(url), "duplicate url for {} {}", period, family);
                }
            }
        }
        assert_eq!(seen.len(), 8 * 12 * 2);
    }
}
