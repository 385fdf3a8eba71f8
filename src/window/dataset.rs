//! Merged window dataset and the load report that accompanies it

use crate::error::PipelineError;
use crate::period::Period;
use crate::schema::DataQuality;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Enrollment row joined with its parent organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRecord {
    #[serde(rename = "Contract_ID")]
    pub contract_id: String,
    #[serde(rename = "Plan_ID")]
    pub plan_id: String,
    #[serde(rename = "Org_Name")]
    pub org_name: String,
    #[serde(rename = "Parent_Org")]
    pub parent_org: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "County")]
    pub county: String,
    #[serde(rename = "Plan_Type")]
    pub plan_type: String,
    #[serde(rename = "Enrollment")]
    pub enrollment: Option<u64>,
    #[serde(rename = "Period")]
    pub period: Period,
}

impl WindowRecord {
    pub fn enrolled(&self) -> u64 {
        self.enrollment.unwrap_or(0)
    }
}

/// Ordered rows spanning at most the configured number of months
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowDataset {
    /// Sorted by period ascending, source order within a period
    pub records: Vec<WindowRecord>,
    /// Distinct periods present, ascending
    pub periods: Vec<Period>,
}

impl WindowDataset {
    /// Build from rows, sorting by period and deriving the period list
    pub fn from_records(mut records: Vec<WindowRecord>) -> Self {
        records.sort_by_key(|r| r.period);
        let periods: BTreeSet<Period> = records.iter().map(|r| r.period).collect();
        Self {
            records,
            periods: periods.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest_period(&self) -> Option<Period> {
        self.periods.last().copied()
    }

    pub fn earliest_period(&self) -> Option<Period> {
        self.periods.first().copied()
    }

    pub fn contains_period(&self, period: Period) -> bool {
        self.periods.binary_search(&period).is_ok()
    }

    pub fn records_for(&self, period: Period) -> impl Iterator<Item = &WindowRecord> {
        self.records.iter().filter(move |r| r.period == period)
    }
}

/// Where a loaded period's data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
    Cache,
    /// Pre-fetched file under the local data directory
    Local,
    Remote,
    Demo,
}

/// A period that could not be loaded, with the reason
#[derive(Debug)]
pub struct PeriodFailure {
    pub period: Period,
    pub error: PipelineError,
}

/// Outcome of assembling a window, surfaced to the KPI layer
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Number of periods requested for the window
    pub requested: usize,
    /// Successfully loaded periods kept in the window, ascending
    pub loaded: Vec<(Period, LoadSource)>,
    pub failures: Vec<PeriodFailure>,
    /// Loaded periods dropped because they fell outside the window
    pub trimmed: Vec<Period>,
    pub quality: DataQuality,
    /// Whether a plan directory snapshot was available for the merge
    pub directory_loaded: bool,
}

impl LoadReport {
    /// Periods backed by CMS data; synthetic demo periods are not counted
    pub fn loaded_count(&self) -> usize {
        self.loaded.iter().filter(|(_, s)| *s != LoadSource::Demo).count()
    }

    pub fn is_demo(&self) -> bool {
        self.count_from(LoadSource::Demo) > 0
    }

    pub fn count_from(&self, source: LoadSource) -> usize {
        self.loaded.iter().filter(|(_, s)| *s == source).count()
    }

    pub fn not_yet_published(&self) -> usize {
        self.failures.iter().filter(|f| f.error.is_expected_gap()).count()
    }

    /// Failures that indicate an outage or bad data rather than a publication gap
    pub fn unexpected_failures(&self) -> usize {
        self.failures.len() - self.not_yet_published()
    }

    pub fn missing_periods(&self) -> Vec<Period> {
        let mut missing: Vec<Period> = self.failures.iter().map(|f| f.period).collect();
        missing.sort();
        missing
    }

    /// e.g. "22 of 24 months loaded", or "0 of 24 months loaded (demo data)"
    pub fn status_line(&self) -> String {
        let line = format!("{} of {} months loaded", self.loaded_count(), self.requested);
        if self.is_demo() {
            format!("{} (demo data)", line)
        } else {
            line
        }
    }

    /// Breakdown of where loaded periods came from, e.g. "local files (3) + live download (9)"
    pub fn sources_line(&self) -> String {
        let parts: Vec<String> = [
            (LoadSource::Local, "local files"),
            (LoadSource::Remote, "live download"),
            (LoadSource::Cache, "cache"),
        ]
        .iter()
        .filter_map(|(source, label)| match self.count_from(*source) {
            0 => None,
            n => Some(format!("{} ({})", label, n)),
        })
        .collect();

        if parts.is_empty() {
            "no CMS data".to_string()
        } else {
            parts.join(" + ")
        }
    }
}
