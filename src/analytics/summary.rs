//! KPI summary over the filtered window
//!
//! Recomputed on every request from the dataset; nothing here is cached.

use super::filters::FilterSet;
use crate::period::Period;
use crate::window::{LoadReport, WindowDataset, WindowRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Change from a previous value to a current one
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Change {
    pub previous: u64,
    pub current: u64,
    pub absolute: i64,
    /// Percent of `previous`
    pub pct: f64,
}

impl Change {
    /// `None` when there is nothing to compare against
    pub fn between(current: u64, previous: u64) -> Option<Self> {
        if previous == 0 {
            return None;
        }
        let absolute = current as i64 - previous as i64;
        Some(Self {
            previous,
            current,
            absolute,
            pct: absolute as f64 / previous as f64 * 100.0,
        })
    }
}

/// Enrollment summed per period, ascending
pub fn period_totals(dataset: &WindowDataset) -> BTreeMap<Period, u64> {
    let mut totals = BTreeMap::new();
    for record in &dataset.records {
        *totals.entry(record.period).or_insert(0) += record.enrolled();
    }
    totals
}

/// Compare `period` against `baseline`; N/A unless both are present
pub fn change_vs(totals: &BTreeMap<Period, u64>, period: Period, baseline: Period) -> Option<Change> {
    let current = *totals.get(&period)?;
    let previous = *totals.get(&baseline)?;
    Change::between(current, previous)
}

fn distinct<'a, F>(rows: &[&'a WindowRecord], field: F) -> usize
where
    F: Fn(&'a WindowRecord) -> &'a str,
{
    rows.iter().map(|r| field(*r)).collect::<HashSet<_>>().len()
}

/// Headline figures for the latest period of the filtered window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSummary {
    pub latest_period: Option<Period>,
    pub latest_total: u64,
    pub mom: Option<Change>,
    pub yoy: Option<Change>,
    /// Earliest to latest period in the filtered window
    pub window_growth: Option<Change>,
    pub parent_orgs: usize,
    pub contracts: usize,
    pub states: usize,
    pub rows: usize,
    pub periods_in_view: usize,
    pub periods_loaded: usize,
    pub periods_requested: usize,
    pub missing_periods: Vec<Period>,
    pub status: String,
    pub data_quality_warnings: Vec<String>,
}

impl AggregateSummary {
    /// Apply `filters`, then summarize
    pub fn compute(dataset: &WindowDataset, filters: &FilterSet, report: &LoadReport) -> Self {
        let filtered = filters.apply(dataset);
        Self::from_filtered(&filtered, report)
    }

    /// Summarize a dataset that has already been filtered
    pub fn from_filtered(filtered: &WindowDataset, report: &LoadReport) -> Self {
        let totals = period_totals(filtered);
        let latest_period = filtered.latest_period();

        let (latest_total, mom, yoy, window_growth) = match latest_period {
            Some(latest) => {
                let growth = filtered
                    .earliest_period()
                    .filter(|earliest| *earliest != latest)
                    .and_then(|earliest| change_vs(&totals, latest, earliest));
                (
                    totals.get(&latest).copied().unwrap_or(0),
                    change_vs(&totals, latest, latest.previous()),
                    change_vs(&totals, latest, latest.year_ago()),
                    growth,
                )
            }
            None => (0, None, None, None),
        };

        let latest_rows: Vec<&WindowRecord> = match latest_period {
            Some(latest) => filtered.records_for(latest).collect(),
            None => Vec::new(),
        };

        Self {
            latest_period,
            latest_total,
            mom,
            yoy,
            window_growth,
            parent_orgs: distinct(&latest_rows, |r| r.parent_org.as_str()),
            contracts: distinct(&latest_rows, |r| r.contract_id.as_str()),
            states: distinct(&latest_rows, |r| r.state.as_str()),
            rows: filtered.len(),
            periods_in_view: filtered.periods.len(),
            periods_loaded: report.loaded_count(),
            periods_requested: report.requested,
            missing_periods: report.missing_periods(),
            status: report.status_line(),
            data_quality_warnings: report.quality.warnings(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.latest_period.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::LoadSource;
    use approx::assert_relative_eq;

    fn row(parent: &str, state: &str, year: i32, month: u32, enrollment: Option<u64>) -> WindowRecord {
        WindowRecord {
            contract_id: format!("C-{}", parent),
            plan_id: "001".into(),
            org_name: parent.into(),
            parent_org: parent.into(),
            state: state.into(),
            county: "County".into(),
            plan_type: "HMO".into(),
            enrollment,
            period: Period::new(year, month).unwrap(),
        }
    }

    fn report(periods: &[Period]) -> LoadReport {
        LoadReport {
            requested: 13,
            loaded: periods.iter().map(|p| (*p, LoadSource::Remote)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_change_between() {
        let c = Change::between(120, 100).unwrap();
        assert_eq!(c.absolute, 20);
        assert_relative_eq!(c.pct, 20.0);
        assert!(Change::between(5, 0).is_none());
    }

    #[test]
    fn test_mom_and_yoy() {
        let dataset = WindowDataset::from_records(vec![
            row("A", "CA", 2023, 12, Some(200)),
            row("A", "CA", 2024, 11, Some(100)),
            row("A", "CA", 2024, 12, Some(110)),
            row("B", "TX", 2024, 12, Some(40)),
        ]);
        let summary = AggregateSummary::compute(&dataset, &FilterSet::new(), &report(&dataset.periods));

        assert_eq!(summary.latest_period, Some(Period::new(2024, 12).unwrap()));
        assert_eq!(summary.latest_total, 150);
        let mom = summary.mom.unwrap();
        assert_eq!(mom.absolute, 50);
        assert_relative_eq!(mom.pct, 50.0);
        let yoy = summary.yoy.unwrap();
        assert_relative_eq!(yoy.pct, -25.0);
        assert_eq!(summary.parent_orgs, 2);
        assert_eq!(summary.states, 2);
        assert_eq!(summary.status, "3 of 13 months loaded");
    }

    #[test]
    fn test_missing_comparison_periods_are_na() {
        // No prior-year data
        let dataset = WindowDataset::from_records(vec![
            row("A", "CA", 2024, 10, Some(100)),
            row("A", "CA", 2024, 11, Some(110)),
        ]);
        let summary = AggregateSummary::compute(&dataset, &FilterSet::new(), &report(&dataset.periods));

        assert!(summary.mom.is_some());
        assert!(summary.yoy.is_none());

        let dataset = WindowDataset::from_records(vec![
            row("A", "CA", 2024, 9, Some(100)),
            row("A", "CA", 2024, 11, Some(110)),
        ]);
        let filters = FilterSet::new().period_range(Period::new(2024, 11).unwrap(), Period::new(2024, 11).unwrap());
        let summary = AggregateSummary::compute(&dataset, &filters, &report(&dataset.periods));
        assert!(summary.mom.is_none());
        assert!(summary.window_growth.is_none());
    }

    #[test]
    fn test_mom_na_when_previous_month_absent() {
        let dataset = WindowDataset::from_records(vec![
            row("A", "CA", 2024, 9, Some(100)),
            row("A", "CA", 2024, 11, Some(110)),
        ]);
        let totals = period_totals(&dataset);
        let nov = Period::new(2024, 11).unwrap();
        assert!(change_vs(&totals, nov, nov.previous()).is_none());
        // Window growth still compares oldest to latest
        let summary = AggregateSummary::from_filtered(&dataset, &report(&dataset.periods));
        assert_relative_eq!(summary.window_growth.unwrap().pct, 10.0);
    }

    #[test]
    fn test_filters_applied_before_aggregation() {
        let dataset = WindowDataset::from_records(vec![
            row("A", "CA", 2024, 11, Some(100)),
            row("A", "CA", 2024, 12, Some(110)),
            row("B", "TX", 2024, 11, Some(1000)),
            row("B", "TX", 2024, 12, Some(500)),
        ]);
        let summary = AggregateSummary::compute(&dataset, &FilterSet::new().states(["CA"]), &report(&dataset.periods));

        assert_eq!(summary.latest_total, 110);
        assert_relative_eq!(summary.mom.unwrap().pct, 10.0);
        assert_eq!(summary.parent_orgs, 1);
    }

    #[test]
    fn test_absent_enrollment_counts_as_zero() {
        let dataset = WindowDataset::from_records(vec![
            row("A", "CA", 2024, 12, Some(100)),
            row("B", "CA", 2024, 12, None),
        ]);
        let summary = AggregateSummary::from_filtered(&dataset, &report(&dataset.periods));
        assert_eq!(summary.latest_total, 100);
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.parent_orgs, 2);
    }

    #[test]
    fn test_empty_dataset() {
        let summary = AggregateSummary::from_filtered(&WindowDataset::default(), &LoadReport::default());
        assert!(summary.is_empty());
        assert_eq!(summary.latest_total, 0);
        assert!(summary.mom.is_none());
    }
}
