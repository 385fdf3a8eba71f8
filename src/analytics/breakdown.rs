//! Grouped series consumed by the presentation layer

use super::summary::Change;
use crate::error::PipelineError;
use crate::period::Period;
use crate::window::{WindowDataset, WindowRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Dimension used to split trend and change series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GroupBy {
    ParentOrg,
    PlanType,
    State,
}

impl GroupBy {
    pub fn key<'a>(&self, record: &'a WindowRecord) -> &'a str {
        match self {
            GroupBy::ParentOrg => &record.parent_org,
            GroupBy::PlanType => &record.plan_type,
            GroupBy::State => &record.state,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GroupBy::ParentOrg => "Parent Organization",
            GroupBy::PlanType => "Plan Type",
            GroupBy::State => "State",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GroupBy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "parentorg" | "parent" | "org" => Ok(GroupBy::ParentOrg),
            "plantype" | "plan" => Ok(GroupBy::PlanType),
            "state" => Ok(GroupBy::State),
            _ => Err(PipelineError::Config(format!("unknown grouping: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub period: Period,
    pub group: String,
    pub enrollment: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupChange {
    pub period: Period,
    pub group: String,
    /// Net change from the calendar-previous month
    pub change: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupGrowth {
    pub group: String,
    pub yoy: Change,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountyTotal {
    pub state: String,
    pub county: String,
    pub enrollment: u64,
}

impl CountyTotal {
    /// e.g. "Orange, CA"
    pub fn label(&self) -> String {
        format!("{}, {}", self.county, self.state)
    }
}

fn grouped_totals(dataset: &WindowDataset, group: GroupBy) -> BTreeMap<(Period, &str), u64> {
    let mut totals = BTreeMap::new();
    for record in &dataset.records {
        *totals.entry((record.period, group.key(record))).or_insert(0) += record.enrolled();
    }
    totals
}

/// Enrollment per period and group, ordered by period then group
pub fn trend_by(dataset: &WindowDataset, group: GroupBy) -> Vec<TrendPoint> {
    grouped_totals(dataset, group)
        .into_iter()
        .map(|((period, key), enrollment)| TrendPoint {
            period,
            group: key.to_string(),
            enrollment,
        })
        .collect()
}

/// Plan-type mix per period
pub fn plan_mix(dataset: &WindowDataset) -> Vec<TrendPoint> {
    trend_by(dataset, GroupBy::PlanType)
}

/// The `n` groups with the most enrollment over the whole dataset
pub fn top_groups(dataset: &WindowDataset, group: GroupBy, n: usize) -> Vec<String> {
    let mut totals: HashMap<&str, u64> = HashMap::new();
    for record in &dataset.records {
        *totals.entry(group.key(record)).or_insert(0) += record.enrolled();
    }
    let mut ranked: Vec<(&str, u64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().take(n).map(|(k, _)| k.to_string()).collect()
}

/// Month-over-month net change for the `top_n` largest groups
///
/// A point exists only when the group has data in the previous month.
pub fn mom_by_group(dataset: &WindowDataset, group: GroupBy, top_n: usize) -> Vec<GroupChange> {
    let top = top_groups(dataset, group, top_n);
    let totals = grouped_totals(dataset, group);

    totals
        .iter()
        .filter(|((_, key), _)| top.iter().any(|t| t == key))
        .filter_map(|(&(period, key), &current)| {
            let previous = *totals.get(&(period.previous(), key))?;
            Some(GroupChange {
                period,
                group: key.to_string(),
                change: current as i64 - previous as i64,
            })
        })
        .collect()
}

/// YoY per group for the latest period, best first; groups without a
/// prior-year figure are omitted
pub fn yoy_by_group(dataset: &WindowDataset, group: GroupBy) -> Vec<GroupGrowth> {
    let Some(latest) = dataset.latest_period() else {
        return Vec::new();
    };
    let totals = grouped_totals(dataset, group);
    let prior_year = latest.year_ago();

    let mut growth: Vec<GroupGrowth> = totals
        .iter()
        .filter(|((period, _), _)| *period == latest)
        .filter_map(|(&(_, key), &current)| {
            let previous = *totals.get(&(prior_year, key))?;
            Change::between(current, previous).map(|yoy| GroupGrowth {
                group: key.to_string(),
                yoy,
            })
        })
        .collect();
    growth.sort_by(|a, b| {
        b.yoy
            .pct
            .partial_cmp(&a.yoy.pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.group.cmp(&b.group))
    });
    growth
}

/// Enrollment per state in one period, largest first
pub fn state_totals(dataset: &WindowDataset, period: Period) -> Vec<(String, u64)> {
    let mut totals: HashMap<&str, u64> = HashMap::new();
    for record in dataset.records_for(period) {
        *totals.entry(record.state.as_str()).or_insert(0) += record.enrolled();
    }
    let mut states: Vec<(String, u64)> = totals.into_iter().map(|(s, n)| (s.to_string(), n)).collect();
    states.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    states
}

/// The `n` largest counties in one period
pub fn top_counties(dataset: &WindowDataset, period: Period, n: usize) -> Vec<CountyTotal> {
    let mut totals: HashMap<(&str, &str), u64> = HashMap::new();
    for record in dataset.records_for(period) {
        *totals
            .entry((record.state.as_str(), record.county.as_str()))
            .or_insert(0) += record.enrolled();
    }
    let mut counties: Vec<CountyTotal> = totals
        .into_iter()
        .map(|((state, county), enrollment)| CountyTotal {
            state: state.to_string(),
            county: county.to_string(),
            enrollment,
        })
        .collect();
    counties.sort_by(|a, b| {
        b.enrollment
            .cmp(&a.enrollment)
            .then_with(|| a.state.cmp(&b.state))
            .then_with(|| a.county.cmp(&b.county))
    });
    counties.truncate(n);
    counties
}
