//! Row filters applied before any aggregation

use crate::period::Period;
use crate::window::{WindowDataset, WindowRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Predicates over the merged dataset; an empty set means "all"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub parent_orgs: BTreeSet<String>,
    pub states: BTreeSet<String>,
    pub counties: BTreeSet<String>,
    pub plan_types: BTreeSet<String>,
    /// Inclusive period bounds
    pub period_range: Option<(Period, Period)>,
    /// Case-insensitive substring over parent org, state and county
    pub search: Option<String>,
}

fn collect<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parent_orgs<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_orgs = collect(values);
        self
    }

    pub fn states<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.states = collect(values);
        self
    }

    pub fn counties<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.counties = collect(values);
        self
    }

    pub fn plan_types<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plan_types = collect(values);
        self
    }

    pub fn period_range(mut self, start: Period, end: Period) -> Self {
        self.period_range = Some((start.min(end), start.max(end)));
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = if term.trim().is_empty() {
            None
        } else {
            Some(term.trim().to_lowercase())
        };
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn matches(&self, record: &WindowRecord) -> bool {
        fn allowed(set: &BTreeSet<String>, value: &str) -> bool {
            set.is_empty() || set.contains(value)
        }

        if !allowed(&self.parent_orgs, &record.parent_org)
            || !allowed(&self.states, &record.state)
            || !allowed(&self.counties, &record.county)
            || !allowed(&self.plan_types, &record.plan_type)
        {
            return false;
        }

        if let Some((start, end)) = self.period_range {
            if record.period < start || record.period > end {
                return false;
            }
        }

        match &self.search {
            Some(term) => [&record.parent_org, &record.state, &record.county]
                .iter()
                .any(|field| field.to_lowercase().contains(term.as_str())),
            None => true,
        }
    }

    /// Matching rows as a new dataset; periods with no surviving rows drop out
    pub fn apply(&self, dataset: &WindowDataset) -> WindowDataset {
        if self.is_empty() {
            return dataset.clone();
        }
        let records = dataset
            .records
            .iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();
        WindowDataset::from_records(records)
    }
}
