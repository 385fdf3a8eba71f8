//! Market share, growth ranking and the competitive summary table

use super::summary::Change;
use crate::period::Period;
use crate::window::WindowDataset;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Label for the bucket that collects orgs beyond the top N
pub const ALL_OTHER: &str = "All Other";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrgShare {
    pub parent_org: String,
    pub enrollment: u64,
    /// Percent of the period total
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrgGrowth {
    pub parent_org: String,
    pub enrollment: u64,
    pub yoy: Option<Change>,
}

/// One row of the competitive summary export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitiveRow {
    #[serde(rename = "Parent Organization")]
    pub parent_org: String,
    #[serde(rename = "Enrollment")]
    pub enrollment: u64,
    #[serde(rename = "Market Share %")]
    pub market_share_pct: f64,
    #[serde(rename = "MoM Change")]
    pub mom_change: Option<i64>,
    #[serde(rename = "MoM %")]
    pub mom_pct: Option<f64>,
    #[serde(rename = "YoY %")]
    pub yoy_pct: Option<f64>,
}

/// Enrollment per parent org in one period
pub fn org_totals(dataset: &WindowDataset, period: Period) -> HashMap<&str, u64> {
    let mut totals: HashMap<&str, u64> = HashMap::new();
    for record in dataset.records_for(period) {
        *totals.entry(record.parent_org.as_str()).or_insert(0) += record.enrolled();
    }
    totals
}

fn by_enrollment_then_name(a: (&str, u64), b: (&str, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

/// Share of each parent org in `period`, largest first
///
/// Shares sum to 100 whenever the period total is non-zero; otherwise every
/// share is 0.
pub fn market_share(dataset: &WindowDataset, period: Period) -> Vec<OrgShare> {
    let totals = org_totals(dataset, period);
    let grand_total: u64 = totals.values().sum();

    let mut shares: Vec<OrgShare> = totals
        .into_iter()
        .map(|(org, enrollment)| OrgShare {
            parent_org: org.to_string(),
            enrollment,
            share_pct: if grand_total == 0 {
                0.0
            } else {
                enrollment as f64 / grand_total as f64 * 100.0
            },
        })
        .collect();
    shares.sort_by(|a, b| {
        by_enrollment_then_name((a.parent_org.as_str(), a.enrollment), (b.parent_org.as_str(), b.enrollment))
    });
    shares
}

/// Keep the `n` largest shares and fold the rest into "All Other"
pub fn top_shares(mut shares: Vec<OrgShare>, n: usize) -> Vec<OrgShare> {
    if shares.len() <= n {
        return shares;
    }
    let rest = shares.split_off(n);
    shares.push(OrgShare {
        parent_org: ALL_OTHER.to_string(),
        enrollment: rest.iter().map(|s| s.enrollment).sum(),
        share_pct: rest.iter().map(|s| s.share_pct).sum(),
    });
    shares
}

/// Parent orgs in the latest period ordered by their own YoY, best first
///
/// Orgs without a comparable prior-year figure follow all ranked orgs. Ties
/// go to the larger enrollment, then the org name.
pub fn growth_ranking(dataset: &WindowDataset) -> Vec<OrgGrowth> {
    let Some(latest) = dataset.latest_period() else {
        return Vec::new();
    };
    let current = org_totals(dataset, latest);
    let prior = org_totals(dataset, latest.year_ago());

    let mut ranking: Vec<OrgGrowth> = current
        .into_iter()
        .map(|(org, enrollment)| OrgGrowth {
            parent_org: org.to_string(),
            enrollment,
            yoy: prior
                .get(org)
                .and_then(|&previous| Change::between(enrollment, previous)),
        })
        .collect();

    ranking.sort_by(|a, b| {
        let by_yoy = match (&a.yoy, &b.yoy) {
            (Some(x), Some(y)) => y.pct.partial_cmp(&x.pct).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_yoy.then_with(|| {
            by_enrollment_then_name((a.parent_org.as_str(), a.enrollment), (b.parent_org.as_str(), b.enrollment))
        })
    });
    ranking
}

/// Per parent org in the latest period: enrollment, share, MoM and YoY
pub fn competitive_summary(dataset: &WindowDataset) -> Vec<CompetitiveRow> {
    let Some(latest) = dataset.latest_period() else {
        return Vec::new();
    };
    let previous_month = org_totals(dataset, latest.previous());
    let previous_year = org_totals(dataset, latest.year_ago());

    market_share(dataset, latest)
        .into_iter()
        .map(|share| {
            let mom = previous_month
                .get(share.parent_org.as_str())
                .and_then(|&p| Change::between(share.enrollment, p));
            let yoy = previous_year
                .get(share.parent_org.as_str())
                .and_then(|&p| Change::between(share.enrollment, p));
            CompetitiveRow {
                mom_change: mom.map(|c| c.absolute),
                mom_pct: mom.map(|c| c.pct),
                yoy_pct: yoy.map(|c| c.pct),
                market_share_pct: share.share_pct,
                enrollment: share.enrollment,
                parent_org: share.parent_org,
            }
        })
        .collect()
}
