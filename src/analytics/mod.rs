//! Aggregations over the merged window
//!
//! Every function here is pure over a `WindowDataset`. Filtering happens
//! first so all figures agree with the rows on display.

pub mod breakdown;
pub mod competitive;
pub mod filters;
pub mod format;
pub mod summary;

pub use breakdown::{
    mom_by_group, plan_mix, state_totals, top_counties, top_groups, trend_by, yoy_by_group, CountyTotal,
    GroupBy, GroupChange, GroupGrowth, TrendPoint,
};
pub use competitive::{
    competitive_summary, growth_ranking, market_share, org_totals, top_shares, CompetitiveRow, OrgGrowth,
    OrgShare, ALL_OTHER,
};
pub use filters::FilterSet;
pub use format::{format_count, format_delta, format_pct};
pub use summary::{change_vs, period_totals, AggregateSummary, Change};

/// Groups shown in the month-over-month breakdown
pub const MOM_TOP_GROUPS: usize = 6;

/// Counties shown in the latest-period county ranking
pub const TOP_COUNTIES: usize = 15;
