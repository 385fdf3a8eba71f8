//! MA Enrollment CLI
//!
//! Command-line interface for loading the rolling enrollment window and
//! printing competitive analytics

use anyhow::{bail, Context, Result};
use chrono::{TimeDelta, Utc};
use clap::{Args, Parser, Subcommand};
use ma_enrollment::analytics::{
    competitive_summary, format_count, format_delta, format_pct, growth_ranking, market_share, mom_by_group,
    state_totals, top_counties, top_shares, trend_by, AggregateSummary, CompetitiveRow, FilterSet, GroupBy,
    GroupChange, OrgGrowth, OrgShare, TrendPoint, MOM_TOP_GROUPS, TOP_COUNTIES,
};
use ma_enrollment::cache::DEFAULT_MARKER_PATH;
use ma_enrollment::config::WINDOW_CHOICES;
use ma_enrollment::export::export_all;
use ma_enrollment::period::{resource_url, FileFamily, Period};
use ma_enrollment::pipeline::{DataMode, Pipeline, PipelineOutput};
use ma_enrollment::{PipelineConfig, WindowDataset};
use serde::Serialize;
use std::path::PathBuf;

/// Number of parent orgs shown before folding into "All Other"
const SHARE_TOP_N: usize = 8;

#[derive(Debug, Parser)]
#[command(name = "ma-enrollment", version)]
#[command(about = "Rolling-window Medicare Advantage enrollment analytics from CMS public files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the window and print KPIs, market share and growth
    Run(RunArgs),
    /// Stamp the refresh marker now
    ///
    /// Each process starts with an empty cache, so this only records the
    /// time; `run --marker` reads it to decide whether a refresh is due.
    Refresh {
        #[arg(long, default_value = DEFAULT_MARKER_PATH)]
        marker: PathBuf,
    },
    /// Print the periods and URLs the window would request
    Periods {
        #[arg(long, value_parser = parse_window)]
        window: Option<usize>,
        #[arg(long)]
        lag: Option<u32>,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Use the synthetic demo dataset instead of CMS data
    #[arg(long)]
    demo: bool,

    /// Window length in months (12, 18 or 24)
    #[arg(long, value_parser = parse_window)]
    window: Option<usize>,

    #[arg(long = "parent-org")]
    parent_orgs: Vec<String>,

    #[arg(long = "state")]
    states: Vec<String>,

    #[arg(long = "county")]
    counties: Vec<String>,

    #[arg(long = "plan-type")]
    plan_types: Vec<String>,

    /// First period to include (YYYY-MM)
    #[arg(long)]
    from: Option<Period>,

    /// Last period to include (YYYY-MM)
    #[arg(long)]
    to: Option<Period>,

    /// Substring match on parent org, state or county
    #[arg(long)]
    search: Option<String>,

    /// Grouping for trend and MoM breakdowns (parent-org, plan-type, state)
    #[arg(long, default_value = "parent-org")]
    group_by: GroupBy,

    /// Write the three CSV exports into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Directory of pre-fetched extracts (cpsc/, plandir/) read before downloading
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Refresh marker to check; a due refresh invalidates the cache and is recorded
    #[arg(long)]
    marker: Option<PathBuf>,

    /// Hours between refreshes when --marker is given
    #[arg(long, default_value_t = 6)]
    refresh_hours: i64,
}

fn parse_window(raw: &str) -> std::result::Result<usize, String> {
    let months: usize = raw.parse().map_err(|_| format!("not a number: {}", raw))?;
    if WINDOW_CHOICES.contains(&months) {
        Ok(months)
    } else {
        Err(format!("window must be one of {:?}", WINDOW_CHOICES))
    }
}

/// Everything `run --json` prints
#[derive(Serialize)]
struct RunReport<'a> {
    mode: DataMode,
    notice: Option<String>,
    summary: &'a AggregateSummary,
    market_share: Vec<OrgShare>,
    competitive: &'a [CompetitiveRow],
    growth: Vec<OrgGrowth>,
    trend: Vec<TrendPoint>,
    mom: Vec<GroupChange>,
}

fn build_filters(args: &RunArgs, output: &PipelineOutput) -> FilterSet {
    let mut filters = FilterSet::new()
        .parent_orgs(args.parent_orgs.iter().cloned())
        .states(args.states.iter().cloned())
        .counties(args.counties.iter().cloned())
        .plan_types(args.plan_types.iter().cloned());

    let start = args.from.or(output.dataset.earliest_period());
    let end = args.to.or(output.dataset.latest_period());
    if args.from.is_some() || args.to.is_some() {
        if let (Some(start), Some(end)) = (start, end) {
            filters = filters.period_range(start, end);
        }
    }
    if let Some(term) = &args.search {
        filters = filters.search(term.as_str());
    }
    filters
}

fn print_text(output: &PipelineOutput, summary: &AggregateSummary, group: GroupBy, filtered: &WindowDataset) {
    match output.mode {
        DataMode::Live => println!(
            "Source: CMS public data ({}; {})",
            summary.status,
            output.report.sources_line()
        ),
        DataMode::Demo => println!("Source: demo data (synthetic)"),
    }
    if let Some(notice) = &output.notice {
        println!("WARNING: {}", notice);
    }
    for warning in &summary.data_quality_warnings {
        println!("Data quality: {}", warning);
    }
    if !summary.missing_periods.is_empty() {
        let missing: Vec<String> = summary.missing_periods.iter().map(|p| p.label()).collect();
        println!("Missing periods: {}", missing.join(", "));
    }

    let Some(latest) = summary.latest_period else {
        println!("\nNo rows match the current filters.");
        return;
    };

    println!("\nKey Metrics ({})", latest.label());
    println!("{}", "-".repeat(48));
    println!("  {:<26} {:>12}", "Total Enrolled", format_count(summary.latest_total));
    println!(
        "  {:<26} {:>12}",
        "MoM",
        format!("{} ({})", format_pct(summary.mom.as_ref()), format_delta(summary.mom.as_ref()))
    );
    println!("  {:<26} {:>12}", "YoY", format_pct(summary.yoy.as_ref()));
    println!("  {:<26} {:>12}", "Window Growth", format_pct(summary.window_growth.as_ref()));
    println!("  {:<26} {:>12}", "Parent Organizations", summary.parent_orgs);
    println!("  {:<26} {:>12}", "Active Contracts", summary.contracts);
    println!("  {:<26} {:>12}", "States Covered", summary.states);

    println!("\nMarket Share ({})", latest.label());
    for share in top_shares(market_share(filtered, latest), SHARE_TOP_N) {
        println!("  {:<32} {:>10} {:>7.2}%", share.parent_org, format_count(share.enrollment), share.share_pct);
    }

    println!("\nGrowth Ranking (YoY)");
    for (rank, org) in growth_ranking(filtered).iter().enumerate() {
        println!(
            "  {:>2}. {:<32} {:>10} {:>8}",
            rank + 1,
            org.parent_org,
            format_count(org.enrollment),
            format_pct(org.yoy.as_ref())
        );
    }

    println!("\nMoM Net Change by {} (Top {})", group, MOM_TOP_GROUPS);
    let changes = mom_by_group(filtered, group, MOM_TOP_GROUPS);
    for change in changes.iter().filter(|c| c.period == latest) {
        println!("  {:<32} {:>+10}", change.group, change.change);
    }

    println!("\nEnrollment by State ({})", latest.label());
    for (state, enrollment) in state_totals(filtered, latest).iter().take(10) {
        println!("  {:<6} {:>10}", state, format_count(*enrollment));
    }

    println!("\nTop {} Counties ({})", TOP_COUNTIES, latest.label());
    for county in top_counties(filtered, latest, TOP_COUNTIES) {
        println!("  {:<32} {:>10}", county.label(), format_count(county.enrollment));
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = PipelineConfig::from_env().context("Invalid environment configuration")?;
    if let Some(window) = args.window {
        config.window_months = window;
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    config.min_periods = config.min_periods.min(config.window_months);

    let pipeline = Pipeline::live(config).context("Failed to set up pipeline")?;
    if let Some(marker) = &args.marker {
        let interval = TimeDelta::try_hours(args.refresh_hours)
            .filter(|d| *d > TimeDelta::zero())
            .with_context(|| format!("Invalid refresh interval: {} hours", args.refresh_hours))?;
        let refreshed = pipeline
            .refresh_if_due(marker, interval)
            .with_context(|| format!("Failed to check refresh marker {}", marker.display()))?;
        if refreshed {
            eprintln!("Refresh was due; recorded in {}", marker.display());
        }
    }

    let output = if args.demo {
        pipeline.demo()
    } else {
        pipeline.run().context("Pipeline run failed")?
    };

    let filters = build_filters(&args, &output);
    let filtered = output.filtered(&filters);
    let summary = AggregateSummary::from_filtered(&filtered, &output.report);
    let competitive = competitive_summary(&filtered);

    if let Some(dir) = &args.export_dir {
        let written = export_all(dir, Utc::now().date_naive(), &filtered, &competitive, &output.directory)
            .with_context(|| format!("Failed to write exports to {}", dir.display()))?;
        eprintln!("Wrote {} export file(s) to {}", written.len(), dir.display());
    }

    if args.json {
        let report = RunReport {
            mode: output.mode,
            notice: output.notice.as_ref().map(|n| n.to_string()),
            summary: &summary,
            market_share: summary
                .latest_period
                .map(|p| market_share(&filtered, p))
                .unwrap_or_default(),
            competitive: &competitive,
            growth: growth_ranking(&filtered),
            trend: trend_by(&filtered, args.group_by),
            mom: mom_by_group(&filtered, args.group_by, MOM_TOP_GROUPS),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&output, &summary, args.group_by, &filtered);
    }
    Ok(())
}

fn refresh(marker: PathBuf) -> Result<()> {
    let config = PipelineConfig::from_env().context("Invalid environment configuration")?;
    let pipeline = Pipeline::live(config).context("Failed to set up pipeline")?;
    let stamp = pipeline
        .refresh(&marker)
        .with_context(|| format!("Failed to write refresh marker {}", marker.display()))?;
    println!("Refresh recorded at {}", stamp.last_refresh.to_rfc3339());
    Ok(())
}

fn periods(window: Option<usize>, lag: Option<u32>) -> Result<()> {
    let mut config = PipelineConfig::from_env().context("Invalid environment configuration")?;
    if let Some(window) = window {
        config.window_months = window;
    }
    if let Some(lag) = lag {
        config.publication_lag = lag;
    }
    config.min_periods = config.min_periods.min(config.window_months);
    if let Err(e) = config.validate() {
        bail!("{}", e);
    }

    for period in config.resolver().resolve(Utc::now()) {
        println!(
            "{}  {}  {}",
            period,
            resource_url(period, FileFamily::Enrollment)?,
            resource_url(period, FileFamily::Directory)?
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args),
        Command::Refresh { marker } => refresh(marker),
        Command::Periods { window, lag } => periods(window, lag),
    }
}
