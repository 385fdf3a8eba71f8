//! Pipeline configuration
//!
//! Defaults match CMS publication behaviour. Environment variables overlay the
//! defaults:
//!   MA_WINDOW_MONTHS, MA_PUBLICATION_LAG, MA_ENROLLMENT_TTL_HOURS,
//!   MA_DIRECTORY_TTL_HOURS, MA_MIN_PERIODS, MA_FETCH_ATTEMPTS,
//!   MA_FETCH_TIMEOUT_SECS, MA_PARALLEL_FETCH, MA_DATA_DIR (empty disables)

use crate::cache::CacheTtls;
use crate::error::{PipelineError, Result};
use crate::period::{PeriodResolver, DEFAULT_PUBLICATION_LAG, DEFAULT_WINDOW_MONTHS};
use crate::source::{RetryPolicy, DEFAULT_DATA_DIR};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Window lengths offered to dashboard users
pub const WINDOW_CHOICES: [usize; 3] = [12, 18, 24];

/// Longest window accepted from the environment (ten years of history)
pub const MAX_WINDOW_MONTHS: usize = 120;

/// Number of resolved periods searched for a published plan directory
pub const DEFAULT_DIRECTORY_LOOKBACK: usize = 6;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; ma-enrollment)";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Rolling window length in months
    pub window_months: usize,

    /// Months between a period and its expected publication
    pub publication_lag: u32,

    pub ttls: CacheTtls,

    /// How many of the most recent periods to try for the plan directory
    pub directory_lookback: usize,

    /// Fewer loaded periods than this triggers demo mode
    pub min_periods: usize,

    pub retry: RetryPolicy,

    /// Per-request timeout; exceeding it counts as unreachable
    pub request_timeout: Duration,

    /// Fetch the window's periods on the rayon pool
    pub parallel_fetch: bool,

    pub user_agent: String,

    /// Root of pre-fetched extracts read before downloading; `None` disables
    pub data_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_months: DEFAULT_WINDOW_MONTHS,
            publication_lag: DEFAULT_PUBLICATION_LAG,
            ttls: CacheTtls::default(),
            directory_lookback: DEFAULT_DIRECTORY_LOOKBACK,
            min_periods: 1,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(90),
            parallel_fetch: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            data_dir: Some(PathBuf::from(DEFAULT_DATA_DIR)),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| PipelineError::Config(format!("{}: cannot parse {:?}", name, raw)))
}

fn parse_hours(name: &str, raw: &str) -> Result<chrono::Duration> {
    let hours: i64 = parse_var(name, raw)?;
    chrono::TimeDelta::try_hours(hours)
        .ok_or_else(|| PipelineError::Config(format!("{}: {} hours is out of range", name, hours)))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PipelineError::Config(format!("{}: expected a boolean, got {:?}", name, raw))),
    }
}

impl PipelineConfig {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|name| std::env::var(name).ok())
    }

    /// Overlay values from any variable lookup, then validate
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MA_WINDOW_MONTHS") {
            self.window_months = parse_var("MA_WINDOW_MONTHS", &v)?;
        }
        if let Some(v) = lookup("MA_PUBLICATION_LAG") {
            self.publication_lag = parse_var("MA_PUBLICATION_LAG", &v)?;
        }
        if let Some(v) = lookup("MA_ENROLLMENT_TTL_HOURS") {
            self.ttls.enrollment = parse_hours("MA_ENROLLMENT_TTL_HOURS", &v)?;
        }
        if let Some(v) = lookup("MA_DIRECTORY_TTL_HOURS") {
            self.ttls.directory = parse_hours("MA_DIRECTORY_TTL_HOURS", &v)?;
        }
        if let Some(v) = lookup("MA_MIN_PERIODS") {
            self.min_periods = parse_var("MA_MIN_PERIODS", &v)?;
        }
        if let Some(v) = lookup("MA_FETCH_ATTEMPTS") {
            self.retry.max_attempts = parse_var("MA_FETCH_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("MA_FETCH_TIMEOUT_SECS") {
            self.request_timeout = Duration::from_secs(parse_var("MA_FETCH_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("MA_PARALLEL_FETCH") {
            self.parallel_fetch = parse_flag("MA_PARALLEL_FETCH", &v)?;
        }
        if let Some(v) = lookup("MA_DATA_DIR") {
            let v = v.trim();
            self.data_dir = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_months == 0 {
            return Err(PipelineError::Config("window must cover at least one month".into()));
        }
        if self.window_months > MAX_WINDOW_MONTHS {
            return Err(PipelineError::Config(format!(
                "window of {} months exceeds the {}-month maximum",
                self.window_months, MAX_WINDOW_MONTHS
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(PipelineError::Config("at least one fetch attempt is required".into()));
        }
        if self.min_periods > self.window_months {
            return Err(PipelineError::Config(format!(
                "minimum of {} periods exceeds the {}-month window",
                self.min_periods, self.window_months
            )));
        }
        if self.ttls.enrollment <= chrono::Duration::zero() || self.ttls.directory <= chrono::Duration::zero() {
            return Err(PipelineError::Config("cache TTLs must be positive".into()));
        }
        Ok(())
    }

    pub fn resolver(&self) -> PeriodResolver {
        PeriodResolver::new(self.window_months, self.publication_lag)
    }
}
