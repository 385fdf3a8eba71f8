//! End-to-end pipeline: resolve, load, merge, and fall back to demo data
//!
//! A run never fails because the publisher is missing files or is down.
//! When too few periods load, the output switches to the demo dataset and
//! carries a degraded notice instead. Only configuration and period
//! construction errors are returned as `Err`.

use crate::analytics::{AggregateSummary, FilterSet};
use crate::cache::{refresh_due, CacheManager, RefreshMarker};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::period::Period;
use crate::schema::DirectoryRecord;
use crate::source::{Fetcher, HttpFetcher, LocalStore, RetryingFetcher};
use crate::window::{
    demo_window, merge_directory, LoadReport, LoadSource, WindowAssembler, WindowDataset,
};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Where the output's rows came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    Live,
    Demo,
}

/// Shown to the user when live data could not be served
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegradedNotice {
    pub reason: String,
    pub missing: Vec<Period>,
    /// A manual refresh (cache invalidation and reload) may recover
    pub refresh_offered: bool,
}

impl fmt::Display for DegradedNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Live data unavailable ({}); showing demo data.", self.reason)?;
        if self.refresh_offered {
            write!(f, " A manual refresh will retry the download.")?;
        }
        Ok(())
    }
}

/// Everything the presentation layer needs for one render
#[derive(Debug)]
pub struct PipelineOutput {
    pub dataset: WindowDataset,
    pub directory: Arc<Vec<DirectoryRecord>>,
    pub report: LoadReport,
    pub mode: DataMode,
    pub notice: Option<DegradedNotice>,
}

impl PipelineOutput {
    pub fn is_degraded(&self) -> bool {
        self.notice.is_some()
    }

    pub fn filtered(&self, filters: &FilterSet) -> WindowDataset {
        filters.apply(&self.dataset)
    }

    /// KPI summary for the given filters
    pub fn summary(&self, filters: &FilterSet) -> AggregateSummary {
        AggregateSummary::compute(&self.dataset, filters, &self.report)
    }
}

pub struct Pipeline<F: Fetcher> {
    config: PipelineConfig,
    fetcher: F,
    cache: Arc<CacheManager>,
    local: Option<LocalStore>,
}

impl Pipeline<RetryingFetcher<HttpFetcher>> {
    /// Pipeline against the live CMS site with the configured retry policy
    pub fn live(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let http = HttpFetcher::new(config.request_timeout, &config.user_agent)?;
        let fetcher = RetryingFetcher::new(http, config.retry.clone());
        let cache = Arc::new(CacheManager::new(config.ttls));
        Ok(Self::new(config, fetcher, cache))
    }
}

impl<F: Fetcher> Pipeline<F> {
    pub fn new(config: PipelineConfig, fetcher: F, cache: Arc<CacheManager>) -> Self {
        let local = config.data_dir.as_ref().map(LocalStore::new);
        Self {
            config,
            fetcher,
            cache,
            local,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Periods the window would request at `now`, most recent first
    pub fn resolve(&self, now: DateTime<Utc>) -> Vec<Period> {
        self.config.resolver().resolve(now)
    }

    /// Run at the cache clock's current time
    pub fn run(&self) -> Result<PipelineOutput> {
        self.run_at(self.cache.now())
    }

    pub fn run_at(&self, now: DateTime<Utc>) -> Result<PipelineOutput> {
        self.config.validate()?;
        let periods = self.resolve(now);
        info!(
            "Loading {} periods ({} to {})",
            periods.len(),
            periods.last().map(|p| p.label()).unwrap_or_default(),
            periods.first().map(|p| p.label()).unwrap_or_default()
        );

        let assembler = WindowAssembler::new(&self.fetcher, &self.cache, self.config.window_months)
            .parallel(self.config.parallel_fetch)
            .local(self.local.as_ref());
        let (loaded, mut report) = assembler.assemble(&periods);

        if let Some(failure) = report
            .failures
            .iter()
            .find(|f| matches!(f.error, PipelineError::InvalidPeriod { .. }))
        {
            return Err(PipelineError::InvalidPeriod {
                year: failure.period.year,
                month: failure.period.month,
            });
        }

        if loaded.len() < self.config.min_periods {
            let insufficient = PipelineError::InsufficientData {
                loaded: loaded.len(),
                required: self.config.min_periods,
            };
            warn!("{}; falling back to demo data", insufficient);
            let notice = DegradedNotice {
                reason: insufficient.to_string(),
                missing: report.missing_periods(),
                refresh_offered: true,
            };
            return Ok(self.demo_output(&periods, report, Some(notice)));
        }

        let candidates: Vec<Period> = periods
            .iter()
            .take(self.config.directory_lookback)
            .copied()
            .collect();
        let directory = match assembler.load_directory(&candidates) {
            Ok(directory) => {
                report.directory_loaded = true;
                directory
            }
            Err(e) => {
                warn!("Plan directory unavailable ({}); parents default to the sentinel", e);
                Arc::new(Vec::new())
            }
        };

        let dataset = merge_directory(&loaded, &directory);
        info!("{} rows across {} periods", dataset.len(), dataset.periods.len());

        Ok(PipelineOutput {
            dataset,
            directory,
            report,
            mode: DataMode::Live,
            notice: None,
        })
    }

    /// Demo dataset for the window at `now`, without touching the network
    pub fn demo_at(&self, now: DateTime<Utc>) -> PipelineOutput {
        let periods = self.resolve(now);
        let report = LoadReport {
            requested: self.config.window_months,
            ..Default::default()
        };
        self.demo_output(&periods, report, None)
    }

    pub fn demo(&self) -> PipelineOutput {
        self.demo_at(self.cache.now())
    }

    fn demo_output(&self, periods: &[Period], mut report: LoadReport, notice: Option<DegradedNotice>) -> PipelineOutput {
        info!("Serving demo dataset for {} periods", periods.len());
        let (loaded, directory) = demo_window(periods);
        report.loaded = loaded.iter().map(|(p, _)| (*p, LoadSource::Demo)).collect();
        report.trimmed.clear();
        report.directory_loaded = true;

        PipelineOutput {
            dataset: merge_directory(&loaded, &directory),
            directory: Arc::new(directory),
            report,
            mode: DataMode::Demo,
            notice,
        }
    }

    /// Invalidate the cache and record the refresh time
    pub fn refresh(&self, marker_path: &Path) -> Result<RefreshMarker> {
        self.cache.invalidate_all();
        let marker = RefreshMarker::new(self.cache.now());
        marker.store(marker_path)?;
        info!("Refresh recorded at {}", marker.last_refresh);
        Ok(marker)
    }

    /// Refresh only if `interval` has passed since the stored marker
    pub fn refresh_if_due(&self, marker_path: &Path, interval: Duration) -> Result<bool> {
        let marker = RefreshMarker::load(marker_path)?;
        if refresh_due(marker.as_ref(), self.cache.now(), interval) {
            self.refresh(marker_path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
