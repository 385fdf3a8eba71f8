//! Rolling window assembly
//!
//! Each period is served from the cache when fresh, then from a local
//! extract if one exists, otherwise fetched, extracted and normalized; the
//! result is cached. Failed periods are skipped and reported; they never
//! abort the window.

use super::dataset::{LoadReport, LoadSource, PeriodFailure};
use crate::cache::CacheManager;
use crate::error::{PipelineError, Result};
use crate::period::{resource_url, FileFamily, Period};
use crate::schema::{normalize_directory, normalize_enrollment, DataQuality, DirectoryRecord, EnrollmentRecord, Normalized};
use crate::source::{extract_tables, pick_table, Fetcher, LocalStore};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::sync::Arc;

/// Per-period datasets that survived loading and trimming, ascending
pub type LoadedPeriods = Vec<(Period, Arc<Vec<EnrollmentRecord>>)>;

enum PeriodLoad {
    Loaded {
        period: Period,
        records: Arc<Vec<EnrollmentRecord>>,
        source: LoadSource,
        quality: DataQuality,
    },
    Failed(PeriodFailure),
}

/// Download, extract and pick the table for one resource
fn fetch_table<F: Fetcher>(fetcher: &F, url: &str, family: FileFamily) -> Result<Vec<u8>> {
    let bytes = fetcher.fetch(url).into_result(url)?;
    let tables = extract_tables(&bytes)?;
    let table = pick_table(tables, family.member_hint())
        .ok_or_else(|| PipelineError::CorruptArchive(format!("no CSV member in {}", url)))?;
    debug!("Using archive member {} from {}", table.name, url);
    Ok(table.bytes)
}

/// Fetch and normalize one enrollment period, bypassing the cache
pub fn fetch_enrollment<F: Fetcher>(fetcher: &F, period: Period) -> Result<Normalized<EnrollmentRecord>> {
    let url = resource_url(period, FileFamily::Enrollment)?;
    let table = fetch_table(fetcher, &url, FileFamily::Enrollment)?;
    let normalized = normalize_enrollment(&table, period)?;
    if normalized.records.is_empty() {
        return Err(PipelineError::EmptyPayload(url));
    }
    Ok(normalized)
}

/// Fetch and normalize the plan directory published for a period
pub fn fetch_directory<F: Fetcher>(fetcher: &F, period: Period) -> Result<Normalized<DirectoryRecord>> {
    let url = resource_url(period, FileFamily::Directory)?;
    let table = fetch_table(fetcher, &url, FileFamily::Directory)?;
    let normalized = normalize_directory(&table)?;
    if normalized.records.is_empty() {
        return Err(PipelineError::EmptyPayload(url));
    }
    Ok(normalized)
}

/// Builds the rolling window from cache and remote sources
pub struct WindowAssembler<'a, F: Fetcher> {
    fetcher: &'a F,
    cache: &'a CacheManager,
    local: Option<&'a LocalStore>,
    window_months: usize,
    parallel: bool,
}

impl<'a, F: Fetcher> WindowAssembler<'a, F> {
    pub fn new(fetcher: &'a F, cache: &'a CacheManager, window_months: usize) -> Self {
        Self {
            fetcher,
            cache,
            local: None,
            window_months,
            parallel: false,
        }
    }

    /// Consult pre-fetched extracts before downloading
    pub fn local(mut self, store: Option<&'a LocalStore>) -> Self {
        self.local = store;
        self
    }

    /// Fetch independent periods on the rayon pool
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn load_period(&self, period: Period) -> PeriodLoad {
        if let Some(records) = self.cache.get_enrollment(period) {
            debug!("{}: {} rows from cache", period, records.len());
            return PeriodLoad::Loaded {
                period,
                records,
                source: LoadSource::Cache,
                quality: DataQuality::default(),
            };
        }

        if let Some(normalized) = self.read_local_enrollment(period) {
            return self.accept(period, normalized, LoadSource::Local);
        }

        match fetch_enrollment(self.fetcher, period) {
            Ok(normalized) => self.accept(period, normalized, LoadSource::Remote),
            Err(error) => {
                if error.is_expected_gap() {
                    info!("{}: not yet published, skipping", period);
                } else {
                    warn!("{}: skipped ({})", period, error);
                }
                PeriodLoad::Failed(PeriodFailure { period, error })
            }
        }
    }

    fn accept(&self, period: Period, normalized: Normalized<EnrollmentRecord>, source: LoadSource) -> PeriodLoad {
        for warning in normalized.quality.warnings() {
            warn!("{}: {}", period, warning);
        }
        info!("{}: {} rows ({:?})", period, normalized.records.len(), source);
        let records = self.cache.put_enrollment(period, normalized.records);
        PeriodLoad::Loaded {
            period,
            records,
            source,
            quality: normalized.quality,
        }
    }

    /// Normalized local extract for `period`; an unusable file falls through to download
    fn read_local_enrollment(&self, period: Period) -> Option<Normalized<EnrollmentRecord>> {
        let path = self.local?.find_enrollment(period)?;
        let result = LocalStore::read(&path)
            .and_then(|bytes| normalize_enrollment(&bytes, period))
            .and_then(|normalized| {
                if normalized.records.is_empty() {
                    Err(PipelineError::EmptyPayload(path.display().to_string()))
                } else {
                    Ok(normalized)
                }
            });
        match result {
            Ok(normalized) => Some(normalized),
            Err(e) => {
                warn!("{}: local extract {} unusable ({}); downloading", period, path.display(), e);
                None
            }
        }
    }

    fn read_local_directory(&self) -> Option<Normalized<DirectoryRecord>> {
        let store = self.local?;
        let path = match store.find_directory() {
            Ok(path) => path?,
            Err(e) => {
                warn!("Cannot list local plan directories in {}: {}", store.root().display(), e);
                return None;
            }
        };
        match LocalStore::read(&path).and_then(|bytes| normalize_directory(&bytes)) {
            Ok(normalized) if !normalized.records.is_empty() => {
                info!("Plan directory: {} contracts from {}", normalized.records.len(), path.display());
                Some(normalized)
            }
            Ok(_) => {
                warn!("Local plan directory {} has no rows; downloading", path.display());
                None
            }
            Err(e) => {
                warn!("Local plan directory {} unusable ({}); downloading", path.display(), e);
                None
            }
        }
    }

    /// Load every requested period and trim to the window
    ///
    /// The window is anchored on the latest period that actually loaded, not
    /// on the calendar, so publication gaps at the recent end do not shrink
    /// the history kept.
    pub fn assemble(&self, periods: &[Period]) -> (LoadedPeriods, LoadReport) {
        let mut requested: Vec<Period> = periods.to_vec();
        requested.sort();
        requested.dedup();

        let loads: Vec<PeriodLoad> = if self.parallel {
            requested.par_iter().map(|p| self.load_period(*p)).collect()
        } else {
            requested.iter().map(|p| self.load_period(*p)).collect()
        };

        let mut report = LoadReport {
            requested: self.window_months,
            ..Default::default()
        };
        let mut loaded: Vec<(Period, Arc<Vec<EnrollmentRecord>>, LoadSource)> = Vec::new();

        for load in loads {
            match load {
                PeriodLoad::Loaded { period, records, source, quality } => {
                    report.quality.merge(&quality);
                    loaded.push((period, records, source));
                }
                PeriodLoad::Failed(failure) => report.failures.push(failure),
            }
        }
        loaded.sort_by_key(|(p, _, _)| *p);

        if let Some(&(latest, _, _)) = loaded.last() {
            let span = self.window_months.saturating_sub(1) as u32;
            let oldest_allowed = latest.minus_months(span);
            loaded.retain(|(period, _, _)| {
                let keep = *period >= oldest_allowed;
                if !keep {
                    report.trimmed.push(*period);
                }
                keep
            });
        }

        report.loaded = loaded.iter().map(|(p, _, s)| (*p, *s)).collect();
        info!("Window assembled: {}", report.status_line());

        let periods = loaded.into_iter().map(|(p, records, _)| (p, records)).collect();
        (periods, report)
    }

    /// Latest plan directory: cached snapshot, then the newest local extract,
    /// else the most recent published one among `candidates` (most recent first)
    pub fn load_directory(&self, candidates: &[Period]) -> Result<Arc<Vec<DirectoryRecord>>> {
        if let Some(records) = self.cache.get_directory() {
            debug!("Plan directory: {} rows from cache", records.len());
            return Ok(records);
        }
        if let Some(normalized) = self.read_local_directory() {
            return Ok(self.cache.put_directory(normalized.records));
        }

        let mut last_error = None;
        for &period in candidates {
            match fetch_directory(self.fetcher, period) {
                Ok(normalized) => {
                    for warning in normalized.quality.warnings() {
                        warn!("Plan directory {}: {}", period, warning);
                    }
                    info!("Plan directory {}: {} contracts", period, normalized.records.len());
                    return Ok(self.cache.put_directory(normalized.records));
                }
                Err(error) => {
                    debug!("Plan directory {} unavailable: {}", period, error);
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PipelineError::NotYetPublished("plan directory".into())))
    }
}
