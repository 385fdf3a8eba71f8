//! MA Enrollment - Rolling-window Medicare Advantage enrollment pipeline
//!
//! This library provides:
//! - Period resolution and CMS resource location for the rolling window
//! - Local pre-fetched extracts, then remote fetching with typed "not yet published" handling and retries
//! - Archive extraction and header-tolerant schema normalization
//! - A TTL cache with an injectable clock and a persisted refresh marker
//! - Window assembly, plan directory merge and a deterministic demo fallback
//! - Competitive analytics (MoM, YoY, market share, growth ranking) and CSV exports

pub mod error;
pub mod period;
pub mod source;
pub mod schema;
pub mod cache;
pub mod config;
pub mod window;
pub mod analytics;
pub mod export;
pub mod pipeline;

// Re-export commonly used types
pub use error::{PipelineError, Result};
pub use period::{FileFamily, Period, PeriodResolver};
pub use schema::{DirectoryRecord, EnrollmentRecord};
pub use source::LocalStore;
pub use cache::{CacheManager, Clock, ManualClock, RefreshMarker};
pub use config::PipelineConfig;
pub use window::{LoadReport, WindowDataset, WindowRecord, INDEPENDENT_SENTINEL};
pub use analytics::{AggregateSummary, FilterSet, GroupBy};
pub use pipeline::{DataMode, DegradedNotice, Pipeline, PipelineOutput};
