//! Error taxonomy for the enrollment pipeline

use crate::period::FileFamily;
use thiserror::Error;

/// Every failure the pipeline can surface
///
/// Per-period failures (`NotYetPublished`, `Unreachable`, `CorruptArchive`,
/// `Normalization`) are isolated by the window assembler and reported in the
/// load report. `InvalidPeriod` and `Config` are programmer/configuration
/// errors and are fatal.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid period {year}-{month:02}")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("not yet published: {0}")]
    NotYetPublished(String),

    #[error("unreachable: {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("no usable rows in {0}")]
    EmptyPayload(String),

    #[error("{family} payload is missing required columns: {}", missing.join(", "))]
    Normalization {
        family: FileFamily,
        missing: Vec<String>,
    },

    #[error("insufficient data: {loaded} period(s) loaded, at least {required} required")]
    InsufficientData { loaded: usize, required: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl PipelineError {
    /// Short machine-friendly label used in load reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidPeriod { .. } => "invalid_period",
            PipelineError::NotYetPublished(_) => "not_yet_published",
            PipelineError::Unreachable { .. } => "unreachable",
            PipelineError::CorruptArchive(_) | PipelineError::Zip(_) => "corrupt_archive",
            PipelineError::Normalization { .. }
            | PipelineError::EmptyPayload(_)
            | PipelineError::Csv(_) => "normalization",
            PipelineError::InsufficientData { .. } => "insufficient_data",
            PipelineError::Config(_) => "config",
            PipelineError::Io(_) => "io",
            PipelineError::Json(_) => "json",
        }
    }

    /// Whether this failure is an expected steady-state gap rather than an outage
    pub fn is_expected_gap(&self) -> bool {
        matches!(self, PipelineError::NotYetPublished(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
