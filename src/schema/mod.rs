//! Canonical schema, record types and source normalization

mod records;
mod quality;
pub mod normalizer;

pub use records::{DirectoryRecord, EnrollmentKey, EnrollmentRecord};
pub use quality::DataQuality;
pub use normalizer::{
    fold_header, normalize_directory, normalize_enrollment, parse_enrollment, CanonicalField,
    Normalized,
};
