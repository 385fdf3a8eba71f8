//! Source retrieval: remote archives, their extraction, and local extracts

mod fetcher;
pub mod archive;
pub mod local;

pub use fetcher::{
    classify_status, FetchOutcome, Fetcher, HttpFetcher, RetryPolicy, RetryingFetcher, StatusClass,
};
pub use archive::{extract_tables, extract_tables_limited, pick_table, TablePayload, MAX_MEMBER_BYTES};
pub use local::{LocalStore, DEFAULT_DATA_DIR};
