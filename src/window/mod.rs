//! Rolling window assembly, directory merge and demo fallback

pub mod assembler;
pub mod dataset;
pub mod demo;
pub mod merger;

pub use assembler::{fetch_directory, fetch_enrollment, LoadedPeriods, WindowAssembler};
pub use dataset::{LoadReport, LoadSource, PeriodFailure, WindowDataset, WindowRecord};
pub use demo::{demo_directory, demo_window, DEMO_SEED};
pub use merger::{merge_directory, DirectoryIndex, INDEPENDENT_SENTINEL};
