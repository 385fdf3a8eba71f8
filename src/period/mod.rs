//! Periods, rolling window resolution and source locations

mod data;
mod resolver;
mod locator;

pub use data::{Period, MONTH_NAMES};
pub use resolver::{rolling_periods, PeriodResolver, DEFAULT_PUBLICATION_LAG, DEFAULT_WINDOW_MONTHS};
pub use locator::{resource_url, FileFamily};
