//! Expiring cache for normalized datasets and the refresh marker

mod clock;
mod store;
mod marker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{CacheEntry, CacheKey, CacheManager, CacheStats, CacheTtls, CachedPayload};
pub use marker::{refresh_due, RefreshMarker, DEFAULT_MARKER_PATH};
