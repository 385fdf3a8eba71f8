//! Persisted last-refresh marker shared with the external scheduler

use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default marker location
pub const DEFAULT_MARKER_PATH: &str = "data/last_refresh.json";

/// When the cache was last invalidated by a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshMarker {
    pub last_refresh: DateTime<Utc>,
}

impl RefreshMarker {
    pub fn new(last_refresh: DateTime<Utc>) -> Self {
        Self { last_refresh }
    }

    /// Read the marker; `None` if it was never written
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Write the marker, creating parent directories as needed
    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Whether at least `interval` has elapsed since the last refresh
    pub fn is_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        now - self.last_refresh >= interval
    }
}

/// A missing marker always means a refresh is due
pub fn refresh_due(marker: Option<&RefreshMarker>, now: DateTime<Utc>, interval: Duration) -> bool {
    marker.map_or(true, |m| m.is_due(now, interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("ma_enrollment_marker_{}_{}", std::process::id(), name))
            .join("last_refresh.json")
    }

    #[test]
    fn test_store_and_load_round_trip() {
        let path = scratch_path("roundtrip");
        let marker = RefreshMarker::new(Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap());

        marker.store(&path).unwrap();
        let loaded = RefreshMarker::load(&path).unwrap();
        assert_eq!(loaded, Some(marker));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_marker_is_none_and_due() {
        let path = scratch_path("missing");
        assert_eq!(RefreshMarker::load(&path).unwrap(), None);
        assert!(refresh_due(None, Utc::now(), Duration::days(30)));
    }

    #[test]
    fn test_is_due() {
        let last = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let marker = RefreshMarker::new(last);

        assert!(!marker.is_due(last + Duration::days(29), Duration::days(30)));
        assert!(marker.is_due(last + Duration::days(30), Duration::days(30)));
        assert!(refresh_due(Some(&marker), last + Duration::days(31), Duration::days(30)));
    }
}
