//! Pre-fetched CMS extracts on local disk
//!
//! A scheduled job can keep monthly files under a data directory:
//!   <root>/cpsc/cpsc-YYYY-MM.csv
//!   <root>/plandir/plan-directory*.csv
//! These are plain CSV (already unzipped) and are read before any download.

use crate::error::Result;
use crate::period::Period;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = "data";

const ENROLLMENT_DIR: &str = "cpsc";
const DIRECTORY_DIR: &str = "plandir";
const DIRECTORY_PREFIX: &str = "plan-directory";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the enrollment extract for `period` is expected
    pub fn enrollment_path(&self, period: Period) -> PathBuf {
        self.root.join(ENROLLMENT_DIR).join(format!("cpsc-{}.csv", period))
    }

    /// Enrollment extract for `period`, if one has been dropped in
    pub fn find_enrollment(&self, period: Period) -> Option<PathBuf> {
        let path = self.enrollment_path(period);
        path.is_file().then_some(path)
    }

    /// Newest plan directory file, by name (names embed the snapshot date)
    pub fn find_directory(&self) -> Result<Option<PathBuf>> {
        let dir = self.root.join(DIRECTORY_DIR);
        if !dir.is_dir() {
            return Ok(None);
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(DIRECTORY_PREFIX)
                && name.to_ascii_lowercase().ends_with(".csv")
                && entry.path().is_file()
            {
                names.push(name);
            }
        }
        names.sort();
        Ok(names.pop().map(|name| dir.join(name)))
    }

    pub fn read(path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }
}
