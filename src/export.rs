//! CSV exports of the filtered dataset, competitive summary and directory

use crate::analytics::CompetitiveRow;
use crate::error::Result;
use crate::schema::DirectoryRecord;
use crate::window::WindowDataset;
use chrono::NaiveDate;
use log::info;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Dataset,
    Competitive,
    Directory,
}

impl ExportKind {
    fn prefix(&self) -> &'static str {
        match self {
            ExportKind::Dataset => "ma_enrollment",
            ExportKind::Competitive => "ma_competitive",
            ExportKind::Directory => "ma_plan_directory",
        }
    }

    /// Date-stamped default file name, e.g. `ma_enrollment_20240315.csv`
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}_{}.csv", self.prefix(), date.format("%Y%m%d"))
    }
}

fn write_rows<W, T>(writer: W, rows: &[T]) -> Result<()>
where
    W: Write,
    T: Serialize,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_dataset<W: Write>(writer: W, dataset: &WindowDataset) -> Result<()> {
    write_rows(writer, &dataset.records)
}

pub fn write_competitive<W: Write>(writer: W, rows: &[CompetitiveRow]) -> Result<()> {
    write_rows(writer, rows)
}

pub fn write_directory<W: Write>(writer: W, records: &[DirectoryRecord]) -> Result<()> {
    write_rows(writer, records)
}

/// Write all three exports into `dir`, returning the paths written
///
/// The directory export is skipped when no directory snapshot is available.
pub fn export_all(
    dir: &Path,
    date: NaiveDate,
    dataset: &WindowDataset,
    competitive: &[CompetitiveRow],
    directory: &[DirectoryRecord],
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let path = dir.join(ExportKind::Dataset.file_name(date));
    write_dataset(fs::File::create(&path)?, dataset)?;
    written.push(path);

    let path = dir.join(ExportKind::Competitive.file_name(date));
    write_competitive(fs::File::create(&path)?, competitive)?;
    written.push(path);

    if !directory.is_empty() {
        let path = dir.join(ExportKind::Directory.file_name(date));
        write_directory(fs::File::create(&path)?, directory)?;
        written.push(path);
    }

    for path in &written {
        info!("Wrote {}", path.display());
    }
    Ok(written)
}
