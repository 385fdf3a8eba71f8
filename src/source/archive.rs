//! Zip archive extraction
//!
//! CMS ships each monthly file as a zip holding one CSV (occasionally with
//! macOS resource forks or a spreadsheet alongside).

use crate::error::{PipelineError, Result};
use log::debug;
use std::io::{Cursor, Read};

/// Largest member read out of an archive; CMS CPSC files are well under this
pub const MAX_MEMBER_BYTES: u64 = 1 << 30;

/// One tabular member of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePayload {
    pub name: String,
    pub bytes: Vec<u8>,
}

fn is_junk(name: &str) -> bool {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    name.contains("__MACOSX") || file_name.starts_with('.') || file_name.is_empty()
}

fn is_csv(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".csv")
}

/// Extract every CSV member, in archive order
///
/// Fails with `CorruptArchive` if the bytes are not a readable zip.
pub fn extract_tables(bytes: &[u8]) -> Result<Vec<TablePayload>> {
    extract_tables_limited(bytes, MAX_MEMBER_BYTES)
}

/// As `extract_tables`, rejecting any member that inflates past `limit` bytes
///
/// The declared member size is not trusted for allocation.
pub fn extract_tables_limited(bytes: &[u8], limit: u64) -> Result<Vec<TablePayload>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PipelineError::CorruptArchive(e.to_string()))?;

    let mut tables = Vec::new();
    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .map_err(|e| PipelineError::CorruptArchive(e.to_string()))?;

        let name = member.name().to_string();
        if member.is_dir() || is_junk(&name) {
            continue;
        }
        if !is_csv(&name) {
            debug!("Skipping non-CSV archive member {}", name);
            continue;
        }

        let mut buf = Vec::new();
        (&mut member)
            .take(limit.saturating_add(1))
            .read_to_end(&mut buf)
            .map_err(|e| PipelineError::CorruptArchive(format!("{}: {}", name, e)))?;
        if buf.len() as u64 > limit {
            return Err(PipelineError::CorruptArchive(format!(
                "{}: member exceeds {} bytes",
                name, limit
            )));
        }
        tables.push(TablePayload { name, bytes: buf });
    }

    Ok(tables)
}

/// Choose the member to normalize: first one whose name contains `hint`
/// (case-insensitive), otherwise the first table
pub fn pick_table(tables: Vec<TablePayload>, hint: &str) -> Option<TablePayload> {
    let hint = hint.to_ascii_lowercase();
    let preferred = tables
        .iter()
        .position(|t| !hint.is_empty() && t.name.to_ascii_lowercase().contains(&hint));
    let index = preferred.unwrap_or(0);
    tables.into_iter().nth(index)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build an in-memory zip from (name, contents) pairs
    pub(crate) fn build_zip(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, contents) in members {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extracts_csv_members_in_order() {
        let bytes = build_zip(&[
            ("a.csv", b"x,y\n1,2\n"),
            ("b.CSV", b"z\n3\n"),
        ]);
        let tables = extract_tables(&bytes).unwrap();

        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "a.csv");
        assert_eq!(tables[0].bytes, b"x,y\n1,2\n");
        assert_eq!(tables[1].name, "b.CSV");
    }

    #[test]
    fn test_skips_junk_and_non_csv() {
        let bytes = build_zip(&[
            ("__MACOSX/", b""),
            ("__MACOSX/._data.csv", b"junk"),
            (".hidden.csv", b"junk"),
            ("readme.txt", b"notes"),
            ("nested/", b""),
            ("nested/CPSC_Enrollment_Info_2024_01.csv", b"h\n1\n"),
        ]);
        let tables = extract_tables(&bytes).unwrap();

        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "nested/CPSC_Enrollment_Info_2024_01.csv");
    }

    #[test]
    fn test_corrupt_archive() {
        let err = extract_tables(b"<html>not a zip</html>").unwrap_err();
        assert!(matches!(err, PipelineError::CorruptArchive(_)));
    }

    #[test]
    fn test_oversized_member_rejected() {
        let bytes = build_zip(&[("big.csv", &[b'x'; 64])]);

        let err = extract_tables_limited(&bytes, 16).unwrap_err();
        assert!(matches!(err, PipelineError::CorruptArchive(ref m) if m.contains("big.csv")));

        let tables = extract_tables_limited(&bytes, 64).unwrap();
        assert_eq!(tables[0].bytes.len(), 64);
    }

    #[test]
    fn test_pick_table_prefers_hint() {
        let tables = vec![
            TablePayload { name: "Contract_Info.csv".into(), bytes: vec![1] },
            TablePayload { name: "CPSC_Enrollment.csv".into(), bytes: vec![2] },
        ];
        assert_eq!(pick_table(tables.clone(), "cpsc").unwrap().bytes, vec![2]);
        assert_eq!(pick_table(tables, "missing").unwrap().bytes, vec![1]);
        assert!(pick_table(Vec::new(), "cpsc").is_none());
    }
}
