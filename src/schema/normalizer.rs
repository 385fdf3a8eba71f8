//! Map source headers onto the canonical schema
//!
//! CMS has renamed columns across file vintages. Headers are folded
//! (trimmed, lower-cased, underscores and runs of whitespace collapsed to a
//! single space) and looked up in a declarative alias table. The canonical
//! names are themselves aliases, so normalizing an export is a no-op.

use super::quality::DataQuality;
use super::records::{DirectoryRecord, EnrollmentKey, EnrollmentRecord};
use crate::error::{PipelineError, Result};
use crate::period::{FileFamily, Period};
use csv::{ByteRecord, ReaderBuilder};
use std::collections::HashMap;

/// Number of leading rows searched for the header (CMS sometimes prepends notes)
const HEADER_SCAN_ROWS: usize = 5;

/// Columns of the canonical schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    ContractId,
    PlanId,
    OrgName,
    State,
    County,
    PlanType,
    Enrollment,
    ParentOrg,
}

impl CanonicalField {
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::ContractId => "Contract_ID",
            CanonicalField::PlanId => "Plan_ID",
            CanonicalField::OrgName => "Org_Name",
            CanonicalField::State => "State",
            CanonicalField::County => "County",
            CanonicalField::PlanType => "Plan_Type",
            CanonicalField::Enrollment => "Enrollment",
            CanonicalField::ParentOrg => "Parent_Org",
        }
    }
}

use CanonicalField::*;

/// Folded source header -> canonical field, enrollment (CPSC) family
pub const ENROLLMENT_ALIASES: &[(&str, CanonicalField)] = &[
    ("contract number", ContractId),
    ("contract id", ContractId),
    ("h number", ContractId),
    ("plan id", PlanId),
    ("plan identifier", PlanId),
    ("organization name", OrgName),
    ("organization marketing name", OrgName),
    ("contract name", OrgName),
    ("org name", OrgName),
    ("state", State),
    ("state code", State),
    ("county", County),
    ("county name", County),
    ("plan type", PlanType),
    ("type of medicare health plan", PlanType),
    ("enrollment", Enrollment),
    ("total enrollment", Enrollment),
    ("enrolled", Enrollment),
];

/// Folded source header -> canonical field, plan directory family
pub const DIRECTORY_ALIASES: &[(&str, CanonicalField)] = &[
    ("h number", ContractId),
    ("contract number", ContractId),
    ("contract id", ContractId),
    ("organization name", OrgName),
    ("contract name", OrgName),
    ("org name", OrgName),
    ("parent organization", ParentOrg),
    ("parent org", ParentOrg),
];

const ENROLLMENT_REQUIRED: &[CanonicalField] = &[ContractId, PlanId, State, County, Enrollment];
const DIRECTORY_REQUIRED: &[CanonicalField] = &[ContractId, ParentOrg];

fn aliases(family: FileFamily) -> &'static [(&'static str, CanonicalField)] {
    match family {
        FileFamily::Enrollment => ENROLLMENT_ALIASES,
        FileFamily::Directory => DIRECTORY_ALIASES,
    }
}

fn required(family: FileFamily) -> &'static [CanonicalField] {
    match family {
        FileFamily::Enrollment => ENROLLMENT_REQUIRED,
        FileFamily::Directory => DIRECTORY_REQUIRED,
    }
}

/// Trim, lower-case, and collapse underscores/whitespace to single spaces
pub fn fold_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Decode a field as UTF-8, falling back to Latin-1 for legacy files
fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.trim().to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect::<String>().trim().to_string(),
    }
}

/// Parse an enrollment count, stripping thousands separators
///
/// Masked (`*`), malformed and negative values are absent.
pub fn parse_enrollment(raw: &str) -> Option<u64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(n) = cleaned.parse::<u64>() {
        return Some(n);
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 => Some(v as u64),
        _ => None,
    }
}

/// Resolved column positions for one payload
#[derive(Debug, Clone, Default)]
struct ColumnMap {
    positions: HashMap<CanonicalField, usize>,
}

impl ColumnMap {
    /// First source column mapping to a field wins
    fn from_header(header: &ByteRecord, family: FileFamily) -> Self {
        let table = aliases(family);
        let mut positions = HashMap::new();
        for (index, raw) in header.iter().enumerate() {
            let folded = fold_header(&decode_field(raw));
            if let Some((_, field)) = table.iter().find(|(alias, _)| *alias == folded) {
                positions.entry(*field).or_insert(index);
            }
        }
        Self { positions }
    }

    fn missing(&self, family: FileFamily) -> Vec<String> {
        required(family)
            .iter()
            .filter(|f| !self.positions.contains_key(*f))
            .map(|f| f.name().to_string())
            .collect()
    }

    fn get(&self, record: &ByteRecord, field: CanonicalField) -> String {
        self.positions
            .get(&field)
            .and_then(|&i| record.get(i))
            .map(decode_field)
            .unwrap_or_default()
    }
}

/// Records produced from one payload plus the problems found on the way
#[derive(Debug, Clone)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub quality: DataQuality,
}

/// Locate the header among the first rows and return its column map with the
/// remaining rows
fn read_rows(bytes: &[u8], family: FileFamily) -> Result<(ColumnMap, Vec<ByteRecord>)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for result in reader.byte_records() {
        rows.push(result?);
    }

    let mut header: Option<(usize, ColumnMap)> = None;
    let mut best: Option<ColumnMap> = None;
    for (index, row) in rows.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let map = ColumnMap::from_header(row, family);
        if map.missing(family).is_empty() {
            header = Some((index, map));
            break;
        }
        let better = best
            .as_ref()
            .map_or(true, |b| map.positions.len() > b.positions.len());
        if better {
            best = Some(map);
        }
    }

    if let Some((index, map)) = header {
        let data = rows.split_off(index + 1);
        return Ok((map, data));
    }

    let missing = best
        .map(|map| map.missing(family))
        .unwrap_or_else(|| required(family).iter().map(|f| f.name().to_string()).collect());
    Err(PipelineError::Normalization { family, missing })
}

/// Normalize a CPSC payload for the given period
///
/// Duplicate (contract, plan, county) keys keep the last row, at the
/// position of the first.
pub fn normalize_enrollment(bytes: &[u8], period: Period) -> Result<Normalized<EnrollmentRecord>> {
    let (columns, rows) = read_rows(bytes, FileFamily::Enrollment)?;
    let mut quality = DataQuality::default();
    let mut records: Vec<EnrollmentRecord> = Vec::with_capacity(rows.len());
    let mut index_by_key: HashMap<EnrollmentKey, usize> = HashMap::new();

    for row in &rows {
        quality.rows_read += 1;
        let contract_id = columns.get(row, ContractId);
        if contract_id.is_empty() {
            quality.skipped_rows += 1;
            continue;
        }

        let raw_enrollment = columns.get(row, Enrollment);
        let enrollment = parse_enrollment(&raw_enrollment);
        if enrollment.is_none() && !raw_enrollment.is_empty() {
            quality.coerced_values += 1;
        }

        let record = EnrollmentRecord {
            contract_id,
            plan_id: columns.get(row, PlanId),
            org_name: columns.get(row, OrgName),
            state: columns.get(row, State),
            county: columns.get(row, County),
            plan_type: columns.get(row, PlanType),
            enrollment,
            period,
        };

        match index_by_key.get(&record.key()) {
            Some(&existing) => {
                quality.duplicate_keys += 1;
                records[existing] = record;
            }
            None => {
                index_by_key.insert(record.key(), records.len());
                records.push(record);
            }
        }
    }

    Ok(Normalized { records, quality })
}

/// Normalize a plan directory payload
///
/// A blank Parent_Org falls back to the row's Org_Name. Duplicate contracts
/// keep the last row.
pub fn normalize_directory(bytes: &[u8]) -> Result<Normalized<DirectoryRecord>> {
    let (columns, rows) = read_rows(bytes, FileFamily::Directory)?;
    let mut quality = DataQuality::default();
    let mut records: Vec<DirectoryRecord> = Vec::with_capacity(rows.len());
    let mut index_by_contract: HashMap<String, usize> = HashMap::new();

    for row in &rows {
        quality.rows_read += 1;
        let contract_id = columns.get(row, ContractId);
        if contract_id.is_empty() {
            quality.skipped_rows += 1;
            continue;
        }

        let org_name = columns.get(row, OrgName);
        let mut parent_org = columns.get(row, ParentOrg);
        if parent_org.is_empty() {
            parent_org = org_name.clone();
        }

        let record = DirectoryRecord {
            contract_id,
            org_name,
            parent_org,
        };

        match index_by_contract.get(&record.contract_id) {
            Some(&existing) => {
                quality.duplicate_keys += 1;
                records[existing] = record;
            }
            None => {
                index_by_contract.insert(record.contract_id.clone(), records.len());
                records.push(record);
            }
        }
    }

    Ok(Normalized { records, quality })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan_2024() -> Period {
        Period::new(2024, 1).unwrap()
    }

    const CPSC: &str = "\
Contract Number,Plan ID,SSA State County Code,FIPS State County Code,State,County,Enrollment,Organization Name,Plan Type
H1234,001,05200,06037,CA,Los Angeles,\"1,250\",Acme Health,HMO
H1234,001,05300,06059,CA,Orange,*,Acme Health,HMO
H1234,002,05200,06037,CA,Los Angeles,-5,Acme Health,PPO
H5678,010,10100,12086,FL,Miami-Dade,abc,Sunshine Care,PPO
";

    #[test]
    fn test_fold_header() {
        assert_eq!(fold_header("  Contract   Number "), "contract number");
        assert_eq!(fold_header("CONTRACT_NUMBER"), "contract number");
        assert_eq!(fold_header("\u{feff}Plan ID"), "plan id");
        assert_eq!(fold_header("Contract_ID"), "contract id");
    }

    #[test]
    fn test_parse_enrollment() {
        assert_eq!(parse_enrollment("1,250"), Some(1250));
        assert_eq!(parse_enrollment(" 42 "), Some(42));
        assert_eq!(parse_enrollment("17.0"), Some(17));
        assert_eq!(parse_enrollment("0"), Some(0));
        assert_eq!(parse_enrollment("*"), None);
        assert_eq!(parse_enrollment("-5"), None);
        assert_eq!(parse_enrollment("3.5"), None);
        assert_eq!(parse_enrollment(""), None);
        assert_eq!(parse_enrollment("n/a"), None);
    }

    #[test]
    fn test_normalizes_cpsc_rows() {
        let result = normalize_enrollment(CPSC.as_bytes(), jan_2024()).unwrap();

        assert_eq!(result.records.len(), 4);
        let first = &result.records[0];
        assert_eq!(first.contract_id, "H1234");
        assert_eq!(first.plan_id, "001");
        assert_eq!(first.org_name, "Acme Health");
        assert_eq!(first.state, "CA");
        assert_eq!(first.county, "Los Angeles");
        assert_eq!(first.plan_type, "HMO");
        assert_eq!(first.enrollment, Some(1250));
        assert_eq!(first.period, jan_2024());

        assert_eq!(result.records[1].enrollment, None);
        assert_eq!(result.quality.coerced_values, 3);
        assert_eq!(result.quality.rows_read, 4);
    }

    #[test]
    fn test_negative_enrollment_is_absent() {
        let csv = "Contract Number,Plan ID,State,County,Enrollment\nH1234,001,TX,Harris,-5\n";
        let result = normalize_enrollment(csv.as_bytes(), jan_2024()).unwrap();

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].contract_id, "H1234");
        assert_eq!(result.records[0].plan_id, "001");
        assert_eq!(result.records[0].enrollment, None);
    }

    #[test]
    fn test_headers_case_and_whitespace_insensitive() {
        let csv = "  CONTRACT NUMBER ,plan_id,STATE,county ,  enrollment\nH1,001,OH,Franklin,12\n";
        let result = normalize_enrollment(csv.as_bytes(), jan_2024()).unwrap();
        assert_eq!(result.records[0].county, "Franklin");
        assert_eq!(result.records[0].enrollment, Some(12));
        // Optional columns default to empty
        assert_eq!(result.records[0].org_name, "");
    }

    #[test]
    fn test_missing_required_columns() {
        let csv = "Contract Number,State,Enrollment\nH1,OH,12\n";
        match normalize_enrollment(csv.as_bytes(), jan_2024()) {
            Err(PipelineError::Normalization { family, missing }) => {
                assert_eq!(family, FileFamily::Enrollment);
                assert_eq!(missing, vec!["Plan_ID".to_string(), "County".to_string()]);
            }
            other => panic!("expected normalization error, got {:?}", other),
        }
    }

    #[test]
    fn test_note_rows_before_header_skipped() {
        let csv = "Monthly enrollment by CPSC\nSource: CMS\nContract Number,Plan ID,State,County,Enrollment\nH1,001,GA,Fulton,99\n";
        let result = normalize_enrollment(csv.as_bytes(), jan_2024()).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].enrollment, Some(99));
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let csv = "\
Contract Number,Plan ID,State,County,Enrollment
H1,001,GA,Fulton,10
H2,001,GA,Fulton,20
H1,001,GA,Fulton,30
";
        let result = normalize_enrollment(csv.as_bytes(), jan_2024()).unwrap();
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].contract_id, "H1");
        assert_eq!(result.records[0].enrollment, Some(30));
        assert_eq!(result.quality.duplicate_keys, 1);
    }

    #[test]
    fn test_rows_without_contract_skipped() {
        let csv = "Contract Number,Plan ID,State,County,Enrollment\nH1,001,GA,Fulton,10\n,,,Total,10\n";
        let result = normalize_enrollment(csv.as_bytes(), jan_2024()).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.quality.skipped_rows, 1);
    }

    #[test]
    fn test_latin1_fields_decoded() {
        let mut csv = b"Contract Number,Plan ID,State,County,Enrollment\nH1,001,PR,".to_vec();
        csv.extend_from_slice(&[b'A', b'\xf1', b'a', b's', b'c', b'o']);
        csv.extend_from_slice(b",15\n");
        let result = normalize_enrollment(&csv, jan_2024()).unwrap();
        assert_eq!(result.records[0].county, "Añasco");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let first = normalize_enrollment(CPSC.as_bytes(), jan_2024()).unwrap().records;

        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in &first {
            writer.serialize(record).unwrap();
        }
        let canonical = writer.into_inner().unwrap();

        let second = normalize_enrollment(&canonical, jan_2024()).unwrap();
        assert_eq!(second.records, first);
        assert!(second.quality.is_clean());
    }

    #[test]
    fn test_directory_normalization() {
        let csv = "\
Contract Number,Organization Name,Organization Marketing Name,Parent Organization
H1234,Acme Health Plan Inc,Acme,Acme Holdings
H5678,Sunshine Care LLC,Sunshine,
H1234,Acme Health Plan Inc,Acme,Acme Holdings Corp
";
        let result = normalize_directory(csv.as_bytes()).unwrap();
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].parent_org, "Acme Holdings Corp");
        assert_eq!(result.records[1].parent_org, "Sunshine Care LLC");
        assert_eq!(result.quality.duplicate_keys, 1);
    }

    #[test]
    fn test_directory_accepts_h_number() {
        let csv = "H Number,Parent Organization\nH9,Big Parent\n";
        let result = normalize_directory(csv.as_bytes()).unwrap();
        assert_eq!(result.records[0].contract_id, "H9");
        assert_eq!(result.records[0].org_name, "");
    }

    #[test]
    fn test_directory_missing_parent_column() {
        let err = normalize_directory(b"Contract Number,Organization Name\nH1,X\n").unwrap_err();
        assert!(matches!(err, PipelineError::Normalization { family: FileFamily::Directory, .. }));
    }
}
