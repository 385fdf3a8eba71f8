//! Attach parent organizations to enrollment rows

use super::assembler::LoadedPeriods;
use super::dataset::{WindowDataset, WindowRecord};
use crate::schema::{DirectoryRecord, EnrollmentRecord};
use std::collections::HashMap;

/// Parent assigned to contracts the directory does not know
pub const INDEPENDENT_SENTINEL: &str = "Independent / Other";

/// Contract -> parent organization lookup
#[derive(Debug, Clone, Default)]
pub struct DirectoryIndex {
    parents: HashMap<String, String>,
}

impl DirectoryIndex {
    pub fn new(directory: &[DirectoryRecord]) -> Self {
        let parents = directory
            .iter()
            .filter(|d| !d.parent_org.trim().is_empty())
            .map(|d| (d.contract_id.clone(), d.parent_org.trim().to_string()))
            .collect();
        Self { parents }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn parent_of(&self, contract_id: &str) -> &str {
        self.parents
            .get(contract_id)
            .map(String::as_str)
            .unwrap_or(INDEPENDENT_SENTINEL)
    }

    pub fn attach(&self, record: &EnrollmentRecord) -> WindowRecord {
        WindowRecord {
            contract_id: record.contract_id.clone(),
            plan_id: record.plan_id.clone(),
            org_name: record.org_name.clone(),
            parent_org: self.parent_of(&record.contract_id).to_string(),
            state: record.state.clone(),
            county: record.county.clone(),
            plan_type: record.plan_type.clone(),
            enrollment: record.enrollment,
            period: record.period,
        }
    }
}

/// Merge loaded periods with the directory into one window dataset
///
/// An empty directory (not loaded) assigns every row to the sentinel.
pub fn merge_directory(loaded: &LoadedPeriods, directory: &[DirectoryRecord]) -> WindowDataset {
    let index = DirectoryIndex::new(directory);
    let records = loaded
        .iter()
        .flat_map(|(_, rows)| rows.iter())
        .map(|row| index.attach(row))
        .collect();
    WindowDataset::from_records(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;
    use std::sync::Arc;

    fn enrollment(contract: &str, period: Period) -> EnrollmentRecord {
        EnrollmentRecord {
            contract_id: contract.into(),
            plan_id: "001".into(),
            org_name: format!("Org {}", contract),
            state: "CA".into(),
            county: "Orange".into(),
            plan_type: "HMO".into(),
            enrollment: Some(100),
            period,
        }
    }

    fn directory(contract: &str, parent: &str) -> DirectoryRecord {
        DirectoryRecord {
            contract_id: contract.into(),
            org_name: format!("Org {}", contract),
            parent_org: parent.into(),
        }
    }

    #[test]
    fn test_every_row_gets_a_parent() {
        let jan = Period::new(2024, 1).unwrap();
        let loaded: LoadedPeriods = vec![(
            jan,
            Arc::new(vec![enrollment("H1", jan), enrollment("H2", jan), enrollment("H3", jan)]),
        )];
        let dir = vec![directory("H1", "Big Parent"), directory("H3", "  ")];

        let dataset = merge_directory(&loaded, &dir);

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.records[0].parent_org, "Big Parent");
        assert_eq!(dataset.records[1].parent_org, INDEPENDENT_SENTINEL);
        assert_eq!(dataset.records[2].parent_org, INDEPENDENT_SENTINEL);
        assert!(dataset.records.iter().all(|r| !r.parent_org.is_empty()));
    }

    #[test]
    fn test_missing_directory_uses_sentinel() {
        let jan = Period::new(2024, 1).unwrap();
        let feb = Period::new(2024, 2).unwrap();
        let loaded: LoadedPeriods = vec![
            (jan, Arc::new(vec![enrollment("H1", jan)])),
            (feb, Arc::new(vec![enrollment("H1", feb)])),
        ];

        let dataset = merge_directory(&loaded, &[]);

        assert_eq!(dataset.periods, vec![jan, feb]);
        assert!(dataset.records.iter().all(|r| r.parent_org == INDEPENDENT_SENTINEL));
        assert_eq!(dataset.records[0].enrollment, Some(100));
    }
}
