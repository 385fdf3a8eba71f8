//! Canonical record types for both source families

use crate::period::Period;
use serde::{Deserialize, Serialize};

/// One CPSC row: enrollment for a contract/plan in a county for a month
///
/// Field names serialize to the canonical column names so exports can be fed
/// straight back through the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    #[serde(rename = "Contract_ID")]
    pub contract_id: String,
    #[serde(rename = "Plan_ID")]
    pub plan_id: String,
    #[serde(rename = "Org_Name")]
    pub org_name: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "County")]
    pub county: String,
    #[serde(rename = "Plan_Type")]
    pub plan_type: String,
    /// Absent when the source value was masked, malformed or negative
    #[serde(rename = "Enrollment")]
    pub enrollment: Option<u64>,
    #[serde(rename = "Period")]
    pub period: Period,
}

/// Composite identity of an enrollment row within a period
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnrollmentKey {
    pub contract_id: String,
    pub plan_id: String,
    pub county: String,
    pub period: Period,
}

impl EnrollmentRecord {
    pub fn key(&self) -> EnrollmentKey {
        EnrollmentKey {
            contract_id: self.contract_id.clone(),
            plan_id: self.plan_id.clone(),
            county: self.county.clone(),
            period: self.period,
        }
    }

    /// Enrollment contribution to sums (absent counts as zero)
    pub fn enrolled(&self) -> u64 {
        self.enrollment.unwrap_or(0)
    }
}

/// One plan directory row mapping a contract to its parent organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    #[serde(rename = "Contract_ID")]
    pub contract_id: String,
    #[serde(rename = "Org_Name")]
    pub org_name: String,
    #[serde(rename = "Parent_Org")]
    pub parent_org: String,
}
