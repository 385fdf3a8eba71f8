//! Data-quality counters collected during normalization

use serde::Serialize;

/// Non-fatal problems found while normalizing a payload
///
/// Counts rather than per-row entries: a single CPSC file can contain
/// hundreds of thousands of masked values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataQuality {
    /// Data rows read after the header
    pub rows_read: usize,
    /// Rows replaced by a later row with the same composite key
    pub duplicate_keys: usize,
    /// Non-empty enrollment values coerced to absent
    pub coerced_values: usize,
    /// Rows dropped because they had no contract identifier
    pub skipped_rows: usize,
}

impl DataQuality {
    pub fn merge(&mut self, other: &DataQuality) {
        self.rows_read += other.rows_read;
        self.duplicate_keys += other.duplicate_keys;
        self.coerced_values += other.coerced_values;
        self.skipped_rows += other.skipped_rows;
    }

    pub fn is_clean(&self) -> bool {
        self.duplicate_keys == 0 && self.coerced_values == 0 && self.skipped_rows == 0
    }

    /// Human-readable warnings, one per non-zero counter
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.duplicate_keys > 0 {
            warnings.push(format!(
                "{} duplicate row(s) replaced by a later row with the same key",
                self.duplicate_keys
            ));
        }
        if self.coerced_values > 0 {
            warnings.push(format!(
                "{} enrollment value(s) masked, malformed or negative",
                self.coerced_values
            ));
        }
        if self.skipped_rows > 0 {
            warnings.push(format!("{} row(s) without a contract identifier skipped", self.skipped_rows));
        }
        warnings
    }
}
