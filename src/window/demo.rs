//! Deterministic synthetic window used when live data is unavailable

use super::assembler::LoadedPeriods;
use crate::period::Period;
use crate::schema::{DirectoryRecord, EnrollmentRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

pub const DEMO_SEED: u64 = 42;

const PARENTS: [(&str, &[&str]); 8] = [
    ("UnitedHealth Group", &["H0001", "H0002", "H0003"]),
    ("Humana", &["H0010", "H0011"]),
    ("CVS / Aetna", &["H0020", "H0021"]),
    ("Elevance Health", &["H0030"]),
    ("Kaiser Permanente", &["H0040", "H0041"]),
    ("Centene", &["H0050"]),
    ("Molina Healthcare", &["H0060"]),
    ("BCBS Plans", &["H0070", "H0071"]),
];

const GEOGRAPHY: [(&str, &[&str]); 10] = [
    ("CA", &["Los Angeles", "San Diego", "Orange", "Riverside"]),
    ("TX", &["Harris", "Dallas", "Tarrant", "Bexar"]),
    ("FL", &["Miami-Dade", "Broward", "Palm Beach", "Hillsborough"]),
    ("NY", &["New York", "Kings", "Queens", "Bronx"]),
    ("PA", &["Philadelphia", "Allegheny", "Montgomery"]),
    ("OH", &["Franklin", "Cuyahoga", "Hamilton"]),
    ("IL", &["Cook", "DuPage", "Lake"]),
    ("NC", &["Mecklenburg", "Wake", "Guilford"]),
    ("GA", &["Fulton", "Gwinnett", "DeKalb"]),
    ("MI", &["Wayne", "Oakland", "Macomb"]),
];

/// Plan type and the Plan_ID it is filed under, one plan per type per contract
const PLANS: [(&str, &str); 2] = [("HMO", "001"), ("PPO", "002")];

/// Monthly drift bounds; centred slightly above zero so the demo trends up
const DRIFT_LOW: f64 = -0.021;
const DRIFT_HIGH: f64 = 0.027;
const FLOOR: u64 = 50;

struct Cell {
    state: &'static str,
    county: &'static str,
    parent: &'static str,
    contract: &'static str,
    plan_type: &'static str,
    plan_id: &'static str,
    enrollment: u64,
}

fn org_name(parent: &str, contract: &str) -> String {
    format!("{} - {}", parent, contract)
}

/// Synthetic enrollment for the given periods plus its plan directory
///
/// The same periods always produce the same rows. Periods are generated
/// oldest first so each month drifts from the previous one.
pub fn demo_window(periods: &[Period]) -> (LoadedPeriods, Vec<DirectoryRecord>) {
    let mut rng = StdRng::seed_from_u64(DEMO_SEED);

    let mut cells = Vec::new();
    for (state, counties) in GEOGRAPHY {
        for &county in counties {
            for (parent, contracts) in PARENTS {
                for &contract in contracts {
                    for (plan_type, plan_id) in PLANS {
                        cells.push(Cell {
                            state,
                            county,
                            parent,
                            contract,
                            plan_type,
                            plan_id,
                            enrollment: rng.gen_range(300..12_000),
                        });
                    }
                }
            }
        }
    }

    let mut ordered: Vec<Period> = periods.to_vec();
    ordered.sort();
    ordered.dedup();

    let loaded = ordered
        .into_iter()
        .map(|period| {
            let rows = cells
                .iter_mut()
                .map(|cell| {
                    let drift = 1.0 + rng.gen_range(DRIFT_LOW..DRIFT_HIGH);
                    cell.enrollment = ((cell.enrollment as f64 * drift) as u64).max(FLOOR);
                    EnrollmentRecord {
                        contract_id: cell.contract.to_string(),
                        plan_id: cell.plan_id.to_string(),
                        org_name: org_name(cell.parent, cell.contract),
                        state: cell.state.to_string(),
                        county: cell.county.to_string(),
                        plan_type: cell.plan_type.to_string(),
                        enrollment: Some(cell.enrollment),
                        period,
                    }
                })
                .collect();
            (period, Arc::new(rows))
        })
        .collect();

    (loaded, demo_directory())
}

pub fn demo_directory() -> Vec<DirectoryRecord> {
    PARENTS
        .iter()
        .flat_map(|(parent, contracts)| {
            contracts.iter().map(move |contract| DirectoryRecord {
                contract_id: contract.to_string(),
                org_name: org_name(parent, contract),
                parent_org: parent.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::write_dataset;
    use crate::schema::normalize_enrollment;
    use crate::window::merger::{merge_directory, INDEPENDENT_SENTINEL};
    use crate::window::WindowDataset;
    use std::collections::{BTreeSet, HashSet};

    fn periods() -> Vec<Period> {
        (1..=12).map(|m| Period::new(2024, m).unwrap()).collect()
    }

    #[test]
    fn test_demo_is_deterministic() {
        let (a, _) = demo_window(&periods());
        let (b, _) = demo_window(&periods());
        assert_eq!(a.len(), 12);
        for ((pa, ra), (pb, rb)) in a.iter().zip(b.iter()) {
            assert_eq!(pa, pb);
            assert_eq!(ra, rb);
        }
    }

    #[test]
    fn test_demo_shape() {
        let (loaded, directory) = demo_window(&periods());
        assert_eq!(directory.len(), 14);

        let dataset = merge_directory(&loaded, &directory);
        let parents: BTreeSet<&str> = dataset.records.iter().map(|r| r.parent_org.as_str()).collect();
        let states: BTreeSet<&str> = dataset.records.iter().map(|r| r.state.as_str()).collect();

        assert_eq!(parents.len(), 8);
        assert!(!parents.contains(INDEPENDENT_SENTINEL));
        assert_eq!(states.len(), 10);
        assert_eq!(dataset.periods, periods());
        assert!(dataset.records.iter().all(|r| r.enrollment.unwrap_or(0) >= FLOOR));
    }

    #[test]
    fn test_demo_record_keys_unique() {
        let (loaded, _) = demo_window(&periods());
        let mut seen = HashSet::new();
        for (_, rows) in &loaded {
            for row in rows.iter() {
                assert!(seen.insert(row.key()), "duplicate demo key {:?}", row.key());
            }
        }
        let plan_ids: BTreeSet<&str> = loaded[0].1.iter().map(|r| r.plan_id.as_str()).collect();
        assert_eq!(plan_ids.into_iter().collect::<Vec<_>>(), vec!["001", "002"]);
    }

    #[test]
    fn test_demo_rows_survive_export_and_renormalize() {
        let (loaded, directory) = demo_window(&periods());
        let dataset = merge_directory(&loaded, &directory);
        let latest = dataset.latest_period().unwrap();
        let rows: Vec<_> = dataset.records_for(latest).cloned().collect();

        let mut buf = Vec::new();
        write_dataset(&mut buf, &WindowDataset::from_records(rows.clone())).unwrap();
        let reread = normalize_enrollment(&buf, latest).unwrap();

        assert_eq!(reread.records.len(), rows.len());
        assert_eq!(reread.quality.duplicate_keys, 0);
    }
}
