// ==========================================
// PV PAN Tool - Module comparison
// ==========================================
// Side-by-side comparison of 2..=10 selected records. Each parameter
// carries a polarity (higher- or lower-is-better); best values are
// designated per parameter with joint-best ties, and every present
// value gets its percentage deviation from the best.
// ==========================================

use crate::domain::module::ModuleRecord;
use crate::repository::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};

pub const MIN_COMPARE: usize = 2;
pub const MAX_COMPARE: usize = 10;

// ==========================================
// Polarity table
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

struct CompareParameter {
    key: &'static str,
    polarity: Polarity,
    extract: fn(&ModuleRecord) -> Option<f64>,
}

/// The per-parameter orientation table. Extending the comparison is a
/// row here, not new branching.
const COMPARE_PARAMETERS: &[CompareParameter] = &[
    CompareParameter {
        key: "pmax_stc",
        polarity: Polarity::HigherIsBetter,
        extract: |r| r.electrical.pmax_stc,
    },
    CompareParameter {
        key: "efficiency_stc",
        polarity: Polarity::HigherIsBetter,
        extract: |r| r.efficiency_stc,
    },
    CompareParameter {
        key: "voc_stc",
        polarity: Polarity::HigherIsBetter,
        extract: |r| r.electrical.voc_stc,
    },
    CompareParameter {
        key: "isc_stc",
        polarity: Polarity::HigherIsBetter,
        extract: |r| r.electrical.isc_stc,
    },
    CompareParameter {
        key: "bifaciality_factor",
        polarity: Polarity::HigherIsBetter,
        extract: |r| r.electrical.bifaciality_factor,
    },
    CompareParameter {
        key: "power_density",
        polarity: Polarity::HigherIsBetter,
        extract: |r| r.power_density,
    },
    // Stored as a magnitude: a smaller power loss per degree wins.
    CompareParameter {
        key: "temp_coeff_pmax",
        polarity: Polarity::LowerIsBetter,
        extract: |r| r.electrical.temp_coeff_pmax,
    },
    CompareParameter {
        key: "weight_kg",
        polarity: Polarity::LowerIsBetter,
        extract: |r| r.physical.weight_kg,
    },
    CompareParameter {
        key: "thickness_mm",
        polarity: Polarity::LowerIsBetter,
        extract: |r| r.physical.thickness_mm,
    },
];

// ==========================================
// Result structures
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterComparison {
    pub key: String,
    pub polarity: Polarity,
    /// One entry per compared module, in selection order.
    pub values: Vec<Option<f64>>,
    /// Indices into the selection that hold the best value (ties are
    /// all listed: joint best).
    pub best: Vec<usize>,
    /// Percentage deviation from the best value; 0 for the best, None
    /// for absent values or a zero best.
    pub deviation_pct: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub module_ids: Vec<String>,
    pub parameters: Vec<ParameterComparison>,
}

// ==========================================
// Comparison
// ==========================================
/// Compare the given records. The caller resolves ids to records; this
/// function only checks the selection size.
pub fn compare_records(records: &[ModuleRecord]) -> StoreResult<ComparisonResult> {
    if records.len() < MIN_COMPARE || records.len() > MAX_COMPARE {
        return Err(StoreError::InvalidSelection(format!(
            "comparison needs {} to {} modules, got {}",
            MIN_COMPARE,
            MAX_COMPARE,
            records.len()
        )));
    }

    let module_ids = records.iter().map(|r| r.unique_id.clone()).collect();
    let parameters = COMPARE_PARAMETERS
        .iter()
        .map(|param| compare_parameter(param, records))
        .collect();

    Ok(ComparisonResult {
        module_ids,
        parameters,
    })
}

fn compare_parameter(param: &CompareParameter, records: &[ModuleRecord]) -> ParameterComparison {
    let values: Vec<Option<f64>> = records.iter().map(|r| (param.extract)(r)).collect();

    let best_value = values.iter().flatten().copied().fold(None, |acc: Option<f64>, v| {
        Some(match (acc, param.polarity) {
            (None, _) => v,
            (Some(best), Polarity::HigherIsBetter) => best.max(v),
            (Some(best), Polarity::LowerIsBetter) => best.min(v),
        })
    });

    let best: Vec<usize> = match best_value {
        Some(best_value) => values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == Some(best_value))
            .map(|(i, _)| i)
            .collect(),
        None => Vec::new(),
    };

    let deviation_pct = values
        .iter()
        .map(|v| match (v, best_value) {
            (Some(v), Some(best)) if best != 0.0 => Some((v / best - 1.0) * 100.0),
            _ => None,
        })
        .collect();

    ParameterComparison {
        key: param.key.to_string(),
        polarity: param.polarity,
        values,
        best,
        deviation_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::module::{ElectricalParameters, FileMetadata, PhysicalParameters};
    use crate::domain::types::{CellType, ModuleType};
    use chrono::Utc;

    fn record(id: &str, pmax: Option<f64>, weight: Option<f64>) -> ModuleRecord {
        ModuleRecord {
            unique_id: id.to_string(),
            manufacturer: "M".into(),
            model: id.to_string(),
            electrical: ElectricalParameters {
                pmax_stc: pmax,
                ..Default::default()
            },
            physical: PhysicalParameters {
                weight_kg: weight,
                ..Default::default()
            },
            cell_type: CellType::Unknown,
            module_type: ModuleType::Standard,
            technology: None,
            area_m2: None,
            efficiency_stc: None,
            power_density: None,
            curves: Vec::new(),
            metadata: FileMetadata {
                file_path: format!("/{}.pan", id),
                file_name: format!("{}.pan", id),
                file_size: 1,
                file_hash: "hash".into(),
                last_modified: Utc::now(),
                parsed_at: Utc::now(),
            },
        }
    }

    fn find<'a>(result: &'a ComparisonResult, key: &str) -> &'a ParameterComparison {
        result.parameters.iter().find(|p| p.key == key).unwrap()
    }

    #[test]
    fn test_selection_size_bounds() {
        let one = vec![record("a", Some(1.0), None)];
        assert!(matches!(
            compare_records(&one),
            Err(StoreError::InvalidSelection(_))
        ));

        let eleven: Vec<ModuleRecord> = (0..11)
            .map(|i| record(&format!("m{}", i), Some(1.0), None))
            .collect();
        assert!(matches!(
            compare_records(&eleven),
            Err(StoreError::InvalidSelection(_))
        ));
    }

    #[test]
    fn test_highest_power_is_best_with_deviation() {
        let records = vec![
            record("a", Some(550.0), None),
            record("b", Some(500.0), None),
            record("c", Some(440.0), None),
        ];
        let result = compare_records(&records).unwrap();
        let power = find(&result, "pmax_stc");
        assert_eq!(power.best, vec![0]);
        assert_eq!(power.deviation_pct[0], Some(0.0));
        let dev_b = power.deviation_pct[1].unwrap();
        assert!((dev_b - (-9.0909)).abs() < 0.001);
        let dev_c = power.deviation_pct[2].unwrap();
        assert!((dev_c - (-20.0)).abs() < 1e-9);
    }

    #[test]
    fn test_lower_is_better_for_weight() {
        let records = vec![
            record("a", None, Some(28.0)),
            record("b", None, Some(25.0)),
        ];
        let result = compare_records(&records).unwrap();
        let weight = find(&result, "weight_kg");
        assert_eq!(weight.best, vec![1]);
        let dev_a = weight.deviation_pct[0].unwrap();
        assert!((dev_a - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_joint_best_ties() {
        let records = vec![
            record("a", Some(500.0), None),
            record("b", Some(500.0), None),
            record("c", Some(450.0), None),
        ];
        let result = compare_records(&records).unwrap();
        let power = find(&result, "pmax_stc");
        assert_eq!(power.best, vec![0, 1]);
    }

    #[test]
    fn test_absent_values_never_best() {
        let records = vec![
            record("a", None, None),
            record("b", Some(400.0), None),
        ];
        let result = compare_records(&records).unwrap();
        let power = find(&result, "pmax_stc");
        assert_eq!(power.best, vec![1]);
        assert_eq!(power.deviation_pct[0], None);

        let weight = find(&result, "weight_kg");
        assert!(weight.best.is_empty());
    }
}
