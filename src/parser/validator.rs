// ==========================================
// PV PAN Tool - Validator
// ==========================================
// Physical-quantity invariants, independent of vendor dialect.
// Policy split:
// - bifaciality outside [0,1]: dropped to absent (a stored factor is
//   always a valid fraction or absent)
// - plausibility bounds (positive ratings, positive dimensions):
//   value kept, flagged, never clamped
// - curve series: 4-point / non-negative / monotonic-voltage rule,
//   violating series dropped, point cap enforced
// Validation never aborts the remaining fields of the same file.
// ==========================================

use crate::config::IngestConfig;
use crate::domain::module::{CurveSeries, ParseWarning};
use crate::parser::field_mapper::{CandidateSeries, MappedFields};

/// Minimum points a stored series must have.
pub const MIN_SERIES_POINTS: usize = 4;

pub struct Validator {
    max_points: usize,
    downsample: bool,
}

impl Validator {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            max_points: config.max_points_per_series,
            downsample: config.downsample_oversized_series,
        }
    }

    // ==========================================
    // Field invariants
    // ==========================================
    pub fn validate_fields(&self, fields: &mut MappedFields) -> Vec<ParseWarning> {
        let mut warnings = Vec::new();

        // Bifaciality is the one hard range: out of [0,1] goes absent.
        if let Some(factor) = fields.bifaciality_factor {
            if !(0.0..=1.0).contains(&factor) {
                warnings.push(ParseWarning::warning(
                    "bifaciality_factor",
                    Some(format!("{}", factor)),
                    "outside [0,1], field dropped to absent",
                ));
                fields.bifaciality_factor = None;
            }
        }

        // Plausibility bounds: keep the value, flag it.
        flag_non_positive(&mut warnings, "pmax_stc", fields.pmax_stc);
        flag_non_positive(&mut warnings, "vmp_stc", fields.vmp_stc);
        flag_non_positive(&mut warnings, "imp_stc", fields.imp_stc);
        flag_non_positive(&mut warnings, "voc_stc", fields.voc_stc);
        flag_non_positive(&mut warnings, "isc_stc", fields.isc_stc);
        flag_non_positive(&mut warnings, "r_series", fields.r_series);
        flag_non_positive(&mut warnings, "r_shunt", fields.r_shunt);
        flag_non_positive(&mut warnings, "max_system_voltage", fields.max_system_voltage);
        flag_non_positive(&mut warnings, "width_mm", fields.width_mm);
        flag_non_positive(&mut warnings, "height_mm", fields.height_mm);
        flag_non_positive(&mut warnings, "thickness_mm", fields.thickness_mm);
        flag_non_positive(&mut warnings, "weight_kg", fields.weight_kg);

        if let Some(noct) = fields.noct {
            if !(0.0..=120.0).contains(&noct) {
                warnings.push(ParseWarning::warning(
                    "noct",
                    Some(format!("{}", noct)),
                    "outside plausible range [0,120] °C",
                ));
            }
        }

        for (name, count) in [
            ("bypass_diodes", fields.bypass_diodes),
            ("cells_in_series", fields.cells_in_series),
            ("cells_in_parallel", fields.cells_in_parallel),
        ] {
            if let Some(n) = count {
                if n <= 0 {
                    warnings.push(ParseWarning::warning(
                        name,
                        Some(n.to_string()),
                        "expected a positive count",
                    ));
                }
            }
        }

        warnings
    }

    // ==========================================
    // Series invariants
    // ==========================================
    /// Filter candidate series against the storage rule. Accepted series
    /// are returned; each rejected one leaves a warning naming the label
    /// and the violated invariant.
    pub fn validate_series(
        &self,
        candidates: Vec<CandidateSeries>,
    ) -> (Vec<CurveSeries>, Vec<ParseWarning>) {
        let mut accepted = Vec::new();
        let mut warnings = Vec::new();

        for candidate in candidates {
            let label = candidate.label.clone();
            let mut points = candidate.points;

            if points.len() < MIN_SERIES_POINTS {
                warnings.push(ParseWarning::warning(
                    format!("series '{}'", label),
                    Some(points.len().to_string()),
                    format!("dropped: {} points, minimum is {}", points.len(), MIN_SERIES_POINTS),
                ));
                continue;
            }

            if points
                .iter()
                .any(|p| !p.voltage.is_finite() || !p.current.is_finite())
            {
                warnings.push(ParseWarning::warning(
                    format!("series '{}'", label),
                    None,
                    "dropped: non-finite coordinate",
                ));
                continue;
            }

            if points.iter().any(|p| p.voltage < 0.0 || p.current < 0.0) {
                warnings.push(ParseWarning::warning(
                    format!("series '{}'", label),
                    None,
                    "dropped: negative coordinate",
                ));
                continue;
            }

            if points.windows(2).any(|w| w[1].voltage < w[0].voltage) {
                warnings.push(ParseWarning::warning(
                    format!("series '{}'", label),
                    None,
                    "dropped: voltage not monotonically non-decreasing",
                ));
                continue;
            }

            if points.len() > self.max_points {
                if self.downsample {
                    let original = points.len();
                    points = downsample(points, self.max_points);
                    warnings.push(ParseWarning::note(
                        format!("series '{}'", label),
                        format!("downsampled from {} to {} points", original, points.len()),
                    ));
                } else {
                    warnings.push(ParseWarning::warning(
                        format!("series '{}'", label),
                        Some(points.len().to_string()),
                        format!("dropped: exceeds the {}-point cap", self.max_points),
                    ));
                    continue;
                }
            }

            accepted.push(CurveSeries { label, points });
        }

        (accepted, warnings)
    }
}

fn flag_non_positive(warnings: &mut Vec<ParseWarning>, name: &str, value: Option<f64>) {
    if let Some(v) = value {
        if v <= 0.0 {
            warnings.push(ParseWarning::warning(
                name,
                Some(format!("{}", v)),
                "expected a value > 0 (kept, flagged)",
            ));
        }
    }
}

/// Evenly-strided downsample that always preserves both endpoints; the
/// index mapping is monotonic, so voltage ordering survives.
fn downsample<T: Copy>(points: Vec<T>, target: usize) -> Vec<T> {
    let n = points.len();
    if target >= n || target < 2 {
        return points;
    }
    (0..target)
        .map(|i| points[i * (n - 1) / (target - 1)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::module::CurvePoint;
    use crate::domain::types::WarningSeverity;

    fn validator() -> Validator {
        Validator::new(&IngestConfig::default())
    }

    fn series(label: &str, pts: &[(f64, f64)]) -> CandidateSeries {
        CandidateSeries {
            label: label.to_string(),
            points: pts
                .iter()
                .map(|&(voltage, current)| CurvePoint { voltage, current })
                .collect(),
        }
    }

    #[test]
    fn test_bifaciality_out_of_range_goes_absent() {
        let mut fields = MappedFields {
            bifaciality_factor: Some(70.0), // "70" without percent sign
            ..Default::default()
        };
        let warnings = validator().validate_fields(&mut fields);
        assert_eq!(fields.bifaciality_factor, None);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, WarningSeverity::Warning);
    }

    #[test]
    fn test_non_positive_voc_kept_but_flagged() {
        let mut fields = MappedFields {
            voc_stc: Some(-1.0),
            ..Default::default()
        };
        let warnings = validator().validate_fields(&mut fields);
        assert_eq!(fields.voc_stc, Some(-1.0));
        assert!(warnings.iter().any(|w| w.field == "voc_stc"));
    }

    #[test]
    fn test_short_series_dropped() {
        let (accepted, warnings) =
            validator().validate_series(vec![series("STC", &[(0.0, 10.0), (1.0, 9.0), (2.0, 8.0)])]);
        assert!(accepted.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].reason.contains("minimum is 4"));
    }

    #[test]
    fn test_negative_coordinate_dropped() {
        let (accepted, warnings) = validator().validate_series(vec![series(
            "STC",
            &[(0.0, 10.0), (1.0, -9.0), (2.0, 8.0), (3.0, 7.0)],
        )]);
        assert!(accepted.is_empty());
        assert!(warnings[0].reason.contains("negative"));
    }

    #[test]
    fn test_non_monotonic_voltage_dropped() {
        let (accepted, warnings) = validator().validate_series(vec![series(
            "STC",
            &[(0.0, 10.0), (2.0, 9.0), (1.0, 8.0), (3.0, 7.0)],
        )]);
        assert!(accepted.is_empty());
        assert!(warnings[0].reason.contains("monotonically"));
    }

    #[test]
    fn test_valid_series_accepted() {
        let (accepted, warnings) = validator().validate_series(vec![series(
            "STC",
            &[(0.0, 13.9), (10.0, 13.8), (20.0, 13.5), (30.0, 12.0), (40.0, 9.0)],
        )]);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].points.len(), 5);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_oversized_series_rejected_without_downsampling() {
        let config = IngestConfig {
            max_points_per_series: 10,
            ..Default::default()
        };
        let v = Validator::new(&config);
        let pts: Vec<(f64, f64)> = (0..20).map(|i| (i as f64, 10.0)).collect();
        let (accepted, warnings) = v.validate_series(vec![series("STC", &pts)]);
        assert!(accepted.is_empty());
        assert!(warnings[0].reason.contains("cap"));
    }

    #[test]
    fn test_oversized_series_downsampled_on_request() {
        let config = IngestConfig {
            max_points_per_series: 10,
            downsample_oversized_series: true,
            ..Default::default()
        };
        let v = Validator::new(&config);
        let pts: Vec<(f64, f64)> = (0..20).map(|i| (i as f64, 10.0)).collect();
        let (accepted, warnings) = v.validate_series(vec![series("STC", &pts)]);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].points.len(), 10);
        // endpoints preserved
        assert_eq!(accepted[0].points[0].voltage, 0.0);
        assert_eq!(accepted[0].points[9].voltage, 19.0);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, WarningSeverity::Note);
    }
}
