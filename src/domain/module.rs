// ==========================================
// PV PAN Tool - Module domain model
// ==========================================
// One ModuleRecord per successfully parsed .PAN file.
// Absent vendor values stay None end to end; they are
// never replaced by zero or any other sentinel.
// ==========================================

use crate::domain::types::{CellType, ModuleType, WarningSeverity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ElectricalParameters - STC ratings and coefficients
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElectricalParameters {
    // ===== Standard test conditions =====
    pub pmax_stc: Option<f64>, // Maximum power at STC (W)
    pub vmp_stc: Option<f64>,  // Voltage at maximum power point (V)
    pub imp_stc: Option<f64>,  // Current at maximum power point (A)
    pub voc_stc: Option<f64>,  // Open circuit voltage (V)
    pub isc_stc: Option<f64>,  // Short circuit current (A)

    // ===== Temperature coefficients (%/°C, sign-normalized magnitudes) =====
    pub temp_coeff_pmax: Option<f64>,
    pub temp_coeff_voc: Option<f64>,
    pub temp_coeff_isc: Option<f64>,

    // ===== Reference conditions =====
    pub g_ref: Option<f64>, // Reference irradiance (W/m²)
    pub t_ref: Option<f64>, // Reference temperature (°C)

    // ===== Module configuration =====
    pub noct: Option<f64>,               // Nominal operating cell temperature (°C)
    pub bypass_diodes: Option<i64>,      // Number of bypass diodes
    pub max_system_voltage: Option<f64>, // Maximum system voltage (V)

    // ===== Resistance model =====
    pub r_series: Option<f64>, // Series resistance (Ω)
    pub r_shunt: Option<f64>,  // Shunt resistance (Ω)

    // ===== Bifacial properties =====
    // Fraction in [0,1] or absent. Never inferred from other fields.
    pub bifaciality_factor: Option<f64>,
}

// ==========================================
// PhysicalParameters - mechanical dimensions
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalParameters {
    pub width_mm: Option<f64>,
    pub height_mm: Option<f64>,
    pub thickness_mm: Option<f64>,
    pub weight_kg: Option<f64>,

    pub cells_in_series: Option<i64>,
    pub cells_in_parallel: Option<i64>,
    pub total_cells: Option<i64>, // derived: series × parallel when both present
}

impl PhysicalParameters {
    /// Front surface area in m², when both dimensions are present.
    pub fn area_m2(&self) -> Option<f64> {
        match (self.width_mm, self.height_mm) {
            (Some(w), Some(h)) => Some((w / 1000.0) * (h / 1000.0)),
            _ => None,
        }
    }
}

// ==========================================
// CurvePoint / CurveSeries - raw sample pairs
// ==========================================
// Points are stored exactly as provided by the vendor file.
// Power views are derived on read by consumers, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub voltage: f64, // V
    pub current: f64, // A
}

/// An ordered sequence of (voltage, current) samples under one condition
/// label such as "STC" or "NOCT".
///
/// Storage invariants (enforced by the validator, checked again by tests):
/// at least 4 points, all coordinates ≥ 0, voltage non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSeries {
    pub label: String,
    pub points: Vec<CurvePoint>,
}

impl CurveSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ==========================================
// FileMetadata - identity of the source file
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_hash: String, // SHA-256 hex digest of the content
    pub last_modified: DateTime<Utc>,
    pub parsed_at: DateTime<Utc>,
}

// ==========================================
// ParseWarning - structured soft-fail report
// ==========================================
// Replaces log-and-continue: every recovered problem is a value
// attached to the owning file's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub field: String,             // canonical field, series label, or "line <n>"
    pub raw_value: Option<String>, // offending raw token, when there is one
    pub reason: String,
    pub severity: WarningSeverity,
}

impl ParseWarning {
    pub fn note(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            raw_value: None,
            reason: reason.into(),
            severity: WarningSeverity::Note,
        }
    }

    pub fn warning(
        field: impl Into<String>,
        raw_value: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            raw_value,
            reason: reason.into(),
            severity: WarningSeverity::Warning,
        }
    }
}

// ==========================================
// ModuleRecord - assembled, immutable result
// ==========================================
// Created once per successfully parsed file. Re-parse of an unchanged
// file is a no-op; a changed file replaces the record transactionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    // ===== Identity =====
    pub unique_id: String, // {manufacturer}_{model}_{hash8}
    pub manufacturer: String,
    pub model: String,

    // ===== Parameters =====
    pub electrical: ElectricalParameters,
    pub physical: PhysicalParameters,

    // ===== Technology =====
    pub cell_type: CellType,
    pub module_type: ModuleType,
    pub technology: Option<String>, // raw vendor technology string

    // ===== Derived columns (from present values only) =====
    pub area_m2: Option<f64>,
    pub efficiency_stc: Option<f64>, // %
    pub power_density: Option<f64>,  // W/m²

    // ===== Curve samples =====
    pub curves: Vec<CurveSeries>,

    // ===== Source =====
    pub metadata: FileMetadata,
}

// ==========================================
// ParseOutcome - record plus ordered warnings
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub record: ModuleRecord,
    pub warnings: Vec<ParseWarning>,
}

impl ParseOutcome {
    pub fn has_warnings(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| w.severity == WarningSeverity::Warning)
    }
}
