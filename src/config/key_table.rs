// ==========================================
// PV PAN Tool - Candidate-key tables
// ==========================================
// Single home of "which raw spellings map to which canonical field".
// Extending a field with a new vendor spelling is a table row in the
// configuration, never a code branch.
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ==========================================
// CanonicalField - normalized field identity
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Manufacturer,
    Model,
    DataSource,
    PmaxStc,
    VmpStc,
    ImpStc,
    VocStc,
    IscStc,
    TempCoeffPmax,
    TempCoeffVoc,
    TempCoeffIsc,
    GRef,
    TRef,
    Noct,
    BypassDiodes,
    MaxSystemVoltage,
    RSeries,
    RShunt,
    BifacialityFactor,
    Width,
    Height,
    Thickness,
    Weight,
    CellsInSeries,
    CellsInParallel,
    Technology,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Manufacturer => "manufacturer",
            CanonicalField::Model => "model",
            CanonicalField::DataSource => "data_source",
            CanonicalField::PmaxStc => "pmax_stc",
            CanonicalField::VmpStc => "vmp_stc",
            CanonicalField::ImpStc => "imp_stc",
            CanonicalField::VocStc => "voc_stc",
            CanonicalField::IscStc => "isc_stc",
            CanonicalField::TempCoeffPmax => "temp_coeff_pmax",
            CanonicalField::TempCoeffVoc => "temp_coeff_voc",
            CanonicalField::TempCoeffIsc => "temp_coeff_isc",
            CanonicalField::GRef => "g_ref",
            CanonicalField::TRef => "t_ref",
            CanonicalField::Noct => "noct",
            CanonicalField::BypassDiodes => "bypass_diodes",
            CanonicalField::MaxSystemVoltage => "max_system_voltage",
            CanonicalField::RSeries => "r_series",
            CanonicalField::RShunt => "r_shunt",
            CanonicalField::BifacialityFactor => "bifaciality_factor",
            CanonicalField::Width => "width_mm",
            CanonicalField::Height => "height_mm",
            CanonicalField::Thickness => "thickness_mm",
            CanonicalField::Weight => "weight_kg",
            CanonicalField::CellsInSeries => "cells_in_series",
            CanonicalField::CellsInParallel => "cells_in_parallel",
            CanonicalField::Technology => "technology",
        }
    }

    /// Resolve a canonical field from its snake_case name (used when
    /// merging configuration extensions).
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_FIELDS.iter().copied().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub const ALL_FIELDS: &[CanonicalField] = &[
    CanonicalField::Manufacturer,
    CanonicalField::Model,
    CanonicalField::DataSource,
    CanonicalField::PmaxStc,
    CanonicalField::VmpStc,
    CanonicalField::ImpStc,
    CanonicalField::VocStc,
    CanonicalField::IscStc,
    CanonicalField::TempCoeffPmax,
    CanonicalField::TempCoeffVoc,
    CanonicalField::TempCoeffIsc,
    CanonicalField::GRef,
    CanonicalField::TRef,
    CanonicalField::Noct,
    CanonicalField::BypassDiodes,
    CanonicalField::MaxSystemVoltage,
    CanonicalField::RSeries,
    CanonicalField::RShunt,
    CanonicalField::BifacialityFactor,
    CanonicalField::Width,
    CanonicalField::Height,
    CanonicalField::Thickness,
    CanonicalField::Weight,
    CanonicalField::CellsInSeries,
    CanonicalField::CellsInParallel,
    CanonicalField::Technology,
];

// ==========================================
// Default spellings (PVsyst dialect + common variants)
// ==========================================
// Order within a list is the declared acceptance order; resolution
// against a file is still first-match-in-file-order.
fn default_spellings(field: CanonicalField) -> &'static [&'static str] {
    match field {
        CanonicalField::Manufacturer => &["Manufacturer", "Producer", "Maker"],
        CanonicalField::Model => &["Model", "ModuleName", "ModelName"],
        CanonicalField::DataSource => &["DataSource", "Source"],
        CanonicalField::PmaxStc => &["PNom", "Pmax", "PmaxSTC", "NominalPower"],
        CanonicalField::VmpStc => &["Vmp", "Vmpp", "VmpSTC"],
        CanonicalField::ImpStc => &["Imp", "Impp", "ImpSTC"],
        CanonicalField::VocStc => &["Voc", "VocSTC", "OpenCircuitVoltage"],
        CanonicalField::IscStc => &["Isc", "IscSTC", "ShortCircuitCurrent"],
        CanonicalField::TempCoeffPmax => &["muPmpReq", "muPmp", "TkPmax", "GammaPmax"],
        CanonicalField::TempCoeffVoc => &["muVocSpec", "TkVoc", "BetaVoc"],
        CanonicalField::TempCoeffIsc => &["muISC", "TkIsc", "AlphaIsc"],
        CanonicalField::GRef => &["GRef"],
        CanonicalField::TRef => &["TRef"],
        CanonicalField::Noct => &["NOCT", "TNOCT"],
        CanonicalField::BypassDiodes => &["NDiode", "BypassDiodes"],
        CanonicalField::MaxSystemVoltage => &["VMaxIEC", "VMaxUL", "MaxSystemVoltage"],
        CanonicalField::RSeries => &["RSerie", "RSeries", "Rs"],
        CanonicalField::RShunt => &["RShunt", "Rsh"],
        CanonicalField::BifacialityFactor => {
            &["Bifaciality", "BifacialityFactor", "BifIsc", "Bifacial_Factor"]
        }
        CanonicalField::Width => &["Width"],
        CanonicalField::Height => &["Height", "Length"],
        CanonicalField::Thickness => &["Depth", "Thickness"],
        CanonicalField::Weight => &["Weight"],
        CanonicalField::CellsInSeries => &["NCelS", "CellsInSeries"],
        CanonicalField::CellsInParallel => &["NCelP", "CellsInParallel"],
        CanonicalField::Technology => &["Technol", "Technology", "CellTech"],
    }
}

// ==========================================
// KeyTable - resolved lookup structure
// ==========================================
/// Ordered candidate-key table with a normalized reverse index.
///
/// Raw-key matching is whitespace-trimmed and case-insensitive.
#[derive(Debug, Clone)]
pub struct KeyTable {
    // declared table: canonical field -> accepted raw spellings, in order
    rows: Vec<(CanonicalField, Vec<String>)>,
    // normalized raw key -> canonical field
    index: HashMap<String, CanonicalField>,
}

impl KeyTable {
    /// Build the default table, optionally extended with extra spellings
    /// per canonical field (from configuration). Extra spellings are
    /// appended after the defaults and never override an existing mapping.
    pub fn with_extensions(extensions: &HashMap<String, Vec<String>>) -> Self {
        let mut rows = Vec::with_capacity(ALL_FIELDS.len());
        for &field in ALL_FIELDS {
            let mut spellings: Vec<String> = default_spellings(field)
                .iter()
                .map(|s| s.to_string())
                .collect();
            if let Some(extra) = extensions.get(field.as_str()) {
                spellings.extend(extra.iter().cloned());
            }
            rows.push((field, spellings));
        }

        let mut index = HashMap::new();
        for (field, spellings) in &rows {
            for spelling in spellings {
                index.entry(normalize_key(spelling)).or_insert(*field);
            }
        }

        Self { rows, index }
    }

    /// Look up the canonical field for a raw key.
    pub fn resolve(&self, raw_key: &str) -> Option<CanonicalField> {
        self.index.get(&normalize_key(raw_key)).copied()
    }

    /// Declared acceptance rows (for diagnostics and tests).
    pub fn rows(&self) -> &[(CanonicalField, Vec<String>)] {
        &self.rows
    }
}

impl Default for KeyTable {
    fn default() -> Self {
        Self::with_extensions(&HashMap::new())
    }
}

/// Trim + lowercase; the only key normalization applied anywhere.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_case_insensitive_and_trimmed() {
        let table = KeyTable::default();
        assert_eq!(table.resolve("  pnom "), Some(CanonicalField::PmaxStc));
        assert_eq!(table.resolve("BIFACIALITY"), Some(CanonicalField::BifacialityFactor));
        assert_eq!(table.resolve("BifIsc"), Some(CanonicalField::BifacialityFactor));
        assert_eq!(table.resolve("NoSuchKey"), None);
    }

    #[test]
    fn test_extensions_append_without_overriding() {
        let mut ext = HashMap::new();
        ext.insert("pmax_stc".to_string(), vec!["WattPeak".to_string()]);
        // a spelling already owned by another field must keep its owner
        ext.insert("voc_stc".to_string(), vec!["PNom".to_string()]);

        let table = KeyTable::with_extensions(&ext);
        assert_eq!(table.resolve("WattPeak"), Some(CanonicalField::PmaxStc));
        assert_eq!(table.resolve("PNom"), Some(CanonicalField::PmaxStc));
    }

    #[test]
    fn test_every_field_has_spellings() {
        let table = KeyTable::default();
        assert_eq!(table.rows().len(), ALL_FIELDS.len());
        for (field, spellings) in table.rows() {
            assert!(!spellings.is_empty(), "no spellings for {}", field);
        }
    }
}
