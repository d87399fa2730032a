// ==========================================
// PV PAN Tool - Domain type definitions
// ==========================================
// Closed enumerations shared across layers.
// Serialization format: snake_case strings (aligned with the database)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Cell technology
// ==========================================
// Mapped from the vendor "Technol" string through an explicit table;
// unmatched strings stay Unknown, the raw string is kept on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Monocrystalline,
    Polycrystalline,
    ThinFilm,
    Cigs,
    CdTe,
    Perc,
    Hjt,
    Ibc,
    Unknown,
}

impl CellType {
    /// Map a raw vendor technology string to a cell type.
    ///
    /// The table covers the PVsyst-style `mt*` codes plus a few spelled-out
    /// variants seen in the wild. Matching is case-insensitive.
    pub fn from_technology(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mtsimono" | "mono" | "monocrystalline" => CellType::Monocrystalline,
            "mtsipoly" | "poly" | "polycrystalline" => CellType::Polycrystalline,
            "mtcis" | "cis" | "cigs" => CellType::Cigs,
            "mtcdte" | "cdte" => CellType::CdTe,
            "mtamorphous" | "thinfilm" | "thin_film" => CellType::ThinFilm,
            "perc" => CellType::Perc,
            "hjt" | "heterojunction" => CellType::Hjt,
            "ibc" => CellType::Ibc,
            _ => CellType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Monocrystalline => "monocrystalline",
            CellType::Polycrystalline => "polycrystalline",
            CellType::ThinFilm => "thin_film",
            CellType::Cigs => "cigs",
            CellType::CdTe => "cdte",
            CellType::Perc => "perc",
            CellType::Hjt => "hjt",
            CellType::Ibc => "ibc",
            CellType::Unknown => "unknown",
        }
    }

    /// Parse the database representation back into the enum.
    pub fn from_str_tag(tag: &str) -> Self {
        match tag {
            "monocrystalline" => CellType::Monocrystalline,
            "polycrystalline" => CellType::Polycrystalline,
            "thin_film" => CellType::ThinFilm,
            "cigs" => CellType::Cigs,
            "cdte" => CellType::CdTe,
            "perc" => CellType::Perc,
            "hjt" => CellType::Hjt,
            "ibc" => CellType::Ibc,
            _ => CellType::Unknown,
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// Module construction type
// ==========================================
// Bifacial is promoted from a positive bifaciality factor at assembly time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    Standard,
    Bifacial,
    GlassGlass,
    Flexible,
    Unknown,
}

impl ModuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleType::Standard => "standard",
            ModuleType::Bifacial => "bifacial",
            ModuleType::GlassGlass => "glass_glass",
            ModuleType::Flexible => "flexible",
            ModuleType::Unknown => "unknown",
        }
    }

    pub fn from_str_tag(tag: &str) -> Self {
        match tag {
            "standard" => ModuleType::Standard,
            "bifacial" => ModuleType::Bifacial,
            "glass_glass" => ModuleType::GlassGlass,
            "flexible" => ModuleType::Flexible,
            _ => ModuleType::Unknown,
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// Warning severity
// ==========================================
// Note: tokenizer-level skip (unparseable line, ignored duplicate key).
// Warning: dropped field/series or flagged out-of-bounds value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    Note,
    Warning,
}

impl fmt::Display for WarningSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningSeverity::Note => write!(f, "note"),
            WarningSeverity::Warning => write!(f, "warning"),
        }
    }
}

// ==========================================
// Sort direction
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}
