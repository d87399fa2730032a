// ==========================================
// PV PAN Tool - Aggregate statistics
// ==========================================
// Count / mean / min / max / percentile, grouped by manufacturer or
// cell type, plus a whole-database overview. Percentiles use linear
// interpolation and are computed here (SQLite has no percentile
// aggregate).
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Grouping
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsGroupBy {
    Manufacturer,
    CellType,
}

impl StatsGroupBy {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            StatsGroupBy::Manufacturer => "manufacturer",
            StatsGroupBy::CellType => "cell_type",
        }
    }
}

impl fmt::Display for StatsGroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

// ==========================================
// Aggregate
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
}

/// Aggregate a value set. The input is sorted in place.
pub fn aggregate(values: &mut Vec<f64>) -> Aggregate {
    if values.is_empty() {
        return Aggregate::default();
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let count = values.len();
    let sum: f64 = values.iter().sum();
    Aggregate {
        count,
        mean: Some(sum / count as f64),
        min: values.first().copied(),
        max: values.last().copied(),
        p50: percentile(values, 50.0),
        p90: percentile(values, 90.0),
    }
}

/// Linear-interpolation percentile over an ascending-sorted slice.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=100.0).contains(&q) {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let weight = rank - lower as f64;
    Some(sorted[lower] * (1.0 - weight) + sorted[upper] * weight)
}

// ==========================================
// Result structures
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupStats {
    pub group: String,
    pub module_count: usize,
    pub power: Aggregate,
    pub efficiency: Aggregate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResult {
    pub group_by: StatsGroupBy,
    pub groups: Vec<GroupStats>,
}

/// Whole-database overview for dashboards and CLI summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseStatistics {
    pub total_modules: usize,
    pub total_manufacturers: usize,
    pub total_models: usize,
    pub power: Aggregate,
    pub efficiency: Aggregate,
    pub cell_type_distribution: Vec<(String, usize)>,
}
