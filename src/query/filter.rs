// ==========================================
// PV PAN Tool - Filter specification
// ==========================================
// Structured filters: inclusive numeric ranges, categorical equality,
// case-insensitive partial text, whitelisted sort key + direction,
// result cap. Sort keys always place NULL values last, in both
// directions.
// ==========================================

use crate::domain::types::{CellType, ModuleType, SortDirection};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

// ==========================================
// SortKey - whitelisted sortable columns
// ==========================================
// A closed enum instead of raw column strings keeps user input out of
// the ORDER BY clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    PmaxStc,
    EfficiencyStc,
    VocStc,
    IscStc,
    VmpStc,
    ImpStc,
    BifacialityFactor,
    WeightKg,
    Manufacturer,
    Model,
}

impl SortKey {
    pub fn column(&self) -> &'static str {
        match self {
            SortKey::PmaxStc => "pmax_stc",
            SortKey::EfficiencyStc => "efficiency_stc",
            SortKey::VocStc => "voc_stc",
            SortKey::IscStc => "isc_stc",
            SortKey::VmpStc => "vmp_stc",
            SortKey::ImpStc => "imp_stc",
            SortKey::BifacialityFactor => "bifaciality_factor",
            SortKey::WeightKg => "weight_kg",
            SortKey::Manufacturer => "manufacturer",
            SortKey::Model => "model",
        }
    }
}

// ==========================================
// FilterSpec
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    // ===== Partial text (case-insensitive) =====
    pub manufacturer_contains: Option<String>,
    pub model_contains: Option<String>,

    // ===== Categorical equality =====
    pub cell_type: Option<CellType>,
    pub module_type: Option<ModuleType>,

    // ===== Inclusive numeric ranges =====
    pub min_power: Option<f64>,
    pub max_power: Option<f64>,
    pub min_efficiency: Option<f64>,
    pub max_efficiency: Option<f64>,
    pub min_height_mm: Option<f64>,
    pub max_height_mm: Option<f64>,
    pub min_width_mm: Option<f64>,
    pub max_width_mm: Option<f64>,

    // ===== Ordering and cap =====
    pub sort_by: Option<SortKey>,
    pub sort_direction: SortDirection,
    pub limit: Option<usize>,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            manufacturer_contains: None,
            model_contains: None,
            cell_type: None,
            module_type: None,
            min_power: None,
            max_power: None,
            min_efficiency: None,
            max_efficiency: None,
            min_height_mm: None,
            max_height_mm: None,
            min_width_mm: None,
            max_width_mm: None,
            sort_by: None,
            sort_direction: SortDirection::Descending,
            limit: None,
        }
    }
}

impl FilterSpec {
    /// Render the filter into SQL plus its bind parameters.
    ///
    /// The sort column is whitelisted through SortKey; NULL sort values
    /// land last regardless of direction via `{col} IS NULL` as the
    /// leading order term. The default ordering is power, descending.
    pub(crate) fn build_query(&self, select_columns: &str) -> (String, Vec<Value>) {
        let mut builder = SqlFilterBuilder::new();

        if let Some(text) = &self.manufacturer_contains {
            builder.and("manufacturer LIKE ?", Value::Text(format!("%{}%", text)));
        }
        if let Some(text) = &self.model_contains {
            builder.and("model LIKE ?", Value::Text(format!("%{}%", text)));
        }
        if let Some(cell_type) = self.cell_type {
            builder.and("cell_type = ?", Value::Text(cell_type.as_str().to_string()));
        }
        if let Some(module_type) = self.module_type {
            builder.and(
                "module_type = ?",
                Value::Text(module_type.as_str().to_string()),
            );
        }
        if let Some(v) = self.min_power {
            builder.and("pmax_stc >= ?", Value::Real(v));
        }
        if let Some(v) = self.max_power {
            builder.and("pmax_stc <= ?", Value::Real(v));
        }
        if let Some(v) = self.min_efficiency {
            builder.and("efficiency_stc >= ?", Value::Real(v));
        }
        if let Some(v) = self.max_efficiency {
            builder.and("efficiency_stc <= ?", Value::Real(v));
        }
        if let Some(v) = self.min_height_mm {
            builder.and("height_mm >= ?", Value::Real(v));
        }
        if let Some(v) = self.max_height_mm {
            builder.and("height_mm <= ?", Value::Real(v));
        }
        if let Some(v) = self.min_width_mm {
            builder.and("width_mm >= ?", Value::Real(v));
        }
        if let Some(v) = self.max_width_mm {
            builder.and("width_mm <= ?", Value::Real(v));
        }

        let sort_column = self.sort_by.unwrap_or(SortKey::PmaxStc).column();
        builder.order_by(format!(
            "{col} IS NULL, {col} {dir}",
            col = sort_column,
            dir = self.sort_direction.as_sql()
        ));
        builder.limit(self.limit);

        builder.build(&format!("SELECT {} FROM modules", select_columns))
    }
}

// ==========================================
// SqlFilterBuilder - WHERE fragments + binds
// ==========================================
// Accumulates conditions together with their parameters so the clause
// text and the bind list can never drift apart.
struct SqlFilterBuilder {
    clauses: Vec<String>,
    params: Vec<Value>,
    order_by: Option<String>,
    limit: Option<usize>,
}

impl SqlFilterBuilder {
    fn new() -> Self {
        Self {
            clauses: Vec::new(),
            params: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    fn and(&mut self, condition: &str, param: Value) {
        self.clauses.push(condition.to_string());
        self.params.push(param);
    }

    fn order_by(&mut self, order: String) {
        self.order_by = Some(order);
    }

    fn limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    fn build(self, select: &str) -> (String, Vec<Value>) {
        let mut sql = select.to_string();
        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }
        if let Some(order) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        (sql, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_defaults_to_power_desc_nulls_last() {
        let (sql, params) = FilterSpec::default().build_query("*");
        assert_eq!(
            sql,
            "SELECT * FROM modules ORDER BY pmax_stc IS NULL, pmax_stc DESC"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_combined_filters_align_with_params() {
        let spec = FilterSpec {
            manufacturer_contains: Some("jinko".into()),
            min_power: Some(500.0),
            max_power: Some(600.0),
            cell_type: Some(CellType::Monocrystalline),
            sort_by: Some(SortKey::EfficiencyStc),
            sort_direction: SortDirection::Ascending,
            limit: Some(25),
            ..Default::default()
        };
        let (sql, params) = spec.build_query("*");
        assert!(sql.contains("manufacturer LIKE ?"));
        assert!(sql.contains("pmax_stc >= ?"));
        assert!(sql.contains("pmax_stc <= ?"));
        assert!(sql.contains("cell_type = ?"));
        assert!(sql.contains("ORDER BY efficiency_stc IS NULL, efficiency_stc ASC"));
        assert!(sql.ends_with("LIMIT 25"));
        assert_eq!(params.len(), 4);
        assert!(matches!(&params[0], Value::Text(t) if t == "%jinko%"));
    }

    #[test]
    fn test_nulls_last_in_both_directions() {
        for dir in [SortDirection::Ascending, SortDirection::Descending] {
            let spec = FilterSpec {
                sort_by: Some(SortKey::BifacialityFactor),
                sort_direction: dir,
                ..Default::default()
            };
            let (sql, _) = spec.build_query("*");
            assert!(sql.contains("bifaciality_factor IS NULL, bifaciality_factor"));
        }
    }
}
