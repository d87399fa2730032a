// ==========================================
// PV PAN Tool - Query engine
// ==========================================
// Read-only access over the store: filtered listing, single-record
// lookup, curve retrieval, comparison, statistics and CSV export.
// Shares the repository's row mapping so absent values survive
// round-trips unchanged.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::module::{CurveSeries, ModuleRecord};
use crate::query::compare::{compare_records, ComparisonResult};
use crate::query::filter::FilterSpec;
use crate::query::stats::{aggregate, DatabaseStatistics, GroupStats, StatsGroupBy, StatsResult};
use crate::repository::error::{StoreError, StoreResult};
use crate::repository::module_repo::{load_curves, map_module_row, SELECT_COLUMNS};
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub struct QueryEngine {
    conn: Arc<Mutex<Connection>>,
}

impl QueryEngine {
    pub fn new(db_path: &str) -> StoreResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| StoreError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::LockError(e.to_string()))
    }

    // ==========================================
    // Filtered listing
    // ==========================================
    /// Run a structured filter. Curves are not attached here; use
    /// `get_curve_series` for the selected records.
    pub fn query(&self, spec: &FilterSpec) -> StoreResult<Vec<ModuleRecord>> {
        let (sql, sql_params) = spec.build_query(SELECT_COLUMNS);
        debug!(sql = %sql, params = sql_params.len(), "module query");

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(sql_params), map_module_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Single record by unique id, curves included.
    pub fn get_module(&self, unique_id: &str) -> StoreResult<Option<ModuleRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM modules WHERE unique_id = ?1", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let mut record = match stmt.query_row(params![unique_id], map_module_row) {
            Ok(record) => record,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        record.curves = load_curves(&conn, unique_id)?;
        Ok(Some(record))
    }

    /// Curve series for one module, in stored order.
    pub fn get_curve_series(&self, unique_id: &str) -> StoreResult<Vec<CurveSeries>> {
        let conn = self.get_conn()?;
        load_curves(&conn, unique_id)
    }

    // ==========================================
    // Comparison
    // ==========================================
    /// Compare 2..=10 modules by unique id. Every id must resolve.
    pub fn compare(&self, unique_ids: &[String]) -> StoreResult<ComparisonResult> {
        let mut records = Vec::with_capacity(unique_ids.len());
        for id in unique_ids {
            match self.get_module(id)? {
                Some(record) => records.push(record),
                None => {
                    return Err(StoreError::NotFound {
                        entity: "module".to_string(),
                        id: id.clone(),
                    })
                }
            }
        }
        compare_records(&records)
    }

    // ==========================================
    // Statistics
    // ==========================================
    /// Grouped aggregates, largest groups first.
    pub fn stats(&self, group_by: StatsGroupBy) -> StoreResult<StatsResult> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {}, pmax_stc, efficiency_stc FROM modules",
            group_by.column()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })?;

        let mut buckets: HashMap<String, (usize, Vec<f64>, Vec<f64>)> = HashMap::new();
        for row in rows {
            let (group, power, efficiency) = row?;
            let bucket = buckets.entry(group).or_default();
            bucket.0 += 1;
            if let Some(p) = power {
                bucket.1.push(p);
            }
            if let Some(e) = efficiency {
                bucket.2.push(e);
            }
        }

        let mut groups: Vec<GroupStats> = buckets
            .into_iter()
            .map(|(group, (count, mut powers, mut efficiencies))| GroupStats {
                group,
                module_count: count,
                power: aggregate(&mut powers),
                efficiency: aggregate(&mut efficiencies),
            })
            .collect();
        groups.sort_by(|a, b| {
            b.module_count
                .cmp(&a.module_count)
                .then_with(|| a.group.cmp(&b.group))
        });

        Ok(StatsResult { group_by, groups })
    }

    /// Whole-database overview.
    pub fn database_statistics(&self) -> StoreResult<DatabaseStatistics> {
        let conn = self.get_conn()?;

        let total_modules: usize =
            conn.query_row("SELECT COUNT(*) FROM modules", [], |r| r.get::<_, i64>(0))? as usize;
        let total_manufacturers: usize = conn.query_row(
            "SELECT COUNT(DISTINCT manufacturer) FROM modules",
            [],
            |r| r.get::<_, i64>(0),
        )? as usize;
        let total_models: usize =
            conn.query_row("SELECT COUNT(DISTINCT model) FROM modules", [], |r| {
                r.get::<_, i64>(0)
            })? as usize;

        let mut powers = collect_column(&conn, "pmax_stc")?;
        let mut efficiencies = collect_column(&conn, "efficiency_stc")?;

        let mut stmt = conn.prepare(
            "SELECT cell_type, COUNT(*) AS cnt FROM modules GROUP BY cell_type ORDER BY cnt DESC",
        )?;
        let cell_type_distribution = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(DatabaseStatistics {
            total_modules,
            total_manufacturers,
            total_models,
            power: aggregate(&mut powers),
            efficiency: aggregate(&mut efficiencies),
            cell_type_distribution,
        })
    }

    /// Distinct manufacturers, alphabetical (collaborator dropdowns).
    pub fn list_manufacturers(&self) -> StoreResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT manufacturer FROM modules ORDER BY manufacturer")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    // ==========================================
    // CSV export
    // ==========================================
    /// Export the filtered record set as CSV. Absent values become
    /// empty cells, never zeros.
    ///
    /// # Returns
    /// - Ok(usize): number of exported records
    pub fn export_csv<W: std::io::Write>(
        &self,
        spec: &FilterSpec,
        writer: W,
    ) -> StoreResult<usize> {
        let records = self.query(spec)?;

        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer
            .write_record([
                "unique_id",
                "manufacturer",
                "model",
                "pmax_stc",
                "vmp_stc",
                "imp_stc",
                "voc_stc",
                "isc_stc",
                "efficiency_stc",
                "bifaciality_factor",
                "cell_type",
                "module_type",
                "width_mm",
                "height_mm",
                "weight_kg",
                "source_path",
            ])
            .map_err(|e| StoreError::DatabaseQueryError(e.to_string()))?;

        for record in &records {
            csv_writer
                .write_record([
                    record.unique_id.clone(),
                    record.manufacturer.clone(),
                    record.model.clone(),
                    opt_cell(record.electrical.pmax_stc),
                    opt_cell(record.electrical.vmp_stc),
                    opt_cell(record.electrical.imp_stc),
                    opt_cell(record.electrical.voc_stc),
                    opt_cell(record.electrical.isc_stc),
                    opt_cell(record.efficiency_stc),
                    opt_cell(record.electrical.bifaciality_factor),
                    record.cell_type.to_string(),
                    record.module_type.to_string(),
                    opt_cell(record.physical.width_mm),
                    opt_cell(record.physical.height_mm),
                    opt_cell(record.physical.weight_kg),
                    record.metadata.file_path.clone(),
                ])
                .map_err(|e| StoreError::DatabaseQueryError(e.to_string()))?;
        }
        csv_writer
            .flush()
            .map_err(|e| StoreError::DatabaseQueryError(e.to_string()))?;

        Ok(records.len())
    }
}

fn collect_column(conn: &Connection, column: &str) -> StoreResult<Vec<f64>> {
    let sql = format!(
        "SELECT {col} FROM modules WHERE {col} IS NOT NULL",
        col = column
    );
    let mut stmt = conn.prepare(&sql)?;
    let values = stmt
        .query_map([], |row| row.get::<_, f64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(values)
}

fn opt_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
