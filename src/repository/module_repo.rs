// ==========================================
// PV PAN Tool - Module repository
// ==========================================
// Owns the modules and curve_series tables. Upsert is keyed by the
// content fingerprint: replacing a changed file deletes the prior row
// for the same source path (cascading its series) and inserts the new
// one inside the same transaction. One ingestion batch = one
// transaction, all-or-nothing.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::module::{CurveSeries, ElectricalParameters, FileMetadata, ModuleRecord, ParseOutcome, PhysicalParameters};
use crate::domain::registry::FileRegistryEntry;
use crate::domain::types::{CellType, ModuleType};
use crate::repository::error::{StoreError, StoreResult};
use crate::repository::registry_repo;
use crate::repository::schema;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// FileCommit - one file's contribution to a batch
// ==========================================
#[derive(Debug, Clone)]
pub enum FileCommit {
    /// Parse succeeded: module rows plus the registry entry.
    Parsed {
        outcome: ParseOutcome,
        entry: FileRegistryEntry,
    },
    /// Structural failure: only the registry entry is recorded.
    Failed { entry: FileRegistryEntry },
}

// ==========================================
// ModuleRepository
// ==========================================
pub struct ModuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ModuleRepository {
    /// Open (or create) the database at the given path.
    pub fn new(db_path: &str) -> StoreResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| StoreError::DatabaseConnectionError(e.to_string()))?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Share an existing connection (the schema is ensured once more,
    /// which is idempotent).
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> StoreResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| StoreError::LockError(e.to_string()))?;
            schema::init_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn get_conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::LockError(e.to_string()))
    }

    // ==========================================
    // Writes (coordinator commit path only)
    // ==========================================

    /// Commit one batch atomically: module upserts, curve rows and
    /// registry entries all land in a single transaction.
    ///
    /// # Returns
    /// - Ok(usize): number of module records written
    pub fn commit_batch(&self, commits: &[FileCommit]) -> StoreResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StoreError::DatabaseTransactionError(e.to_string()))?;

        let mut written = 0;
        for commit in commits {
            match commit {
                FileCommit::Parsed { outcome, entry } => {
                    upsert_module_tx(&tx, &outcome.record)?;
                    registry_repo::upsert_entry_tx(&tx, entry)?;
                    written += 1;
                }
                FileCommit::Failed { entry } => {
                    registry_repo::upsert_entry_tx(&tx, entry)?;
                }
            }
        }

        tx.commit()
            .map_err(|e| StoreError::DatabaseTransactionError(e.to_string()))?;
        Ok(written)
    }

    // ==========================================
    // Reads
    // ==========================================

    /// Fetch one record by unique id, curves included.
    pub fn find_by_unique_id(&self, unique_id: &str) -> StoreResult<Option<ModuleRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM modules WHERE unique_id = ?1", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let result = stmt.query_row(params![unique_id], map_module_row);

        let mut record = match result {
            Ok(record) => record,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        record.curves = load_curves(&conn, unique_id)?;
        Ok(Some(record))
    }

    /// Curve series for a module, in insertion order.
    pub fn get_curve_series(&self, unique_id: &str) -> StoreResult<Vec<CurveSeries>> {
        let conn = self.get_conn()?;
        load_curves(&conn, unique_id)
    }

    pub fn count_modules(&self) -> StoreResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM modules", [], |row| row.get(0))?;
        Ok(count)
    }
}

// ==========================================
// Transaction-scoped write helpers
// ==========================================

fn upsert_module_tx(conn: &Connection, record: &ModuleRecord) -> StoreResult<()> {
    // Replace any prior record for this source (or an identical content
    // fingerprint landing under a moved path); cascade removes old curves.
    conn.execute(
        "DELETE FROM modules WHERE source_path = ?1 OR unique_id = ?2",
        params![record.metadata.file_path, record.unique_id],
    )?;

    let now = Utc::now().to_rfc3339();
    let e = &record.electrical;
    let p = &record.physical;
    let m = &record.metadata;
    conn.execute(
        r#"
        INSERT INTO modules (
            unique_id, manufacturer, model,
            pmax_stc, vmp_stc, imp_stc, voc_stc, isc_stc,
            temp_coeff_pmax, temp_coeff_voc, temp_coeff_isc,
            g_ref, t_ref, noct, bypass_diodes, max_system_voltage,
            r_series, r_shunt, bifaciality_factor,
            width_mm, height_mm, thickness_mm, weight_kg,
            cells_in_series, cells_in_parallel, total_cells,
            cell_type, module_type, technology,
            area_m2, efficiency_stc, power_density,
            source_path, file_name, file_size, file_hash, last_modified, parsed_at,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
            ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30,
            ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38, ?39, ?40
        )
        "#,
        params![
            record.unique_id,
            record.manufacturer,
            record.model,
            e.pmax_stc,
            e.vmp_stc,
            e.imp_stc,
            e.voc_stc,
            e.isc_stc,
            e.temp_coeff_pmax,
            e.temp_coeff_voc,
            e.temp_coeff_isc,
            e.g_ref,
            e.t_ref,
            e.noct,
            e.bypass_diodes,
            e.max_system_voltage,
            e.r_series,
            e.r_shunt,
            e.bifaciality_factor,
            p.width_mm,
            p.height_mm,
            p.thickness_mm,
            p.weight_kg,
            p.cells_in_series,
            p.cells_in_parallel,
            p.total_cells,
            record.cell_type.as_str(),
            record.module_type.as_str(),
            record.technology,
            record.area_m2,
            record.efficiency_stc,
            record.power_density,
            m.file_path,
            m.file_name,
            m.file_size as i64,
            m.file_hash,
            m.last_modified.to_rfc3339(),
            m.parsed_at.to_rfc3339(),
            now,
            now,
        ],
    )?;
    let module_id = conn.last_insert_rowid();

    for series in &record.curves {
        let payload = serde_json::to_string(&series.points)?;
        conn.execute(
            "INSERT INTO curve_series (module_id, label, point_count, points_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![module_id, series.label, series.points.len() as i64, payload],
        )?;
    }

    Ok(())
}

// ==========================================
// Row mapping (shared with the query engine)
// ==========================================

/// Column list matching `map_module_row`, curves excluded.
pub(crate) const SELECT_COLUMNS: &str = "\
unique_id, manufacturer, model, \
pmax_stc, vmp_stc, imp_stc, voc_stc, isc_stc, \
temp_coeff_pmax, temp_coeff_voc, temp_coeff_isc, \
g_ref, t_ref, noct, bypass_diodes, max_system_voltage, \
r_series, r_shunt, bifaciality_factor, \
width_mm, height_mm, thickness_mm, weight_kg, \
cells_in_series, cells_in_parallel, total_cells, \
cell_type, module_type, technology, \
area_m2, efficiency_stc, power_density, \
source_path, file_name, file_size, file_hash, last_modified, parsed_at";

/// Map a `SELECT_COLUMNS` row back into a ModuleRecord. NULL columns
/// come back as None, exactly as they were written; curves are loaded
/// separately.
pub(crate) fn map_module_row(row: &Row<'_>) -> rusqlite::Result<ModuleRecord> {
    Ok(ModuleRecord {
        unique_id: row.get(0)?,
        manufacturer: row.get(1)?,
        model: row.get(2)?,
        electrical: ElectricalParameters {
            pmax_stc: row.get(3)?,
            vmp_stc: row.get(4)?,
            imp_stc: row.get(5)?,
            voc_stc: row.get(6)?,
            isc_stc: row.get(7)?,
            temp_coeff_pmax: row.get(8)?,
            temp_coeff_voc: row.get(9)?,
            temp_coeff_isc: row.get(10)?,
            g_ref: row.get(11)?,
            t_ref: row.get(12)?,
            noct: row.get(13)?,
            bypass_diodes: row.get(14)?,
            max_system_voltage: row.get(15)?,
            r_series: row.get(16)?,
            r_shunt: row.get(17)?,
            bifaciality_factor: row.get(18)?,
        },
        physical: PhysicalParameters {
            width_mm: row.get(19)?,
            height_mm: row.get(20)?,
            thickness_mm: row.get(21)?,
            weight_kg: row.get(22)?,
            cells_in_series: row.get(23)?,
            cells_in_parallel: row.get(24)?,
            total_cells: row.get(25)?,
        },
        cell_type: CellType::from_str_tag(&row.get::<_, String>(26)?),
        module_type: ModuleType::from_str_tag(&row.get::<_, String>(27)?),
        technology: row.get(28)?,
        area_m2: row.get(29)?,
        efficiency_stc: row.get(30)?,
        power_density: row.get(31)?,
        curves: Vec::new(),
        metadata: FileMetadata {
            file_path: row.get(32)?,
            file_name: row.get(33)?,
            file_size: row.get::<_, i64>(34)? as u64,
            file_hash: row.get(35)?,
            last_modified: parse_ts(&row.get::<_, String>(36)?),
            parsed_at: parse_ts(&row.get::<_, String>(37)?),
        },
    })
}

pub(crate) fn load_curves(conn: &Connection, unique_id: &str) -> StoreResult<Vec<CurveSeries>> {
    let mut stmt = conn.prepare(
        "SELECT cs.label, cs.points_json
         FROM curve_series cs
         JOIN modules m ON m.id = cs.module_id
         WHERE m.unique_id = ?1
         ORDER BY cs.id",
    )?;
    let rows = stmt.query_map(params![unique_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut curves = Vec::new();
    for row in rows {
        let (label, payload) = row?;
        let points = serde_json::from_str(&payload)?;
        curves.push(CurveSeries { label, points });
    }
    Ok(curves)
}

pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
