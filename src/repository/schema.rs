// ==========================================
// PV PAN Tool - Database schema
// ==========================================
// Three tables: modules (one row per ModuleRecord), curve_series
// (FK to modules, cascade delete), file_registry (change detection).
// Indexes cover the query engine's common filter paths.
// ==========================================

use rusqlite::Connection;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS modules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unique_id TEXT UNIQUE NOT NULL,

    -- Identity
    manufacturer TEXT NOT NULL,
    model TEXT NOT NULL,

    -- Electrical parameters (STC)
    pmax_stc REAL,
    vmp_stc REAL,
    imp_stc REAL,
    voc_stc REAL,
    isc_stc REAL,

    -- Temperature coefficients (magnitudes, %/degC)
    temp_coeff_pmax REAL,
    temp_coeff_voc REAL,
    temp_coeff_isc REAL,

    -- Reference conditions / configuration
    g_ref REAL,
    t_ref REAL,
    noct REAL,
    bypass_diodes INTEGER,
    max_system_voltage REAL,
    r_series REAL,
    r_shunt REAL,

    -- Bifacial (fraction in [0,1] or NULL, never defaulted)
    bifaciality_factor REAL,

    -- Physical parameters
    width_mm REAL,
    height_mm REAL,
    thickness_mm REAL,
    weight_kg REAL,
    cells_in_series INTEGER,
    cells_in_parallel INTEGER,
    total_cells INTEGER,

    -- Technology
    cell_type TEXT NOT NULL,
    module_type TEXT NOT NULL,
    technology TEXT,

    -- Derived columns (from present values only)
    area_m2 REAL,
    efficiency_stc REAL,
    power_density REAL,

    -- Source file metadata
    source_path TEXT UNIQUE NOT NULL,
    file_name TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    file_hash TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    parsed_at TEXT NOT NULL,

    -- Audit
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS curve_series (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    label TEXT NOT NULL,
    point_count INTEGER NOT NULL,
    points_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS file_registry (
    path TEXT PRIMARY KEY,
    file_size INTEGER NOT NULL,
    modified_at TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    parsed_at TEXT NOT NULL,
    parser_version TEXT NOT NULL,
    outcome TEXT NOT NULL,
    error_message TEXT,
    warnings_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_modules_manufacturer ON modules (manufacturer);
CREATE INDEX IF NOT EXISTS idx_modules_model ON modules (model);
CREATE INDEX IF NOT EXISTS idx_modules_pmax ON modules (pmax_stc);
CREATE INDEX IF NOT EXISTS idx_modules_efficiency ON modules (efficiency_stc);
CREATE INDEX IF NOT EXISTS idx_modules_cell_type ON modules (cell_type);
CREATE INDEX IF NOT EXISTS idx_modules_height ON modules (height_mm);
CREATE INDEX IF NOT EXISTS idx_modules_width ON modules (width_mm);
CREATE INDEX IF NOT EXISTS idx_modules_file_hash ON modules (file_hash);
CREATE INDEX IF NOT EXISTS idx_curve_series_module ON curve_series (module_id);
"#;

/// Create tables and indexes if they do not exist yet.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::configure_sqlite_connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('modules','curve_series','file_registry')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_cascade_delete_removes_series() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO modules (unique_id, manufacturer, model, cell_type, module_type,
                source_path, file_name, file_size, file_hash, last_modified, parsed_at,
                created_at, updated_at)
             VALUES ('m1', 'A', 'X', 'unknown', 'standard', '/a/x.pan', 'x.pan', 1, 'h',
                     't', 't', 't', 't')",
            [],
        )
        .unwrap();
        let module_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO curve_series (module_id, label, point_count, points_json)
             VALUES (?1, 'STC', 0, '[]')",
            [module_id],
        )
        .unwrap();

        conn.execute("DELETE FROM modules WHERE id = ?1", [module_id])
            .unwrap();
        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM curve_series", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
