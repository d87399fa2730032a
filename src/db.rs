// ==========================================
// PV PAN Tool - SQLite connection init
// ==========================================
// Goals:
// - Unify PRAGMA behavior across every Connection::open so curve cascade
//   deletes never run against a connection with foreign keys off
// - Unify busy_timeout to reduce sporadic busy errors under concurrent use
// ==========================================

use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;

/// Default busy_timeout (milliseconds)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Apply the unified PRAGMA set to a SQLite connection.
///
/// foreign_keys and busy_timeout are per-connection settings in SQLite and
/// must be applied to every connection, not once per database.
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open a SQLite connection with the unified configuration applied.
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Default database location: `<user data dir>/pv-pan-tool/pv_modules.db`,
/// falling back to a relative path when no data dir is available.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("pv-pan-tool").join("pv_modules.db"))
        .unwrap_or_else(|| PathBuf::from("data/pv_modules.db"))
}
