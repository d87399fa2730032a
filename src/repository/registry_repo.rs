// ==========================================
// PV PAN Tool - File registry repository
// ==========================================
// Owns the file_registry table. Entries are written only through the
// ingestion coordinator's commit path (upsert_entry_tx runs inside the
// batch transaction); everything else here is read-only.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::registry::{FileRegistryEntry, IngestionStatus};
use crate::repository::error::{StoreError, StoreResult};
use crate::repository::module_repo::parse_ts;
use crate::repository::schema;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct RegistryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RegistryRepository {
    pub fn new(db_path: &str) -> StoreResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| StoreError::DatabaseConnectionError(e.to_string()))?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> StoreResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| StoreError::LockError(e.to_string()))?;
            schema::init_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::LockError(e.to_string()))
    }

    /// Registry entry for a source path, if the file was seen before.
    pub fn find_by_path(&self, path: &str) -> StoreResult<Option<FileRegistryEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT path, file_size, modified_at, content_hash, parsed_at,
                    parser_version, outcome, error_message, warnings_json
             FROM file_registry WHERE path = ?1",
        )?;
        match stmt.query_row(params![path], map_entry_row) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All registry entries, ordered by path.
    pub fn list_all(&self) -> StoreResult<Vec<FileRegistryEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT path, file_size, modified_at, content_hash, parsed_at,
                    parser_version, outcome, error_message, warnings_json
             FROM file_registry ORDER BY path",
        )?;
        let entries = stmt
            .query_map([], map_entry_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

/// Upsert one registry entry inside an open transaction. Used by the
/// batch commit; not exposed on the repository itself so no write path
/// can bypass the coordinator.
pub(crate) fn upsert_entry_tx(conn: &Connection, entry: &FileRegistryEntry) -> StoreResult<()> {
    let warnings_json = serde_json::to_string(&entry.warnings)?;
    conn.execute(
        r#"
        INSERT INTO file_registry (
            path, file_size, modified_at, content_hash, parsed_at,
            parser_version, outcome, error_message, warnings_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(path) DO UPDATE SET
            file_size = excluded.file_size,
            modified_at = excluded.modified_at,
            content_hash = excluded.content_hash,
            parsed_at = excluded.parsed_at,
            parser_version = excluded.parser_version,
            outcome = excluded.outcome,
            error_message = excluded.error_message,
            warnings_json = excluded.warnings_json
        "#,
        params![
            entry.path,
            entry.file_size as i64,
            entry.modified_at.to_rfc3339(),
            entry.content_hash,
            entry.parsed_at.to_rfc3339(),
            entry.parser_version,
            entry.outcome.as_str(),
            entry.error_message,
            warnings_json,
        ],
    )?;
    Ok(())
}

fn map_entry_row(row: &Row<'_>) -> rusqlite::Result<FileRegistryEntry> {
    let warnings_json: String = row.get(8)?;
    Ok(FileRegistryEntry {
        path: row.get(0)?,
        file_size: row.get::<_, i64>(1)? as u64,
        modified_at: parse_ts(&row.get::<_, String>(2)?),
        content_hash: row.get(3)?,
        parsed_at: parse_ts(&row.get::<_, String>(4)?),
        parser_version: row.get(5)?,
        outcome: IngestionStatus::from_str_tag(&row.get::<_, String>(6)?),
        error_message: row.get(7)?,
        warnings: serde_json::from_str(&warnings_json).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::configure_sqlite_connection;
    use chrono::Utc;

    fn repo() -> RegistryRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        RegistryRepository::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    fn entry(path: &str, hash: &str) -> FileRegistryEntry {
        FileRegistryEntry {
            path: path.to_string(),
            file_size: 42,
            modified_at: Utc::now(),
            content_hash: hash.to_string(),
            parsed_at: Utc::now(),
            parser_version: crate::PARSER_VERSION.to_string(),
            outcome: IngestionStatus::Success,
            error_message: None,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_upsert_and_find() {
        let repo = repo();
        {
            let guard = repo.conn.lock().unwrap();
            upsert_entry_tx(&guard, &entry("/a/x.pan", "h1")).unwrap();
        }
        let found = repo.find_by_path("/a/x.pan").unwrap().unwrap();
        assert_eq!(found.content_hash, "h1");
        assert_eq!(found.outcome, IngestionStatus::Success);

        // second upsert for the same path replaces, not duplicates
        {
            let guard = repo.conn.lock().unwrap();
            upsert_entry_tx(&guard, &entry("/a/x.pan", "h2")).unwrap();
        }
        let found = repo.find_by_path("/a/x.pan").unwrap().unwrap();
        assert_eq!(found.content_hash, "h2");
        assert_eq!(repo.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_find_missing_is_none() {
        assert!(repo().find_by_path("/nope.pan").unwrap().is_none());
    }
}
