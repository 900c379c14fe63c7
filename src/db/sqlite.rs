use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use super::DatabaseError;

/// Schema revision written by [`SCHEMA_SQL`].
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = include_str!("../../resources/schema.sql");

/// Open the document store at `path`, creating missing parent directories
/// and the schema.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    prepare(Connection::open(path)?)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    prepare(Connection::open_in_memory()?)
}

fn prepare(conn: Connection) -> Result<Connection, DatabaseError> {
    conn.execute_batch("PRAGMA journal_mode=DELETE;")?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Create the tables unless the stored schema is already current.
pub fn ensure_schema(conn: &Connection) -> Result<(), DatabaseError> {
    let stored = schema_version(conn)?;
    if stored >= SCHEMA_VERSION {
        return Ok(());
    }
    tracing::info!(from = stored, to = SCHEMA_VERSION, "Creating document store schema");
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| DatabaseError::SchemaFailed {
            version: SCHEMA_VERSION,
            reason: e.to_string(),
        })
}

/// Stored schema revision, 0 for a blank database.
fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let has_table = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !has_table {
        return Ok(0);
    }
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        names
    }

    #[test]
    fn fresh_database_gets_current_schema() {
        let conn = open_memory_database().unwrap();
        assert_eq!(table_names(&conn), vec!["schema_version", "stock_documents"]);
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn blank_connection_reports_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let conn = open_memory_database().unwrap();
        ensure_schema(&conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn opens_file_database_in_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stock.db");
        let conn = open_database(&path).unwrap();
        assert_eq!(table_names(&conn).len(), 2);
        assert!(path.exists());
    }
}
