use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::db::DatabaseError;
use crate::models::StockDocument;

/// Insert a document, replacing any existing body with the same id.
pub fn upsert_document(conn: &Connection, id: &str, body: &Value) -> Result<(), DatabaseError> {
    let json = serde_json::to_string(body)?;
    conn.execute(
        "INSERT INTO stock_documents (id, body, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        params![id, json, now_stamp()],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &str) -> Result<Option<StockDocument>, DatabaseError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM stock_documents WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    body.map(|b| parse_body(id, &b)).transpose()
}

/// Every document in the collection, ordered by id.
pub fn list_documents(conn: &Connection) -> Result<Vec<StockDocument>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, body FROM stock_documents ORDER BY id ASC")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

    let mut docs = Vec::new();
    for row in rows {
        let (id, body) = row?;
        docs.push(parse_body(&id, &body)?);
    }
    Ok(docs)
}

/// Overwrite the body of an existing document.
pub fn update_document_body(conn: &Connection, id: &str, body: &Value) -> Result<(), DatabaseError> {
    let json = serde_json::to_string(body)?;
    let changed = conn.execute(
        "UPDATE stock_documents SET body = ?1, updated_at = ?2 WHERE id = ?3",
        params![json, now_stamp(), id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "stock_document".into(),
            id: id.into(),
        });
    }
    Ok(())
}

pub fn count_documents(conn: &Connection) -> Result<usize, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM stock_documents", [], |row| row.get(0))?;
    Ok(count as usize)
}

fn parse_body(id: &str, body: &str) -> Result<StockDocument, DatabaseError> {
    let value = serde_json::from_str(body).map_err(|e| DatabaseError::MalformedDocument {
        id: id.into(),
        reason: e.to_string(),
    })?;
    Ok(StockDocument::new(id, value))
}

fn now_stamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
