//! Repository layer: collection-scoped database operations.

mod stock_document;

pub use stock_document::*;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::{open_memory_database, DatabaseError};

    #[test]
    fn upsert_and_get_document() {
        let conn = open_memory_database().unwrap();
        upsert_document(&conn, "FAM", &json!({"materials": []})).unwrap();
        let doc = get_document(&conn, "FAM").unwrap().unwrap();
        assert_eq!(doc.id, "FAM");
        assert_eq!(doc.body, json!({"materials": []}));
    }

    #[test]
    fn upsert_replaces_body() {
        let conn = open_memory_database().unwrap();
        upsert_document(&conn, "d1", &json!({"keyword": "A"})).unwrap();
        upsert_document(&conn, "d1", &json!({"keyword": "B"})).unwrap();
        assert_eq!(count_documents(&conn).unwrap(), 1);
        let doc = get_document(&conn, "d1").unwrap().unwrap();
        assert_eq!(doc.body["keyword"], "B");
    }

    #[test]
    fn missing_document_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_document(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn list_is_ordered_by_id() {
        let conn = open_memory_database().unwrap();
        upsert_document(&conn, "b", &json!({})).unwrap();
        upsert_document(&conn, "a", &json!({})).unwrap();
        let ids: Vec<String> = list_documents(&conn).unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn update_of_unknown_document_fails() {
        let conn = open_memory_database().unwrap();
        let err = update_document_body(&conn, "ghost", &json!({})).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn corrupt_body_is_reported() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO stock_documents (id, body) VALUES ('bad', '{not json')",
            [],
        )
        .unwrap();
        let err = list_documents(&conn).unwrap_err();
        assert!(matches!(err, DatabaseError::MalformedDocument { ref id, .. } if id == "bad"));
    }
}
