//! SQLite-backed stock document store.

use std::collections::BTreeMap;

use rusqlite::Connection;

use super::error::ReplenishmentError;
use super::traits::StockDocumentStore;
use super::writer::DocumentUpdate;
use crate::db::repository::{get_document, list_documents, update_document_body};
use crate::db::DatabaseError;
use crate::models::{group_families, StockRecord, SubstrateFamily};

pub struct SqliteStockStore {
    conn: Connection,
}

impl SqliteStockStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl StockDocumentStore for SqliteStockStore {
    fn load_families(&self) -> Result<BTreeMap<String, SubstrateFamily>, ReplenishmentError> {
        let documents = list_documents(&self.conn)?;
        let scanned = documents.len();

        let records: Vec<StockRecord> = documents
            .iter()
            .filter_map(|doc| {
                let record = StockRecord::classify(doc);
                if record.is_none() {
                    tracing::debug!(doc_id = %doc.id, "Document is neither a family nor a legacy record");
                }
                record
            })
            .collect();
        let (family_docs, legacy_docs) = records.iter().fold((0usize, 0usize), |(f, l), r| match r {
            StockRecord::Family(_) => (f + 1, l),
            StockRecord::Legacy(_) => (f, l + 1),
        });

        let families = group_families(records);
        tracing::info!(
            documents = scanned,
            family_documents = family_docs,
            legacy_documents = legacy_docs,
            families = families.len(),
            "Discovered substrate families"
        );
        Ok(families)
    }

    fn apply_updates(&self, updates: &[DocumentUpdate]) -> Result<usize, ReplenishmentError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction().map_err(DatabaseError::from)?;
        for update in updates {
            let doc_id = update.doc_id();
            let mut doc = get_document(&tx, doc_id)?.ok_or_else(|| DatabaseError::NotFound {
                entity_type: "stock_document".into(),
                id: doc_id.into(),
            })?;
            update
                .apply_to(&mut doc.body)
                .map_err(|reason| DatabaseError::MalformedDocument {
                    id: doc_id.into(),
                    reason,
                })?;
            update_document_body(&tx, doc_id, &doc.body)?;
        }
        tx.commit().map_err(DatabaseError::from)?;

        Ok(updates.len())
    }
}
