//! Raw stock documents and their classification into the two stored layouts.
//!
//! Downstream code only sees [`SubstrateFamily`]; the layout survives solely as
//! [`RecordSchema`] on each material so writes can target the right fields.

use std::collections::BTreeMap;

use serde_json::Value;

use super::stock::{RecordSchema, StockMaterial, SubstrateFamily};

/// A document as stored in the stock collection.
#[derive(Debug, Clone, PartialEq)]
pub struct StockDocument {
    pub id: String,
    pub body: Value,
}

impl StockDocument {
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }
}

/// One legacy document holding a single material.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyRecord {
    pub doc_id: String,
    pub keyword: String,
    pub material: StockMaterial,
}

/// One family document holding every material of a keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyRecord {
    pub doc_id: String,
    pub keyword: String,
    pub materials: Vec<StockMaterial>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StockRecord {
    Legacy(LegacyRecord),
    Family(FamilyRecord),
}

impl StockRecord {
    /// Classify a document. Returns `None` for documents that are neither a
    /// family record (`materials` array) nor a legacy record (`keyword` field).
    pub fn classify(doc: &StockDocument) -> Option<Self> {
        if let Some(items) = doc.body.get("materials").and_then(Value::as_array) {
            let keyword = doc.id.trim().to_string();
            let mut materials = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                match serde_json::from_value::<StockMaterial>(item.clone()) {
                    Ok(mut material) => {
                        material.id = format!("{}_{index}", doc.id);
                        material.doc_id = doc.id.clone();
                        material.keyword = keyword.clone();
                        material.schema = RecordSchema::Family;
                        materials.push(material);
                    }
                    Err(e) => tracing::warn!(
                        doc_id = %doc.id,
                        index,
                        error = %e,
                        "Skipping unreadable material entry"
                    ),
                }
            }
            return Some(Self::Family(FamilyRecord {
                doc_id: doc.id.clone(),
                keyword,
                materials,
            }));
        }

        let keyword = match doc.body.get("keyword") {
            None | Some(Value::Null) => return None,
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => other.to_string().trim().to_string(),
        };

        match serde_json::from_value::<StockMaterial>(doc.body.clone()) {
            Ok(mut material) => {
                material.id = doc.id.clone();
                material.doc_id = doc.id.clone();
                material.keyword = keyword.clone();
                material.schema = RecordSchema::Legacy;
                Some(Self::Legacy(LegacyRecord {
                    doc_id: doc.id.clone(),
                    keyword,
                    material,
                }))
            }
            Err(e) => {
                tracing::warn!(doc_id = %doc.id, error = %e, "Skipping unreadable legacy record");
                None
            }
        }
    }

    pub fn keyword(&self) -> &str {
        match self {
            Self::Legacy(r) => &r.keyword,
            Self::Family(r) => &r.keyword,
        }
    }

    pub fn into_materials(self) -> Vec<StockMaterial> {
        match self {
            Self::Legacy(r) => vec![r.material],
            Self::Family(r) => r.materials,
        }
    }
}

/// Merge classified records into families keyed by trimmed keyword, in key order.
/// Records with an empty keyword are dropped; families without materials are not created.
pub fn group_families(records: impl IntoIterator<Item = StockRecord>) -> BTreeMap<String, SubstrateFamily> {
    let mut families: BTreeMap<String, SubstrateFamily> = BTreeMap::new();
    for record in records {
        let key = record.keyword().to_string();
        if key.is_empty() {
            tracing::debug!("Skipping record with empty keyword");
            continue;
        }
        let materials = record.into_materials();
        if materials.is_empty() {
            continue;
        }
        families
            .entry(key.clone())
            .or_insert_with(|| SubstrateFamily::new(key, Vec::new()))
            .materials
            .extend(materials);
    }
    families
}
