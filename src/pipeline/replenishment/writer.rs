//! Turns one family's decisions into per-document updates.
//!
//! Every origin document touched by a family receives exactly one update.
//! Family documents get the conclusion on each matching material plus header
//! fields; legacy documents get the header fields from their own material.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::models::{Conclusion, DecisionMethod, MaterialResult, RecordSchema, SubstrateFamily};

/// Decision fields written at document level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderFields {
    #[serde(rename = "ai_conclusion")]
    pub conclusion: Conclusion,
    #[serde(rename = "ai_output_text")]
    pub output_text: String,
    #[serde(rename = "ai_processed_at")]
    pub processed_at: DateTime<Utc>,
    #[serde(rename = "ai_model")]
    pub model: String,
    #[serde(rename = "processing_method")]
    pub method: DecisionMethod,
}

impl HeaderFields {
    fn from_result(conclusion: Conclusion, result: &MaterialResult) -> Self {
        Self {
            conclusion,
            output_text: result.reasoning.clone(),
            processed_at: result.processed_at,
            model: result.model.clone(),
            method: result.method,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentUpdate {
    /// `materials[i].ai_conclusion` per material id, plus header fields.
    FamilyDocument {
        doc_id: String,
        conclusions: BTreeMap<String, Conclusion>,
        header: HeaderFields,
    },
    /// Top-level fields of a one-material document.
    LegacyDocument { doc_id: String, fields: HeaderFields },
}

impl DocumentUpdate {
    pub fn doc_id(&self) -> &str {
        match self {
            Self::FamilyDocument { doc_id, .. } | Self::LegacyDocument { doc_id, .. } => doc_id,
        }
    }

    /// Merge this update into a stored document body. Fields not named by the
    /// update are left untouched.
    pub fn apply_to(&self, body: &mut Value) -> Result<(), String> {
        let Some(root) = body.as_object_mut() else {
            return Err(format!("document {} is not a JSON object", self.doc_id()));
        };

        let header = match self {
            Self::FamilyDocument {
                conclusions,
                header,
                ..
            } => {
                let Some(materials) = root.get_mut("materials").and_then(Value::as_array_mut) else {
                    return Err(format!("document {} has no materials array", self.doc_id()));
                };
                for entry in materials.iter_mut() {
                    let id = entry.get("material_id").and_then(material_id_text);
                    let conclusion = id.as_deref().and_then(|id| conclusions.get(id));
                    if let (Some(conclusion), Some(obj)) = (conclusion, entry.as_object_mut()) {
                        obj.insert("ai_conclusion".into(), Value::from(conclusion.as_str()));
                    }
                }
                header
            }
            Self::LegacyDocument { fields, .. } => fields,
        };

        let header = serde_json::to_value(header).map_err(|e| e.to_string())?;
        if let Value::Object(fields) = header {
            root.extend(fields);
        }
        Ok(())
    }
}

fn material_id_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Group a family's results by origin document.
///
/// Every material of `family` takes the first result carrying its material id,
/// so documents sharing a material id are all updated. Results naming no
/// material of the family are skipped with a warning. The family header
/// carries the aggregate over the whole family and the reasoning, timestamp,
/// model and method of the first result.
pub fn plan_updates(family: &SubstrateFamily, results: &[MaterialResult]) -> Vec<DocumentUpdate> {
    let Some(first) = results.first() else {
        tracing::warn!(family = %family.key, "No results to write");
        return Vec::new();
    };
    let aggregate = Conclusion::aggregate(results.iter().map(|r| &r.conclusion));

    let mut by_material: HashMap<&str, &MaterialResult> = HashMap::new();
    for result in results {
        if !family.contains_material(&result.material_id) {
            tracing::warn!(
                family = %family.key,
                material_id = %result.material_id,
                "Result for unknown material, not written"
            );
            continue;
        }
        by_material.entry(result.material_id.as_str()).or_insert(result);
    }

    let mut family_docs: BTreeMap<&str, BTreeMap<String, Conclusion>> = BTreeMap::new();
    let mut legacy_docs: BTreeMap<&str, &MaterialResult> = BTreeMap::new();

    for material in &family.materials {
        let Some(&result) = by_material.get(material.material_id.as_str()) else {
            tracing::warn!(
                family = %family.key,
                material_id = %material.material_id,
                material = %material.id,
                "No result for material, document not written"
            );
            continue;
        };
        if material.doc_id.is_empty() {
            tracing::warn!(material_id = %material.material_id, "Material has no origin document");
            continue;
        }
        match material.schema {
            RecordSchema::Family => {
                family_docs
                    .entry(material.doc_id.as_str())
                    .or_default()
                    .insert(material.material_id.clone(), result.conclusion);
            }
            RecordSchema::Legacy => {
                legacy_docs.entry(material.doc_id.as_str()).or_insert(result);
            }
        }
    }

    let header = HeaderFields::from_result(aggregate, first);
    let mut updates: Vec<DocumentUpdate> = family_docs
        .into_iter()
        .map(|(doc_id, conclusions)| DocumentUpdate::FamilyDocument {
            doc_id: doc_id.to_string(),
            conclusions,
            header: header.clone(),
        })
        .collect();
    updates.extend(legacy_docs.into_iter().map(|(doc_id, result)| {
        DocumentUpdate::LegacyDocument {
            doc_id: doc_id.to_string(),
            fields: HeaderFields::from_result(result.conclusion, result),
        }
    }));
    updates
}
