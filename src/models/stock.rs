use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

/// A single stock-keeping unit as read from the stock document store.
///
/// Field values come from spreadsheet imports, so text fields may arrive as
/// numbers and quantities as strings. Both are accepted on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockMaterial {
    /// Unique within a run: the document id, or `<doc id>_<index>` for
    /// materials held in a family document.
    #[serde(default, skip_serializing)]
    pub id: String,
    /// Id of the document this material was read from.
    #[serde(default, skip_serializing)]
    pub doc_id: String,
    /// Layout of the origin document, decided once at load time.
    #[serde(skip)]
    pub schema: RecordSchema,
    #[serde(default, deserialize_with = "lenient_string")]
    pub material_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub supplier_keyword: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub keyword: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub width: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub length: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ref_at_supplier: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub lead_time: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub safety_stock: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_stock: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub reservations: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub final_stock: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub expected_date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub historical_slit: String,
}

/// The two document layouts coexisting in the stock collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RecordSchema {
    /// One document per material, family keyword as a top-level field.
    #[default]
    Legacy,
    /// One document per family (document id is the keyword) with a `materials` array.
    Family,
}

impl StockMaterial {
    /// Projected stock falls under the safety level.
    pub fn is_below_safety(&self) -> bool {
        self.final_stock < self.safety_stock
    }

    /// Projected stock meets or exceeds the safety level.
    pub fn is_sufficient(&self) -> bool {
        self.final_stock >= self.safety_stock
    }
}

/// Materials sharing one trimmed keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstrateFamily {
    pub key: String,
    pub materials: Vec<StockMaterial>,
}

impl SubstrateFamily {
    pub fn new(key: impl Into<String>, materials: Vec<StockMaterial>) -> Self {
        Self {
            key: key.into(),
            materials,
        }
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn all_sufficient(&self) -> bool {
        self.materials.iter().all(StockMaterial::is_sufficient)
    }

    pub fn contains_material(&self, material_id: &str) -> bool {
        self.materials.iter().any(|m| m.material_id == material_id)
    }

    /// Distinct origin documents, sorted.
    pub fn origin_documents(&self) -> BTreeSet<&str> {
        self.materials.iter().map(|m| m.doc_id.as_str()).collect()
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().replace(',', ".").parse().unwrap_or(0.0),
        _ => 0.0,
    })
}
