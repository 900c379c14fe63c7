//! System prompt loading, the per-family context payload and rule reasoning texts.

use std::path::Path;

use serde::Serialize;

use super::error::ReplenishmentError;
use crate::models::{StockMaterial, SubstrateFamily};

/// Built-in prompt used when no prompt file is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../../../resources/system_prompt.md");

/// Read the system prompt from `path`, or fall back to the built-in one.
pub fn load_system_prompt(path: Option<&Path>) -> Result<String, ReplenishmentError> {
    let prompt = match path {
        Some(p) => std::fs::read_to_string(p).map_err(|e| ReplenishmentError::Prompt {
            path: p.to_path_buf(),
            reason: e.to_string(),
        })?,
        None => DEFAULT_SYSTEM_PROMPT.to_string(),
    };

    if prompt.trim().is_empty() {
        return Err(ReplenishmentError::Prompt {
            path: path.map(Path::to_path_buf).unwrap_or_default(),
            reason: "prompt is empty".into(),
        });
    }

    tracing::info!(
        source = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "built-in".into()),
        chars = prompt.chars().count(),
        "Loaded system prompt"
    );
    Ok(prompt)
}

/// What the model sees for one material.
#[derive(Debug, Serialize)]
struct MaterialContext<'a> {
    material_id: &'a str,
    supplier_keyword: &'a str,
    keyword: &'a str,
    width: &'a str,
    length: &'a str,
    ref_at_supplier: &'a str,
    description: &'a str,
    lead_time: &'a str,
    safety_stock: f64,
    total_stock: f64,
    reservations: f64,
    final_stock: f64,
    expected_date: &'a str,
    historical_slit: &'a str,
}

impl<'a> From<&'a StockMaterial> for MaterialContext<'a> {
    fn from(m: &'a StockMaterial) -> Self {
        Self {
            material_id: &m.material_id,
            supplier_keyword: &m.supplier_keyword,
            keyword: &m.keyword,
            width: &m.width,
            length: &m.length,
            ref_at_supplier: &m.ref_at_supplier,
            description: &m.description,
            lead_time: &m.lead_time,
            safety_stock: m.safety_stock,
            total_stock: m.total_stock,
            reservations: m.reservations,
            final_stock: m.final_stock,
            expected_date: &m.expected_date,
            historical_slit: &m.historical_slit,
        }
    }
}

/// Pretty-printed JSON array, one object per material, in family order.
pub fn build_stock_context(family: &SubstrateFamily) -> Result<String, ReplenishmentError> {
    let context: Vec<MaterialContext<'_>> = family.materials.iter().map(Into::into).collect();
    Ok(serde_json::to_string_pretty(&context)?)
}

pub fn single_material_reasoning(material: &StockMaterial, replenish: bool) -> String {
    let (label, meaning) = if replenish {
        ("YES", "Replenishment needed")
    } else {
        ("NO", "Stock sufficient")
    };
    format!(
        "Rule-based decision for {}:\n- Final Stock: {}\n- Safety Stock: {}\n- Decision: {} ({})",
        material.material_id, material.final_stock, material.safety_stock, label, meaning
    )
}

pub fn sufficient_family_reasoning(material: &StockMaterial, family_size: usize) -> String {
    format!(
        "Rule-based decision (multi-material optimization):\n\
         - All {} materials in family have sufficient stock\n\
         - Material {}: Final Stock ({}) >= Safety Stock ({})\n\
         - Decision: NO action needed",
        family_size, material.material_id, material.final_stock, material.safety_stock
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn material(id: &str, final_stock: f64, safety_stock: f64) -> StockMaterial {
        StockMaterial {
            material_id: id.into(),
            keyword: "PET 12".into(),
            width: "1250".into(),
            final_stock,
            safety_stock,
            ..Default::default()
        }
    }

    #[test]
    fn context_lists_every_material_field() {
        let family = SubstrateFamily::new("PET 12", vec![material("M1", 5.0, 10.0), material("M2", 3.5, 1.0)]);
        let text = build_stock_context(&family).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();

        let items = parsed.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["material_id"], "M1");
        assert_eq!(items[0]["width"], "1250");
        assert_eq!(items[1]["final_stock"], 3.5);
        assert_eq!(items[0].as_object().unwrap().len(), 14);
        assert!(text.contains('\n'), "payload should be pretty-printed");
    }

    #[test]
    fn context_omits_bookkeeping_fields() {
        let mut m = material("M1", 1.0, 2.0);
        m.doc_id = "doc-1".into();
        let text = build_stock_context(&SubstrateFamily::new("k", vec![m])).unwrap();
        assert!(!text.contains("doc-1"));
    }

    #[test]
    fn single_material_reasoning_states_decision() {
        let text = single_material_reasoning(&material("M1", 5.0, 10.0), true);
        assert_eq!(
            text,
            "Rule-based decision for M1:\n- Final Stock: 5\n- Safety Stock: 10\n- Decision: YES (Replenishment needed)"
        );
        assert!(single_material_reasoning(&material("M1", 10.0, 5.0), false).ends_with("NO (Stock sufficient)"));
    }

    #[test]
    fn sufficient_family_reasoning_names_material() {
        let text = sufficient_family_reasoning(&material("M2", 20.0, 5.0), 2);
        assert!(text.starts_with("Rule-based decision (multi-material optimization):"));
        assert!(text.contains("All 2 materials"));
        assert!(text.contains("Material M2: Final Stock (20) >= Safety Stock (5)"));
    }

    #[test]
    fn builtin_prompt_loads() {
        let prompt = load_system_prompt(None).unwrap();
        assert!(prompt.contains("```json"));
    }

    #[test]
    fn prompt_file_is_read_or_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("prompt.md");
        std::fs::write(&path, "Decide.").unwrap();
        assert_eq!(load_system_prompt(Some(&path)).unwrap(), "Decide.");

        let missing = tmp.path().join("missing.md");
        let err = load_system_prompt(Some(&missing)).unwrap_err();
        assert!(matches!(err, ReplenishmentError::Prompt { .. }));
    }
}
