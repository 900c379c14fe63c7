//! Extracts per-material conclusions from free-form model output.
//!
//! The model is asked for prose followed by one ```` ```json ```` block holding an
//! array of `{"Material ID", "Conclusion"}` entries. Anything short of that
//! degrades to NO for every material; parsing never fails the family.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde_json::Value;

use crate::models::{Conclusion, MaterialResult, SubstrateFamily};
use crate::pipeline::diagnostic;

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").unwrap());
static ANY_JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\s*[\s\S]*?\s*```").unwrap());
static ANY_FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[\s\S]*?```").unwrap());
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\n+").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const MATERIAL_ID_KEYS: &[&str] = &["Material ID", "material_id", "materialId"];
const CONCLUSION_KEYS: &[&str] = &["Conclusion", "conclusion"];

/// Length of the reasoning excerpt shown in progress logs.
const PREVIEW_CHARS: usize = 300;

/// Replace fenced blocks with `...` so the rationale reads without payloads.
pub fn strip_json_blocks(text: &str) -> String {
    let cleaned = ANY_JSON_BLOCK.replace_all(text, "...");
    let cleaned = ANY_FENCED_BLOCK.replace_all(&cleaned, "...");
    let cleaned = BLANK_RUNS.replace_all(&cleaned, "\n\n");
    cleaned.trim().to_string()
}

/// Content of the first ```` ```json ```` block, if any.
pub fn extract_json_block(text: &str) -> Option<&str> {
    JSON_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Single-line excerpt of the prose before the JSON block, for logs.
/// `None` when there is no meaningful prose.
pub fn reasoning_preview(text: &str) -> Option<String> {
    let before = text.split("```json").next().unwrap_or_default().trim();
    if before.chars().count() < 10 {
        return None;
    }
    let flat = WHITESPACE.replace_all(before, " ");
    let mut preview: String = flat.chars().take(PREVIEW_CHARS).collect();
    if flat.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    Some(preview)
}

/// Turns raw model output into one [`MaterialResult`] per family material.
#[derive(Debug, Clone, Default)]
pub struct ResponseParser {
    dump_dir: Option<PathBuf>,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode failures are written to `dir` for postmortem.
    pub fn with_dump_dir(dir: Option<PathBuf>) -> Self {
        Self { dump_dir: dir }
    }

    pub fn parse(&self, raw: &str, family: &SubstrateFamily, model: &str) -> Vec<MaterialResult> {
        let now = Utc::now();
        let reasoning = strip_json_blocks(raw);

        let Some(payload) = extract_json_block(raw) else {
            let preview: String = raw.chars().take(200).collect();
            tracing::warn!(
                family = %family.key,
                preview = %preview,
                "No JSON block in model response, defaulting every material to NO"
            );
            return fallback(family, reasoning, model);
        };

        let decoded: Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                let dump = self
                    .dump_dir
                    .as_deref()
                    .and_then(|dir| diagnostic::dump_parse_failure(dir, &e.to_string(), raw, payload));
                tracing::error!(
                    family = %family.key,
                    error = %e,
                    line = e.line(),
                    column = e.column(),
                    dump = ?dump,
                    "JSON block in model response does not decode, defaulting every material to NO"
                );
                return fallback(family, format!("JSON Parse Error: {e}\n\n{reasoning}"), model);
            }
        };

        let entries = match decoded {
            Value::Array(items) => items,
            other => vec![other],
        };

        let mut answers: HashMap<String, Conclusion> = HashMap::new();
        for entry in &entries {
            let Some(material_id) = field_text(entry, MATERIAL_ID_KEYS) else {
                tracing::warn!(family = %family.key, entry = %entry, "Entry without material id, skipped");
                continue;
            };
            if !family.contains_material(&material_id) {
                tracing::warn!(
                    family = %family.key,
                    material_id = %material_id,
                    "Model named a material outside the family, skipped"
                );
                continue;
            }
            if answers.contains_key(&material_id) {
                tracing::warn!(
                    family = %family.key,
                    material_id = %material_id,
                    "Duplicate entry for material, keeping the first"
                );
                continue;
            }
            let conclusion = field_text(entry, CONCLUSION_KEYS)
                .map(|c| Conclusion::from_model_output(&c))
                .unwrap_or(Conclusion::No);
            answers.insert(material_id, conclusion);
        }

        // One result per material, so origin documents sharing a material id
        // each get theirs.
        family
            .materials
            .iter()
            .map(|material| {
                let conclusion = answers.get(&material.material_id).copied().unwrap_or_else(|| {
                    tracing::warn!(
                        family = %family.key,
                        material_id = %material.material_id,
                        "Model omitted material, defaulting to NO"
                    );
                    Conclusion::No
                });
                MaterialResult::ai(material.material_id.clone(), conclusion, reasoning.clone(), now, model)
            })
            .collect()
    }
}

fn fallback(family: &SubstrateFamily, reasoning: String, model: &str) -> Vec<MaterialResult> {
    let now = Utc::now();
    family
        .materials
        .iter()
        .map(|m| MaterialResult::ai(m.material_id.clone(), Conclusion::No, reasoning.clone(), now, model))
        .collect()
}

/// First non-empty scalar under any of `keys`. Object values may carry the
/// scalar under `value` or `example value`.
fn field_text(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| entry.get(*k))
        .find_map(|v| match v {
            Value::Object(map) => map
                .get("example value")
                .or_else(|| map.get("value"))
                .and_then(scalar_text),
            other => scalar_text(other),
        })
}

fn scalar_text(v: &Value) -> Option<String> {
    let text = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DecisionMethod, StockMaterial};

    fn family(ids: &[&str]) -> SubstrateFamily {
        SubstrateFamily::new(
            "F3",
            ids.iter()
                .map(|id| StockMaterial {
                    material_id: id.to_string(),
                    ..Default::default()
                })
                .collect(),
        )
    }

    fn conclusion_of(results: &[MaterialResult], id: &str) -> Conclusion {
        results.iter().find(|r| r.material_id == id).unwrap().conclusion
    }

    #[test]
    fn lowercase_conclusion_matches() {
        let raw = "M1 is short.\n\n```json\n[{\"Material ID\": \"M1\", \"Conclusion\": \"yes\"}, {\"Material ID\": \"M2\", \"Conclusion\": \"No\"}, {\"Material ID\": \"M3\", \"Conclusion\": \"slit\"}]\n```";
        let results = ResponseParser::new().parse(raw, &family(&["M1", "M2", "M3"]), "model-x");

        assert_eq!(results.len(), 3);
        assert_eq!(conclusion_of(&results, "M1"), Conclusion::Yes);
        assert_eq!(conclusion_of(&results, "M2"), Conclusion::No);
        assert_eq!(conclusion_of(&results, "M3"), Conclusion::Slit);
        assert!(results.iter().all(|r| r.method == DecisionMethod::Ai && r.model == "model-x"));
    }

    #[test]
    fn reasoning_has_payload_replaced_by_ellipsis() {
        let raw = "Analysis first.\n\n\n```json\n[{\"Material ID\": \"M1\", \"Conclusion\": \"YES\"}]\n```\n\nDone.";
        let results = ResponseParser::new().parse(raw, &family(&["M1"]), "m");
        assert_eq!(results[0].reasoning, "Analysis first.\n\n...\n\nDone.");
    }

    #[test]
    fn plain_text_defaults_every_material_to_no() {
        let raw = "I could not decide anything about these materials.";
        let results = ResponseParser::new().parse(raw, &family(&["M1", "M2"]), "m");

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.conclusion == Conclusion::No));
        assert!(results.iter().all(|r| r.reasoning == raw));
    }

    #[test]
    fn undecodable_block_defaults_to_no_and_dumps() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = "Reasoning.\n```json\n[{\"Material ID\": \"M1\", \"Conclusion\": YES}]\n```";
        let parser = ResponseParser::with_dump_dir(Some(tmp.path().to_path_buf()));

        let results = parser.parse(raw, &family(&["M1", "M2"]), "m");

        assert!(results.iter().all(|r| r.conclusion == Conclusion::No));
        assert!(results[0].reasoning.starts_with("JSON Parse Error: "));
        assert!(results[0].reasoning.ends_with("Reasoning.\n..."));
        let dumps: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(dumps.len(), 1);
    }

    #[test]
    fn unknown_conclusion_coerces_to_no() {
        let raw = "```json\n[{\"Material ID\": \"M1\", \"Conclusion\": \"ORDER NOW\"}]\n```";
        let results = ResponseParser::new().parse(raw, &family(&["M1"]), "m");
        assert_eq!(results[0].conclusion, Conclusion::No);
    }

    #[test]
    fn example_value_and_value_objects_are_read() {
        let raw = r#"```json
[
  {"Material ID": {"example value": "M1"}, "Conclusion": {"example value": "SLIT"}},
  {"Material ID": {"value": "M2"}, "Conclusion": {"value": "yes"}}
]
```"#;
        let results = ResponseParser::new().parse(raw, &family(&["M1", "M2"]), "m");
        assert_eq!(conclusion_of(&results, "M1"), Conclusion::Slit);
        assert_eq!(conclusion_of(&results, "M2"), Conclusion::Yes);
    }

    #[test]
    fn single_object_is_treated_as_array() {
        let raw = "```json\n{\"material_id\": 42, \"conclusion\": \"YES\"}\n```";
        let results = ResponseParser::new().parse(raw, &family(&["42"]), "m");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].conclusion, Conclusion::Yes);
    }

    #[test]
    fn foreign_and_duplicate_entries_are_dropped() {
        let raw = r#"```json
[
  {"Material ID": "M1", "Conclusion": "YES"},
  {"Material ID": "ZZZ", "Conclusion": "YES"},
  {"Material ID": "M1", "Conclusion": "NO"}
]
```"#;
        let results = ResponseParser::new().parse(raw, &family(&["M1", "M2"]), "m");

        assert_eq!(results.len(), 2);
        assert_eq!(conclusion_of(&results, "M1"), Conclusion::Yes);
        assert_eq!(conclusion_of(&results, "M2"), Conclusion::No);
        assert!(results.iter().all(|r| r.material_id != "ZZZ"));
    }

    #[test]
    fn materials_sharing_an_id_each_get_a_result() {
        let raw = "```json\n[{\"Material ID\": \"M1\", \"Conclusion\": \"YES\"}]\n```";
        let results = ResponseParser::new().parse(raw, &family(&["M1", "M1", "M2"]), "m");

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].conclusion, Conclusion::Yes);
        assert_eq!(results[1].conclusion, Conclusion::Yes);
        assert_eq!(results[2].conclusion, Conclusion::No);

        let degraded = ResponseParser::new().parse("no block", &family(&["M1", "M1"]), "m");
        assert_eq!(degraded.len(), 2);
    }

    #[test]
    fn strip_handles_untagged_fences() {
        let text = "a\n```\nraw\n```\nb";
        assert_eq!(strip_json_blocks(text), "a\n...\nb");
    }

    #[test]
    fn preview_uses_prose_before_block() {
        let text = "Line one\nline   two is here\n```json\n[]\n```";
        assert_eq!(reasoning_preview(text).unwrap(), "Line one line two is here");
        assert!(reasoning_preview("```json\n[]\n```").is_none());

        let long = "x".repeat(400);
        let preview = reasoning_preview(&long).unwrap();
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));
    }
}
