use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Conclusion, DecisionMethod};

/// Model identifier recorded for decisions that never reached the inference service.
pub const RULE_BASED_MODEL: &str = "rule-based";

/// Decision for one material. Field names follow the stored document fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialResult {
    pub material_id: String,
    #[serde(rename = "ai_conclusion")]
    pub conclusion: Conclusion,
    #[serde(rename = "ai_output_text")]
    pub reasoning: String,
    #[serde(rename = "ai_processed_at")]
    pub processed_at: DateTime<Utc>,
    #[serde(rename = "ai_model")]
    pub model: String,
    #[serde(rename = "processing_method")]
    pub method: DecisionMethod,
}

impl MaterialResult {
    pub fn rule_based(
        material_id: impl Into<String>,
        conclusion: Conclusion,
        reasoning: String,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            material_id: material_id.into(),
            conclusion,
            reasoning,
            processed_at,
            model: RULE_BASED_MODEL.to_string(),
            method: DecisionMethod::Rule,
        }
    }

    pub fn ai(
        material_id: impl Into<String>,
        conclusion: Conclusion,
        reasoning: String,
        processed_at: DateTime<Utc>,
        model: &str,
    ) -> Self {
        Self {
            material_id: material_id.into(),
            conclusion,
            reasoning,
            processed_at,
            model: model.to_string(),
            method: DecisionMethod::Ai,
        }
    }
}

/// Per-conclusion tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConclusionCounts {
    pub yes: usize,
    pub no: usize,
    pub slit: usize,
}

impl ConclusionCounts {
    pub fn add(&mut self, conclusion: Conclusion) {
        match conclusion {
            Conclusion::Yes => self.yes += 1,
            Conclusion::No => self.no += 1,
            Conclusion::Slit => self.slit += 1,
        }
    }

    pub fn from_results(results: &[MaterialResult]) -> Self {
        let mut counts = Self::default();
        for r in results {
            counts.add(r.conclusion);
        }
        counts
    }

    pub fn merge(&mut self, other: &ConclusionCounts) {
        self.yes += other.yes;
        self.no += other.no;
        self.slit += other.slit;
    }

    pub fn total(&self) -> usize {
        self.yes + self.no + self.slit
    }
}

/// Outcome of processing one family.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    pub key: String,
    pub material_count: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub materials: Vec<MaterialResult>,
    pub timestamp: DateTime<Utc>,
    pub method: DecisionMethod,
}

impl ProcessingResult {
    pub fn succeeded(
        key: impl Into<String>,
        material_count: usize,
        materials: Vec<MaterialResult>,
        method: DecisionMethod,
    ) -> Self {
        Self {
            key: key.into(),
            material_count,
            success: true,
            error: None,
            materials,
            timestamp: Utc::now(),
            method,
        }
    }

    pub fn failed(key: impl Into<String>, material_count: usize, error: String) -> Self {
        Self {
            key: key.into(),
            material_count,
            success: false,
            error: Some(error),
            materials: Vec::new(),
            timestamp: Utc::now(),
            method: DecisionMethod::Ai,
        }
    }

    /// Family-level conclusion over every material result.
    pub fn aggregate_conclusion(&self) -> Conclusion {
        Conclusion::aggregate(self.materials.iter().map(|m| &m.conclusion))
    }

    pub fn conclusion_counts(&self) -> ConclusionCounts {
        ConclusionCounts::from_results(&self.materials)
    }
}
