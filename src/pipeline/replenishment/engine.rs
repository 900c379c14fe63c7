//! Per-family decision policy.
//!
//! Evaluated in order:
//! 1. one material: YES when final stock is below safety stock, else NO
//! 2. every material at or above safety stock: NO for all
//! 3. otherwise the inference service arbitrates
//!
//! Only step 3 leaves the process. Nothing here writes anywhere.

use std::sync::Arc;

use chrono::Utc;

use super::error::ReplenishmentError;
use super::parser::ResponseParser;
use super::prompt::{build_stock_context, single_material_reasoning, sufficient_family_reasoning};
use crate::models::{Conclusion, DecisionMethod, MaterialResult, SubstrateFamily};
use crate::pipeline::inference::LlmClient;

/// Complete decision set for one family.
#[derive(Debug, Clone)]
pub struct FamilyDecision {
    pub results: Vec<MaterialResult>,
    pub method: DecisionMethod,
    /// Raw model output, kept for progress logging. `None` for rule decisions.
    pub raw_response: Option<String>,
}

pub struct DecisionEngine {
    llm: Arc<dyn LlmClient>,
    parser: ResponseParser,
    system_prompt: String,
    model: String,
}

impl DecisionEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        parser: ResponseParser,
        system_prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            parser,
            system_prompt: system_prompt.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn decide(&self, family: &SubstrateFamily) -> Result<FamilyDecision, ReplenishmentError> {
        if family.is_empty() {
            return Err(ReplenishmentError::EmptyFamily(family.key.clone()));
        }

        if let Some(results) = rule_decision(family) {
            tracing::debug!(family = %family.key, materials = family.len(), "Rule-based decision");
            return Ok(FamilyDecision {
                results,
                method: DecisionMethod::Rule,
                raw_response: None,
            });
        }

        let context = build_stock_context(family)?;
        tracing::debug!(
            family = %family.key,
            materials = family.len(),
            model = %self.model,
            payload_chars = context.len(),
            "Requesting AI arbitration"
        );
        let raw = self
            .llm
            .complete(&self.system_prompt, &context, &self.model)
            .await?;
        let results = self.parser.parse(&raw, family, &self.model);

        Ok(FamilyDecision {
            results,
            method: DecisionMethod::Ai,
            raw_response: Some(raw),
        })
    }
}

/// Decision without the inference service, when one of the local rules applies.
pub fn rule_decision(family: &SubstrateFamily) -> Option<Vec<MaterialResult>> {
    let now = Utc::now();

    if let [material] = family.materials.as_slice() {
        let replenish = material.is_below_safety();
        let conclusion = if replenish { Conclusion::Yes } else { Conclusion::No };
        return Some(vec![MaterialResult::rule_based(
            material.material_id.clone(),
            conclusion,
            single_material_reasoning(material, replenish),
            now,
        )]);
    }

    if !family.is_empty() && family.all_sufficient() {
        return Some(
            family
                .materials
                .iter()
                .map(|m| {
                    MaterialResult::rule_based(
                        m.material_id.clone(),
                        Conclusion::No,
                        sufficient_family_reasoning(m, family.len()),
                        now,
                    )
                })
                .collect(),
        );
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StockMaterial, RULE_BASED_MODEL};
    use crate::pipeline::inference::mock::MockLlmClient;
    use crate::pipeline::inference::InferenceError;

    fn material(id: &str, final_stock: f64, safety_stock: f64) -> StockMaterial {
        StockMaterial {
            material_id: id.into(),
            final_stock,
            safety_stock,
            ..Default::default()
        }
    }

    fn engine(llm: Arc<MockLlmClient>) -> DecisionEngine {
        DecisionEngine::new(llm, ResponseParser::new(), "SYSTEM", "model-x")
    }

    #[tokio::test]
    async fn single_short_material_is_yes_without_network() {
        let llm = Arc::new(MockLlmClient::new("unused"));
        let family = SubstrateFamily::new("F1", vec![material("M1", 5.0, 10.0)]);

        let decision = engine(llm.clone()).decide(&family).await.unwrap();

        assert_eq!(decision.method, DecisionMethod::Rule);
        assert_eq!(decision.results.len(), 1);
        assert_eq!(decision.results[0].conclusion, Conclusion::Yes);
        assert_eq!(decision.results[0].model, RULE_BASED_MODEL);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn single_material_at_safety_level_is_no() {
        let llm = Arc::new(MockLlmClient::new("unused"));
        let family = SubstrateFamily::new("F1", vec![material("M1", 10.0, 10.0)]);

        let decision = engine(llm.clone()).decide(&family).await.unwrap();

        assert_eq!(decision.results[0].conclusion, Conclusion::No);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn sufficient_family_is_all_no_without_network() {
        let llm = Arc::new(MockLlmClient::new("unused"));
        let family = SubstrateFamily::new("F2", vec![material("M1", 10.0, 10.0), material("M2", 20.0, 5.0)]);

        let decision = engine(llm.clone()).decide(&family).await.unwrap();

        assert_eq!(decision.method, DecisionMethod::Rule);
        assert!(decision.results.iter().all(|r| r.conclusion == Conclusion::No));
        assert!(decision.results.iter().all(|r| r.method == DecisionMethod::Rule));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn short_family_goes_to_inference() {
        let llm = Arc::new(MockLlmClient::new(
            "M1 runs out.\n```json\n[{\"Material ID\": \"M1\", \"Conclusion\": \"yes\"}]\n```",
        ));
        let family = SubstrateFamily::new(
            "F3",
            vec![material("M1", 1.0, 10.0), material("M2", 50.0, 10.0), material("M3", 30.0, 10.0)],
        );

        let decision = engine(llm.clone()).decide(&family).await.unwrap();

        assert_eq!(llm.calls(), 1);
        assert_eq!(decision.method, DecisionMethod::Ai);
        assert_eq!(decision.results.len(), 3);
        let m1 = decision.results.iter().find(|r| r.material_id == "M1").unwrap();
        assert_eq!(m1.conclusion, Conclusion::Yes);
        assert_eq!(m1.model, "model-x");

        let payload: serde_json::Value = serde_json::from_str(&llm.payloads()[0]).unwrap();
        assert_eq!(payload.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn inference_failure_propagates() {
        let llm = Arc::new(MockLlmClient::new("unused").then(Err(InferenceError::Service {
            status: 400,
            body: "bad".into(),
        })));
        let family = SubstrateFamily::new("F3", vec![material("M1", 1.0, 10.0), material("M2", 50.0, 10.0)]);

        let err = engine(llm).decide(&family).await.unwrap_err();

        assert!(matches!(err, ReplenishmentError::Inference(InferenceError::Service { status: 400, .. })));
    }

    #[tokio::test]
    async fn empty_family_is_rejected() {
        let llm = Arc::new(MockLlmClient::new("unused"));
        let err = engine(llm).decide(&SubstrateFamily::new("E", vec![])).await.unwrap_err();
        assert!(matches!(err, ReplenishmentError::EmptyFamily(_)));
    }
}
