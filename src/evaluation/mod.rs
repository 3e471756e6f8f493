//! The self-evaluation controller (C5): grades an executor's candidate
//! answer against a descriptor's declared criteria and decides whether to
//! iterate.

pub mod json_extract;

use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::descriptor::{AgentDescriptor, Criterion, EvaluationConfig};
use crate::executor::GenerationFuture;
use crate::types::{CriterionResult, EvaluationResult, Message};

/// The fixed system message casting the model as an objective grader.
const EVALUATOR_SYSTEM_MESSAGE: &str = "You are an objective evaluator. Grade the candidate result against \
the given criteria and respond with ONLY a JSON object of the shape \
{\"passed\": bool, \"score\": number, \"criteria_results\": [{\"name\": string, \"passed\": bool, \"feedback\": string}], \
\"feedback\": string, \"improvements\": [string]}. Do not include any other text.";

/// Temperature used for evaluation generation calls, per §4.5 step 3.
const EVALUATION_TEMPERATURE: f64 = 0.1;

/// Diagnostic feedback used when the heuristic fallback engages because the
/// evaluator's response could not be decoded as JSON.
const FALLBACK_DIAGNOSTIC: &str =
    "Evaluation response could not be parsed as JSON; applied length-based heuristic fallback.";

/// A temperature-aware generation call, used only by the evaluation
/// controller. The plain/model-aware shapes in `executor::GenerationFns`
/// carry no temperature parameter per the injected generation contract
/// (§6); this is a distinct, narrower callback so the evaluator's
/// "temperature = 0.1" requirement (§4.5 step 3) has somewhere to live
/// without widening the executor's external interface. See DESIGN.md.
pub type EvaluationGenerationFn =
    Arc<dyn Fn(CancellationToken, String, f64, Vec<Message>) -> GenerationFuture + Send + Sync>;

/// The JSON shape emitted by the evaluation model (§6 "Evaluator-JSON
/// shape").
#[derive(Debug, Clone, Deserialize)]
struct EvaluatorResponse {
    passed: bool,
    score: f64,
    #[serde(default)]
    criteria_results: Vec<DecodedCriterionResult>,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    improvements: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct DecodedCriterionResult {
    name: String,
    passed: bool,
    #[serde(default)]
    feedback: String,
}

/// Grades candidate answers and decides on further iteration. Stateless
/// beyond the injected generation callback.
pub struct EvaluationController {
    generate: EvaluationGenerationFn,
}

impl EvaluationController {
    pub fn new(generate: EvaluationGenerationFn) -> Self {
        Self { generate }
    }

    /// Grade `candidate_result` against `descriptor`'s evaluation config,
    /// per §4.5's `EvaluateResult` operation.
    pub async fn evaluate(
        &self,
        ctx: CancellationToken,
        descriptor: &AgentDescriptor,
        task: &str,
        candidate_result: &str,
        iteration: u32,
    ) -> EvaluationResult {
        let Some(config) = descriptor.evaluation.as_ref().filter(|c| c.enabled) else {
            return auto_pass();
        };

        let prompt = render_evaluation_prompt(config, task, candidate_result);
        let model = config.evaluation_model.clone().unwrap_or_else(|| descriptor.model.clone());

        let messages = vec![Message::system(EVALUATOR_SYSTEM_MESSAGE), Message::user(prompt)];
        let response = (self.generate)(ctx, model, EVALUATION_TEMPERATURE, messages).await;

        let mut result = match response {
            Ok(raw) => decode_evaluator_response(&raw, config, candidate_result, iteration),
            Err(_) => heuristic_fallback(config, candidate_result, iteration),
        };

        // Post-check per §4.5 step 6: a sub-threshold score or a failed
        // required criterion always forces an overall fail, regardless of
        // what the model (or the heuristic) claimed.
        if result.score < config.min_quality_score {
            result.passed = false;
        }
        if result.criteria_results.iter().any(|c| c.required && !c.passed) {
            result.passed = false;
        }

        result
    }

    /// §4.5 `ShouldIterate`: iterate iff evaluation is enabled, the last
    /// grade failed, and the iteration cap has not been reached.
    pub fn should_iterate(descriptor: &AgentDescriptor, eval_result: &EvaluationResult, current_iteration: u32) -> bool {
        let Some(config) = descriptor.evaluation.as_ref().filter(|c| c.enabled) else {
            return false;
        };
        !eval_result.passed && current_iteration < config.max_iterations
    }

    /// §4.5 `BuildImprovementPrompt`.
    pub fn build_improvement_prompt(
        descriptor: &AgentDescriptor,
        original_task: &str,
        previous_result: &str,
        eval_result: &EvaluationResult,
    ) -> String {
        let config = descriptor.evaluation.as_ref().cloned().unwrap_or_default();
        let failed_criteria = eval_result
            .criteria_results
            .iter()
            .filter(|c| !c.passed)
            .map(|c| format!("- {}: {}", c.name, c.feedback))
            .collect::<Vec<_>>()
            .join("\n");

        config
            .improvement_prompt
            .replace("{{ORIGINAL_TASK}}", original_task)
            .replace("{{PREVIOUS_RESULT}}", previous_result)
            .replace("{{EVALUATION_FEEDBACK}}", &eval_result.feedback)
            .replace("{{FAILED_CRITERIA}}", &failed_criteria)
    }
}

fn auto_pass() -> EvaluationResult {
    EvaluationResult {
        iteration: 1,
        passed: true,
        score: 1.0,
        criteria_results: Vec::new(),
        feedback: "Evaluation not configured - auto-pass".to_string(),
        improvements: Vec::new(),
    }
}

/// §4.5 step 2: numbered criteria rendering, `<i>. <name>[ [PFLICHT]]: <check>`.
fn render_criteria_list(criteria: &[Criterion]) -> String {
    criteria
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let marker = if c.required { " [PFLICHT]" } else { "" };
            format!("{}. {}{}: {}", i + 1, c.name, marker, c.check)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_evaluation_prompt(config: &EvaluationConfig, task: &str, result: &str) -> String {
    config
        .evaluation_prompt
        .replace("{{ORIGINAL_TASK}}", task)
        .replace("{{RESULT}}", result)
        .replace("{{CRITERIA_LIST}}", &render_criteria_list(&config.criteria))
}

/// Decode the evaluator's JSON response, per §4.5 step 4/5: extract →
/// decode → map onto configured criteria by name to copy `required` flags.
/// Falls back to the length-based heuristic on any decode failure.
fn decode_evaluator_response(
    raw: &str,
    config: &EvaluationConfig,
    candidate_result: &str,
    iteration: u32,
) -> EvaluationResult {
    let json_text = json_extract::extract_json_object(raw);
    let Ok(decoded) = serde_json::from_str::<EvaluatorResponse>(&json_text) else {
        return heuristic_fallback(config, candidate_result, iteration);
    };

    let criteria_results = decoded
        .criteria_results
        .into_iter()
        .map(|c| {
            let required = config.criteria.iter().find(|cfg| cfg.name == c.name).map(|cfg| cfg.required).unwrap_or(false);
            CriterionResult { name: c.name, passed: c.passed, required, feedback: c.feedback }
        })
        .collect();

    EvaluationResult {
        iteration,
        passed: decoded.passed,
        score: decoded.score,
        criteria_results,
        feedback: decoded.feedback,
        improvements: decoded.improvements,
    }
}

/// §4.5 step 5 fallback: deliberately fail-open (flagged in spec.md §9 as
/// a likely bug in a strict deployment — preserved as specified).
fn heuristic_fallback(config: &EvaluationConfig, candidate_result: &str, iteration: u32) -> EvaluationResult {
    let passed = candidate_result.len() > 100;
    let score = if passed { 0.7 } else { 0.5 };
    let criteria_results = config
        .criteria
        .iter()
        .map(|c| CriterionResult {
            name: c.name.clone(),
            passed: true,
            required: c.required,
            feedback: "manual review".to_string(),
        })
        .collect();

    EvaluationResult {
        iteration,
        passed,
        score,
        criteria_results,
        feedback: FALLBACK_DIAGNOSTIC.to_string(),
        improvements: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ToolConfig;
    use std::collections::HashMap;
    use std::time::Duration;

    fn descriptor_with_evaluation(config: EvaluationConfig) -> AgentDescriptor {
        AgentDescriptor {
            id: "a".to_string(),
            name: "Agent".to_string(),
            description: String::new(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_steps: 10,
            timeout: Duration::from_secs(120),
            system_prompt: "Be helpful.".to_string(),
            tools: Vec::<ToolConfig>::new(),
            evaluation: Some(config),
            embedding: Vec::new(),
            embedding_hash: String::new(),
            metadata: HashMap::new(),
            source_path: None,
            loaded_at: None,
        }
    }

    fn eval_config(criteria: Vec<Criterion>) -> EvaluationConfig {
        EvaluationConfig { enabled: true, criteria, ..Default::default() }
    }

    fn generation_returning(response: &'static str) -> EvaluationGenerationFn {
        Arc::new(move |_ctx, _model, _temp, _messages| Box::pin(async move { Ok(response.to_string()) }))
    }

    #[tokio::test]
    async fn disabled_evaluation_auto_passes() {
        let descriptor = {
            let mut d = descriptor_with_evaluation(eval_config(Vec::new()));
            d.evaluation.as_mut().unwrap().enabled = false;
            d
        };
        let controller = EvaluationController::new(generation_returning("irrelevant"));
        let result = controller.evaluate(CancellationToken::new(), &descriptor, "task", "result", 1).await;
        assert!(result.passed);
        assert_eq!(result.score, 1.0);
    }

    #[tokio::test]
    async fn decodes_fenced_json_and_maps_required_flags() {
        let criteria = vec![Criterion { name: "accuracy".to_string(), check: "is it correct".to_string(), required: true, weight: 1.0 }];
        let descriptor = descriptor_with_evaluation(eval_config(criteria));
        let response = "```json\n{\"passed\": true, \"score\": 0.9, \"criteria_results\": [{\"name\": \"accuracy\", \"passed\": true, \"feedback\": \"good\"}], \"feedback\": \"solid\", \"improvements\": []}\n```";
        let controller = EvaluationController::new(generation_returning(response));
        let result = controller.evaluate(CancellationToken::new(), &descriptor, "task", "result", 1).await;

        assert!(result.passed);
        assert_eq!(result.score, 0.9);
        assert!(result.criteria_results[0].required);
    }

    #[tokio::test]
    async fn score_below_threshold_forces_fail() {
        let descriptor = descriptor_with_evaluation(eval_config(Vec::new()));
        let response = "{\"passed\": true, \"score\": 0.2, \"criteria_results\": [], \"feedback\": \"meh\", \"improvements\": []}";
        let controller = EvaluationController::new(generation_returning(response));
        let result = controller.evaluate(CancellationToken::new(), &descriptor, "task", "result", 1).await;
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn failed_required_criterion_forces_fail_even_if_passed_true() {
        let criteria = vec![Criterion { name: "safety".to_string(), check: "is it safe".to_string(), required: true, weight: 1.0 }];
        let descriptor = descriptor_with_evaluation(eval_config(criteria));
        let response = "{\"passed\": true, \"score\": 0.95, \"criteria_results\": [{\"name\": \"safety\", \"passed\": false, \"feedback\": \"bad\"}], \"feedback\": \"x\", \"improvements\": []}";
        let controller = EvaluationController::new(generation_returning(response));
        let result = controller.evaluate(CancellationToken::new(), &descriptor, "task", "result", 1).await;
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn malformed_response_falls_back_to_heuristic() {
        let descriptor = descriptor_with_evaluation(eval_config(Vec::new()));
        let controller = EvaluationController::new(generation_returning("not json at all"));
        let long_result = "x".repeat(150);
        let result = controller.evaluate(CancellationToken::new(), &descriptor, "task", &long_result, 1).await;
        assert!(result.passed);
        assert_eq!(result.score, 0.7);
        assert_eq!(result.feedback, FALLBACK_DIAGNOSTIC);
    }

    #[test]
    fn should_iterate_respects_max_iterations() {
        let descriptor = descriptor_with_evaluation(EvaluationConfig { enabled: true, max_iterations: 2, ..Default::default() });
        let failing = EvaluationResult { iteration: 1, passed: false, score: 0.3, criteria_results: Vec::new(), feedback: String::new(), improvements: Vec::new() };
        assert!(EvaluationController::should_iterate(&descriptor, &failing, 1));
        assert!(!EvaluationController::should_iterate(&descriptor, &failing, 2));
    }

    #[test]
    fn build_improvement_prompt_substitutes_failed_criteria() {
        let descriptor = descriptor_with_evaluation(eval_config(Vec::new()));
        let eval_result = EvaluationResult {
            iteration: 1,
            passed: false,
            score: 0.4,
            criteria_results: vec![CriterionResult { name: "clarity".to_string(), passed: false, required: false, feedback: "too vague".to_string() }],
            feedback: "needs work".to_string(),
            improvements: Vec::new(),
        };
        let prompt = EvaluationController::build_improvement_prompt(&descriptor, "original", "previous", &eval_result);
        assert!(prompt.contains("original"));
        assert!(prompt.contains("previous"));
        assert!(prompt.contains("needs work"));
        assert!(prompt.contains("- clarity: too vague"));
    }
}
