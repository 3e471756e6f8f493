//! The orchestrator (C6): the runtime's public entry point. Binds a
//! per-execution tool registry from a descriptor, drives the executor
//! (optionally wrapped in the evaluation controller's iteration loop), and
//! returns the sealed `Execution`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::descriptor::AgentDescriptor;
use crate::embedding::EmbeddingRegistry;
use crate::evaluation::EvaluationController;
use crate::executor::{Executor, ExecutorConfig, GenerationFns};
use crate::tools::{ToolRegistry, ToolSpec};
use crate::types::Execution;
use crate::utilities::errors::RuntimeError;

/// The process-wide catalog of tool implementations an orchestrator may
/// bind into a per-execution `ToolRegistry`. Keyed by tool name; an
/// `AgentDescriptor` naming a tool absent from the catalog simply leaves
/// that tool unavailable (the model sees a "tool not found" observation if
/// it tries to call it — §4.3).
pub type ToolCatalog = HashMap<String, ToolSpec>;

/// Wires C1 (descriptor lookup), C2 (routing), C3 (tool binding), C4
/// (execution) and C5 (evaluation) together behind the three public entry
/// points described in §4.6.
pub struct Orchestrator {
    embedding_registry: Arc<EmbeddingRegistry>,
    tool_catalog: Arc<ToolCatalog>,
    generation: GenerationFns,
    evaluation: Option<Arc<EvaluationController>>,
}

impl Orchestrator {
    pub fn new(
        embedding_registry: Arc<EmbeddingRegistry>,
        tool_catalog: Arc<ToolCatalog>,
        generation: GenerationFns,
        evaluation: Option<Arc<EvaluationController>>,
    ) -> Self {
        Self { embedding_registry, tool_catalog, generation, evaluation }
    }

    /// Legacy path: invoke the executor once on a pre-configured agent, no
    /// evaluation.
    pub async fn execute(&self, ctx: CancellationToken, task: &str, descriptor: &AgentDescriptor) -> Execution {
        self.build_executor(descriptor).run(ctx, task).await
    }

    /// Full path per §4.5/§4.6. Degenerates to a single executor run
    /// (`Execution.iterations` stays 0) when the descriptor has no
    /// evaluation config, evaluation is disabled, or no evaluation
    /// controller is configured on this orchestrator.
    pub async fn execute_with_evaluation(
        &self,
        ctx: CancellationToken,
        task: &str,
        descriptor: &AgentDescriptor,
    ) -> Execution {
        let evaluation_enabled = descriptor.evaluation.as_ref().map(|c| c.enabled).unwrap_or(false);
        let Some(controller) = self.evaluation.as_ref().filter(|_| evaluation_enabled) else {
            return self.execute(ctx, task, descriptor).await;
        };

        let executor = self.build_executor(descriptor);

        let mut execution = executor.run(ctx.clone(), task).await;
        let mut iteration: u32 = 1;
        let mut eval_result = controller.evaluate(ctx.clone(), descriptor, task, &execution.result, iteration).await;
        execution.evaluation_results.push(eval_result.clone());

        while EvaluationController::should_iterate(descriptor, &eval_result, iteration) {
            if ctx.is_cancelled() {
                break;
            }

            let improvement_prompt =
                EvaluationController::build_improvement_prompt(descriptor, task, &execution.result, &eval_result);

            let next_execution = executor.run(ctx.clone(), &improvement_prompt).await;
            iteration += 1;

            eval_result = controller.evaluate(ctx.clone(), descriptor, task, &next_execution.result, iteration).await;

            execution.steps = next_execution.steps;
            execution.result = next_execution.result;
            for tool in &next_execution.tools_used {
                execution.record_tool_used(tool);
            }
            execution.status = next_execution.status;
            execution.evaluation_results.push(eval_result.clone());
        }

        execution.iterations = iteration;
        execution.final_quality_score = eval_result.score;
        execution
    }

    /// Route `task` to the best-matching agent via the embedding registry,
    /// then run it through `execute_with_evaluation`.
    pub async fn route_and_execute(&self, ctx: CancellationToken, task: &str) -> Result<Execution, RuntimeError> {
        let descriptor = self.embedding_registry.find_best(ctx.clone(), task).await?;
        Ok(self.execute_with_evaluation(ctx, task, &descriptor).await)
    }

    /// Build a per-execution tool registry and executor from `descriptor`,
    /// restricting to its enabled tool entries (§4.6).
    fn build_executor(&self, descriptor: &AgentDescriptor) -> Executor {
        let mut tools = ToolRegistry::new();
        let mut tool_defaults = HashMap::new();
        for tool_config in descriptor.enabled_tools() {
            if let Some(spec) = self.tool_catalog.get(&tool_config.name) {
                tools.register(spec.clone());
            }
            if !tool_config.config.is_empty() {
                tool_defaults.insert(tool_config.name.clone(), tool_config.config.clone());
            }
        }

        let config = ExecutorConfig {
            model: descriptor.model.clone(),
            max_steps: descriptor.max_steps,
            system_prompt_template: descriptor.system_prompt.clone(),
        };

        Executor::new(config, tools, self.generation.clone()).with_tool_defaults(tool_defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Criterion, EvaluationConfig, ToolConfig};
    use crate::evaluation::EvaluationGenerationFn;
    use crate::executor::{GenerationFuture, PlainGenerationFn};
    use crate::tools::builtin::ExprTool;
    use std::collections::HashMap as Map;
    use std::time::Duration;

    fn descriptor(id: &str, evaluation: Option<EvaluationConfig>) -> AgentDescriptor {
        AgentDescriptor {
            id: id.to_string(),
            name: "Agent".to_string(),
            description: String::new(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_steps: 10,
            timeout: Duration::from_secs(120),
            system_prompt: "Be helpful.\n\n{{TOOLS}}".to_string(),
            tools: vec![ToolConfig { name: "calculator".to_string(), enabled: true, config: Default::default() }],
            evaluation,
            embedding: Vec::new(),
            embedding_hash: String::new(),
            metadata: Map::new(),
            source_path: None,
            loaded_at: None,
        }
    }

    fn catalog() -> Arc<ToolCatalog> {
        let mut catalog = ToolCatalog::new();
        let spec = ExprTool::spec();
        catalog.insert(spec.name.clone(), spec);
        Arc::new(catalog)
    }

    fn scripted_plain(responses: Vec<&'static str>) -> GenerationFns {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let responses: Vec<String> = responses.into_iter().map(String::from).collect();
        let f: PlainGenerationFn = Arc::new(move |_ctx, _messages| {
            let i = calls.fetch_add(1, Ordering::SeqCst);
            let responses = responses.clone();
            Box::pin(async move { responses.get(i).cloned().ok_or_else(|| "exhausted".to_string()) })
        });
        GenerationFns::plain(f)
    }

    #[tokio::test]
    async fn execute_with_evaluation_degenerates_without_evaluation_config() {
        let orchestrator = Orchestrator::new(
            Arc::new(EmbeddingRegistry::new()),
            catalog(),
            scripted_plain(vec!["THOUGHT: x\nACTION: FINAL_ANSWER\nACTION_INPUT: {\"input\":\"done\"}"]),
            None,
        );
        let descriptor = descriptor("agent-1", None);
        let execution = orchestrator.execute_with_evaluation(CancellationToken::new(), "task", &descriptor).await;
        assert_eq!(execution.iterations, 0);
        assert_eq!(execution.result, "done");
    }

    #[tokio::test]
    async fn evaluation_loop_converges_across_three_iterations() {
        let scores = Arc::new(std::sync::Mutex::new(vec![0.5, 0.7, 0.85].into_iter()));
        let eval_fn: EvaluationGenerationFn = Arc::new(move |_ctx, _model, _temp, _messages| {
            let scores = scores.clone();
            Box::pin(async move {
                let score = scores.lock().unwrap().next().unwrap();
                let passed = score >= 0.8;
                Ok(format!(
                    "{{\"passed\": {passed}, \"score\": {score}, \"criteria_results\": [], \"feedback\": \"iter\", \"improvements\": []}}"
                ))
            }) as GenerationFuture
        });

        let criteria = vec![Criterion { name: "clarity".to_string(), check: "clear".to_string(), required: false, weight: 1.0 }];
        let evaluation_config = EvaluationConfig { enabled: true, max_iterations: 3, min_quality_score: 0.7, criteria, ..Default::default() };
        let descriptor = descriptor("agent-1", Some(evaluation_config));

        let orchestrator = Orchestrator::new(
            Arc::new(EmbeddingRegistry::new()),
            catalog(),
            scripted_plain(vec![
                "THOUGHT: a\nACTION: FINAL_ANSWER\nACTION_INPUT: {\"input\":\"first\"}",
                "THOUGHT: b\nACTION: FINAL_ANSWER\nACTION_INPUT: {\"input\":\"second\"}",
                "THOUGHT: c\nACTION: FINAL_ANSWER\nACTION_INPUT: {\"input\":\"third\"}",
            ]),
            Some(Arc::new(EvaluationController::new(eval_fn))),
        );

        let execution = orchestrator.execute_with_evaluation(CancellationToken::new(), "task", &descriptor).await;

        assert_eq!(execution.iterations, 3);
        assert_eq!(execution.evaluation_results.len(), 3);
        assert!((execution.final_quality_score - 0.85).abs() < 1e-9);
        assert!(execution.evaluation_results.last().unwrap().passed);
        // Each iteration reruns the executor from scratch; the returned
        // Execution must carry only the latest run's steps, never the sum
        // across iterations.
        assert!(execution.steps.len() as u32 <= descriptor.max_steps);
    }
}
