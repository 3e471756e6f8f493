//! The Reason-Act executor (C4): a bounded loop that alternates model
//! generation with tool dispatch until a `FINAL_ANSWER` is produced or the
//! step cap is reached.

pub mod react;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::tools::{ToolOutcome, ToolRegistry};
use crate::types::{Execution, ExecutionStatus, ExecutionStep, Message, ToolCall, ToolResultRecord};
use crate::utilities::config::process_config;

/// Tool names treated as "web search" for the step-8 backpressure nudge.
/// Per §4.4/§9, this is a behavioural nudge, not load-bearing for
/// correctness, and its exact membership is a deployment detail rather than
/// a protocol invariant.
const WEB_SEARCH_TOOL_NAMES: &[&str] = &["web_search", "search_news"];

const NUDGE_TEXT: &str = "\n\n[You have already searched. Do not perform further searches — \
produce a FINAL_ANSWER based on what you have found.]";

/// The return type of both generation function shapes.
pub type GenerationFuture = BoxFuture<'static, Result<String, String>>;

/// The plain generation function shape: `(ctx, messages) -> response`.
pub type PlainGenerationFn = Arc<dyn Fn(CancellationToken, Vec<Message>) -> GenerationFuture + Send + Sync>;

/// The model-aware generation function shape: `(ctx, model, messages) -> response`.
/// Takes precedence over the plain variant when both are configured.
pub type ModelAwareGenerationFn =
    Arc<dyn Fn(CancellationToken, String, Vec<Message>) -> GenerationFuture + Send + Sync>;

/// The two generation function shapes an executor may be configured with.
/// At least one should be set; if neither is, every run fails immediately
/// with a generation error.
#[derive(Clone, Default)]
pub struct GenerationFns {
    pub plain: Option<PlainGenerationFn>,
    pub model_aware: Option<ModelAwareGenerationFn>,
}

impl GenerationFns {
    pub fn plain(f: PlainGenerationFn) -> Self {
        Self { plain: Some(f), model_aware: None }
    }

    pub fn model_aware(f: ModelAwareGenerationFn) -> Self {
        Self { plain: None, model_aware: Some(f) }
    }

    async fn generate(
        &self,
        ctx: CancellationToken,
        model: &str,
        messages: Vec<Message>,
    ) -> Result<String, String> {
        if let Some(f) = &self.model_aware {
            return f(ctx, model.to_string(), messages).await;
        }
        if let Some(f) = &self.plain {
            return f(ctx, messages).await;
        }
        Err("no generation function configured".to_string())
    }
}

/// Per-run configuration, assembled by the orchestrator from an
/// `AgentDescriptor`.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub model: String,
    pub max_steps: u32,
    /// The descriptor's `systemPrompt`, with `{{DATE}}`..`{{DATETIME}}`
    /// already substituted by the descriptor store at load time, but the
    /// `{{TOOLS}}` placeholder still unresolved — the executor fills that
    /// in at bootstrap, per §4.1/§4.4.
    pub system_prompt_template: String,
}

/// Drives one bounded Reason-Act loop. Owns its message log and step list
/// exclusively for the duration of one `run` call.
pub struct Executor {
    config: ExecutorConfig,
    tools: ToolRegistry,
    generation: GenerationFns,
    /// Per-tool static defaults from the descriptor's `tools[].config`,
    /// merged under whatever the model supplies in `ACTION_INPUT` before a
    /// handler is called.
    tool_defaults: HashMap<String, HashMap<String, Value>>,
}

impl Executor {
    pub fn new(config: ExecutorConfig, tools: ToolRegistry, generation: GenerationFns) -> Self {
        Self { config, tools, generation, tool_defaults: HashMap::new() }
    }

    /// Attach per-tool config defaults (descriptor `tools[].config`), keyed
    /// by tool name.
    pub fn with_tool_defaults(mut self, tool_defaults: HashMap<String, HashMap<String, Value>>) -> Self {
        self.tool_defaults = tool_defaults;
        self
    }

    /// Run the bounded step loop for `task`, producing a sealed `Execution`.
    pub async fn run(&self, ctx: CancellationToken, task: &str) -> Execution {
        let mut execution = Execution::new(task);

        let system_prompt = self.config.system_prompt_template.replace("{{TOOLS}}", &self.tools.manifest());
        let mut messages = vec![Message::system(system_prompt), Message::user(task)];

        let mut web_search_count: u32 = 0;

        for step_index in 0..self.config.max_steps {
            if ctx.is_cancelled() {
                execution.error = "execution cancelled".to_string();
                execution.seal(ExecutionStatus::Cancelled);
                return execution;
            }

            let response = tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    execution.error = "execution cancelled".to_string();
                    execution.seal(ExecutionStatus::Cancelled);
                    return execution;
                }
                result = self.generation.generate(ctx.clone(), &self.config.model, messages.clone()) => result,
            };

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    execution.error = format!("LLM error: {e}");
                    execution.seal(ExecutionStatus::Failed);
                    return execution;
                }
            };

            let parsed = react::parse_react_response(&response);

            if parsed.action.is_empty() && parsed.thought.is_empty() {
                let trimmed = response.trim().to_string();
                execution.steps.push(ExecutionStep {
                    index: step_index,
                    thought: String::new(),
                    action: "FINAL_ANSWER".to_string(),
                    tool_call: Some(ToolCall { name: "FINAL_ANSWER".to_string(), params: {
                        let mut m = serde_json::Map::new();
                        m.insert("input".to_string(), Value::String(trimmed.clone()));
                        m
                    } }),
                    tool_result: None,
                    timestamp: chrono::Utc::now(),
                });
                execution.result = trimmed;
                execution.seal(ExecutionStatus::Completed);
                return execution;
            }

            if parsed.action == "FINAL_ANSWER" {
                let result = parsed
                    .action_input
                    .get("input")
                    .and_then(Value::as_str)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| serde_json::to_string(&parsed.action_input).unwrap_or_default());

                execution.steps.push(ExecutionStep {
                    index: step_index,
                    thought: parsed.thought.clone(),
                    action: parsed.action.clone(),
                    tool_call: Some(ToolCall { name: parsed.action.clone(), params: parsed.action_input }),
                    tool_result: None,
                    timestamp: chrono::Utc::now(),
                });
                execution.result = result;
                execution.seal(ExecutionStatus::Completed);
                return execution;
            }

            let tool_result = match self.tools.get(&parsed.action) {
                None => ToolResultRecord {
                    tool: parsed.action.clone(),
                    value: None,
                    error: Some(format!("Tool not found: {}", parsed.action)),
                },
                Some(spec) => {
                    execution.record_tool_used(&parsed.action);
                    let args = match self.tool_defaults.get(&parsed.action) {
                        Some(defaults) => {
                            let overrides: HashMap<String, Value> = parsed.action_input.clone().into_iter().collect();
                            process_config(&overrides, defaults).into_iter().collect()
                        }
                        None => parsed.action_input.clone(),
                    };
                    match spec.handler.call(ctx.clone(), args).await {
                        Ok(outcome) => ToolResultRecord {
                            tool: parsed.action.clone(),
                            value: Some(outcome_to_value(&outcome)),
                            error: None,
                        },
                        Err(e) => ToolResultRecord { tool: parsed.action.clone(), value: None, error: Some(e) },
                    }
                }
            };

            let mut observation = format_observation(&tool_result);

            if WEB_SEARCH_TOOL_NAMES.contains(&parsed.action.as_str()) {
                web_search_count += 1;
                if web_search_count >= 1 {
                    observation.push_str(NUDGE_TEXT);
                }
            }

            messages.push(Message::assistant(response));
            messages.push(Message::user(format!("OBSERVATION: {observation}")));

            execution.steps.push(ExecutionStep {
                index: step_index,
                thought: parsed.thought,
                action: parsed.action.clone(),
                tool_call: Some(ToolCall { name: parsed.action, params: parsed.action_input }),
                tool_result: Some(tool_result),
                timestamp: chrono::Utc::now(),
            });
        }

        // Step cap exhausted without a FINAL_ANSWER: still a completed
        // execution, per §4.4/§7 — not a failure of the run.
        let gathered: Vec<String> = execution
            .steps
            .iter()
            .filter_map(|s| s.tool_result.as_ref())
            .filter(|r| r.error.is_none())
            .filter_map(|r| r.value.as_ref())
            .map(value_to_observation_text)
            .filter(|s| !s.is_empty())
            .collect();

        execution.result = if gathered.is_empty() {
            "No tool results were gathered before the step limit was reached.".to_string()
        } else {
            format!("Tool results gathered before reaching the step limit:\n{}", gathered.join("\n"))
        };
        execution.error = "max steps reached without a final answer".to_string();
        execution.seal(ExecutionStatus::Completed);
        execution
    }
}

fn outcome_to_value(outcome: &ToolOutcome) -> Value {
    match outcome {
        ToolOutcome::Text(s) => Value::String(s.clone()),
        ToolOutcome::Json(v) => v.clone(),
    }
}

/// Render a tool result the way the executor formats an `OBSERVATION:`
/// message, per §4.4 step 7.
fn format_observation(result: &ToolResultRecord) -> String {
    if let Some(err) = &result.error {
        return format!("Error: {err}");
    }
    match &result.value {
        Some(value) => value_to_observation_text(value),
        None => "No result".to_string(),
    }
}

fn value_to_observation_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
