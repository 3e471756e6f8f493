//! The execution-time data model (§3): messages, steps, and the sealed
//! `Execution` record that every orchestrator entry point returns.
//!
//! Unlike `AgentDescriptor`, these types have no independent lifecycle of
//! their own — they are created, mutated, and sealed entirely within one
//! `Executor::run` / evaluation-iteration call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A role in the executor's internal conversation log. Closed rather than
/// a bare string so `{system, user, assistant}` stays an enumerable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry in the executor-internal conversation log. Append-only within
/// one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A parsed `ACTION` / `ACTION_INPUT` pair from one model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub params: Map<String, Value>,
}

/// The outcome of dispatching a `ToolCall`, as recorded on the step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultRecord {
    pub tool: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One iteration of the Reason-Act loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub index: u32,
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
    #[serde(default)]
    pub tool_result: Option<ToolResultRecord>,
    pub timestamp: DateTime<Utc>,
}

/// The lifecycle state of an `Execution`. An execution is sealed exactly
/// once it leaves `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Per-criterion verdict inside one `EvaluationResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionResult {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub feedback: String,
}

/// The grade produced by one evaluation pass over one candidate answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub iteration: u32,
    pub passed: bool,
    pub score: f64,
    #[serde(default)]
    pub criteria_results: Vec<CriterionResult>,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub improvements: Vec<String>,
}

/// The canonical output of every orchestrator run. Created by the
/// orchestrator, mutated only by the executor and evaluation controller,
/// sealed (status leaves `Running`) exactly once before it is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub task: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub steps: Vec<ExecutionStep>,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub error: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Duplicate-free, first-occurrence-order subset of tool names actually
    /// invoked across `steps`.
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub iterations: u32,
    #[serde(default)]
    pub evaluation_results: Vec<EvaluationResult>,
    #[serde(default)]
    pub final_quality_score: f64,
}

impl Execution {
    /// Create a fresh, running execution with a new id.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task: task.into(),
            status: ExecutionStatus::Running,
            steps: Vec::new(),
            result: String::new(),
            error: String::new(),
            started_at: Utc::now(),
            ended_at: None,
            tools_used: Vec::new(),
            iterations: 0,
            evaluation_results: Vec::new(),
            final_quality_score: 0.0,
        }
    }

    /// Record a tool name in `tools_used`, set semantics: first occurrence
    /// wins, duplicates are silently dropped.
    pub fn record_tool_used(&mut self, name: &str) {
        if !self.tools_used.iter().any(|t| t == name) {
            self.tools_used.push(name.to_string());
        }
    }

    pub fn seal(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tool_used_is_duplicate_free_and_preserves_first_occurrence_order() {
        let mut execution = Execution::new("task");
        execution.record_tool_used("b");
        execution.record_tool_used("a");
        execution.record_tool_used("b");
        assert_eq!(execution.tools_used, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn seal_sets_status_and_ended_at() {
        let mut execution = Execution::new("task");
        assert!(execution.ended_at.is_none());
        execution.seal(ExecutionStatus::Completed);
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.ended_at.is_some());
    }
}
