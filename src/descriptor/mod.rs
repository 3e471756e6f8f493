//! Agent descriptors: the unit of configuration for the runtime (C1's data
//! model). A descriptor is created by loading a file, mutated only by
//! hot-reload or embedding refresh, and destroyed when its source file
//! disappears.

pub mod store;
pub mod template;
pub mod watcher;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use store::{ChangeCallback, DeleteCallback, DescriptorStore};
pub use watcher::DescriptorWatcher;

/// Recognised descriptor file extensions.
pub const DESCRIPTOR_EXTENSIONS: &[&str] = &["yaml", "yml"];

fn default_temperature() -> f64 {
    0.7
}

fn default_max_steps() -> u32 {
    crate::utilities::paths::DEFAULT_MAX_STEPS
}

fn default_timeout() -> Duration {
    crate::utilities::paths::DEFAULT_TIMEOUT
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

fn default_max_iterations() -> u32 {
    crate::utilities::paths::DEFAULT_MAX_ITERATIONS
}

fn default_min_quality_score() -> f64 {
    crate::utilities::paths::DEFAULT_MIN_QUALITY_SCORE
}

fn default_evaluation_prompt() -> String {
    "Evaluate the following result against the original task.\n\n\
     Original task: {{ORIGINAL_TASK}}\n\nResult: {{RESULT}}\n\nCriteria:\n{{CRITERIA_LIST}}\n\n\
     Respond with a JSON object: \
     {\"passed\": bool, \"score\": number, \"criteria_results\": [...], \"feedback\": string, \"improvements\": [string]}"
        .to_string()
}

fn default_improvement_prompt() -> String {
    "The previous attempt at this task did not meet quality standards.\n\n\
     Original task: {{ORIGINAL_TASK}}\n\nPrevious result: {{PREVIOUS_RESULT}}\n\n\
     Evaluator feedback: {{EVALUATION_FEEDBACK}}\n\nFailed criteria:\n{{FAILED_CRITERIA}}\n\n\
     Produce an improved result that addresses this feedback."
        .to_string()
}

/// Serde support for the human-readable duration strings (`"120s"`, `"2m"`)
/// required of descriptor files by the external interface.
mod duration_serde {
    use super::Duration;
    use crate::utilities::paths::parse_human_duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}s", value.as_secs_f64()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_human_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// One entry in an `AgentDescriptor`'s ordered tool list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub config: HashMap<String, Value>,
}

/// A single quality criterion applied by the evaluation controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Criterion {
    pub name: String,
    /// Human-readable description of what the criterion checks for.
    pub check: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// Evaluation configuration block, embedded in an `AgentDescriptor`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_iterations", rename = "maxIterations")]
    pub max_iterations: u32,
    #[serde(default = "default_min_quality_score", rename = "minQualityScore")]
    pub min_quality_score: f64,
    #[serde(default)]
    pub criteria: Vec<Criterion>,
    #[serde(default = "default_evaluation_prompt", rename = "evaluationPrompt")]
    pub evaluation_prompt: String,
    #[serde(default = "default_improvement_prompt", rename = "improvementPrompt")]
    pub improvement_prompt: String,
    #[serde(default, rename = "evaluationModel")]
    pub evaluation_model: Option<String>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_iterations: default_max_iterations(),
            min_quality_score: default_min_quality_score(),
            criteria: Vec::new(),
            evaluation_prompt: default_evaluation_prompt(),
            improvement_prompt: default_improvement_prompt(),
            evaluation_model: None,
        }
    }
}

/// The declarative configuration for one agent.
///
/// Invariants (enforced by [`AgentDescriptor::validate`]): `id`, `name`, and
/// `system_prompt` are non-empty; `embedding_hash` is non-empty iff
/// `embedding` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_steps", rename = "maxSteps")]
    pub max_steps: u32,
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,
    #[serde(rename = "systemPrompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub evaluation: Option<EvaluationConfig>,
    #[serde(default)]
    pub embedding: Vec<f64>,
    #[serde(default, rename = "embeddingHash")]
    pub embedding_hash: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    /// Source file path. Not serialised; populated by the store on load.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
    /// Load timestamp. Not serialised; populated by the store on load.
    #[serde(skip)]
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Error returned by [`AgentDescriptor::validate`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum DescriptorValidationError {
    #[error("descriptor has an empty id")]
    EmptyId,
    #[error("descriptor {id} has an empty name")]
    EmptyName { id: String },
    #[error("descriptor {id} has an empty systemPrompt")]
    EmptySystemPrompt { id: String },
    #[error("descriptor {id} has embeddingHash set but no embedding, or vice versa")]
    InconsistentEmbedding { id: String },
}

impl AgentDescriptor {
    /// Validate the structural invariants from the data model.
    pub fn validate(&self) -> Result<(), DescriptorValidationError> {
        if self.id.trim().is_empty() {
            return Err(DescriptorValidationError::EmptyId);
        }
        if self.name.trim().is_empty() {
            return Err(DescriptorValidationError::EmptyName { id: self.id.clone() });
        }
        if self.system_prompt.trim().is_empty() {
            return Err(DescriptorValidationError::EmptySystemPrompt { id: self.id.clone() });
        }
        if self.embedding.is_empty() != self.embedding_hash.is_empty() {
            return Err(DescriptorValidationError::InconsistentEmbedding { id: self.id.clone() });
        }
        Ok(())
    }

    /// Enabled tools, in descriptor order.
    pub fn enabled_tools(&self) -> impl Iterator<Item = &ToolConfig> {
        self.tools.iter().filter(|t| t.enabled)
    }
}
