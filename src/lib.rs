//! # agentrt
//!
//! An agent orchestration runtime: declarative agent descriptors loaded
//! from a hot-reloaded filesystem directory, embedding-based task routing,
//! a bounded Reason-Act tool-use loop, and an optional self-evaluation
//! improvement loop.
//!
//! The subsystems compose as:
//!
//! - [`descriptor`] — the descriptor store (C1): load, validate, persist,
//!   and watch agent descriptor files.
//! - [`embedding`] — the embedding registry (C2): per-agent embedding
//!   vectors, content-hash caching, cosine-similarity routing.
//! - [`tools`] — the tool registry (C3): the per-execution handler map the
//!   executor dispatches against.
//! - [`executor`] — the Reason-Act executor (C4): the bounded
//!   generate-parse-dispatch loop.
//! - [`evaluation`] — the self-evaluation controller (C5): grades a
//!   candidate answer and drives improvement iterations.
//! - [`orchestrator`] — the public entry point (C6) wiring the above
//!   together.

pub mod descriptor;
pub mod embedding;
pub mod evaluation;
pub mod executor;
pub mod orchestrator;
pub mod tools;
pub mod types;
pub mod utilities;

pub use descriptor::{AgentDescriptor, DescriptorStore, EvaluationConfig};
pub use embedding::EmbeddingRegistry;
pub use evaluation::EvaluationController;
pub use executor::{Executor, ExecutorConfig};
pub use orchestrator::Orchestrator;
pub use tools::{ToolRegistry, ToolSpec};
pub use types::{Execution, ExecutionStatus, Message};
