//! Crate-wide error taxonomy.
//!
//! One `thiserror` enum per subsystem, matching the error-category table in
//! the runtime's design: configuration errors are directory-level and fatal,
//! generation/evaluation errors are fatal to a single execution, and
//! per-step failures (tool-not-found, parse failures) are never surfaced as
//! `Result::Err` — they are recorded on the `Execution` itself.

use thiserror::Error;

/// Errors from the descriptor store (C1).
#[derive(Debug, Error)]
pub enum DescriptorStoreError {
    /// The descriptor directory could not be created, read, or listed.
    #[error("descriptor directory inaccessible: {0}")]
    DirectoryInaccessible(#[source] std::io::Error),

    /// A read or write against a specific descriptor file failed.
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialising a descriptor back to YAML failed.
    #[error("failed to serialise descriptor {id}: {source}")]
    Serialize {
        id: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The descriptor failed its structural invariants before it could be
    /// persisted.
    #[error("descriptor {id} failed validation: {message}")]
    Validation { id: String, message: String },
}

/// Errors from the embedding registry (C2).
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// No embedding function was configured on this registry.
    #[error("no embedding function configured")]
    NoEmbeddingFunction,

    /// A similarity query was issued but no agent carries an embedding.
    #[error("no agent in the registry has an embedding")]
    NoEmbeddedAgents,

    /// The injected embedding function returned an error.
    #[error("embedding function call failed: {0}")]
    EmbeddingCallFailed(String),

    /// The embedding function returned a vector count that does not match
    /// the number of input texts.
    #[error("embedding function returned {got} vectors for {expected} inputs")]
    VectorCountMismatch { expected: usize, got: usize },
}

/// Errors surfaced by the Reason-Act executor and evaluation controller
/// (C4/C5/C6). Tool errors and ReAct parse failures are intentionally not
/// represented here: per the executor's error-handling design, those are
/// per-step data recorded on the execution, not propagated `Result::Err`s.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The injected generation function returned an error.
    #[error("LLM error: {0}")]
    Generation(String),

    /// The execution's cancellation token fired before completion.
    #[error("execution cancelled")]
    Cancelled,

    /// The evaluation controller could not be driven to completion (e.g. the
    /// evaluator generation call itself failed, as opposed to merely
    /// returning a malformed payload, which degrades to the heuristic
    /// fallback instead of an error).
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// The task was routed but no agent could be selected.
    #[error("routing error: {0}")]
    Routing(#[from] EmbeddingError),
}
