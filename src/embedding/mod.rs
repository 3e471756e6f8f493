//! The embedding registry (C2): one embedding vector per descriptor,
//! recomputed only when the canonical text's content hash changes, queried
//! by cosine similarity.

pub mod canonical;
pub mod similarity;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use canonical::{canonical_agent_text, fnv1a_hex};
use similarity::cosine_similarity;

use crate::descriptor::{AgentDescriptor, DescriptorStore};
use crate::utilities::errors::EmbeddingError;

/// A boxed, `'static` future — the return type of the injected embedding
/// function.
pub type EmbeddingFuture = BoxFuture<'static, Result<Vec<Vec<f64>>, String>>;

/// The injected embedding function: `(ctx, texts) -> vectors`, one vector
/// per input text, in input order, sharing dimensionality.
pub type EmbeddingFn = Arc<dyn Fn(CancellationToken, Vec<String>) -> EmbeddingFuture + Send + Sync>;

/// Holds one embedding vector per descriptor id and answers nearest-neighbour
/// queries. Shares descriptor instances with a [`DescriptorStore`]: the
/// store is the sole writer of a descriptor's non-embedding fields, this
/// registry is the sole writer of its embedding fields.
pub struct EmbeddingRegistry {
    embed_fn: Option<EmbeddingFn>,
    store: Option<Arc<DescriptorStore>>,
    persist_timeout: Duration,
    entries: RwLock<HashMap<String, AgentDescriptor>>,
}

impl EmbeddingRegistry {
    /// Construct a registry with no embedding function and no backing store
    /// (queries will fail with [`EmbeddingError::NoEmbeddingFunction`]).
    pub fn new() -> Self {
        Self {
            embed_fn: None,
            store: None,
            persist_timeout: crate::utilities::paths::DEFAULT_PERSIST_TIMEOUT,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Attach an embedding function.
    pub fn with_embedding_fn(mut self, embed_fn: EmbeddingFn) -> Self {
        self.embed_fn = Some(embed_fn);
        self
    }

    /// Attach the descriptor store so updated embeddings are persisted back
    /// to their source file after a cache miss.
    pub fn with_store(mut self, store: Arc<DescriptorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the persistence bound applied when writing a refreshed
    /// embedding back to disk.
    pub fn with_persist_timeout(mut self, timeout: Duration) -> Self {
        self.persist_timeout = timeout;
        self
    }

    /// Register (or replace) a descriptor's embedding-bearing entry without
    /// recomputing anything.
    pub async fn register(&self, descriptor: AgentDescriptor) {
        self.entries.write().await.insert(descriptor.id.clone(), descriptor);
    }

    /// Drop a descriptor's entry. Idempotent.
    pub async fn remove(&self, id: &str) {
        self.entries.write().await.remove(id);
    }

    /// Update (if necessary) and register a descriptor's embedding.
    ///
    /// Cache hit: if the descriptor already carries an embedding whose hash
    /// matches the canonical text's current hash, no embedding call is made.
    /// Cache miss: the embedding function is invoked once, the descriptor is
    /// updated and registered, and persistence to the backing store (if any)
    /// is attempted on a bounded, independent timeout — failure there is
    /// logged, not propagated.
    pub async fn update_embedding(
        &self,
        ctx: CancellationToken,
        descriptor: AgentDescriptor,
    ) -> Result<AgentDescriptor, EmbeddingError> {
        let Some(embed_fn) = self.embed_fn.clone() else {
            self.register(descriptor.clone()).await;
            return Ok(descriptor);
        };

        let canonical = canonical_agent_text(&descriptor);
        let hash = fnv1a_hex(&canonical);

        if !descriptor.embedding.is_empty() && descriptor.embedding_hash == hash {
            self.register(descriptor.clone()).await;
            return Ok(descriptor);
        }

        let vectors = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(EmbeddingError::EmbeddingCallFailed("cancelled".to_string())),
            result = embed_fn(ctx.clone(), vec![canonical]) => result.map_err(EmbeddingError::EmbeddingCallFailed)?,
        };

        let vector = vectors
            .into_iter()
            .next()
            .ok_or(EmbeddingError::VectorCountMismatch { expected: 1, got: 0 })?;

        let mut updated = descriptor;
        updated.embedding = vector;
        updated.embedding_hash = hash;

        self.register(updated.clone()).await;

        if let Some(store) = &self.store {
            match tokio::time::timeout(self.persist_timeout, store.save(updated.clone())).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::warn!("failed to persist embedding for {}: {e}", updated.id),
                Err(_) => log::warn!("persisting embedding for {} timed out", updated.id),
            }
        }

        Ok(updated)
    }

    /// The single best-matching agent for `task`, by cosine similarity.
    /// Ties are broken by iteration order; callers must not depend on it.
    pub async fn find_best(
        &self,
        ctx: CancellationToken,
        task: &str,
    ) -> Result<AgentDescriptor, EmbeddingError> {
        self.find_top_n(ctx, task, 1)
            .await?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::NoEmbeddedAgents)
    }

    /// Up to `n` best-matching agents for `task`, descending by similarity.
    pub async fn find_top_n(
        &self,
        ctx: CancellationToken,
        task: &str,
        n: usize,
    ) -> Result<Vec<AgentDescriptor>, EmbeddingError> {
        let embed_fn = self
            .embed_fn
            .clone()
            .ok_or(EmbeddingError::NoEmbeddingFunction)?;

        {
            let entries = self.entries.read().await;
            if entries.values().all(|d| d.embedding.is_empty()) {
                return Err(EmbeddingError::NoEmbeddedAgents);
            }
        }

        let ctx_cancel = ctx.clone();
        let query_vectors = tokio::select! {
            biased;
            _ = ctx_cancel.cancelled() => return Err(EmbeddingError::EmbeddingCallFailed("cancelled".to_string())),
            result = embed_fn(ctx, vec![task.to_string()]) => result.map_err(EmbeddingError::EmbeddingCallFailed)?,
        };
        let query = query_vectors
            .into_iter()
            .next()
            .ok_or(EmbeddingError::VectorCountMismatch { expected: 1, got: 0 })?;

        let entries = self.entries.read().await;
        let mut scored: Vec<(f64, AgentDescriptor)> = entries
            .values()
            .filter(|d| !d.embedding.is_empty())
            .map(|d| (cosine_similarity(&query, &d.embedding), d.clone()))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored.into_iter().take(n).map(|(_, d)| d).collect())
    }
}

impl Default for EmbeddingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
