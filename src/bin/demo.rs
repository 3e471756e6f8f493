//! agentrt demo binary.
//!
//! Wires the descriptor store (with hot-reload), the embedding router, and
//! the orchestrator together against toy generation and embedding
//! functions so the runtime can be exercised without a real LLM provider.
//! Not an RPC/HTTP server — that surface is out of scope (see spec.md §1)
//! and is left to a caller embedding this crate as a library.
//!
//! # Environment Variables
//!
//! - `AGENTRT_DESCRIPTOR_DIR` — descriptor directory (default: `./agents`)
//! - `AGENTRT_DEBOUNCE_MS` — hot-reload debounce window in milliseconds
//! - `RUST_LOG` — log filter (default: `info`)
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin agentrt-demo -- "summarise the quarterly numbers"
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use agentrt::descriptor::{AgentDescriptor, DescriptorStore, DescriptorWatcher, EvaluationConfig, ToolConfig};
use agentrt::embedding::EmbeddingRegistry;
use agentrt::evaluation::EvaluationController;
use agentrt::executor::{GenerationFns, PlainGenerationFn};
use agentrt::orchestrator::{Orchestrator, ToolCatalog};
use agentrt::tools::builtin::{ClockTool, EchoTool, ExprTool};
use agentrt::utilities::paths::RuntimeConfig;
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RuntimeConfig::from_env();
    let task = std::env::args().nth(1).unwrap_or_else(|| "What is 6 times 7?".to_string());

    let store = Arc::new(DescriptorStore::new(&config.descriptor_dir).context("open descriptor directory")?);
    seed_default_agent(&store).await;
    store.load_all().await.context("load descriptors")?;

    let tool_catalog = Arc::new(build_tool_catalog());
    let embedding_registry = Arc::new(EmbeddingRegistry::new().with_embedding_fn(toy_embedding_fn()).with_store(store.clone()));

    for descriptor in store.all().await {
        match embedding_registry.update_embedding(CancellationToken::new(), descriptor).await {
            Ok(updated) => log::info!("embedded agent {}", updated.id),
            Err(e) => log::warn!("failed to embed agent: {e}"),
        }
    }

    let watcher_embeddings = embedding_registry.clone();
    let on_change: agentrt::descriptor::ChangeCallback = Arc::new(move |descriptor| {
        let embeddings = watcher_embeddings.clone();
        tokio::spawn(async move {
            if let Err(e) = embeddings.update_embedding(CancellationToken::new(), descriptor).await {
                log::warn!("failed to re-embed reloaded descriptor: {e}");
            }
        });
    });
    let watcher_embeddings = embedding_registry.clone();
    let on_delete: agentrt::descriptor::DeleteCallback = Arc::new(move |id| {
        let embeddings = watcher_embeddings.clone();
        tokio::spawn(async move { embeddings.remove(&id).await });
    });
    let _watcher = DescriptorWatcher::start(store.clone(), config.debounce, on_change, on_delete)
        .context("start descriptor watcher")?;

    let evaluation = Some(Arc::new(EvaluationController::new(toy_evaluation_fn())));
    let orchestrator = Orchestrator::new(embedding_registry, tool_catalog, GenerationFns::plain(toy_generation_fn()), evaluation);

    let execution = orchestrator.route_and_execute(CancellationToken::new(), &task).await.context("routing failed")?;
    println!("{}", serde_json::to_string_pretty(&execution)?);
    Ok(())
}

fn build_tool_catalog() -> ToolCatalog {
    let mut catalog = HashMap::new();
    for spec in [EchoTool::spec(), ClockTool::spec(), ExprTool::spec()] {
        catalog.insert(spec.name.clone(), spec);
    }
    catalog
}

async fn seed_default_agent(store: &DescriptorStore) {
    if !store.all().await.is_empty() {
        return;
    }

    let descriptor = AgentDescriptor {
        id: "calculator-assistant".to_string(),
        name: "Calculator Assistant".to_string(),
        description: "Answers arithmetic questions using the calculator tool.".to_string(),
        model: "gpt-4o".to_string(),
        temperature: 0.2,
        max_steps: 5,
        timeout: std::time::Duration::from_secs(60),
        system_prompt: "You are a precise arithmetic assistant. Today is {{DATE}}.\n\n{{TOOLS}}".to_string(),
        tools: vec![ToolConfig { name: "calculator".to_string(), enabled: true, config: HashMap::new() }],
        evaluation: Some(EvaluationConfig { enabled: false, ..Default::default() }),
        embedding: Vec::new(),
        embedding_hash: String::new(),
        metadata: HashMap::new(),
        source_path: None,
        loaded_at: None,
    };

    if let Err(e) = store.save(descriptor).await {
        log::warn!("failed to seed default agent descriptor: {e}");
    }
}

/// A toy embedding function: hashes each word into a fixed-width bag of
/// buckets. Good enough to exercise routing end-to-end; not a real
/// embedding model (those are injected by the caller per §6).
fn toy_embedding_fn() -> agentrt::embedding::EmbeddingFn {
    const DIMS: usize = 32;
    Arc::new(|_ctx, texts| {
        Box::pin(async move {
            Ok(texts
                .iter()
                .map(|text| {
                    let mut vector = vec![0.0_f64; DIMS];
                    for word in text.split_whitespace() {
                        let bucket = agentrt::embedding::canonical::fnv1a_hex(word);
                        let idx = usize::from_str_radix(&bucket[..4], 16).unwrap_or(0) % DIMS;
                        vector[idx] += 1.0;
                    }
                    vector
                })
                .collect())
        })
    })
}

/// A toy generation function: always finalises immediately with a
/// calculator-tool call if the task looks arithmetic, else echoes the task.
fn toy_generation_fn() -> PlainGenerationFn {
    Arc::new(|_ctx, messages| {
        Box::pin(async move {
            let task = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            let has_digits = task.chars().any(|c| c.is_ascii_digit());
            let already_observed = messages.iter().any(|m| m.content.starts_with("OBSERVATION:"));

            if has_digits && !already_observed {
                let expr: String = task.chars().filter(|c| c.is_ascii_digit() || "+-*/() ".contains(*c)).collect();
                Ok(format!(
                    "THOUGHT: this looks arithmetic\nACTION: calculator\nACTION_INPUT: {{\"expr\": \"{}\"}}",
                    expr.trim()
                ))
            } else {
                Ok(format!(
                    "THOUGHT: ready to answer\nACTION: FINAL_ANSWER\nACTION_INPUT: {{\"input\": \"{}\"}}",
                    task.replace("OBSERVATION: ", "").replace('"', "'")
                ))
            }
        })
    })
}

fn toy_evaluation_fn() -> agentrt::evaluation::EvaluationGenerationFn {
    Arc::new(|_ctx, _model, _temperature, _messages| {
        Box::pin(async move {
            Ok("{\"passed\": true, \"score\": 0.9, \"criteria_results\": [], \"feedback\": \"looks fine\", \"improvements\": []}"
                .to_string())
        })
    })
}
