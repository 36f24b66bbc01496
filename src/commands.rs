use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::corpus::{ChunkStore, chunk_corpus};
use crate::database::VectorStore;
use crate::embeddings::{Embedder, OllamaClient};
use crate::indexer::{ConsistencyValidator, Indexer};
use crate::mcp::{McpServer, SearchHandler};
use crate::retrieval::Retriever;

fn ollama_embedder(config: &Config) -> Result<Arc<OllamaClient>> {
    let client = OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
    Ok(Arc::new(client))
}

/// Split every document into chunk files
#[inline]
pub fn chunk_documents(config: &Config, input: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let input = input.unwrap_or_else(|| config.paths.documents_dir.clone());
    let output = output.unwrap_or_else(|| config.paths.chunks_dir.clone());

    let stats = chunk_corpus(&input, &output, &config.chunking)
        .with_context(|| format!("Failed to chunk documents in {}", input.display()))?;

    println!(
        "Chunked {} documents into {} chunks in {}",
        stats.documents,
        stats.chunks,
        output.display()
    );
    Ok(())
}

/// Embed every chunk file and rebuild the vector store.
///
/// The index dimension is whatever the chosen model produces, so switching
/// models never requires editing `embedding_dimension` by hand.
#[inline]
pub async fn embed_chunks(config: &Config, input: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let input = input.unwrap_or_else(|| config.paths.chunks_dir.clone());
    let output = output.unwrap_or_else(|| config.paths.vectorstore_dir.clone());

    let client = OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
    let configured_dimension = config.ollama.embedding_dimension as usize;
    let client = tokio::task::spawn_blocking(move || -> Result<OllamaClient> {
        client
            .health_check()
            .context("Ollama is not ready for embedding")?;
        let dimension = client
            .detect_dimension()
            .context("Failed to detect embedding dimension")?;
        if dimension != configured_dimension {
            info!(
                "Model {} produces {} dimensions (configured {}); using {}",
                client.model_name(),
                dimension,
                configured_dimension,
                dimension
            );
        }
        Ok(client.with_dimension(dimension))
    })
    .await
    .context("Ollama start-up task failed")??;

    let stats = Indexer::new(Arc::new(client))
        .with_batch_size(config.ollama.batch_size as usize)
        .build(&input, &output)
        .await
        .with_context(|| format!("Failed to embed chunks from {}", input.display()))?;

    println!(
        "Embedded {} chunks with {} ({} dimensions) into {}",
        stats.chunks_embedded,
        stats.manifest.model,
        stats.manifest.dimension,
        output.display()
    );
    println!("{}", stats.consistency.summary());
    Ok(())
}

/// Load the vector store and pair it with an Ollama client expecting the
/// dimension the store was built with
async fn open_retriever(config: &Config) -> Result<Retriever> {
    let store_dir = &config.paths.vectorstore_dir;
    let store = VectorStore::open(store_dir).await.with_context(|| {
        format!(
            "Failed to load vector store from {} (run `embed` first)",
            store_dir.display()
        )
    })?;

    let client = OllamaClient::new(&config.ollama)
        .context("Failed to initialize Ollama client")?
        .with_dimension(store.manifest().dimension);
    let embedder: Arc<dyn Embedder> = Arc::new(client);

    Retriever::from_parts(embedder, store, ChunkStore::new(&config.paths.chunks_dir))
        .context("Failed to prepare retriever")
}

/// Run one query and print the results as JSON
#[inline]
pub async fn search(config: &Config, query: &str, top_k: Option<usize>) -> Result<()> {
    let retriever = open_retriever(config).await?;
    let top_k = top_k.unwrap_or(config.retrieval.default_top_k);

    let results = retriever.retrieve(query, top_k).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "results": results }))?
    );
    Ok(())
}

/// Validate the built vector store against the chunk directory
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    let store_dir = &config.paths.vectorstore_dir;
    let store = match VectorStore::open(store_dir).await {
        Ok(store) => store,
        Err(e) => {
            println!("No usable vector store at {}: {}", store_dir.display(), e);
            println!("Run `corpus-rag chunk` and `corpus-rag embed` to build one.");
            return Ok(());
        }
    };

    let manifest = store.manifest();
    println!("Vector store: {}", store_dir.display());
    println!("  Model: {} ({} dimensions)", manifest.model, manifest.dimension);
    println!("  Built at: {}", manifest.built_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Format version: {}", manifest.format_version);

    let chunks = ChunkStore::new(&config.paths.chunks_dir);
    let report = ConsistencyValidator::new(&store, &chunks)
        .validate()
        .await
        .context("Consistency validation failed")?;
    println!("{}", report.summary());

    if !report.is_consistent {
        println!("  {} issue(s) found", report.total_issues());
        for chunk_id in report.missing_chunks.iter().take(10) {
            println!("  missing chunk file: {}", chunk_id);
        }
        for chunk_id in report.duplicate_chunk_ids.iter().take(10) {
            println!("  duplicate chunk id: {}", chunk_id);
        }
    }
    Ok(())
}

/// Start the MCP server on stdio
#[inline]
pub async fn serve_mcp(config: &Config) -> Result<()> {
    let health_client = ollama_embedder(config)?;
    match tokio::task::spawn_blocking(move || health_client.health_check()).await {
        Ok(Ok(())) => info!("Ollama health check passed"),
        Ok(Err(e)) => warn!("Ollama health check failed: {:#}", e),
        Err(e) => warn!("Ollama health check did not complete: {}", e),
    }

    let retriever = open_retriever(config).await.map_err(|e| {
        error!("Refusing to start: {:#}", e);
        e
    })?;

    let server = Arc::new(McpServer::new(
        "corpus-rag".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    ));
    server
        .register_tool(
            SearchHandler::tool_definition(),
            SearchHandler::new(Arc::new(retriever), config.retrieval.default_top_k),
        )
        .await;

    info!("MCP server initialized with tool: search");
    server.serve_stdio().await?;
    Ok(())
}

/// Write the effective configuration to the config file
#[inline]
pub fn init_config(config: &Config) -> Result<()> {
    config.save()?;
    println!("Wrote configuration to {}", config.config_file_path().display());
    Ok(())
}
