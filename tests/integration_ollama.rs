#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use corpus_rag::config::OllamaConfig;
use corpus_rag::embeddings::ollama::{DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL};
use corpus_rag::embeddings::{ChunkingConfig, Embedder, OllamaClient, chunk_text};
use serial_test::serial;
use std::env;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn create_integration_test_client() -> OllamaClient {
    let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    let port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);
    let model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
    let embedding_dimension = env::var("OLLAMA_EMBEDDING_DIMENSION")
        .ok()
        .and_then(|d| d.parse().ok())
        .unwrap_or(DEFAULT_EMBEDDING_DIMENSION);

    let config = OllamaConfig {
        host,
        port,
        model,
        batch_size: 5,
        embedding_dimension,
        ..OllamaConfig::default()
    };

    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(3)
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[test]
#[serial]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let client = create_integration_test_client();
    let result = client.health_check();

    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[serial]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_batch_preserves_order() {
    init_test_tracing();

    let client = create_integration_test_client();
    let texts: Vec<String> = (0..12)
        .map(|i| format!("Passage number {} about the Sword Coast", i))
        .collect();

    let batched = client.embed(&texts).expect("batch embedding should succeed");
    assert_eq!(batched.len(), texts.len());

    // Each vector must match the one produced for its text alone
    for (text, vector) in texts.iter().zip(&batched).step_by(5) {
        let single = client.embed_query(text).expect("single embedding should succeed");
        assert_eq!(single.len(), client.dimension());
        assert!(
            squared_distance(&single, vector) < 1e-3,
            "batched embedding for {:?} differs from single",
            text
        );
    }
    info!("Verified order of {} batched embeddings", batched.len());
}

#[test]
#[serial]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_chunk_embeddings() {
    init_test_tracing();

    let client = create_integration_test_client();
    let content = "Baldur's Gate is a city on the Sword Coast. ".repeat(40);
    let chunks: Vec<String> = chunk_text(&content, &ChunkingConfig::default())
        .expect("default chunking config is valid")
        .into_iter()
        .map(str::to_string)
        .collect();
    debug!("Embedding {} chunks", chunks.len());

    let embeddings = client.embed(&chunks).expect("chunk embedding should succeed");

    assert_eq!(embeddings.len(), chunks.len());
    assert!(embeddings.iter().all(|e| e.len() == client.dimension()));
}

#[test]
#[serial]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_empty_input() {
    let client = create_integration_test_client();
    let embeddings = client.embed(&[]).expect("empty input should succeed");
    assert!(embeddings.is_empty());
}
