#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! End-to-end tests of the chunk, embed and retrieve pipeline

use corpus_rag::commands::{embed_chunks, search};
use corpus_rag::config::{Config, OllamaConfig};
use corpus_rag::corpus::{ChunkStore, chunk_corpus, list_json_files};
use corpus_rag::database::VectorStore;
use corpus_rag::embeddings::ollama::DEFAULT_EMBEDDING_DIMENSION;
use corpus_rag::embeddings::{ChunkingConfig, Embedder, OllamaClient};
use corpus_rag::indexer::Indexer;
use corpus_rag::retrieval::Retriever;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// Letter histogram of `text`, one dimension per ASCII letter
fn letter_histogram(text: &str) -> Vec<f32> {
    ALPHABET
        .chars()
        .map(|letter| {
            text.chars()
                .filter(|c| c.to_ascii_lowercase() == letter)
                .count() as f32
        })
        .collect()
}

struct HistogramEmbedder;

impl Embedder for HistogramEmbedder {
    fn model_name(&self) -> &str {
        "histogram"
    }

    fn dimension(&self) -> usize {
        ALPHABET.len()
    }

    fn embed(&self, texts: &[String]) -> corpus_rag::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| letter_histogram(text)).collect())
    }
}

/// Answers `/api/embed` with letter histograms of the request input
struct HistogramResponder;

impl Respond for HistogramResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("request body is JSON");
        let embeddings: Vec<Vec<f32>> = body["input"]
            .as_array()
            .expect("input is an array")
            .iter()
            .map(|text| letter_histogram(text.as_str().expect("input item is a string")))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
    }
}

struct Workspace {
    _temp_dir: TempDir,
    documents: PathBuf,
    chunks: PathBuf,
    store: PathBuf,
}

fn write_document(dir: &Path, stem: &str, title: &str, content: &str) {
    let document = json!({
        "title": title,
        "url": format!("https://wiki.example.com/{}", stem),
        "tags": ["companion"],
        "content": content,
    });
    fs::write(dir.join(format!("{}.json", stem)), document.to_string())
        .expect("should write document");
}

fn workspace() -> Workspace {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let documents = temp_dir.path().join("documents");
    fs::create_dir_all(&documents).expect("should create documents dir");

    write_document(&documents, "karlach", "Karlach", &"k".repeat(1200));
    write_document(&documents, "wyll", "Wyll", &"w".repeat(480));
    write_document(&documents, "zevlor", "Zevlor", &"z".repeat(900));

    Workspace {
        chunks: temp_dir.path().join("chunks"),
        store: temp_dir.path().join("store"),
        documents,
        _temp_dir: temp_dir,
    }
}

async fn build(workspace: &Workspace, embedder: Arc<dyn Embedder>) {
    chunk_corpus(&workspace.documents, &workspace.chunks, &ChunkingConfig::default())
        .expect("chunk build should succeed");
    Indexer::new(embedder)
        .with_batch_size(2)
        .with_progress(false)
        .build(&workspace.chunks, &workspace.store)
        .await
        .expect("embed build should succeed");
}

#[tokio::test]
async fn query_retrieves_matching_document() {
    let workspace = workspace();
    build(&workspace, Arc::new(HistogramEmbedder)).await;

    let retriever = Retriever::open(Arc::new(HistogramEmbedder), &workspace.store, &workspace.chunks)
        .await
        .expect("should open retriever");
    let results = retriever
        .retrieve(&"z".repeat(450), 3)
        .await
        .expect("retrieve should succeed");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].title, "Zevlor");
    assert_eq!(results[0].chunk_id, "zevlor_chunk_1");
    assert_eq!(results[0].content, "z".repeat(450));
    assert!(results[0].score.abs() < 1e-3);
    assert!(results.windows(2).all(|pair| pair[0].score <= pair[1].score));
}

#[tokio::test]
async fn every_position_resolves_to_its_own_chunk() {
    let workspace = workspace();
    build(&workspace, Arc::new(HistogramEmbedder)).await;

    let store = VectorStore::open(&workspace.store)
        .await
        .expect("should open store");
    let chunks = ChunkStore::new(&workspace.chunks);
    assert_eq!(store.index().len(), store.metadata().len());

    for (position, record) in store.metadata().iter().enumerate() {
        let chunk = chunks.read(&record.chunk_id).expect("chunk file should exist");
        let neighbors = store
            .index()
            .search(&letter_histogram(&chunk.content), store.index().len())
            .await
            .expect("search should succeed");
        let own = neighbors
            .iter()
            .find(|n| n.position == position)
            .expect("every position is reachable");
        assert!(own.distance.abs() < 1e-3, "{} is misaligned", record.chunk_id);
    }
}

#[tokio::test]
async fn rebuild_is_idempotent() {
    let workspace = workspace();
    build(&workspace, Arc::new(HistogramEmbedder)).await;

    let read_chunks = || -> Vec<(PathBuf, Vec<u8>)> {
        list_json_files(&workspace.chunks)
            .expect("should list chunks")
            .into_iter()
            .map(|p| {
                let bytes = fs::read(&p).expect("should read chunk");
                (p, bytes)
            })
            .collect()
    };
    let query = letter_histogram(&"k".repeat(300));

    let first_chunks = read_chunks();
    let first_store = VectorStore::open(&workspace.store).await.expect("should open store");
    let first_hits = first_store
        .index()
        .search(&query, 4)
        .await
        .expect("search should succeed");
    let first_len = first_store.index().len();

    build(&workspace, Arc::new(HistogramEmbedder)).await;

    assert_eq!(read_chunks(), first_chunks);
    let second_store = VectorStore::open(&workspace.store).await.expect("should open store");
    assert_eq!(second_store.index().len(), first_len);
    assert_eq!(second_store.metadata(), first_store.metadata());
    let second_hits = second_store
        .index()
        .search(&query, 4)
        .await
        .expect("search should succeed");
    assert_eq!(second_hits, first_hits);
}

#[tokio::test]
async fn ollama_backed_pipeline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(HistogramResponder)
        .mount(&server)
        .await;

    let url = Url::parse(&server.uri()).expect("mock server uri should parse");
    let config = OllamaConfig {
        protocol: url.scheme().to_string(),
        host: url.host_str().expect("mock server has a host").to_string(),
        port: url.port().expect("mock server has a port"),
        model: "histogram".to_string(),
        batch_size: 2,
        embedding_dimension: ALPHABET.len() as u32,
    };
    let client: Arc<dyn Embedder> =
        Arc::new(OllamaClient::new(&config).expect("should create client"));

    let workspace = workspace();
    build(&workspace, Arc::clone(&client)).await;

    let retriever = Retriever::open(client, &workspace.store, &workspace.chunks)
        .await
        .expect("should open retriever");
    let results = retriever
        .retrieve(&"w".repeat(480), 1)
        .await
        .expect("retrieve should succeed");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_id, "wyll_chunk_0");
    assert_eq!(results[0].url, "https://wiki.example.com/wyll");
}

#[tokio::test]
async fn model_override_sets_index_dimension() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": "all-minilm:latest"},
                {"name": "histogram:latest"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(HistogramResponder)
        .mount(&server)
        .await;

    let workspace = workspace();
    chunk_corpus(&workspace.documents, &workspace.chunks, &ChunkingConfig::default())
        .expect("chunk build should succeed");

    let url = Url::parse(&server.uri()).expect("mock server uri should parse");
    let mut config = Config::default();
    config.ollama.protocol = url.scheme().to_string();
    config.ollama.host = url.host_str().expect("mock server has a host").to_string();
    config.ollama.port = url.port().expect("mock server has a port");
    config.paths.chunks_dir.clone_from(&workspace.chunks);
    config.paths.vectorstore_dir.clone_from(&workspace.store);

    // Same as `embed --model histogram`; embedding_dimension keeps its default
    config
        .ollama
        .set_model("histogram".to_string())
        .expect("model name is valid");
    assert_eq!(config.ollama.embedding_dimension, DEFAULT_EMBEDDING_DIMENSION);

    embed_chunks(&config, None, None)
        .await
        .expect("embed should adopt the model's dimension");

    let store = VectorStore::open(&workspace.store)
        .await
        .expect("should open store");
    assert_eq!(store.manifest().model, "histogram");
    assert_eq!(store.manifest().dimension, ALPHABET.len());
    assert_eq!(store.index().dimension(), ALPHABET.len());

    // Queries take the dimension from the manifest as well
    search(&config, "zzzz", Some(2))
        .await
        .expect("search should use the built dimension");
}
