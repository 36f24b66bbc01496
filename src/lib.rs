use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Position {position} is out of range for {len} metadata records")]
    OutOfRange { position: usize, len: usize },

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<config::ConfigError> for RagError {
    #[inline]
    fn from(error: config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod corpus;
pub mod database;
pub mod embeddings;
pub mod indexer;
pub mod mcp;
pub mod retrieval;
