use clap::{Parser, Subcommand};
use corpus_rag::Result;
use corpus_rag::commands::{
    chunk_documents, embed_chunks, init_config, search, serve_mcp, show_status,
};
use corpus_rag::config::{Config, get_config_dir, show_config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "corpus-rag")]
#[command(about = "Chunk, embed and search a document corpus, with an MCP server for retrieval")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split documents into overlapping chunk files
    Chunk {
        /// Directory of document JSON files
        #[arg(long)]
        input: Option<PathBuf>,
        /// Directory to write chunk files to
        #[arg(long)]
        output: Option<PathBuf>,
        /// Chunk window in characters
        #[arg(long)]
        window: Option<usize>,
        /// Characters shared by consecutive chunks
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Embed chunk files and rebuild the vector store
    Embed {
        /// Directory of chunk files
        #[arg(long)]
        input: Option<PathBuf>,
        /// Vector store directory
        #[arg(long)]
        output: Option<PathBuf>,
        /// Ollama embedding model
        #[arg(long)]
        model: Option<String>,
    },
    /// Run a single query against the vector store
    Search {
        /// Query text
        query: String,
        /// Number of results
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Check that the vector store, metadata and chunk files agree
    Status,
    /// Start MCP server on stdio
    Serve,
    /// Show or write the configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Write the current configuration to config.toml
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };
    let mut config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Chunk {
            input,
            output,
            window,
            overlap,
        } => {
            if let Some(window) = window {
                config.chunking.window = window;
            }
            if let Some(overlap) = overlap {
                config.chunking.overlap = overlap;
            }
            chunk_documents(&config, input, output)?;
        }
        Commands::Embed {
            input,
            output,
            model,
        } => {
            if let Some(model) = model {
                config.ollama.set_model(model)?;
            }
            embed_chunks(&config, input, output).await?;
        }
        Commands::Search { query, top_k } => {
            search(&config, &query, top_k).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
        Commands::Serve => {
            serve_mcp(&config).await?;
        }
        Commands::Config { show, init } => {
            if init {
                init_config(&config)?;
            }
            if show || !init {
                show_config(&config)?;
            }
        }
    }

    Ok(())
}
