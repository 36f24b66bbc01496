// Configuration management module
// TOML configuration for the embedder, chunking, artifact paths and retrieval

pub mod settings;

#[cfg(test)]
mod tests;

use anyhow::Result;

pub use settings::{Config, ConfigError, OllamaConfig, PathsConfig, RetrievalConfig};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}

/// Print the effective configuration as TOML
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    println!("# {}", config.config_file_path().display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
