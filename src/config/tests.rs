use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            ollama: OllamaConfig {
                protocol: "https".to_string(),
                host: "test-host".to_string(),
                port: 8080,
                model: "test-model".to_string(),
                batch_size: 32,
                embedding_dimension: 768,
            },
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let content =
            fs::read_to_string(&config_path).expect("should read from config_path successfully");
        let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [ollama
            host = "localhost"
            port = "invalid_port"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn partial_config_with_defaults() {
        let partial_toml = r#"
            [ollama]
            host = "custom-host"

            [chunking]
            window = 1000
        "#;

        let config: Config = toml::from_str(partial_toml).expect("partial config should parse");
        assert_eq!(config.ollama.host, "custom-host");
        assert_eq!(config.ollama.port, 11434);
        assert_eq!(config.chunking.window, 1000);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.retrieval.default_top_k, 3);
    }

    #[test]
    fn complete_valid_config() {
        let valid_toml = r#"
            [ollama]
            protocol = "http"
            host = "localhost"
            port = 11434
            model = "nomic-embed-text:latest"
            batch_size = 64
            embedding_dimension = 768

            [chunking]
            window = 500
            overlap = 50

            [paths]
            documents_dir = "corpus/documents"
            chunks_dir = "corpus/chunks"
            vectorstore_dir = "corpus/vectorstore"

            [retrieval]
            default_top_k = 5
        "#;

        let config: Config = toml::from_str(valid_toml).expect("config should parse");
        assert!(config.validate().is_ok());
        assert_eq!(config.ollama.embedding_dimension, 768);
        assert_eq!(
            config.paths.vectorstore_dir,
            std::path::PathBuf::from("corpus/vectorstore")
        );
        assert_eq!(config.retrieval.default_top_k, 5);
    }

    #[test]
    fn config_error_converts_into_crate_error() {
        let error: crate::RagError = ConfigError::InvalidTopK(0).into();
        assert!(matches!(error, crate::RagError::Config(_)));
        assert!(error.to_string().contains("top_k"));
    }
}
