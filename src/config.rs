use anyhow::{Context, Result};
use std::path::PathBuf;

pub const DEFAULT_MODEL_NAME: &str = "tinyllama";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
pub const DEFAULT_INDEX_DIR: &str = "./db";
pub const DEFAULT_PORT: u16 = 8000;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub model_name: String,
    pub ollama_base_url: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub index_dir: PathBuf,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let embedding_dimension = match std::env::var("EMBEDDING_DIMENSION") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("Invalid EMBEDDING_DIMENSION: {}", raw))?,
            Err(_) => DEFAULT_EMBEDDING_DIMENSION,
        };

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("Invalid PORT: {}", raw))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            model_name: std::env::var("MODEL_NAME")
                .unwrap_or_else(|_| DEFAULT_MODEL_NAME.to_string()),
            ollama_base_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_BASE_URL.to_string()),
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension,
            index_dir: PathBuf::from(
                std::env::var("INDEX_DIR").unwrap_or_else(|_| DEFAULT_INDEX_DIR.to_string()),
            ),
            port,
        })
    }
}
