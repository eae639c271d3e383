//! Retrieval-augmented question answering over a local document index.

pub mod config;
pub mod index;
pub mod ingest_service;
pub mod ollama;
pub mod query_service;
pub mod routes;

pub use config::Config;
pub use index::{DocumentIndex, KnowledgeIndex, ScoredDocument};
pub use ingest_service::IngestService;
pub use ollama::{Embedder, OllamaClient, TextGenerator};
pub use query_service::QueryService;
pub use routes::{router, AppState};
