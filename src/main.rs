use anyhow::Result;
use axum::http::Method;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use askbase::config::Config;
use askbase::index::KnowledgeIndex;
use askbase::ingest_service::IngestService;
use askbase::ollama::OllamaClient;
use askbase::query_service::QueryService;
use askbase::routes::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "askbase=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    info!("Using model: {}", config.model_name);
    info!("Ollama endpoint: {}", config.ollama_base_url);

    // Long-lived collaborator handles, shared by every request
    let ollama = Arc::new(OllamaClient::new(
        &config.ollama_base_url,
        &config.embedding_model,
    ));
    let index = Arc::new(
        KnowledgeIndex::open(&config.index_dir, ollama.clone(), config.embedding_dimension)
            .await?,
    );

    let state = AppState {
        query_service: Arc::new(QueryService::new(
            index.clone(),
            ollama,
            config.model_name.clone(),
        )),
        ingest_service: Arc::new(IngestService::new(index)),
    };

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}
