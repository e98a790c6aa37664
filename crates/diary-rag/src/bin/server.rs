//! Diary RAG server binary
//!
//! Run with: cargo run -p diary-rag --bin diary-rag-server
//!
//! Reads an optional TOML config from `DIARY_RAG_CONFIG`; credentials and the
//! collection name come from the environment.

use std::path::PathBuf;

use diary_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diary_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                      Diary RAG System                     ║
║          Grounded Q&A over a Research Diary               ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let config_path = std::env::var_os("DIARY_RAG_CONFIG").map(PathBuf::from);
    let config = RagConfig::load(config_path.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {} ({:?})", config.embeddings.model, config.embeddings.provider);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - LLM model: {} ({:?})", config.llm.model, config.llm.provider);
    tracing::info!("  - Vector index: {:?}, collection '{}'", config.vector_db.backend, config.vector_db.collection);
    tracing::info!("  - Top k: {}", config.vector_db.top_k);

    let server = RagServer::new(config).await?;

    // Refuse to serve with an embedder that disagrees with the index width
    if let Err(e) = server.initialize().await {
        tracing::error!("Embedding model initialization failed: {}", e);
        return Err(e.into());
    }

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /query   - Ask questions");
    println!("  POST /ingest  - Index raw text");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
