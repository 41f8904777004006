//! RAG server binary
//!
//! Run with: cargo run -p grounded-rag --bin grounded-rag-server

use std::sync::Arc;

use grounded_rag::{server::RagServer, Credentials, RagConfig, RagPipeline};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; variables may come from the environment
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grounded_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RagConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding backend: {:?} ({})", config.embeddings.backend, config.embeddings.model);
    tracing::info!("  - Segmentation: {:?}", config.segmentation.mode);
    tracing::info!("  - Generation model: {}", config.generation.model_id);
    tracing::info!("  - Passages per question: {}", config.retrieval.top_k);

    let credentials = Arc::new(Credentials::from_env()?);
    tracing::info!("watsonx.ai endpoint: {}", credentials.endpoint_url());

    let pipeline = Arc::new(RagPipeline::from_config(config, credentials)?);
    let server = RagServer::new(pipeline);

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/ingest       - Upload a PDF or text file");
    println!("  POST /api/ingest/url   - Ingest a web page");
    println!("  POST /api/query        - Ask a question");
    println!("  GET  /api/collections  - List collections");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
