//! API routes

pub mod collections;
pub mod ingest;
pub mod query;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/ingest",
            post(ingest::ingest_file).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/ingest/url", post(ingest::ingest_url))
        .route("/query", post(query::query))
        .route("/collections", get(collections::list_collections))
        .route("/collections/:name", delete(collections::delete_collection))
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<Value> {
    let config = state.pipeline().config();
    Json(json!({
        "name": "grounded-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Grounded question answering over PDFs, text files and web pages",
        "embedder": state.pipeline().index().embedder().name(),
        "generator": state.pipeline().generator_name(),
        "model_id": config.generation.model_id,
        "segmentation": config.segmentation.mode,
        "top_k": config.retrieval.top_k,
        "uptime_secs": state.uptime_secs(),
        "endpoints": {
            "POST /api/ingest": "Upload a PDF or text file (multipart field 'file', optional 'collection')",
            "POST /api/ingest/url": "Fetch and ingest a web page",
            "POST /api/query": "Answer a question from a collection",
            "GET /api/collections": "List collections",
            "DELETE /api/collections/:name": "Delete a collection"
        }
    }))
}
