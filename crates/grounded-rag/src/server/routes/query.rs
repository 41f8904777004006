//! Question answering endpoint

use axum::{extract::State, Json};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{QueryRequest, QueryResponse};

/// POST /api/query
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    if request.question.trim().is_empty() {
        return Err(Error::InvalidRequest("Question must not be empty".to_string()));
    }

    tracing::info!("Query on {}: \"{}\"", request.collection, request.question);

    let response = state.pipeline().ask(&request).await?;

    tracing::info!(
        "Query completed in {}ms (answerable: {})",
        response.processing_time_ms,
        response.answerable
    );
    Ok(Json(response))
}
